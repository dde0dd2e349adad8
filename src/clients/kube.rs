//! Cluster access via the `kubectl` binary.
//!
//! Each configured endpoint maps to a [`KubeClient`] that shells out with the
//! endpoint's server URL and token. Manifest content never goes through a
//! shell; everything is passed as arguments or on stdin.

use serde_json::json;
use std::path::Path;
use std::process::Stdio;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::config::EndpointConfig;

#[derive(Debug, Error)]
pub enum KubeError {
    #[error("Unknown endpoint {0}")]
    UnknownEndpoint(i32),

    #[error("Failed to run kubectl: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("kubectl {command} failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("Failed to encode secret payload: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Resolves a stack's endpoint id to a client, or fails for unknown ids.
#[derive(Debug, Clone, Default)]
pub struct KubeClientFactory {
    endpoints: Vec<EndpointConfig>,
}

impl KubeClientFactory {
    #[must_use]
    pub const fn new(endpoints: Vec<EndpointConfig>) -> Self {
        Self { endpoints }
    }

    pub fn client_for(&self, endpoint_id: i32) -> Result<KubeClient, KubeError> {
        self.endpoints
            .iter()
            .find(|endpoint| endpoint.id == endpoint_id)
            .map(|endpoint| KubeClient {
                endpoint: endpoint.clone(),
            })
            .ok_or(KubeError::UnknownEndpoint(endpoint_id))
    }

}

#[derive(Debug, Clone)]
pub struct KubeClient {
    endpoint: EndpointConfig,
}

impl KubeClient {
    fn command(&self, namespace: &str) -> Command {
        let mut cmd = Command::new("kubectl");
        cmd.arg("--server").arg(&self.endpoint.server_url);
        if !self.endpoint.token.is_empty() {
            cmd.arg("--token").arg(&self.endpoint.token);
        }
        if self.endpoint.insecure {
            cmd.arg("--insecure-skip-tls-verify=true");
        }
        cmd.arg("--namespace").arg(namespace);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }

    async fn run(&self, mut cmd: Command, what: &str) -> Result<String, KubeError> {
        let output = cmd.output().await?;
        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            Err(KubeError::CommandFailed {
                command: what.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            })
        }
    }

    pub async fn apply_file(&self, manifest: &Path, namespace: &str) -> Result<String, KubeError> {
        let mut cmd = self.command(namespace);
        cmd.arg("apply").arg("-f").arg(manifest);
        self.run(cmd, "apply").await
    }

    /// Attach labels to every resource named by the manifest file.
    pub async fn label_file(
        &self,
        manifest: &Path,
        namespace: &str,
        labels: &[(String, String)],
    ) -> Result<(), KubeError> {
        let mut cmd = self.command(namespace);
        cmd.arg("label").arg("--overwrite").arg("-f").arg(manifest);
        for (key, value) in labels {
            cmd.arg(format!("{key}={value}"));
        }
        self.run(cmd, "label").await?;
        Ok(())
    }

    /// Apply a `kubernetes.io/dockerconfigjson` image-pull secret.
    pub async fn apply_pull_secret(
        &self,
        namespace: &str,
        name: &str,
        server: &str,
        username: &str,
        password: &str,
    ) -> Result<(), KubeError> {
        use base64::Engine as _;
        let b64 = |bytes: &[u8]| base64::engine::general_purpose::STANDARD.encode(bytes);

        let auth = b64(format!("{username}:{password}").as_bytes());
        let dockerconfig = json!({
            "auths": {
                server: {
                    "username": username,
                    "password": password,
                    "auth": auth,
                }
            }
        });

        let secret = json!({
            "apiVersion": "v1",
            "kind": "Secret",
            "type": "kubernetes.io/dockerconfigjson",
            "metadata": { "name": name, "namespace": namespace },
            "data": {
                ".dockerconfigjson": b64(serde_json::to_vec(&dockerconfig)?.as_slice()),
            }
        });

        let mut cmd = self.command(namespace);
        cmd.arg("apply").arg("-f").arg("-");
        cmd.stdin(Stdio::piped());

        let mut child = cmd.spawn()?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(serde_json::to_vec(&secret)?.as_slice()).await?;
        }

        let output = child.wait_with_output().await?;
        if output.status.success() {
            Ok(())
        } else {
            Err(KubeError::CommandFailed {
                command: "apply secret".to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            })
        }
    }
}
