//! Applies a stack's manifest tree into its target endpoint and namespace.

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;
use tracing::info;
use walkdir::WalkDir;

use crate::clients::kube::{KubeClientFactory, KubeError};
use crate::constants::{MANIFEST_EXTENSIONS, labels};
use crate::models::Stack;

/// Label set attached to every resource a deploy touches, so the stack's
/// workloads can be found and cleaned up later.
#[derive(Debug, Clone)]
pub struct KubeAppLabels {
    pub stack_id: i32,
    pub stack_name: String,
    pub owner: String,
    /// "content" for file-managed deploys, "git" for repository deploys.
    pub kind: &'static str,
}

impl KubeAppLabels {
    #[must_use]
    pub fn pairs(&self) -> Vec<(String, String)> {
        vec![
            (labels::STACK_ID.to_string(), self.stack_id.to_string()),
            (labels::STACK_NAME.to_string(), self.stack_name.clone()),
            (labels::OWNER.to_string(), self.owner.clone()),
            (labels::KIND.to_string(), self.kind.to_string()),
        ]
    }
}

#[derive(Debug, Error)]
pub enum DeployError {
    #[error("No manifests found under {0}")]
    EmptyProject(String),

    #[error(transparent)]
    Kube(#[from] KubeError),

    #[error("Deploy failed: {0}")]
    Other(String),
}

#[async_trait]
pub trait KubeDeployer: Send + Sync {
    /// Apply every manifest under `stack.project_path` into the stack's
    /// namespace on the given endpoint. Returns a human-readable summary.
    async fn deploy(&self, stack: &Stack, labels: KubeAppLabels) -> Result<String, DeployError>;
}

pub struct KubectlDeployer {
    factory: KubeClientFactory,
}

impl KubectlDeployer {
    #[must_use]
    pub const fn new(factory: KubeClientFactory) -> Self {
        Self { factory }
    }
}

/// Manifest files under a project path, sorted for deterministic apply order.
fn manifest_files(project_path: &Path) -> Vec<std::path::PathBuf> {
    let mut files: Vec<_> = WalkDir::new(project_path)
        .follow_links(false)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| MANIFEST_EXTENSIONS.contains(&ext))
        })
        .collect();
    files.sort();
    files
}

#[async_trait]
impl KubeDeployer for KubectlDeployer {
    async fn deploy(&self, stack: &Stack, labels: KubeAppLabels) -> Result<String, DeployError> {
        let client = self.factory.client_for(stack.endpoint_id)?;

        let project_path = Path::new(&stack.project_path);
        let manifests = manifest_files(project_path);
        if manifests.is_empty() {
            return Err(DeployError::EmptyProject(stack.project_path.clone()));
        }

        let label_pairs = labels.pairs();
        let mut summary = String::new();

        for manifest in &manifests {
            let output = client.apply_file(manifest, &stack.namespace).await?;
            client
                .label_file(manifest, &stack.namespace, &label_pairs)
                .await?;
            summary.push_str(&output);
        }

        info!(
            stack_id = stack.id,
            manifests = manifests.len(),
            namespace = %stack.namespace,
            "Stack deployed"
        );

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_discovery_filters_and_sorts() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("b.yml"), "b").unwrap();
        std::fs::write(dir.path().join("a.yaml"), "a").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "n").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/c.yaml"), "c").unwrap();

        let files = manifest_files(dir.path());
        let names: Vec<_> = files
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_string_lossy().into_owned())
            .collect();

        assert_eq!(names, vec!["a.yaml", "b.yml", "sub/c.yaml"]);
    }

    #[test]
    fn label_pairs_cover_identity() {
        let labels = KubeAppLabels {
            stack_id: 4,
            stack_name: "web".to_string(),
            owner: "admin".to_string(),
            kind: "content",
        };

        let pairs = labels.pairs();
        assert_eq!(pairs.len(), 4);
        assert!(pairs.iter().any(|(k, v)| k.ends_with("stack.id") && v == "4"));
        assert!(pairs.iter().any(|(_, v)| v == "content"));
    }
}
