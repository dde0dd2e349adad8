//! Orchestrates the two stack-update modes.
//!
//! A git-managed stack takes the git branch (credential carry-forward,
//! reachability probe, autoupdate job rotation); a file-managed stack takes
//! the file branch (deploy from a scoped temp dir, then commit the manifest
//! to the durable store with rollback on failure). The branches never cross:
//! a stack cannot switch modes through an update.
//!
//! Persistence of the stack record happens in the caller after a successful
//! update, so an abort in the git branch leaves no durable effect. The one
//! deliberate exception is the file-branch rename, which is persisted before
//! the deploy so failed deploys can still be retried under the new name.

use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::clients::git::{GitError, GitService};
use crate::clients::kube::KubeClientFactory;
use crate::db::Store;
use crate::filestore::FileStore;
use crate::models::{AutoUpdateSettings, GitAuthentication, Stack, StackSource};
use crate::scheduler::Scheduler;
use crate::services::autoupdate::{AutoupdateContext, start_autoupdate, stop_autoupdate};
use crate::services::deploy::{DeployError, KubeAppLabels, KubeDeployer};
use crate::services::registry::RegistrySecretRefresher;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitStackUpdate {
    pub repository_reference_name: String,

    #[serde(default)]
    pub repository_authentication: bool,

    #[serde(default)]
    pub repository_username: String,

    #[serde(default)]
    pub repository_password: String,

    #[serde(default)]
    pub auto_update: Option<AutoUpdateSettings>,

    #[serde(default)]
    pub tls_skip_verify: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileStackUpdate {
    pub stack_file_content: String,

    #[serde(default)]
    pub stack_name: Option<String>,
}

#[derive(Debug, Clone)]
pub enum StackUpdatePayload {
    Git(GitStackUpdate),
    File(FileStackUpdate),
}

#[derive(Debug, Error)]
pub enum StackUpdateError {
    /// The file branch requires a caller identity for the deploy labels.
    #[error("Failed to retrieve caller identity")]
    MissingIdentity,

    #[error("{0}")]
    Validation(String),

    #[error("Unable to fetch git repository: {0}")]
    GitProbe(#[from] GitError),

    #[error("Unable to schedule stack auto update: {0}")]
    Scheduler(anyhow::Error),

    #[error("Unable to deploy Kubernetes stack: {0}")]
    Deploy(#[from] DeployError),

    #[error("Unable to persist Kubernetes manifest on disk: {0}")]
    Persistence(anyhow::Error),

    #[error("Database error: {0}")]
    Database(anyhow::Error),
}

/// Credential carry-forward: an empty payload password with authentication
/// enabled reuses the previously stored password, so clients can rotate other
/// git settings without re-sending the secret.
pub fn effective_password(payload_password: &str, prior: Option<&str>) -> String {
    if payload_password.is_empty() {
        if let Some(prior) = prior {
            return prior.to_string();
        }
    }
    payload_password.to_string()
}

pub struct StackUpdateService {
    store: Store,
    file_store: FileStore,
    git: Arc<dyn GitService>,
    scheduler: Arc<Scheduler>,
    deployer: Arc<dyn KubeDeployer>,
    kube_factory: KubeClientFactory,
    registry_refresher: Arc<RegistrySecretRefresher>,
}

impl StackUpdateService {
    #[must_use]
    pub fn new(
        store: Store,
        file_store: FileStore,
        git: Arc<dyn GitService>,
        scheduler: Arc<Scheduler>,
        deployer: Arc<dyn KubeDeployer>,
        kube_factory: KubeClientFactory,
    ) -> Self {
        let registry_refresher = Arc::new(RegistrySecretRefresher::new(store.clone()));
        Self {
            store,
            file_store,
            git,
            scheduler,
            deployer,
            kube_factory,
            registry_refresher,
        }
    }

    fn autoupdate_context(&self) -> AutoupdateContext {
        AutoupdateContext {
            store: self.store.clone(),
            git: Arc::clone(&self.git),
            deployer: Arc::clone(&self.deployer),
            workspace: self.file_store.clone(),
        }
    }

    /// Dispatch on the stack's source. The caller persists `stack` after a
    /// successful return.
    pub async fn update_kubernetes_stack(
        &self,
        stack: &mut Stack,
        payload: StackUpdatePayload,
        caller: Option<&str>,
    ) -> Result<(), StackUpdateError> {
        match (&stack.source, payload) {
            (StackSource::Git(_), StackUpdatePayload::Git(git)) => {
                self.update_git(stack, git).await
            }
            (StackSource::File, StackUpdatePayload::File(file)) => {
                self.update_file(stack, file, caller).await
            }
            _ => Err(StackUpdateError::Validation(
                "Payload does not match the stack's management mode".to_string(),
            )),
        }
    }

    async fn update_git(
        &self,
        stack: &mut Stack,
        payload: GitStackUpdate,
    ) -> Result<(), StackUpdateError> {
        // Stop any live autoupdate job before touching the record, so a
        // racing job never observes a half-written config.
        if let Some(job_id) = stack.auto_update.as_ref().and_then(|s| s.job_id) {
            stop_autoupdate(&self.scheduler, stack.id, job_id).await;
        }

        let StackSource::Git(config) = &mut stack.source else {
            return Err(StackUpdateError::Validation(
                "Stack is not git-managed".to_string(),
            ));
        };

        let prior_password = config.authentication.take().map(|auth| auth.password);
        config.reference_name = payload.repository_reference_name.clone();
        config.tls_skip_verify = payload.tls_skip_verify;

        let probe = if payload.repository_authentication {
            let auth = GitAuthentication {
                username: payload.repository_username.clone(),
                password: effective_password(
                    &payload.repository_password,
                    prior_password.as_deref(),
                ),
            };
            config.authentication = Some(auth.clone());
            Some((
                config.url.clone(),
                config.reference_name.clone(),
                auth,
                config.tls_skip_verify,
            ))
        } else {
            None
        };

        // Replace the autoupdate settings wholesale; the job id is only
        // repopulated if a new job actually starts.
        stack.auto_update = payload.auto_update.map(|settings| AutoUpdateSettings {
            interval: settings.interval,
            job_id: None,
        });

        // Unauthenticated references get no reachability check, matching the
        // probe-only-with-credentials behavior clients rely on.
        if let Some((url, reference, auth, tls_skip_verify)) = probe {
            self.git
                .latest_commit_id(
                    &url,
                    &reference,
                    Some(&auth.username),
                    Some(&auth.password),
                    tls_skip_verify,
                )
                .await?;
        }

        if let Some(settings) = &mut stack.auto_update {
            if !settings.interval.is_empty() {
                let job_id = start_autoupdate(
                    &self.scheduler,
                    stack.id,
                    &settings.interval,
                    self.autoupdate_context(),
                )
                .await
                .map_err(StackUpdateError::Scheduler)?;
                settings.job_id = Some(job_id);
            }
        }

        Ok(())
    }

    async fn update_file(
        &self,
        stack: &mut Stack,
        payload: FileStackUpdate,
        caller: Option<&str>,
    ) -> Result<(), StackUpdateError> {
        let Some(_identity) = caller else {
            return Err(StackUpdateError::MissingIdentity);
        };

        // Scoped temp dir; deleted on every exit path when dropped.
        let temp_dir = tempfile::Builder::new()
            .prefix("stackarr-manifest-")
            .tempdir()
            .map_err(|e| StackUpdateError::Persistence(e.into()))?;

        FileStore::write_ephemeral(
            temp_dir.path(),
            &stack.entry_point,
            payload.stack_file_content.as_bytes(),
        )
        .await
        .map_err(StackUpdateError::Persistence)?;

        // Rename before deploy: if the deploy fails, retries must still find
        // the stack under its new name, so the rename is persisted now.
        if let Some(new_name) = payload.stack_name.as_deref() {
            if !new_name.is_empty() && new_name != stack.name {
                stack.name = new_name.to_string();
                self.store
                    .update_stack(stack)
                    .await
                    .map_err(StackUpdateError::Database)?;
            }
        }

        // Best-effort pull-secret refresh. A missing cluster client or a
        // refresh failure is intentionally discarded: the deploy may still
        // succeed on public images.
        if let Ok(client) = self.kube_factory.client_for(stack.endpoint_id) {
            if let Err(e) = self
                .registry_refresher
                .refresh(&client, &stack.namespace)
                .await
            {
                debug!(stack_id = stack.id, "Registry secret refresh skipped: {e:#}");
            }
        }

        // Deploy from the temp dir so a failure never touches the durable
        // copy on disk.
        stack.project_path = temp_dir.path().to_string_lossy().into_owned();

        let labels = KubeAppLabels {
            stack_id: stack.id,
            stack_name: stack.name.clone(),
            owner: stack.created_by.clone(),
            kind: "content",
        };
        self.deployer.deploy(stack, labels).await?;

        // Commit-on-success: only after a clean deploy does the manifest
        // reach the durable store.
        let folder = stack.folder();
        match self
            .file_store
            .update_durable(&folder, &stack.entry_point, payload.stack_file_content.as_bytes())
            .await
        {
            Ok(project_path) => {
                stack.project_path = project_path.to_string_lossy().into_owned();
                self.file_store.remove_backup(&folder, &stack.entry_point).await;
                Ok(())
            }
            Err(err) => {
                if let Err(rollback_err) =
                    self.file_store.rollback(&folder, &stack.entry_point).await
                {
                    warn!(stack_id = stack.id, "Rollback of stack file failed: {rollback_err:#}");
                }
                Err(StackUpdateError::Persistence(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_payload_password_reuses_prior() {
        assert_eq!(effective_password("", Some("old")), "old");
    }

    #[test]
    fn payload_password_wins_when_present() {
        assert_eq!(effective_password("new", Some("old")), "new");
    }

    #[test]
    fn no_prior_password_falls_back_to_payload() {
        assert_eq!(effective_password("", None), "");
        assert_eq!(effective_password("fresh", None), "fresh");
    }
}
