//! Domain model for Kubernetes stacks.
//!
//! A stack is a named, versioned deployment artifact bound to a cluster
//! endpoint. It is either file-managed (the manifest was posted directly) or
//! git-managed (the manifest tree is pulled from a repository). The two modes
//! are mutually exclusive and cannot be switched by an update, which is why
//! the source is a tagged enum rather than an optional git block.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stack {
    pub id: i32,

    /// User-visible name; mutable through the file-branch rename.
    pub name: String,

    /// Relative path of the manifest within the project directory.
    pub entry_point: String,

    pub namespace: String,

    /// Cluster endpoint this stack deploys into (config-declared).
    pub endpoint_id: i32,

    /// Current on-disk location of the materialized manifests.
    pub project_path: String,

    /// Owner identity, as recorded at creation time.
    pub created_by: String,

    pub source: StackSource,

    pub auto_update: Option<AutoUpdateSettings>,

    pub created_at: String,

    pub updated_at: String,
}

impl Stack {
    /// Folder name for this stack inside the durable file store.
    #[must_use]
    pub fn folder(&self) -> String {
        self.id.to_string()
    }

    #[must_use]
    pub const fn git_config(&self) -> Option<&GitConfig> {
        match &self.source {
            StackSource::Git(config) => Some(config),
            StackSource::File => None,
        }
    }

    pub const fn git_config_mut(&mut self) -> Option<&mut GitConfig> {
        match &mut self.source {
            StackSource::Git(config) => Some(config),
            StackSource::File => None,
        }
    }
}

/// Where a stack's manifests come from. File-managed stacks never gain a git
/// config and git-managed stacks never lose theirs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StackSource {
    File,
    Git(GitConfig),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitConfig {
    pub url: String,

    /// Full reference name, e.g. `refs/heads/main`.
    pub reference_name: String,

    pub tls_skip_verify: bool,

    pub authentication: Option<GitAuthentication>,

    /// Commit SHA of the last successful deploy; the autoupdate job compares
    /// the probed remote head against this before redeploying.
    pub config_hash: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitAuthentication {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoUpdateSettings {
    /// Duration string ("5m") or cron expression. Empty disables.
    pub interval: String,

    /// Populated only while a scheduler entry is live for this stack.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<Uuid>,
}

impl GitConfig {
    #[must_use]
    pub fn credentials(&self) -> (Option<&str>, Option<&str>) {
        match &self.authentication {
            Some(auth) => (Some(auth.username.as_str()), Some(auth.password.as_str())),
            None => (None, None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn git_config(reference: &str) -> GitConfig {
        GitConfig {
            url: "https://example.com/repo.git".to_string(),
            reference_name: reference.to_string(),
            tls_skip_verify: false,
            authentication: None,
            config_hash: None,
        }
    }

    #[test]
    fn git_config_accessor_follows_source() {
        let mut stack = Stack {
            id: 7,
            name: "web".to_string(),
            entry_point: "deployment.yml".to_string(),
            namespace: "default".to_string(),
            endpoint_id: 1,
            project_path: String::new(),
            created_by: "admin".to_string(),
            source: StackSource::File,
            auto_update: None,
            created_at: String::new(),
            updated_at: String::new(),
        };
        assert!(stack.git_config().is_none());

        stack.source = StackSource::Git(git_config("refs/heads/main"));
        assert!(stack.git_config().is_some());
        assert_eq!(stack.folder(), "7");
    }
}
