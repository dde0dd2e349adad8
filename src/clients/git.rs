//! Git transport used for reachability probes and working-tree exports.
//!
//! Backed by libgit2. All libgit2 calls are blocking and run inside
//! `spawn_blocking`, bounded by the transport timeout.

use async_trait::async_trait;
use git2::build::RepoBuilder;
use git2::CertificateCheckStatus;
use git2::{Cred, Direction, FetchOptions, RemoteCallbacks};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::task;

#[derive(Debug, Error)]
pub enum GitError {
    #[error("Git transport error: {0}")]
    Transport(String),

    #[error("Reference {0} not found on remote")]
    ReferenceNotFound(String),

    #[error("Git operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Git task failed: {0}")]
    Task(String),
}

impl From<git2::Error> for GitError {
    fn from(err: git2::Error) -> Self {
        Self::Transport(err.message().to_string())
    }
}

/// The only two operations the rest of the crate needs: a no-mutation probe
/// of the remote head, and a working-tree export for redeploys.
#[async_trait]
pub trait GitService: Send + Sync {
    async fn latest_commit_id(
        &self,
        url: &str,
        reference_name: &str,
        username: Option<&str>,
        password: Option<&str>,
        tls_skip_verify: bool,
    ) -> Result<String, GitError>;

    async fn clone_repository(
        &self,
        destination: &Path,
        url: &str,
        reference_name: &str,
        username: Option<&str>,
        password: Option<&str>,
        tls_skip_verify: bool,
    ) -> Result<(), GitError>;
}

pub struct Git2Service {
    timeout: Duration,
}

impl Git2Service {
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    async fn run_blocking<T, F>(&self, op: F) -> Result<T, GitError>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T, GitError> + Send + 'static,
    {
        let timeout = self.timeout;
        let handle = task::spawn_blocking(op);

        match tokio::time::timeout(timeout, handle).await {
            Ok(joined) => joined.map_err(|e| GitError::Task(e.to_string()))?,
            Err(_) => Err(GitError::Timeout(timeout)),
        }
    }
}

impl Default for Git2Service {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

fn callbacks<'a>(
    username: Option<String>,
    password: Option<String>,
    tls_skip_verify: bool,
) -> RemoteCallbacks<'a> {
    let mut cbs = RemoteCallbacks::new();

    if let (Some(user), Some(pass)) = (username, password) {
        cbs.credentials(move |_url, _username_from_url, _allowed| {
            Cred::userpass_plaintext(&user, &pass)
        });
    }

    if tls_skip_verify {
        cbs.certificate_check(|_cert, _host| Ok(CertificateCheckStatus::CertificateOk));
    }

    cbs
}

/// Matches a remote head against a full refname, a short branch/tag name, or
/// HEAD when no reference was supplied.
fn head_matches(head_name: &str, reference_name: &str) -> bool {
    if reference_name.is_empty() {
        return head_name == "HEAD";
    }
    head_name == reference_name
        || head_name == format!("refs/heads/{reference_name}")
        || head_name == format!("refs/tags/{reference_name}")
}

#[async_trait]
impl GitService for Git2Service {
    async fn latest_commit_id(
        &self,
        url: &str,
        reference_name: &str,
        username: Option<&str>,
        password: Option<&str>,
        tls_skip_verify: bool,
    ) -> Result<String, GitError> {
        let url = url.to_string();
        let reference = reference_name.to_string();
        let username = username.map(str::to_string);
        let password = password.map(str::to_string);

        self.run_blocking(move || {
            let mut remote = git2::Remote::create_detached(url.as_str())?;
            let cbs = callbacks(username, password, tls_skip_verify);

            let connection = remote.connect_auth(Direction::Fetch, Some(cbs), None)?;

            for head in connection.list()? {
                if head_matches(head.name(), &reference) {
                    return Ok(head.oid().to_string());
                }
            }

            Err(GitError::ReferenceNotFound(reference))
        })
        .await
    }

    async fn clone_repository(
        &self,
        destination: &Path,
        url: &str,
        reference_name: &str,
        username: Option<&str>,
        password: Option<&str>,
        tls_skip_verify: bool,
    ) -> Result<(), GitError> {
        let destination: PathBuf = destination.to_path_buf();
        let url = url.to_string();
        let reference = reference_name.to_string();
        let username = username.map(str::to_string);
        let password = password.map(str::to_string);

        self.run_blocking(move || {
            let cbs = callbacks(username, password, tls_skip_verify);
            let mut fetch = FetchOptions::new();
            fetch.remote_callbacks(cbs);
            fetch.depth(1);

            let mut builder = RepoBuilder::new();
            builder.fetch_options(fetch);

            let short = reference
                .strip_prefix("refs/heads/")
                .or_else(|| reference.strip_prefix("refs/tags/"))
                .unwrap_or(&reference);
            if !short.is_empty() {
                builder.branch(short);
            }

            builder.clone(&url, &destination)?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn head_matching_accepts_full_and_short_names() {
        assert!(head_matches("refs/heads/main", "refs/heads/main"));
        assert!(head_matches("refs/heads/main", "main"));
        assert!(head_matches("refs/tags/v1.0", "v1.0"));
        assert!(!head_matches("refs/heads/develop", "main"));
    }

    #[test]
    fn empty_reference_resolves_head() {
        assert!(head_matches("HEAD", ""));
        assert!(!head_matches("refs/heads/main", ""));
    }
}
