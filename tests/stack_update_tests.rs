//! Scenario tests for the stack update service, with the git transport and
//! the cluster deployer replaced by in-memory doubles.

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

use stackarr::api::AppState;
use stackarr::clients::git::{GitError, GitService};
use stackarr::clients::kube::KubeClientFactory;
use stackarr::config::Config;
use stackarr::db::Store;
use stackarr::models::{
    AutoUpdateSettings, GitAuthentication, GitConfig, Stack, StackSource,
};
use stackarr::services::deploy::{DeployError, KubeAppLabels, KubeDeployer};
use stackarr::services::stack_update::{
    FileStackUpdate, GitStackUpdate, StackUpdateError, StackUpdatePayload, StackUpdateService,
};

#[derive(Debug, Clone)]
struct RecordedProbe {
    url: String,
    username: Option<String>,
    password: Option<String>,
}

#[derive(Default)]
struct MockGit {
    probes: Mutex<Vec<RecordedProbe>>,
    fail_probe: AtomicBool,
}

#[async_trait]
impl GitService for MockGit {
    async fn latest_commit_id(
        &self,
        url: &str,
        _reference_name: &str,
        username: Option<&str>,
        password: Option<&str>,
        _tls_skip_verify: bool,
    ) -> Result<String, GitError> {
        self.probes.lock().await.push(RecordedProbe {
            url: url.to_string(),
            username: username.map(str::to_string),
            password: password.map(str::to_string),
        });
        if self.fail_probe.load(Ordering::SeqCst) {
            return Err(GitError::Transport("connection refused".to_string()));
        }
        Ok("0123456789abcdef0123456789abcdef01234567".to_string())
    }

    async fn clone_repository(
        &self,
        destination: &Path,
        _url: &str,
        _reference_name: &str,
        _username: Option<&str>,
        _password: Option<&str>,
        _tls_skip_verify: bool,
    ) -> Result<(), GitError> {
        tokio::fs::create_dir_all(destination)
            .await
            .map_err(|e| GitError::Task(e.to_string()))?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct RecordedDeploy {
    project_path: String,
    kind: &'static str,
}

#[derive(Default)]
struct MockDeployer {
    deploys: Mutex<Vec<RecordedDeploy>>,
    fail: AtomicBool,
}

#[async_trait]
impl KubeDeployer for MockDeployer {
    async fn deploy(&self, stack: &Stack, labels: KubeAppLabels) -> Result<String, DeployError> {
        self.deploys.lock().await.push(RecordedDeploy {
            project_path: stack.project_path.clone(),
            kind: labels.kind,
        });
        if self.fail.load(Ordering::SeqCst) {
            return Err(DeployError::Other("apply rejected".to_string()));
        }
        Ok("applied".to_string())
    }
}

struct Harness {
    state: Arc<AppState>,
    git: Arc<MockGit>,
    deployer: Arc<MockDeployer>,
    _data: tempfile::TempDir,
}

impl Harness {
    fn service(&self) -> &StackUpdateService {
        self.state.stack_updater()
    }
}

/// Assembled through the same seam the daemon uses, with the git transport
/// and the cluster deployer swapped for the doubles above.
async fn harness() -> Harness {
    let data = tempfile::tempdir().expect("tempdir");

    let mut config = Config::default();
    config.general.database_path = "sqlite::memory:".to_string();
    config.general.data_dir = data.path().to_string_lossy().into_owned();
    config.general.max_db_connections = 1;
    config.general.min_db_connections = 1;

    let git = Arc::new(MockGit::default());
    let deployer = Arc::new(MockDeployer::default());

    let state = stackarr::api::create_app_state_with(
        config,
        Arc::clone(&git) as Arc<dyn GitService>,
        Arc::clone(&deployer) as Arc<dyn KubeDeployer>,
        KubeClientFactory::new(vec![]),
        None,
    )
    .await
    .expect("app state");

    Harness {
        state,
        git,
        deployer,
        _data: data,
    }
}

async fn seed_git_stack(store: &Store, password: Option<&str>) -> Stack {
    store
        .create_stack(&Stack {
            id: 0,
            name: "gitops".to_string(),
            entry_point: "deploy/app.yml".to_string(),
            namespace: "default".to_string(),
            endpoint_id: 1,
            project_path: String::new(),
            created_by: "admin".to_string(),
            source: StackSource::Git(GitConfig {
                url: "https://git.example.com/app.git".to_string(),
                reference_name: "refs/heads/main".to_string(),
                tls_skip_verify: false,
                authentication: password.map(|p| GitAuthentication {
                    username: "bot".to_string(),
                    password: p.to_string(),
                }),
                config_hash: None,
            }),
            auto_update: None,
            created_at: String::new(),
            updated_at: String::new(),
        })
        .await
        .expect("seed git stack")
}

async fn seed_file_stack(store: &Store) -> Stack {
    store
        .create_stack(&Stack {
            id: 0,
            name: "web".to_string(),
            entry_point: "stackarr.yml".to_string(),
            namespace: "default".to_string(),
            endpoint_id: 1,
            project_path: String::new(),
            created_by: "admin".to_string(),
            source: StackSource::File,
            auto_update: None,
            created_at: String::new(),
            updated_at: String::new(),
        })
        .await
        .expect("seed file stack")
}

fn git_payload() -> GitStackUpdate {
    GitStackUpdate {
        repository_reference_name: "refs/heads/main".to_string(),
        repository_authentication: false,
        repository_username: String::new(),
        repository_password: String::new(),
        auto_update: None,
        tls_skip_verify: false,
    }
}

#[tokio::test]
async fn git_update_reuses_stored_password_when_payload_omits_it() {
    let h = harness().await;
    let mut stack = seed_git_stack(&h.state.store, Some("secret")).await;

    let mut payload = git_payload();
    payload.repository_authentication = true;
    payload.repository_username = "bot".to_string();

    h.service()
        .update_kubernetes_stack(&mut stack, StackUpdatePayload::Git(payload), Some("admin"))
        .await
        .expect("update");

    let auth = stack
        .git_config()
        .and_then(|c| c.authentication.as_ref())
        .expect("authentication kept");
    assert_eq!(auth.password, "secret");

    // The probe ran with the carried-forward credentials.
    let probes = h.git.probes.lock().await;
    assert_eq!(probes.len(), 1);
    assert_eq!(probes[0].url, "https://git.example.com/app.git");
    assert_eq!(probes[0].username.as_deref(), Some("bot"));
    assert_eq!(probes[0].password.as_deref(), Some("secret"));
}

#[tokio::test]
async fn git_update_without_authentication_skips_probe() {
    let h = harness().await;
    let mut stack = seed_git_stack(&h.state.store, Some("secret")).await;

    h.service()
        .update_kubernetes_stack(
            &mut stack,
            StackUpdatePayload::Git(git_payload()),
            Some("admin"),
        )
        .await
        .expect("update");

    assert!(h.git.probes.lock().await.is_empty());
    // Disabling authentication drops the stored credentials.
    assert!(stack.git_config().unwrap().authentication.is_none());
}

#[tokio::test]
async fn git_probe_failure_aborts_before_job_start() {
    let h = harness().await;
    let mut stack = seed_git_stack(&h.state.store, Some("secret")).await;
    h.git.fail_probe.store(true, Ordering::SeqCst);

    let mut payload = git_payload();
    payload.repository_authentication = true;
    payload.repository_username = "bot".to_string();
    payload.auto_update = Some(AutoUpdateSettings {
        interval: "5m".to_string(),
        job_id: None,
    });

    let err = h
        .service()
        .update_kubernetes_stack(&mut stack, StackUpdatePayload::Git(payload), Some("admin"))
        .await
        .expect_err("probe must fail");
    assert!(matches!(err, StackUpdateError::GitProbe(_)));

    assert!(!h.state.scheduler.has_job(stack.id).await);
}

#[tokio::test]
async fn autoupdate_job_rotates_on_repeated_updates() {
    let h = harness().await;
    let mut stack = seed_git_stack(&h.state.store, None).await;

    let mut payload = git_payload();
    payload.auto_update = Some(AutoUpdateSettings {
        interval: "5m".to_string(),
        job_id: None,
    });

    h.service()
        .update_kubernetes_stack(
            &mut stack,
            StackUpdatePayload::Git(payload.clone()),
            Some("admin"),
        )
        .await
        .expect("first update");
    let first = stack
        .auto_update
        .as_ref()
        .and_then(|s| s.job_id)
        .expect("first job id");
    assert_eq!(h.state.scheduler.live_job_id(stack.id).await, Some(first));

    h.service()
        .update_kubernetes_stack(&mut stack, StackUpdatePayload::Git(payload), Some("admin"))
        .await
        .expect("second update");
    let second = stack
        .auto_update
        .as_ref()
        .and_then(|s| s.job_id)
        .expect("second job id");

    assert_ne!(first, second);
    assert_eq!(h.state.scheduler.live_job_id(stack.id).await, Some(second));
}

#[tokio::test]
async fn omitting_autoupdate_stops_the_job() {
    let h = harness().await;
    let mut stack = seed_git_stack(&h.state.store, None).await;

    let mut payload = git_payload();
    payload.auto_update = Some(AutoUpdateSettings {
        interval: "5m".to_string(),
        job_id: None,
    });
    h.service()
        .update_kubernetes_stack(&mut stack, StackUpdatePayload::Git(payload), Some("admin"))
        .await
        .expect("enable autoupdate");
    assert!(h.state.scheduler.has_job(stack.id).await);

    h.service()
        .update_kubernetes_stack(
            &mut stack,
            StackUpdatePayload::Git(git_payload()),
            Some("admin"),
        )
        .await
        .expect("disable autoupdate");

    assert!(stack.auto_update.is_none());
    assert!(!h.state.scheduler.has_job(stack.id).await);
}

#[tokio::test]
async fn payload_mode_must_match_stack_mode() {
    let h = harness().await;
    let mut stack = seed_file_stack(&h.state.store).await;

    let err = h
        .service()
        .update_kubernetes_stack(
            &mut stack,
            StackUpdatePayload::Git(git_payload()),
            Some("admin"),
        )
        .await
        .expect_err("mode mismatch");
    assert!(matches!(err, StackUpdateError::Validation(_)));
}

#[tokio::test]
async fn file_update_requires_caller_identity() {
    let h = harness().await;
    let mut stack = seed_file_stack(&h.state.store).await;

    let err = h
        .service()
        .update_kubernetes_stack(
            &mut stack,
            StackUpdatePayload::File(FileStackUpdate {
                stack_file_content: "apiVersion: v1\n".to_string(),
                stack_name: None,
            }),
            None,
        )
        .await
        .expect_err("no identity");
    assert!(matches!(err, StackUpdateError::MissingIdentity));

    assert!(h.deployer.deploys.lock().await.is_empty());
}

#[tokio::test]
async fn file_update_deploys_from_temp_then_commits() {
    let h = harness().await;
    let mut stack = seed_file_stack(&h.state.store).await;
    let content = "apiVersion: v1\nkind: ConfigMap\n";

    h.service()
        .update_kubernetes_stack(
            &mut stack,
            StackUpdatePayload::File(FileStackUpdate {
                stack_file_content: content.to_string(),
                stack_name: None,
            }),
            Some("admin"),
        )
        .await
        .expect("file update");

    let folder = stack.folder();
    let durable_dir = h.state.file_store.stack_dir(&folder);

    // The deploy ran against a scratch directory, not the durable one.
    let deploys = h.deployer.deploys.lock().await;
    assert_eq!(deploys.len(), 1);
    assert_eq!(deploys[0].kind, "content");
    assert_ne!(
        Path::new(&deploys[0].project_path),
        durable_dir.as_path(),
        "deploy must not read the durable copy"
    );

    // Commit-on-success: durable bytes updated, backup cleaned up, and the
    // record now points at the durable directory.
    let stored = h
        .state
        .file_store
        .read_durable(&folder, &stack.entry_point)
        .await
        .expect("durable manifest");
    assert_eq!(stored, content.as_bytes());
    assert!(!h.state.file_store.backup_exists(&folder, &stack.entry_point).await);
    assert_eq!(Path::new(&stack.project_path), durable_dir.as_path());
}

#[tokio::test]
async fn file_update_deploy_failure_leaves_durable_copy_untouched() {
    let h = harness().await;
    let mut stack = seed_file_stack(&h.state.store).await;
    let folder = stack.folder();

    h.state.file_store
        .update_durable(&folder, &stack.entry_point, b"old: manifest\n")
        .await
        .expect("seed durable");
    h.state.file_store.remove_backup(&folder, &stack.entry_point).await;

    h.deployer.fail.store(true, Ordering::SeqCst);

    let err = h
        .service()
        .update_kubernetes_stack(
            &mut stack,
            StackUpdatePayload::File(FileStackUpdate {
                stack_file_content: "new: manifest\n".to_string(),
                stack_name: None,
            }),
            Some("admin"),
        )
        .await
        .expect_err("deploy fails");
    assert!(matches!(err, StackUpdateError::Deploy(_)));

    let stored = h
        .state
        .file_store
        .read_durable(&folder, &stack.entry_point)
        .await
        .expect("durable manifest");
    assert_eq!(stored, b"old: manifest\n");
    assert!(!h.state.file_store.backup_exists(&folder, &stack.entry_point).await);
}

#[tokio::test]
async fn file_update_persist_failure_rolls_back_durable_copy() {
    let h = harness().await;
    let mut stack = seed_file_stack(&h.state.store).await;
    let folder = stack.folder();

    h.state
        .file_store
        .update_durable(&folder, &stack.entry_point, b"old: manifest\n")
        .await
        .expect("seed durable");
    h.state.file_store.remove_backup(&folder, &stack.entry_point).await;

    // Occupy the staging path with a directory so the durable write cannot
    // land even though the deploy goes through.
    let staging = h.state.file_store.stack_dir(&folder).join("stackarr.yml.tmp");
    tokio::fs::create_dir_all(&staging)
        .await
        .expect("block staging path");

    let err = h
        .service()
        .update_kubernetes_stack(
            &mut stack,
            StackUpdatePayload::File(FileStackUpdate {
                stack_file_content: "new: manifest\n".to_string(),
                stack_name: None,
            }),
            Some("admin"),
        )
        .await
        .expect_err("persist fails");
    assert!(matches!(err, StackUpdateError::Persistence(_)));

    // The deploy already ran; the rollback restored the pre-update bytes and
    // consumed the backup.
    assert_eq!(h.deployer.deploys.lock().await.len(), 1);
    let stored = h
        .state
        .file_store
        .read_durable(&folder, &stack.entry_point)
        .await
        .expect("durable manifest");
    assert_eq!(stored, b"old: manifest\n");
    assert!(!h.state.file_store.backup_exists(&folder, &stack.entry_point).await);
}

#[tokio::test]
async fn file_update_persists_rename_even_when_deploy_fails() {
    let h = harness().await;
    let mut stack = seed_file_stack(&h.state.store).await;
    h.deployer.fail.store(true, Ordering::SeqCst);

    h.service()
        .update_kubernetes_stack(
            &mut stack,
            StackUpdatePayload::File(FileStackUpdate {
                stack_file_content: "new: manifest\n".to_string(),
                stack_name: Some("web-renamed".to_string()),
            }),
            Some("admin"),
        )
        .await
        .expect_err("deploy fails");

    // Retries must find the stack under its new name.
    let persisted = h
        .state
        .store
        .stack_by_id(stack.id)
        .await
        .expect("lookup")
        .expect("stack exists");
    assert_eq!(persisted.name, "web-renamed");
}
