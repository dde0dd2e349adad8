//! Autoupdate job lifecycle: periodically re-pull a git stack and redeploy
//! when the remote head moved.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::clients::git::GitService;
use crate::db::Store;
use crate::filestore::FileStore;
use crate::models::StackSource;
use crate::scheduler::Scheduler;
use crate::services::deploy::{KubeAppLabels, KubeDeployer};

/// Everything a scheduled poll needs; cloned into each tick.
#[derive(Clone)]
pub struct AutoupdateContext {
    pub store: Store,
    pub git: Arc<dyn GitService>,
    pub deployer: Arc<dyn KubeDeployer>,
    pub workspace: FileStore,
}

/// Register the recurring "pull latest commit, redeploy if changed" job for a
/// stack. The caller records the returned handle into
/// `stack.auto_update.job_id`.
pub async fn start_autoupdate(
    scheduler: &Scheduler,
    stack_id: i32,
    interval: &str,
    ctx: AutoupdateContext,
) -> Result<Uuid> {
    scheduler
        .start_job(stack_id, interval, move || {
            let ctx = ctx.clone();
            Box::pin(async move {
                if let Err(e) = poll_and_redeploy(&ctx, stack_id).await {
                    error!(stack_id, "Autoupdate poll failed: {e:#}");
                }
            })
        })
        .await
        .with_context(|| format!("Failed to schedule autoupdate for stack {stack_id}"))
}

/// De-register a stack's autoupdate job. Unknown handles are a no-op.
pub async fn stop_autoupdate(scheduler: &Scheduler, stack_id: i32, job_id: Uuid) {
    scheduler.stop_job(stack_id, job_id).await;
}

/// Re-register jobs after a restart. Stored job handles do not survive the
/// process, so every eligible stack gets a fresh one, persisted in place of
/// the stale handle.
pub async fn resume_autoupdates(scheduler: &Scheduler, ctx: &AutoupdateContext) -> Result<usize> {
    let mut resumed = 0;

    for mut stack in ctx.store.list_stacks().await? {
        if stack.git_config().is_none() {
            continue;
        }
        let Some(interval) = stack
            .auto_update
            .as_ref()
            .map(|settings| settings.interval.clone())
        else {
            continue;
        };
        if interval.is_empty() {
            continue;
        }

        let job_id = start_autoupdate(scheduler, stack.id, &interval, ctx.clone()).await?;
        if let Some(settings) = &mut stack.auto_update {
            settings.job_id = Some(job_id);
        }
        ctx.store.update_stack(&stack).await?;

        info!(stack_id = stack.id, %job_id, "Resumed autoupdate job");
        resumed += 1;
    }

    Ok(resumed)
}

async fn poll_and_redeploy(ctx: &AutoupdateContext, stack_id: i32) -> Result<()> {
    let Some(mut stack) = ctx.store.stack_by_id(stack_id).await? else {
        debug!(stack_id, "Autoupdate target vanished; skipping poll");
        return Ok(());
    };

    let StackSource::Git(config) = &stack.source else {
        return Ok(());
    };

    let (username, password) = config.credentials();
    let sha = ctx
        .git
        .latest_commit_id(
            &config.url,
            &config.reference_name,
            username,
            password,
            config.tls_skip_verify,
        )
        .await?;

    if config.config_hash.as_deref() == Some(sha.as_str()) {
        return Ok(());
    }

    info!(stack_id, commit = %sha, "Remote head moved; redeploying stack");

    // Fresh per-version directory under the stack's durable folder; the
    // previous clone stays in place until the deploy succeeds.
    let short_sha = &sha[..sha.len().min(8)];
    let version_dir = ctx
        .workspace
        .stack_dir(&stack.folder())
        .join(format!("git-{short_sha}"));
    if tokio::fs::try_exists(&version_dir).await.unwrap_or(false) {
        tokio::fs::remove_dir_all(&version_dir).await.ok();
    }

    ctx.git
        .clone_repository(
            &version_dir,
            &config.url,
            &config.reference_name,
            username,
            password,
            config.tls_skip_verify,
        )
        .await?;

    let previous_path = stack.project_path.clone();
    stack.project_path = version_dir.to_string_lossy().into_owned();

    let labels = KubeAppLabels {
        stack_id: stack.id,
        stack_name: stack.name.clone(),
        owner: stack.created_by.clone(),
        kind: "git",
    };

    if let Err(e) = ctx.deployer.deploy(&stack, labels).await {
        tokio::fs::remove_dir_all(&version_dir).await.ok();
        return Err(e.into());
    }

    if let Some(config) = stack.git_config_mut() {
        config.config_hash = Some(sha);
    }
    ctx.store.update_stack(&stack).await?;

    // Only reap clones we created under the stack folder.
    let stack_root = ctx.workspace.stack_dir(&stack.folder());
    if previous_path != stack.project_path
        && std::path::Path::new(&previous_path).starts_with(&stack_root)
    {
        tokio::fs::remove_dir_all(&previous_path).await.ok();
    }

    Ok(())
}
