//! Per-stack autoupdate job registry.
//!
//! Wraps a single process-wide `tokio_cron_scheduler::JobScheduler` and keys
//! recurring jobs by stack id. Guarantees: at most one live job per stack,
//! `stop_job` is idempotent (unknown handles are a no-op), and a job body
//! never overlaps itself for a given stack.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{debug, warn};
use uuid::Uuid;

/// A validated autoupdate interval: either a fixed repetition period or a
/// cron expression (seconds field included).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntervalKind {
    Every(Duration),
    Cron(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IntervalError {
    #[error("Interval must not be empty")]
    Empty,

    #[error("Invalid duration '{0}': expected forms like 30s, 5m, 1h30m")]
    BadDuration(String),

    #[error("Invalid cron expression '{0}': expected 5 or 6 fields")]
    BadCron(String),
}

/// Shared validation policy for autoupdate intervals: a Go-style duration
/// string or a cron expression. Five-field cron gets a seconds field of `0`
/// prepended so both conventions are accepted.
pub fn parse_interval(raw: &str) -> Result<IntervalKind, IntervalError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(IntervalError::Empty);
    }

    let fields: Vec<&str> = trimmed.split_whitespace().collect();
    match fields.len() {
        1 => parse_duration(trimmed)
            .map(IntervalKind::Every)
            .ok_or_else(|| IntervalError::BadDuration(trimmed.to_string())),
        5 => Ok(IntervalKind::Cron(format!("0 {trimmed}"))),
        6 => Ok(IntervalKind::Cron(trimmed.to_string())),
        _ => Err(IntervalError::BadCron(trimmed.to_string())),
    }
}

/// Accepts `90s`, `5m`, `2h`, `1d` and concatenations like `1h30m`.
fn parse_duration(raw: &str) -> Option<Duration> {
    let mut total = Duration::ZERO;
    let mut digits = String::new();
    let mut seen_unit = false;

    for c in raw.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }

        let value: u64 = digits.parse().ok()?;
        digits.clear();
        seen_unit = true;

        let unit = match c {
            's' => 1,
            'm' => 60,
            'h' => 60 * 60,
            'd' => 24 * 60 * 60,
            _ => return None,
        };
        total += Duration::from_secs(value.checked_mul(unit)?);
    }

    if !digits.is_empty() || !seen_unit || total.is_zero() {
        return None;
    }
    Some(total)
}

type TaskFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

pub struct Scheduler {
    sched: JobScheduler,
    jobs: Mutex<HashMap<i32, Uuid>>,
}

impl Scheduler {
    pub async fn new() -> Result<Self> {
        let sched = JobScheduler::new()
            .await
            .context("Failed to create job scheduler")?;
        sched.start().await.context("Failed to start job scheduler")?;

        Ok(Self {
            sched,
            jobs: Mutex::new(HashMap::new()),
        })
    }

    /// Register a recurring task for a stack. Any previous job for the same
    /// stack is de-registered first, so at most one entry is live per stack.
    /// The returned handle goes into `stack.auto_update.job_id`.
    pub async fn start_job<F>(&self, stack_id: i32, interval: &str, task: F) -> Result<Uuid>
    where
        F: Fn() -> TaskFuture + Send + Sync + 'static,
    {
        let kind = parse_interval(interval)?;

        let mut jobs = self.jobs.lock().await;
        if let Some(previous) = jobs.remove(&stack_id) {
            if let Err(e) = self.sched.remove(&previous).await {
                warn!(stack_id, job_id = %previous, "Failed to remove stale job: {e}");
            }
        }

        // Serializes the job body with itself; a tick that arrives while the
        // previous run is still in flight is skipped.
        let task = Arc::new(task);
        let guard = Arc::new(Mutex::new(()));
        let runner = move |_uuid: Uuid, _lock: JobScheduler| -> TaskFuture {
            let task = Arc::clone(&task);
            let guard = Arc::clone(&guard);
            Box::pin(async move {
                let Ok(_held) = guard.try_lock() else {
                    debug!(stack_id, "Autoupdate tick skipped: previous run still active");
                    return;
                };
                task().await;
            })
        };

        let job = match kind {
            IntervalKind::Every(duration) => Job::new_repeated_async(duration, runner)
                .context("Failed to build repeated job")?,
            IntervalKind::Cron(expr) => {
                Job::new_async(expr.as_str(), runner).context("Failed to build cron job")?
            }
        };

        let job_id = self
            .sched
            .add(job)
            .await
            .context("Failed to register job")?;
        jobs.insert(stack_id, job_id);

        Ok(job_id)
    }

    /// Idempotent; unknown handles are a no-op. `start_job` after `stop_job`
    /// is legal and returns a fresh handle.
    pub async fn stop_job(&self, stack_id: i32, job_id: Uuid) {
        let mut jobs = self.jobs.lock().await;
        if jobs.get(&stack_id) == Some(&job_id) {
            jobs.remove(&stack_id);
        }
        drop(jobs);

        if let Err(e) = self.sched.remove(&job_id).await {
            debug!(stack_id, job_id = %job_id, "Job removal was a no-op: {e}");
        }
    }

    pub async fn has_job(&self, stack_id: i32) -> bool {
        self.jobs.lock().await.contains_key(&stack_id)
    }

    pub async fn live_job_id(&self, stack_id: i32) -> Option<Uuid> {
        self.jobs.lock().await.get(&stack_id).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_parse() {
        assert_eq!(
            parse_interval("5m"),
            Ok(IntervalKind::Every(Duration::from_secs(300)))
        );
        assert_eq!(
            parse_interval("1h30m"),
            Ok(IntervalKind::Every(Duration::from_secs(5400)))
        );
        assert_eq!(
            parse_interval("90s"),
            Ok(IntervalKind::Every(Duration::from_secs(90)))
        );
    }

    #[test]
    fn cron_expressions_parse() {
        assert_eq!(
            parse_interval("*/5 * * * *"),
            Ok(IntervalKind::Cron("0 */5 * * * *".to_string()))
        );
        assert_eq!(
            parse_interval("0 0 3 * * *"),
            Ok(IntervalKind::Cron("0 0 3 * * *".to_string()))
        );
    }

    #[test]
    fn invalid_intervals_rejected() {
        assert_eq!(parse_interval(""), Err(IntervalError::Empty));
        assert_eq!(parse_interval("   "), Err(IntervalError::Empty));
        assert!(matches!(
            parse_interval("5x"),
            Err(IntervalError::BadDuration(_))
        ));
        assert!(matches!(
            parse_interval("0m"),
            Err(IntervalError::BadDuration(_))
        ));
        assert!(matches!(
            parse_interval("* * *"),
            Err(IntervalError::BadCron(_))
        ));
    }

    #[tokio::test]
    async fn start_stop_lifecycle() {
        let scheduler = Scheduler::new().await.expect("scheduler");

        let job_a = scheduler
            .start_job(1, "1h", || Box::pin(async {}))
            .await
            .expect("start");
        assert!(scheduler.has_job(1).await);
        assert_eq!(scheduler.live_job_id(1).await, Some(job_a));

        // Starting again rotates the handle and keeps a single entry.
        let job_b = scheduler
            .start_job(1, "2h", || Box::pin(async {}))
            .await
            .expect("restart");
        assert_ne!(job_a, job_b);
        assert_eq!(scheduler.live_job_id(1).await, Some(job_b));

        scheduler.stop_job(1, job_b).await;
        assert!(!scheduler.has_job(1).await);

        // Unknown handle: no-op.
        scheduler.stop_job(1, job_b).await;
        assert!(!scheduler.has_job(1).await);
    }
}
