//! Fixed-interval polling of a run until it finishes.

use log::{debug, info};
use std::time::Duration;

use crate::client::RunApi;
use crate::error::{Result, RunError};
use crate::runtime::Runtime;
use crate::status::RunStatus;

/// Seconds between status checks when nothing else is configured.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;

/// How often to check a run and when to give up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollOptions {
    pub interval: Duration,
    /// Stop once the next check would land past this much time since polling began.
    pub timeout: Option<Duration>,
    /// Stop after this many status checks.
    pub max_attempts: Option<usize>,
}

impl PollOptions {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            timeout: None,
            max_attempts: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }
}

impl Default for PollOptions {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS))
    }
}

/// Polls `run_id` until it reaches a terminal status.
///
/// Sleeps one interval before the first check, then checks and sleeps in turn.
/// `Success` returns normally; `Error` and `Cancelled` fail with
/// [`RunError::RunFailed`] carrying the run's status link. Any error from the
/// status call, including an unknown status code, ends polling immediately.
/// Every observed status is handed to `on_status`.
///
/// Without a timeout or attempt limit this waits for as long as the run
/// takes; dropping the future stops it.
#[tracing::instrument(skip(api, runtime, on_status))]
pub async fn poll_until_terminal<A, R, F>(
    api: &A,
    runtime: &R,
    run_id: u64,
    options: &PollOptions,
    mut on_status: F,
) -> Result<RunStatus>
where
    A: RunApi + ?Sized,
    R: Runtime + ?Sized,
    F: FnMut(RunStatus) + Send,
{
    let started = runtime.now();
    let mut attempts = 0;

    if past_deadline(Duration::ZERO, options) {
        return Err(RunError::PollTimeout { run_id, attempts });
    }
    runtime.sleep(options.interval).await;

    loop {
        let status = api.get_run_status(run_id).await?;
        attempts += 1;

        info!("Run status -> {}", status);
        on_status(status);

        if status.is_failure() {
            return Err(RunError::RunFailed {
                status,
                link: api.status_link(run_id),
            });
        }
        if status == RunStatus::Success {
            return Ok(status);
        }

        if options.max_attempts.is_some_and(|max| attempts >= max) {
            return Err(RunError::PollTimeout { run_id, attempts });
        }
        if options.timeout.is_some() {
            let elapsed = runtime.now().saturating_duration_since(started);
            if past_deadline(elapsed, options) {
                return Err(RunError::PollTimeout { run_id, attempts });
            }
        }

        debug!(
            "Run {} is {}, checking again in {:?}",
            run_id, status, options.interval
        );
        runtime.sleep(options.interval).await;
    }
}

/// True when a check one interval after `elapsed` would land past the timeout.
fn past_deadline(elapsed: Duration, options: &PollOptions) -> bool {
    options.timeout.is_some_and(|timeout| {
        elapsed
            .checked_add(options.interval)
            .is_none_or(|next| next > timeout)
    })
}
