//! Stack operation watcher: a bounded polling loop that observes an external
//! managed resource until it reaches a terminal state.
//!
//! The watcher is deliberately narrow. It consumes a single capability, the
//! [`StackStatusProbe`], classifies each observation against the operation
//! being watched, and produces exactly one [`WatchOutcome`]. It never mutates
//! the resource it observes.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::time::{sleep, Instant};

/// Poll cadence used by every call site.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Retry budget used by every call site (a 20 minute ceiling at the default
/// cadence).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 120;

/// Status reported for a stack that can no longer be found while watching a
/// create operation.
const ABSENT_STATUS: &str = "stack not found";

/// The long-running transition being observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackOperation {
    Create,
    Update,
    Delete,
}

impl fmt::Display for StackOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        })
    }
}

/// Identifies one stack transition to observe and how patiently to watch it.
#[derive(Debug, Clone)]
pub struct WatchRequest {
    pub stack_name: String,
    pub operation: StackOperation,
    pub poll_interval: Duration,
    pub max_attempts: u32,
}

impl WatchRequest {
    pub fn new(stack_name: impl Into<String>, operation: StackOperation) -> Self {
        Self {
            stack_name: stack_name.into(),
            operation,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }
}

/// One observation of the external resource.
///
/// Absence can be reported in-band (`exists == false`) or out-of-band as
/// [`ProbeError::NotFound`]; the watcher treats both identically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusSample {
    pub raw_status: String,
    pub exists: bool,
}

impl StatusSample {
    pub fn present(raw_status: impl Into<String>) -> Self {
        Self {
            raw_status: raw_status.into(),
            exists: true,
        }
    }

    pub fn gone() -> Self {
        Self {
            raw_status: String::new(),
            exists: false,
        }
    }
}

/// Failure modes of a single status query.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProbeError {
    /// The control plane reports the resource as absent.
    #[error("stack does not exist")]
    NotFound,

    /// Any other failure reaching the control plane. Not retried by the
    /// watcher; it surfaces to the caller immediately.
    #[error("status query failed: {0}")]
    Transport(String),
}

/// Result of watching one operation to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchOutcome {
    Succeeded,
    Failed { status: String },
    TimedOut,
}

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("status query failed while watching: {0}")]
    Query(#[from] ProbeError),
}

/// Capability the watcher consumes: one status observation per call.
#[async_trait]
pub trait StackStatusProbe: Send + Sync {
    async fn query(&self, stack_name: &str) -> Result<StatusSample, ProbeError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Disposition {
    Success,
    Failure,
    Pending,
}

impl StackOperation {
    /// Terminal-state classification for this operation kind. Unrecognized
    /// statuses are non-terminal.
    fn classify(self, raw_status: &str) -> Disposition {
        match self {
            Self::Create | Self::Update => {
                if matches!(raw_status, "CREATE_COMPLETE" | "UPDATE_COMPLETE") {
                    Disposition::Success
                } else if matches!(
                    raw_status,
                    "CREATE_FAILED"
                        | "ROLLBACK_COMPLETE"
                        | "ROLLBACK_FAILED"
                        | "UPDATE_ROLLBACK_COMPLETE"
                        | "UPDATE_ROLLBACK_FAILED"
                ) {
                    Disposition::Failure
                } else {
                    Disposition::Pending
                }
            }
            Self::Delete => match raw_status {
                "DELETE_COMPLETE" => Disposition::Success,
                "DELETE_FAILED" => Disposition::Failure,
                _ => Disposition::Pending,
            },
        }
    }
}

/// Poll the resource's status until a terminal condition is reached or the
/// attempt budget is exhausted.
///
/// Every poll counts toward `max_attempts`, including polls that observe an
/// unrecognized status. Terminal observations return without sleeping; the
/// final pending observation returns [`WatchOutcome::TimedOut`] without a
/// trailing sleep.
pub async fn watch<P>(request: &WatchRequest, probe: &P) -> Result<WatchOutcome, WatchError>
where
    P: StackStatusProbe + ?Sized,
{
    let started = Instant::now();
    for attempt in 1..=request.max_attempts {
        let sample = match probe.query(&request.stack_name).await {
            Ok(sample) => sample,
            Err(ProbeError::NotFound) => return absent_outcome(request.operation),
            Err(err @ ProbeError::Transport(_)) => return Err(WatchError::Query(err)),
        };

        if !sample.exists {
            return absent_outcome(request.operation);
        }

        match request.operation.classify(&sample.raw_status) {
            Disposition::Success => {
                log::info!(
                    "{}: {} completed with status {}",
                    request.stack_name,
                    request.operation,
                    sample.raw_status
                );
                return Ok(WatchOutcome::Succeeded);
            }
            Disposition::Failure => {
                return Ok(WatchOutcome::Failed {
                    status: sample.raw_status,
                });
            }
            Disposition::Pending => {
                log::info!(
                    "{}: status {} (waited {}s)",
                    request.stack_name,
                    sample.raw_status,
                    started.elapsed().as_secs()
                );
                if attempt < request.max_attempts {
                    sleep(request.poll_interval).await;
                }
            }
        }
    }
    Ok(WatchOutcome::TimedOut)
}

/// Policy for a resource that can no longer be found, by operation kind:
/// the goal of a delete, a hard failure for a create, and an unexpected
/// error for an update.
fn absent_outcome(operation: StackOperation) -> Result<WatchOutcome, WatchError> {
    match operation {
        StackOperation::Delete => Ok(WatchOutcome::Succeeded),
        StackOperation::Create => Ok(WatchOutcome::Failed {
            status: ABSENT_STATUS.to_string(),
        }),
        StackOperation::Update => Err(WatchError::Query(ProbeError::NotFound)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct ScriptedProbe {
        script: Mutex<VecDeque<Result<StatusSample, ProbeError>>>,
        calls: AtomicUsize,
    }

    impl ScriptedProbe {
        fn new(script: Vec<Result<StatusSample, ProbeError>>) -> Self {
            Self {
                script: Mutex::new(script.into_iter().collect()),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl StackStatusProbe for ScriptedProbe {
        async fn query(&self, _stack_name: &str) -> Result<StatusSample, ProbeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .expect("probe queried past the end of its script")
        }
    }

    fn present(status: &str) -> Result<StatusSample, ProbeError> {
        Ok(StatusSample::present(status))
    }

    fn request(operation: StackOperation) -> WatchRequest {
        WatchRequest::new("s1", operation)
            .poll_interval(Duration::from_secs(10))
            .max_attempts(3)
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_succeeds_after_in_progress_polls() {
        let probe = ScriptedProbe::new(vec![
            present("CREATE_IN_PROGRESS"),
            present("CREATE_IN_PROGRESS"),
            present("CREATE_COMPLETE"),
        ]);
        let started = Instant::now();

        let outcome = watch(&request(StackOperation::Create), &probe).await.unwrap();

        assert_eq!(outcome, WatchOutcome::Succeeded);
        assert_eq!(probe.calls(), 3);
        // Two sleeps of 10s separate the three polls.
        assert!(started.elapsed() >= Duration::from_secs(20));
    }

    #[tokio::test]
    async fn test_failure_status_is_reported_verbatim() {
        let probe = ScriptedProbe::new(vec![present("ROLLBACK_COMPLETE")]);

        let outcome = watch(&request(StackOperation::Create), &probe).await.unwrap();

        assert_eq!(
            outcome,
            WatchOutcome::Failed {
                status: "ROLLBACK_COMPLETE".to_string()
            }
        );
        assert_eq!(probe.calls(), 1);
    }

    #[tokio::test]
    async fn test_update_rollback_failed_is_terminal_failure() {
        let probe = ScriptedProbe::new(vec![present("UPDATE_ROLLBACK_FAILED")]);

        let outcome = watch(&request(StackOperation::Update), &probe).await.unwrap();

        assert_eq!(
            outcome,
            WatchOutcome::Failed {
                status: "UPDATE_ROLLBACK_FAILED".to_string()
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_after_max_attempts_without_further_polling() {
        let probe = ScriptedProbe::new(vec![
            present("CREATE_IN_PROGRESS"),
            present("CREATE_IN_PROGRESS"),
            present("CREATE_IN_PROGRESS"),
        ]);

        let outcome = watch(&request(StackOperation::Create), &probe).await.unwrap();

        assert_eq!(outcome, WatchOutcome::TimedOut);
        assert_eq!(probe.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unrecognized_status_counts_toward_the_bound() {
        let probe = ScriptedProbe::new(vec![
            present("REVIEW_IN_PROGRESS"),
            present("REVIEW_IN_PROGRESS"),
            present("REVIEW_IN_PROGRESS"),
        ]);

        let outcome = watch(&request(StackOperation::Create), &probe).await.unwrap();

        assert_eq!(outcome, WatchOutcome::TimedOut);
        assert_eq!(probe.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_succeeds_when_stack_vanishes() {
        let probe = ScriptedProbe::new(vec![
            present("DELETE_IN_PROGRESS"),
            present("DELETE_IN_PROGRESS"),
            Err(ProbeError::NotFound),
        ]);

        let outcome = watch(&request(StackOperation::Delete), &probe).await.unwrap();

        assert_eq!(outcome, WatchOutcome::Succeeded);
        assert_eq!(probe.calls(), 3);
    }

    #[tokio::test]
    async fn test_delete_succeeds_on_delete_complete() {
        let probe = ScriptedProbe::new(vec![present("DELETE_COMPLETE")]);

        let outcome = watch(&request(StackOperation::Delete), &probe).await.unwrap();

        assert_eq!(outcome, WatchOutcome::Succeeded);
    }

    #[tokio::test]
    async fn test_delete_failed_is_terminal_failure() {
        let probe = ScriptedProbe::new(vec![present("DELETE_FAILED")]);

        let outcome = watch(&request(StackOperation::Delete), &probe).await.unwrap();

        assert_eq!(
            outcome,
            WatchOutcome::Failed {
                status: "DELETE_FAILED".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_delete_succeeds_on_gone_sample() {
        let probe = ScriptedProbe::new(vec![Ok(StatusSample::gone())]);

        let outcome = watch(&request(StackOperation::Delete), &probe).await.unwrap();

        assert_eq!(outcome, WatchOutcome::Succeeded);
        assert_eq!(probe.calls(), 1);
    }

    #[tokio::test]
    async fn test_create_fails_fast_when_stack_missing() {
        let probe = ScriptedProbe::new(vec![Err(ProbeError::NotFound)]);

        let outcome = watch(&request(StackOperation::Create), &probe).await.unwrap();

        assert_eq!(
            outcome,
            WatchOutcome::Failed {
                status: "stack not found".to_string()
            }
        );
        assert_eq!(probe.calls(), 1);
    }

    #[tokio::test]
    async fn test_update_propagates_missing_stack_as_error() {
        let probe = ScriptedProbe::new(vec![Err(ProbeError::NotFound)]);

        let result = watch(&request(StackOperation::Update), &probe).await;

        assert!(matches!(
            result,
            Err(WatchError::Query(ProbeError::NotFound))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_error_propagates_immediately() {
        let probe = ScriptedProbe::new(vec![
            present("CREATE_IN_PROGRESS"),
            Err(ProbeError::Transport("throttled".to_string())),
        ]);

        let result = watch(&request(StackOperation::Create), &probe).await;

        assert!(matches!(
            result,
            Err(WatchError::Query(ProbeError::Transport(_)))
        ));
        assert_eq!(probe.calls(), 2);
    }

    #[tokio::test]
    async fn test_terminal_watch_is_idempotent() {
        for _ in 0..2 {
            let probe = ScriptedProbe::new(vec![present("CREATE_COMPLETE")]);
            let outcome = watch(&request(StackOperation::Create), &probe).await.unwrap();
            assert_eq!(outcome, WatchOutcome::Succeeded);
            assert_eq!(probe.calls(), 1);
        }
    }
}
