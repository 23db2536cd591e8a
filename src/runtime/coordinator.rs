//! At-most-one-run coordination on top of [`ProcessSupervisor`]

use super::supervisor::{ExecutionEvent, ExecutionOutcome, ProcessSupervisor, RunId};
use crate::core::{Config, ExecutionRequest, Result};
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Caller's side of a started run
#[derive(Debug)]
pub struct RunHandle {
    pub run_id: RunId,
    pub started_at: DateTime<Utc>,
    events: mpsc::UnboundedReceiver<ExecutionEvent>,
    cancel: CancellationToken,
}

impl RunHandle {
    /// Next event, or `None` once the run has finished and all events
    /// were delivered
    pub async fn next_event(&mut self) -> Option<ExecutionEvent> {
        self.events.recv().await
    }

    /// Request cancellation of this run
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Token that cancels this run when triggered
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Discard remaining events and return the outcome
    pub async fn wait(mut self) -> Option<ExecutionOutcome> {
        while let Some(event) = self.events.recv().await {
            if let ExecutionEvent::Finished(outcome) = event {
                return Some(outcome);
            }
        }
        None
    }
}

#[derive(Debug)]
struct ActiveRun {
    run_id: RunId,
    cancel: CancellationToken,
    done: JoinHandle<ExecutionOutcome>,
}

/// Starts supervised runs, keeping at most one child alive at a time.
///
/// # Example
///
/// ```rust,no_run
/// use dxcom_runner::core::{Config, ExecutionRequest};
/// use dxcom_runner::runtime::ExecutionCoordinator;
///
/// # #[tokio::main]
/// # async fn main() -> dxcom_runner::core::Result<()> {
/// let mut coordinator = ExecutionCoordinator::new(Config::default());
/// let request = ExecutionRequest::new("model.onnx", "out/model.dxnn").option("opt_level", 1);
/// let handle = coordinator.start(request).await?;
/// let outcome = handle.wait().await;
/// println!("{:?}", outcome);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ExecutionCoordinator {
    config: Arc<Config>,
    active: Option<ActiveRun>,
    last_outcome: Option<ExecutionOutcome>,
}

impl ExecutionCoordinator {
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(config),
            active: None,
            last_outcome: None,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Start a run, cancelling and awaiting any run still in progress.
    ///
    /// A malformed request is rejected before anything is stopped or
    /// spawned.
    pub async fn start(&mut self, request: ExecutionRequest) -> Result<RunHandle> {
        request.validate()?;

        if self.is_running() {
            info!("cancelling previous run before starting a new one");
            self.stop_current();
        }
        self.await_completion(None).await;

        let cancel = CancellationToken::new();
        let (supervisor, events) = ProcessSupervisor::new(&self.config, &request, cancel.clone());
        let run_id = supervisor.run_id();
        let started_at = Utc::now();
        debug!(%run_id, command = %supervisor.command(), "dispatching run");

        let done = tokio::spawn(supervisor.run());
        self.active = Some(ActiveRun {
            run_id,
            cancel: cancel.clone(),
            done,
        });

        Ok(RunHandle {
            run_id,
            started_at,
            events,
            cancel,
        })
    }

    /// Start a run that executes `script_path` with the configured runtime
    pub async fn start_with_script(
        &mut self,
        script_path: impl Into<PathBuf>,
        request: ExecutionRequest,
    ) -> Result<RunHandle> {
        self.start(request.script(script_path)).await
    }

    /// Whether a run has been started and not yet reached a terminal state
    pub fn is_running(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|run| !run.done.is_finished())
    }

    /// Request cancellation of the current run, if any. Does not wait.
    pub fn stop_current(&self) {
        if let Some(run) = &self.active {
            debug!(run_id = %run.run_id, "cancellation requested");
            run.cancel.cancel();
        }
    }

    /// Wait for the current run to finish.
    ///
    /// Returns `true` when no run is left in progress, `false` when the
    /// timeout elapsed first.
    pub async fn await_completion(&mut self, timeout: Option<Duration>) -> bool {
        let Some(run) = self.active.as_mut() else {
            return true;
        };

        let joined = match timeout {
            Some(limit) => match tokio::time::timeout(limit, &mut run.done).await {
                Ok(joined) => joined,
                Err(_) => return false,
            },
            None => (&mut run.done).await,
        };

        let run_id = run.run_id;
        self.active = None;
        match joined {
            Ok(outcome) => self.last_outcome = Some(outcome),
            Err(e) => error!(%run_id, error = %e, "supervisor task did not complete"),
        }
        true
    }

    /// Outcome of the most recent run collected by `await_completion`
    pub fn last_outcome(&self) -> Option<&ExecutionOutcome> {
        self.last_outcome.as_ref()
    }
}

impl Drop for ExecutionCoordinator {
    fn drop(&mut self) {
        self.stop_current();
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::runtime::supervisor::RunState;
    use std::time::Instant;
    use tempfile::TempDir;

    fn coordinator() -> ExecutionCoordinator {
        let config = Config::builder()
            .runtime_program("sh")
            .grace_period_secs(1)
            .build()
            .unwrap();
        ExecutionCoordinator::new(config)
    }

    fn script(dir: &TempDir, name: &str, body: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, body).unwrap();
        path
    }

    fn request() -> ExecutionRequest {
        ExecutionRequest::new("model.onnx", "out/model.dxnn")
    }

    #[tokio::test]
    async fn test_idle_coordinator() {
        let mut coordinator = coordinator();
        assert!(!coordinator.is_running());
        assert!(coordinator.await_completion(Some(Duration::from_millis(10))).await);
        assert!(coordinator.last_outcome().is_none());
        coordinator.stop_current();
    }

    #[tokio::test]
    async fn test_second_start_cancels_first() {
        let dir = tempfile::tempdir().unwrap();
        let silent = script(&dir, "silent.sh", "exec sleep 30\n");
        let quick = script(&dir, "quick.sh", "echo 'Compilation complete'\n");
        let mut coordinator = coordinator();

        let first = coordinator.start_with_script(&silent, request()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(coordinator.is_running());

        let started = Instant::now();
        let second = coordinator.start_with_script(&quick, request()).await.unwrap();
        assert!(started.elapsed() < Duration::from_secs(10));
        assert_ne!(first.run_id, second.run_id);

        // The first run already reached its terminal state inside `start`
        assert_eq!(
            coordinator.last_outcome().map(ExecutionOutcome::state),
            Some(RunState::Cancelled)
        );
        let first_outcome = first.wait().await.unwrap();
        assert_eq!(first_outcome.state(), RunState::Cancelled);
        assert!(first_outcome.message().contains("cancel"));

        let second_outcome = second.wait().await.unwrap();
        assert!(second_outcome.is_success());
        assert!(coordinator.await_completion(None).await);
        assert!(!coordinator.is_running());
    }

    #[tokio::test]
    async fn test_stop_current_and_await() {
        let dir = tempfile::tempdir().unwrap();
        let silent = script(&dir, "silent.sh", "exec sleep 30\n");
        let mut coordinator = coordinator();

        let handle = coordinator.start_with_script(&silent, request()).await.unwrap();
        assert!(!coordinator.await_completion(Some(Duration::from_millis(100))).await);
        assert!(coordinator.is_running());

        coordinator.stop_current();
        assert!(coordinator.await_completion(Some(Duration::from_secs(10))).await);
        assert!(!coordinator.is_running());
        assert_eq!(handle.wait().await.unwrap().state(), RunState::Cancelled);
    }

    #[tokio::test]
    async fn test_handle_cancel() {
        let dir = tempfile::tempdir().unwrap();
        let silent = script(&dir, "silent.sh", "exec sleep 30\n");
        let mut coordinator = coordinator();

        let mut handle = coordinator.start_with_script(&silent, request()).await.unwrap();
        // Preamble arrives before anything else
        assert!(matches!(
            handle.next_event().await,
            Some(ExecutionEvent::Progress { percentage: 0, .. })
        ));
        handle.cancel();
        assert_eq!(handle.wait().await.unwrap().state(), RunState::Cancelled);
    }

    #[tokio::test]
    async fn test_invalid_request_rejected_without_stopping_active_run() {
        let dir = tempfile::tempdir().unwrap();
        let silent = script(&dir, "silent.sh", "exec sleep 30\n");
        let mut coordinator = coordinator();

        let handle = coordinator.start_with_script(&silent, request()).await.unwrap();
        let err = coordinator
            .start(ExecutionRequest::new("", "out/model.dxnn"))
            .await
            .unwrap_err();
        assert!(matches!(err, crate::core::Error::InvalidRequest(_)));
        assert!(coordinator.is_running());

        handle.cancel();
        assert!(coordinator.await_completion(Some(Duration::from_secs(10))).await);
    }

    #[tokio::test]
    async fn test_timeout_zero_is_unbounded_and_default_applies() {
        let coordinator = coordinator();
        assert_eq!(coordinator.config().effective_timeout(Some(0)), None);
        assert_eq!(
            coordinator.config().effective_timeout(None),
            Some(Duration::from_secs(300))
        );
    }
}
