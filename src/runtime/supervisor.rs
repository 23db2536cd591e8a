//! Single-use supervision of one compiler run
//!
//! A [`ProcessSupervisor`] spawns the child, streams its merged output as
//! events, enforces the timeout and cancellation, and reports exactly one
//! [`ExecutionOutcome`]. The `Finished` event is always the last event and
//! the channel closes right after it.

use super::command::CommandSpec;
use super::process::{self, MergedChild};
use crate::core::{
    classify, display_message, estimate, sanitize, Config, ErrorRecord, ExecutionRequest, Fault,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future;
use std::io;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

const STARTING_MESSAGE: &str = "Starting compilation...";
const SUCCESS_MESSAGE: &str = "Compilation completed successfully";

/// Unique identifier for one supervised run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(Uuid);

impl RunId {
    /// Create a new random run id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// The underlying UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of a supervisor. Terminal states are absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Running,
    Success,
    Failed,
    Cancelled,
    TimedOut,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunState::Idle | RunState::Running)
    }
}

/// Terminal result of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ExecutionOutcome {
    Success { message: String },
    Failed(ErrorRecord),
    Cancelled { message: String },
    TimedOut(ErrorRecord),
}

impl ExecutionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionOutcome::Success { .. })
    }

    /// One-line description for the `(success, message)` outcome pair
    pub fn message(&self) -> &str {
        match self {
            ExecutionOutcome::Success { message } | ExecutionOutcome::Cancelled { message } => {
                message
            }
            ExecutionOutcome::Failed(record) | ExecutionOutcome::TimedOut(record) => {
                &record.user_message
            }
        }
    }

    /// The failure record, for failed and timed-out runs
    pub fn error_record(&self) -> Option<&ErrorRecord> {
        match self {
            ExecutionOutcome::Failed(record) | ExecutionOutcome::TimedOut(record) => Some(record),
            _ => None,
        }
    }

    /// The terminal state this outcome corresponds to
    pub fn state(&self) -> RunState {
        match self {
            ExecutionOutcome::Success { .. } => RunState::Success,
            ExecutionOutcome::Failed(_) => RunState::Failed,
            ExecutionOutcome::Cancelled { .. } => RunState::Cancelled,
            ExecutionOutcome::TimedOut(_) => RunState::TimedOut,
        }
    }
}

/// Events delivered to the caller, in order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ExecutionEvent {
    /// One sanitized output line
    Output(String),
    /// Heuristic progress; may go backwards
    Progress { percentage: u8, message: String },
    /// Failure or cancellation record, sent before `Finished`
    Error(ErrorRecord),
    /// Always the last event of a run
    Finished(ExecutionOutcome),
}

/// Why the read loop stopped before the output stream closed
enum Interrupt {
    Cancelled,
    TimedOut,
    ReadFailed(io::Error),
}

enum Step {
    Cancel,
    Deadline,
    Line(Option<io::Result<String>>),
}

async fn deadline_reached(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline.into()).await,
        None => future::pending().await,
    }
}

/// Runs one child process to a terminal outcome.
///
/// Single-use: [`run`](Self::run) consumes the supervisor.
#[derive(Debug)]
pub struct ProcessSupervisor {
    run_id: RunId,
    command: CommandSpec,
    timeout: Option<Duration>,
    grace: Duration,
    cancel: CancellationToken,
    events: mpsc::UnboundedSender<ExecutionEvent>,
    state: RunState,
    started_at: DateTime<Utc>,
    output: String,
    lines_seen: usize,
}

impl ProcessSupervisor {
    /// Prepare a run for `request`. Nothing is spawned until `run`.
    pub fn new(
        config: &Config,
        request: &ExecutionRequest,
        cancel: CancellationToken,
    ) -> (Self, mpsc::UnboundedReceiver<ExecutionEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let supervisor = Self {
            run_id: RunId::new(),
            command: CommandSpec::for_request(config, request),
            timeout: config.effective_timeout(request.timeout_secs),
            grace: config.grace_period(),
            cancel,
            events,
            state: RunState::Idle,
            started_at: Utc::now(),
            output: String::new(),
            lines_seen: 0,
        };
        (supervisor, rx)
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn command(&self) -> &CommandSpec {
        &self.command
    }

    /// Effective wall-clock limit, `None` when unbounded
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Run the child to completion and return its outcome
    pub async fn run(self) -> ExecutionOutcome {
        self.run_from(Instant::now()).await
    }

    /// Run with the timeout measured from `started`
    pub(crate) async fn run_from(self, started: Instant) -> ExecutionOutcome {
        let span = info_span!("supervised_run", run_id = %self.run_id);
        self.drive(started).instrument(span).await
    }

    async fn drive(mut self, started: Instant) -> ExecutionOutcome {
        self.state = RunState::Running;
        self.started_at = Utc::now();
        self.progress(0, STARTING_MESSAGE.to_string());
        self.emit(ExecutionEvent::Output(format!("Executing: {}", self.command)));
        info!(
            command = %self.command,
            timeout_secs = ?self.timeout.map(|t| t.as_secs()),
            "starting compiler process"
        );

        let MergedChild { mut child, mut lines } = match process::spawn_merged(&self.command) {
            Ok(merged) => merged,
            Err(e) => {
                error!(error = %e, program = %self.command.program_name(), "failed to spawn");
                let fault = Fault::from_io(&e, &self.command.program_name());
                let record = classify(None, &self.output, Some(&fault));
                return self.finish(ExecutionOutcome::Failed(record), started);
            }
        };
        let pid = child.id();
        let deadline = self.timeout.and_then(|limit| started.checked_add(limit));

        let interrupt = loop {
            // Timeout wins over cancellation when both are due
            let step = tokio::select! {
                biased;
                _ = deadline_reached(deadline) => Step::Deadline,
                _ = self.cancel.cancelled() => Step::Cancel,
                line = lines.recv() => Step::Line(line),
            };

            match step {
                Step::Cancel => break Some(Interrupt::Cancelled),
                Step::Deadline => break Some(Interrupt::TimedOut),
                Step::Line(Some(Ok(raw))) => {
                    if deadline.is_some_and(|d| Instant::now() >= d) {
                        break Some(Interrupt::TimedOut);
                    }
                    if self.cancel.is_cancelled() {
                        break Some(Interrupt::Cancelled);
                    }
                    self.handle_line(&raw);
                }
                Step::Line(Some(Err(e))) => break Some(Interrupt::ReadFailed(e)),
                Step::Line(None) => break None,
            }
        };

        let interrupt = match interrupt {
            Some(interrupt) => interrupt,
            None => {
                // Output closed; the child is exiting or already gone
                let waited = tokio::select! {
                    biased;
                    _ = deadline_reached(deadline) => Err(Interrupt::TimedOut),
                    _ = self.cancel.cancelled() => Err(Interrupt::Cancelled),
                    status = child.wait() => status.map_err(Interrupt::ReadFailed),
                };
                match waited {
                    Ok(status) => {
                        debug!(?pid, %status, lines = self.lines_seen, "child exited");
                        let outcome = match status.code() {
                            Some(0) => ExecutionOutcome::Success {
                                message: SUCCESS_MESSAGE.to_string(),
                            },
                            Some(code) => {
                                ExecutionOutcome::Failed(classify(Some(code), &self.output, None))
                            }
                            None => {
                                let fault = Fault::Other {
                                    kind: "Terminated".to_string(),
                                    message: format!("Process ended without an exit code ({})", status),
                                };
                                ExecutionOutcome::Failed(classify(None, &self.output, Some(&fault)))
                            }
                        };
                        return self.finish(outcome, started);
                    }
                    Err(interrupt) => interrupt,
                }
            }
        };

        process::terminate(&mut child, self.grace).await;

        let outcome = match interrupt {
            Interrupt::Cancelled => {
                info!(?pid, "run cancelled");
                let record = ErrorRecord::cancelled();
                ExecutionOutcome::Cancelled {
                    message: record.user_message,
                }
            }
            Interrupt::TimedOut => {
                let limit = self.timeout.unwrap_or_default();
                warn!(?pid, limit_secs = limit.as_secs(), "run timed out");
                let fault = Fault::DeadlineExceeded { limit };
                ExecutionOutcome::TimedOut(classify(None, &self.output, Some(&fault)))
            }
            Interrupt::ReadFailed(e) => {
                error!(?pid, error = %e, "lost contact with child process");
                let fault = Fault::from_io(&e, &self.command.program_name());
                ExecutionOutcome::Failed(classify(None, &self.output, Some(&fault)))
            }
        };
        self.finish(outcome, started)
    }

    fn handle_line(&mut self, raw: &str) {
        let line = sanitize(raw.trim_end_matches(|c| c == '\n' || c == '\r'));
        self.lines_seen += 1;

        if !self.output.is_empty() {
            self.output.push('\n');
        }
        self.output.push_str(&line);

        let percentage = estimate(&line, self.lines_seen);
        let message = display_message(&line);
        self.emit(ExecutionEvent::Output(line));
        if let Some(percentage) = percentage {
            self.progress(percentage, message);
        }
    }

    fn finish(mut self, outcome: ExecutionOutcome, started: Instant) -> ExecutionOutcome {
        self.state = outcome.state();

        match &outcome {
            ExecutionOutcome::Success { message } => {
                self.progress(100, message.clone());
            }
            ExecutionOutcome::Failed(record) | ExecutionOutcome::TimedOut(record) => {
                self.emit(ExecutionEvent::Error(record.clone()));
                self.emit(ExecutionEvent::Output(record.render(true)));
            }
            ExecutionOutcome::Cancelled { .. } => {
                self.emit(ExecutionEvent::Error(ErrorRecord::cancelled()));
            }
        }

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match outcome.error_record() {
            Some(record) => info!(
                state = ?self.state,
                category = %record.category,
                exit_code = ?record.exit_code,
                elapsed_ms,
                "run finished"
            ),
            None => info!(state = ?self.state, elapsed_ms, "run finished"),
        }

        self.emit(ExecutionEvent::Finished(outcome.clone()));
        outcome
    }

    fn progress(&self, percentage: u8, message: String) {
        self.emit(ExecutionEvent::Progress {
            percentage,
            message,
        });
    }

    fn emit(&self, event: ExecutionEvent) {
        // A dropped receiver only means nobody is listening
        let _ = self.events.send(event);
    }
}
