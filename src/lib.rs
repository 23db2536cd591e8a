//! # dxcom-runner
//!
//! Supervised execution of the DEEPX `dxcom` model compiler: build the
//! command line from a request, run it as a child process, stream its
//! merged output as events with estimated progress, and classify the
//! failure when something goes wrong.
//!
//! ## Features
//!
//! - **Supervision**: one child at a time, cancellation with a grace
//!   period, wall-clock timeouts
//! - **Progress**: percentages estimated from compiler output keywords
//! - **Failure records**: categorized, user-facing messages with the
//!   technical detail kept alongside
//! - **Readiness probing**: tool, runtime, disk, memory and permissions
//! - **CLI** (feature `cli`): the `dxcom-runner` binary
//!
//! ## Example
//!
//! ```rust,no_run
//! use dxcom_runner::{Config, ExecutionCoordinator, ExecutionEvent, ExecutionRequest};
//!
//! # async fn run() -> dxcom_runner::Result<()> {
//! let mut coordinator = ExecutionCoordinator::new(Config::default());
//! let request = ExecutionRequest::new("model.onnx", "build/model.dxnn")
//!     .option("opt_level", 1)
//!     .option("calib_num", 100);
//!
//! let mut handle = coordinator.start(request).await?;
//! while let Some(event) = handle.next_event().await {
//!     match event {
//!         ExecutionEvent::Output(line) => println!("{}", line),
//!         ExecutionEvent::Progress { percentage, .. } => eprintln!("{}%", percentage),
//!         ExecutionEvent::Error(record) => eprintln!("{}", record.user_message),
//!         ExecutionEvent::Finished(outcome) => println!("{}", outcome.message()),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod probe;
pub mod runtime;

#[cfg(feature = "cli")]
pub mod cli;

pub use crate::core::{
    classify, sanitize, Config, ConfigBuilder, Error, ErrorCategory, ErrorRecord, ExecutionRequest,
    Fault, InvocationMode, OptionValue, Result,
};
pub use crate::probe::{EnvironmentProbe, ToolDetector, ToolInfo, ValidationReport};
pub use crate::runtime::{
    CommandSpec, ExecutionCoordinator, ExecutionEvent, ExecutionOutcome, ProcessSupervisor,
    RunHandle, RunId, RunState,
};
