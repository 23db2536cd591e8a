//! Process supervision: command construction, child plumbing, the
//! per-run supervisor and the single-run coordinator.

pub mod command;
pub mod coordinator;
pub mod process;
pub mod supervisor;



pub use command::{build_cli_command, build_script_command, CommandSpec};
pub use coordinator::{ExecutionCoordinator, RunHandle};
pub use supervisor::{ExecutionEvent, ExecutionOutcome, ProcessSupervisor, RunId, RunState};
