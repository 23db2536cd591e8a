//! Pure building blocks: request types, configuration, output sanitizing,
//! progress estimation, failure classification and pre-flight validation.
//!
//! Nothing in this module spawns processes or touches shared state.

pub mod classify;
pub mod config;
pub mod error;
pub mod progress;
pub mod sanitize;
pub mod types;
pub mod validation;

pub use classify::{classify, extract_technical_details, ErrorCategory, ErrorRecord, Fault};
pub use config::{Config, ConfigBuilder, DEFAULT_GRACE_PERIOD_SECS, DEFAULT_TIMEOUT_SECS};
pub use error::{Error, Result};
pub use progress::{display_message, estimate};
pub use sanitize::sanitize;
pub use types::{option_keys, CompilerOptions, ExecutionRequest, InvocationMode, OptionValue};
pub use validation::ValidationIssue;
