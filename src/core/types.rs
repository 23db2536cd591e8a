//! Request types handed to the supervisor

use crate::core::error::{Error, Result};
use crate::core::validation;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Option keys the command builder knows how to forward
pub mod option_keys {
    pub const CONFIG_PATH: &str = "config_path";
    pub const OPT_LEVEL: &str = "opt_level";
    pub const GEN_LOG: &str = "gen_log";
    pub const AGGRESSIVE_PARTITIONING: &str = "aggressive_partitioning";
    pub const COMPILE_INPUT_NODES: &str = "compile_input_nodes";
    pub const COMPILE_OUTPUT_NODES: &str = "compile_output_nodes";
    pub const CALIB_METHOD: &str = "calib_method";
    pub const CALIB_NUM: &str = "calib_num";
}

/// A single compiler option value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Bool(bool),
    Int(i64),
    Text(String),
}

impl OptionValue {
    /// Whether a flag-style option should be emitted
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Bool(b) => *b,
            Self::Int(n) => *n != 0,
            Self::Text(s) => !s.is_empty(),
        }
    }

    /// Text form used as a command-line argument value
    pub fn as_arg(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(n) => write!(f, "{}", n),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for OptionValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for OptionValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<u32> for OptionValue {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Named compiler options. Keys are forwarded or omitted, never validated.
pub type CompilerOptions = BTreeMap<String, OptionValue>;

/// How the child process is launched
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum InvocationMode {
    /// `<tool> -m ... -o ...` built from the option map
    Cli,
    /// `<runtime> <script>` with no further arguments
    Script { script_path: PathBuf },
}

/// Everything needed to supervise one compilation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRequest {
    pub input_path: PathBuf,
    /// Output artifact path; the compiler receives its directory component
    pub output_path: PathBuf,
    #[serde(default)]
    pub options: CompilerOptions,
    /// `None` uses the configured default, `Some(0)` disables the timeout
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    pub mode: InvocationMode,
}

impl ExecutionRequest {
    /// Create a CLI-mode request with no options
    pub fn new(input_path: impl Into<PathBuf>, output_path: impl Into<PathBuf>) -> Self {
        Self {
            input_path: input_path.into(),
            output_path: output_path.into(),
            options: CompilerOptions::new(),
            timeout_secs: None,
            mode: InvocationMode::Cli,
        }
    }

    /// Set a compiler option
    pub fn option(mut self, key: impl Into<String>, value: impl Into<OptionValue>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Replace the whole option map
    pub fn options(mut self, options: CompilerOptions) -> Self {
        self.options = options;
        self
    }

    /// Set the timeout in seconds (0 = none)
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Switch to script mode
    pub fn script(mut self, script_path: impl Into<PathBuf>) -> Self {
        self.mode = InvocationMode::Script {
            script_path: script_path.into(),
        };
        self
    }

    /// Look up an option by key
    pub fn get_option(&self, key: &str) -> Option<&OptionValue> {
        self.options.get(key)
    }

    /// Directory handed to `-o`: the parent of the output path, or `.`
    pub fn output_dir(&self) -> PathBuf {
        match self.output_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    /// Reject requests that could never be run.
    ///
    /// Only construction mistakes are caught here. Whether the input file
    /// exists or the tool is installed is reported through the run itself.
    pub fn validate(&self) -> Result<()> {
        if is_blank(&self.input_path) {
            return Err(Error::invalid_request("input path is empty"));
        }
        if is_blank(&self.output_path) {
            return Err(Error::invalid_request("output path is empty"));
        }
        if let InvocationMode::Script { script_path } = &self.mode {
            if is_blank(script_path) {
                return Err(Error::invalid_request("script path is empty"));
            }
        }
        for key in [
            option_keys::COMPILE_INPUT_NODES,
            option_keys::COMPILE_OUTPUT_NODES,
        ] {
            if let Some(OptionValue::Text(nodes)) = self.options.get(key) {
                validation::validate_node_list(nodes)
                    .map_err(|issue| Error::invalid_request(format!("{}: {}", key, issue)))?;
            }
        }
        Ok(())
    }
}

fn is_blank(path: &Path) -> bool {
    path.as_os_str().to_string_lossy().trim().is_empty()
}
