//! Command-line construction for the compiler and script runtimes

use crate::core::types::option_keys as keys;
use crate::core::{Config, ExecutionRequest, InvocationMode, OptionValue};
use std::ffi::OsString;
use std::fmt;
use std::path::Path;

/// Program plus discrete arguments. Never passed through a shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: OsString,
    pub args: Vec<OsString>,
}

impl CommandSpec {
    /// Create a command with no arguments
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Append one argument
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Build the command for a request, honoring its invocation mode
    pub fn for_request(config: &Config, request: &ExecutionRequest) -> Self {
        match &request.mode {
            InvocationMode::Cli => build_cli_command(&config.tool_program, request),
            InvocationMode::Script { script_path } => {
                build_script_command(&config.runtime_program, script_path)
            }
        }
    }

    /// Program name as text, for logs and fault classification
    pub fn program_name(&self) -> String {
        self.program.to_string_lossy().into_owned()
    }

    /// Full argv as lossy strings, program first
    pub fn argv(&self) -> Vec<String> {
        std::iter::once(&self.program)
            .chain(self.args.iter())
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    /// Create a tokio command with this program and arguments
    pub fn to_command(&self) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.args(&self.args);
        cmd
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.argv().join(" "))
    }
}

fn text_option<'a>(request: &'a ExecutionRequest, key: &str) -> Option<&'a OptionValue> {
    request.get_option(key).filter(|value| value.is_truthy())
}

/// Build `<tool> -m <input> -o <dir> [-c cfg] --opt_level N [flags...]`.
///
/// Missing options are omitted, never an error. `--opt_level` is always
/// present and `calib_num` is emitted whenever it is set, zero included.
pub fn build_cli_command(tool: &str, request: &ExecutionRequest) -> CommandSpec {
    let mut cmd = CommandSpec::new(tool)
        .arg("-m")
        .arg(request.input_path.as_os_str())
        .arg("-o")
        .arg(request.output_dir().into_os_string());

    if let Some(config_path) = text_option(request, keys::CONFIG_PATH) {
        cmd = cmd.arg("-c").arg(config_path.as_arg());
    }

    let opt_level = request
        .get_option(keys::OPT_LEVEL)
        .map(OptionValue::as_arg)
        .unwrap_or_else(|| "0".to_string());
    cmd = cmd.arg("--opt_level").arg(opt_level);

    for flag in [keys::GEN_LOG, keys::AGGRESSIVE_PARTITIONING] {
        if request.get_option(flag).is_some_and(OptionValue::is_truthy) {
            cmd = cmd.arg(format!("--{}", flag));
        }
    }

    for key in [
        keys::COMPILE_INPUT_NODES,
        keys::COMPILE_OUTPUT_NODES,
        keys::CALIB_METHOD,
    ] {
        if let Some(value) = text_option(request, key) {
            cmd = cmd.arg(format!("--{}", key)).arg(value.as_arg());
        }
    }

    if let Some(calib_num) = request.get_option(keys::CALIB_NUM) {
        cmd = cmd.arg(format!("--{}", keys::CALIB_NUM)).arg(calib_num.as_arg());
    }

    cmd
}

/// Build `<runtime> <script>`
pub fn build_script_command(runtime: &str, script_path: &Path) -> CommandSpec {
    CommandSpec::new(runtime).arg(script_path.as_os_str())
}
