//! Subcommand arguments and handlers
//!
//! This module handles:
//! - Turning compile flags into an `ExecutionRequest`
//! - Pre-flight validation of user-supplied paths
//! - Streaming a run to the terminal, with Ctrl-C as cancellation
//! - Environment reports and tool detection

use crate::cli::config::CliConfig;
use crate::cli::error::{CliError, Result};
use crate::cli::output::Printer;
use crate::core::types::option_keys as keys;
use crate::core::validation::{
    validate_config_file, validate_input_model, validate_node_list, validate_output_dir,
};
use crate::core::ExecutionRequest;
use crate::probe::{EnvironmentProbe, StatusKind, ToolDetector};
use crate::runtime::{CommandSpec, ExecutionCoordinator, ExecutionEvent, ExecutionOutcome};
use clap::Args;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Compiler options shared by `compile` and `command`
#[derive(Args, Debug, Clone, PartialEq)]
pub struct CompileArgs {
    /// Input ONNX model
    #[arg(short = 'm', long)]
    pub input: PathBuf,

    /// Output file; the compiler writes into its directory
    #[arg(short = 'o', long)]
    pub output: PathBuf,

    /// JSON compiler config file
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Optimization level
    #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=1))]
    pub opt_level: u8,

    /// Ask the compiler to write its log
    #[arg(long)]
    pub gen_log: bool,

    /// Enable aggressive partitioning
    #[arg(long)]
    pub aggressive_partitioning: bool,

    /// Comma-separated input node names
    #[arg(long)]
    pub input_nodes: Option<String>,

    /// Comma-separated output node names
    #[arg(long)]
    pub output_nodes: Option<String>,

    /// Calibration method name
    #[arg(long)]
    pub calib_method: Option<String>,

    /// Number of calibration samples
    #[arg(long)]
    pub calib_num: Option<u32>,

    /// Timeout in seconds (0 disables it; default from config)
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Run this script with the configured runtime instead of the compiler
    #[arg(long)]
    pub script: Option<PathBuf>,
}

impl CompileArgs {
    /// Build the request these flags describe
    pub fn to_request(&self) -> ExecutionRequest {
        let mut request = ExecutionRequest::new(&self.input, &self.output)
            .option(keys::OPT_LEVEL, u32::from(self.opt_level))
            .option(keys::GEN_LOG, self.gen_log)
            .option(keys::AGGRESSIVE_PARTITIONING, self.aggressive_partitioning);

        if let Some(config) = &self.config {
            request = request.option(keys::CONFIG_PATH, config.to_string_lossy().into_owned());
        }
        for (key, value) in [
            (keys::COMPILE_INPUT_NODES, &self.input_nodes),
            (keys::COMPILE_OUTPUT_NODES, &self.output_nodes),
            (keys::CALIB_METHOD, &self.calib_method),
        ] {
            if let Some(value) = value {
                request = request.option(key, value.trim());
            }
        }
        if let Some(calib_num) = self.calib_num {
            request = request.option(keys::CALIB_NUM, calib_num);
        }
        if let Some(timeout) = self.timeout {
            request = request.timeout_secs(timeout);
        }
        if let Some(script) = &self.script {
            request = request.script(script);
        }

        request
    }

    /// Check the user-supplied paths and values before anything runs
    pub fn preflight(&self) -> Result<()> {
        validate_input_model(&self.input).map_err(|e| CliError::invalid_input(e.to_string()))?;

        if let Some(config) = &self.config {
            validate_config_file(config).map_err(|e| CliError::invalid_input(e.to_string()))?;
        }
        for nodes in [&self.input_nodes, &self.output_nodes].into_iter().flatten() {
            validate_node_list(nodes).map_err(|e| CliError::invalid_input(e.to_string()))?;
        }

        let request = self.to_request();
        validate_output_dir(&request.output_dir())
            .map_err(|e| CliError::invalid_input(e.to_string()))?;
        if let Some(script) = &self.script {
            if !script.is_file() {
                return Err(CliError::invalid_input(format!(
                    "Script file does not exist: {}",
                    script.display()
                )));
            }
        }

        Ok(())
    }
}

/// Compile a model and stream the compiler output
#[derive(Args, Debug, Clone)]
pub struct CompileCommand {
    #[command(flatten)]
    pub args: CompileArgs,

    /// Skip input validation and the environment check
    #[arg(long)]
    pub skip_checks: bool,
}

impl CompileCommand {
    pub async fn execute(&self, config: &CliConfig, printer: &Printer) -> Result<()> {
        if self.skip_checks {
            debug!("pre-flight checks skipped");
        } else {
            self.args.preflight()?;

            let probe = EnvironmentProbe::new(config.runner.clone());
            let report = probe.validate_compilation_ready(&self.args.output).await;
            if !report.overall_valid() {
                printer.report(&report);
                return Err(CliError::environment(report.error_messages().join("; ")));
            }
            for warning in report.advisories() {
                printer.notice(&format!("Warning: {}", warning.message));
            }
        }

        let mut coordinator = ExecutionCoordinator::new(config.runner.clone());
        let mut handle = coordinator.start(self.args.to_request()).await?;
        let mut cancel_requested = false;

        let outcome = loop {
            tokio::select! {
                event = handle.next_event() => match event {
                    Some(ExecutionEvent::Finished(outcome)) => break Some(outcome),
                    Some(event) => printer.event(&event),
                    None => break None,
                },
                signal = tokio::signal::ctrl_c(), if !cancel_requested => {
                    if let Err(e) = signal {
                        warn!(error = %e, "could not listen for Ctrl-C");
                    }
                    printer.notice("Cancelling compilation...");
                    handle.cancel();
                    cancel_requested = true;
                }
            }
        };
        coordinator.await_completion(None).await;

        match outcome {
            Some(outcome) if outcome.is_success() => {
                printer.success(outcome.message());
                Ok(())
            }
            Some(ExecutionOutcome::Cancelled { .. }) => Err(CliError::Cancelled),
            Some(outcome) => {
                printer.failure(outcome.message());
                Err(CliError::compilation_failed(outcome.message()))
            }
            None => Err(CliError::compilation_failed(
                "the run ended without reporting an outcome",
            )),
        }
    }
}

/// Print the command line `compile` would run
#[derive(Args, Debug, Clone)]
pub struct ShowCommand {
    #[command(flatten)]
    pub args: CompileArgs,
}

impl ShowCommand {
    /// The command line for these flags under `config`
    pub fn render(&self, config: &CliConfig) -> Result<CommandSpec> {
        let request = self.args.to_request();
        request.validate()?;
        Ok(CommandSpec::for_request(&config.runner, &request))
    }

    pub async fn execute(&self, config: &CliConfig) -> Result<()> {
        println!("{}", self.render(config)?);
        Ok(())
    }
}

/// Check that the environment is ready to compile
#[derive(Args, Debug, Clone)]
pub struct CheckCommand {
    /// Also check that this output path is writable
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,

    /// Only check the compiler and runtime
    #[arg(long)]
    pub quick: bool,

    /// Print the report as JSON
    #[arg(long, conflicts_with = "quick")]
    pub json: bool,
}

impl CheckCommand {
    pub async fn execute(&self, config: &CliConfig, printer: &Printer) -> Result<()> {
        let mut probe = EnvironmentProbe::new(config.runner.clone());

        if self.quick {
            let (ready, message) = probe.quick_check().await;
            if ready {
                printer.status(StatusKind::Success, &message);
                return Ok(());
            }
            printer.status(StatusKind::Error, &message);
            return Err(CliError::environment(message));
        }

        let report = probe.validate(true, self.output.as_deref()).await;
        if self.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            printer.report(&report);
        }

        if report.overall_valid() {
            Ok(())
        } else {
            Err(CliError::environment(report.error_messages().join("; ")))
        }
    }
}

/// Detect the compiler and print its version
#[derive(Args, Debug, Clone)]
pub struct DetectCommand {
    /// Print the detection result as JSON
    #[arg(long)]
    pub json: bool,
}

impl DetectCommand {
    pub async fn execute(&self, config: &CliConfig, printer: &Printer) -> Result<()> {
        let mut detector = ToolDetector::from_config(&config.runner);

        if self.json {
            let info = detector.detect(false).await;
            println!("{}", serde_json::to_string_pretty(&info)?);
            return if info.is_valid() {
                Ok(())
            } else {
                Err(CliError::environment(
                    info.error_message.unwrap_or_else(|| "dxcom not available".to_string()),
                ))
            };
        }

        let (kind, message) = detector.status().await;
        printer.status(kind, &message);
        match kind {
            StatusKind::Success => Ok(()),
            StatusKind::Error => Err(CliError::environment(message)),
        }
    }
}
