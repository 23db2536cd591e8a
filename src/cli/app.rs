use crate::cli::commands::{CheckCommand, CompileCommand, DetectCommand, ShowCommand};
use crate::cli::config::CliConfig;
use crate::cli::error::Result;
use crate::cli::output::Printer;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;

/// Supervised runner for the DEEPX dxcom model compiler
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress output (overrides verbose)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path or name of the dxcom executable
    #[arg(long, global = true)]
    pub tool_path: Option<String>,

    /// Settings file to use instead of the default one
    #[arg(long, global = true, env = "DXCOM_RUNNER_CONFIG")]
    pub config_file: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compile an ONNX model
    Compile(CompileCommand),

    /// Check that the environment is ready to compile
    Check(CheckCommand),

    /// Detect the dxcom compiler
    Detect(DetectCommand),

    /// Print the compiler command line without running it
    #[command(name = "command")]
    Show(ShowCommand),
}

impl Cli {
    /// Tracing filter directive matching the verbosity flags
    pub fn log_level(&self) -> &'static str {
        if self.quiet {
            "warn"
        } else if self.verbose {
            "debug"
        } else {
            "info"
        }
    }

    /// Load settings: explicit file, then the default file, then defaults
    pub fn load_config(&self) -> Result<CliConfig> {
        let config = match &self.config_file {
            Some(path) => CliConfig::load_from_file(path)?,
            None => CliConfig::load_default().unwrap_or_else(|e| {
                debug!(error = %e, "using built-in defaults");
                CliConfig::default()
            }),
        };
        let config = config.merge_with_cli_args(self);
        config.runner.validate()?;
        Ok(config)
    }

    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        let config = self.load_config()?;
        if !config.output.color {
            colored::control::set_override(false);
        }
        let printer = Printer::new(&config);

        match &self.command {
            Commands::Compile(cmd) => cmd.execute(&config, &printer).await,
            Commands::Check(cmd) => cmd.execute(&config, &printer).await,
            Commands::Detect(cmd) => cmd.execute(&config, &printer).await,
            Commands::Show(cmd) => cmd.execute(&config).await,
        }
    }
}
