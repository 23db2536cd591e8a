use crate::cli::error::{CliError, Result};
use crate::core::Config;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Settings file for the dxcom-runner command line
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CliConfig {
    /// Default verbosity level
    #[serde(default)]
    pub verbose: bool,

    /// Default quiet mode
    #[serde(default)]
    pub quiet: bool,

    /// Custom data directory (if not using system default)
    pub data_dir: Option<PathBuf>,

    /// Runner settings: programs, timeouts and probe thresholds
    #[serde(default)]
    pub runner: Config,

    /// Output formatting preferences
    #[serde(default)]
    pub output: OutputDefaults,
}

/// Output formatting defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputDefaults {
    /// Enable colored output by default
    #[serde(default = "default_true")]
    pub color: bool,

    /// Show progress lines while compiling
    #[serde(default = "default_true")]
    pub progress: bool,
}

impl Default for OutputDefaults {
    fn default() -> Self {
        Self {
            color: default_true(),
            progress: default_true(),
        }
    }
}

impl CliConfig {
    /// Load configuration from file, creating it with defaults if missing
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            let config = Self::default();
            config.save_to_file(path)?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(path)?;
        let config: CliConfig = toml::from_str(&content).map_err(|e| {
            CliError::configuration(format!(
                "Failed to parse config file {}: {}",
                path.display(),
                e
            ))
        })?;

        Ok(config)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| CliError::configuration(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default config file path
    pub fn default_path() -> Result<PathBuf> {
        let data_dir = crate::cli::ensure_data_dir()?;
        Ok(data_dir.join("config.toml"))
    }

    /// Load configuration from the default location
    pub fn load_default() -> Result<Self> {
        let path = Self::default_path()?;
        Self::load_from_file(path)
    }

    /// Merge with command-line arguments, giving priority to CLI args
    pub fn merge_with_cli_args(mut self, cli_args: &crate::cli::app::Cli) -> Self {
        if cli_args.verbose {
            self.verbose = true;
        }
        if cli_args.quiet {
            self.quiet = true;
            self.verbose = false;
        }
        if let Some(tool_path) = &cli_args.tool_path {
            self.runner.tool_program = tool_path.clone();
        }
        if cli_args.no_color {
            self.output.color = false;
        }

        self
    }
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::app::Cli;
    use clap::Parser;
    use tempfile::tempdir;

    #[test]
    fn test_config_default() {
        let config = CliConfig::default();
        assert!(!config.verbose);
        assert!(!config.quiet);
        assert!(config.output.color);
        assert!(config.output.progress);
        assert_eq!(config.runner, Config::default());
    }

    #[test]
    fn test_config_save_load() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.toml");

        let mut config = CliConfig::default();
        config.verbose = true;
        config.runner.default_timeout_secs = 900;
        config.runner.tool_program = "/opt/deepx/bin/dxcom".to_string();
        config.runner.min_runtime_version = (3, 10);
        config.runner.recommended_runtime_version = (3, 11);

        config.save_to_file(&config_path).unwrap();
        let loaded = CliConfig::load_from_file(&config_path).unwrap();

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_config_file_creation() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("nested/config.toml");

        let config = CliConfig::load_from_file(&config_path).unwrap();

        assert!(config_path.exists());
        assert_eq!(config, CliConfig::default());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        std::fs::write(&config_path, "quiet = true\n\n[runner]\ngrace_period_secs = 2\n").unwrap();

        let config = CliConfig::load_from_file(&config_path).unwrap();
        assert!(config.quiet);
        assert_eq!(config.runner.grace_period_secs, 2);
        assert_eq!(config.runner.tool_program, "dxcom");
        assert!(config.output.color);
    }

    #[test]
    fn test_broken_file_is_configuration_error() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        std::fs::write(&config_path, "verbose = [").unwrap();

        let err = CliConfig::load_from_file(&config_path).unwrap_err();
        assert!(matches!(err, CliError::Configuration(_)));
    }

    #[test]
    fn test_merge_with_cli_args() {
        let cli = Cli::parse_from([
            "dxcom-runner",
            "--quiet",
            "--no-color",
            "--tool-path",
            "/usr/local/bin/dxcom",
            "detect",
        ]);
        let mut base = CliConfig::default();
        base.verbose = true;

        let merged = base.merge_with_cli_args(&cli);
        assert!(merged.quiet);
        assert!(!merged.verbose);
        assert!(!merged.output.color);
        assert_eq!(merged.runner.tool_program, "/usr/local/bin/dxcom");
    }
}
