use crate::core::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default wall-clock timeout for a compilation run, in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Time a child gets between the terminate request and the force kill
pub const DEFAULT_GRACE_PERIOD_SECS: u64 = 5;

/// Runtime configuration shared by the supervisor and the environment probe
///
/// # Examples
///
/// ```rust
/// use dxcom_runner::core::Config;
///
/// let config = Config::builder()
///     .tool_program("/opt/deepx/bin/dxcom")
///     .default_timeout_secs(600)
///     .build()
///     .unwrap();
/// assert_eq!(config.default_timeout_secs, 600);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Compiler executable name or path used in CLI mode
    pub tool_program: String,

    /// Interpreter used to run generated scripts in script mode
    pub runtime_program: String,

    /// Timeout applied when a request does not carry its own
    pub default_timeout_secs: u64,

    /// Seconds between the graceful terminate request and the force kill
    pub grace_period_secs: u64,

    /// Upper bound for each `--version`/`--help` probe of an external tool
    pub version_probe_timeout_secs: u64,

    /// Below this much free space the disk check fails
    pub min_disk_space_mb: u64,

    /// Below this much free space the disk check passes with a warning
    pub recommended_disk_space_mb: u64,

    /// Below this much available memory the memory check warns
    pub low_memory_mb: u64,

    /// Oldest runtime version accepted
    pub min_runtime_version: (u32, u32),

    /// Runtime version below which a warning is issued
    pub recommended_runtime_version: (u32, u32),
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tool_program: "dxcom".to_string(),
            runtime_program: "python3".to_string(),
            default_timeout_secs: DEFAULT_TIMEOUT_SECS,
            grace_period_secs: DEFAULT_GRACE_PERIOD_SECS,
            version_probe_timeout_secs: 5,
            min_disk_space_mb: 100,
            recommended_disk_space_mb: 500,
            low_memory_mb: 256,
            min_runtime_version: (3, 8),
            recommended_runtime_version: (3, 9),
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    /// Check the configuration for values that would break a run
    pub fn validate(&self) -> Result<()> {
        if self.tool_program.trim().is_empty() {
            return Err(Error::configuration("tool_program must not be empty"));
        }
        if self.runtime_program.trim().is_empty() {
            return Err(Error::configuration("runtime_program must not be empty"));
        }
        if self.grace_period_secs == 0 {
            return Err(Error::configuration("grace_period_secs must be at least 1"));
        }
        if self.version_probe_timeout_secs == 0 {
            return Err(Error::configuration(
                "version_probe_timeout_secs must be at least 1",
            ));
        }
        if self.recommended_disk_space_mb < self.min_disk_space_mb {
            return Err(Error::configuration(format!(
                "recommended_disk_space_mb ({}) is below min_disk_space_mb ({})",
                self.recommended_disk_space_mb, self.min_disk_space_mb
            )));
        }
        if self.recommended_runtime_version < self.min_runtime_version {
            return Err(Error::configuration(format!(
                "recommended runtime {}.{} is older than minimum {}.{}",
                self.recommended_runtime_version.0,
                self.recommended_runtime_version.1,
                self.min_runtime_version.0,
                self.min_runtime_version.1
            )));
        }
        Ok(())
    }

    /// Grace period as a `Duration`
    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period_secs)
    }

    /// Version probe timeout as a `Duration`
    pub fn version_probe_timeout(&self) -> Duration {
        Duration::from_secs(self.version_probe_timeout_secs)
    }

    /// Resolve a caller-supplied timeout into the effective run limit.
    ///
    /// `None` means "use the default", `Some(0)` means "no timeout".
    pub fn effective_timeout(&self, requested_secs: Option<u64>) -> Option<Duration> {
        match requested_secs.unwrap_or(self.default_timeout_secs) {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

/// Builder for [`Config`]
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder starting from defaults
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    /// Set the compiler executable
    pub fn tool_program(mut self, program: impl Into<String>) -> Self {
        self.config.tool_program = program.into();
        self
    }

    /// Set the script interpreter
    pub fn runtime_program(mut self, program: impl Into<String>) -> Self {
        self.config.runtime_program = program.into();
        self
    }

    /// Set the default run timeout (0 disables it)
    pub fn default_timeout_secs(mut self, secs: u64) -> Self {
        self.config.default_timeout_secs = secs;
        self
    }

    /// Set the terminate-to-kill grace period
    pub fn grace_period_secs(mut self, secs: u64) -> Self {
        self.config.grace_period_secs = secs;
        self
    }

    /// Set the bound on each version probe
    pub fn version_probe_timeout_secs(mut self, secs: u64) -> Self {
        self.config.version_probe_timeout_secs = secs;
        self
    }

    /// Set disk space floors in MB
    pub fn disk_space_mb(mut self, minimum: u64, recommended: u64) -> Self {
        self.config.min_disk_space_mb = minimum;
        self.config.recommended_disk_space_mb = recommended;
        self
    }

    /// Set the available-memory warning floor in MB
    pub fn low_memory_mb(mut self, mb: u64) -> Self {
        self.config.low_memory_mb = mb;
        self
    }

    /// Set runtime version floors
    pub fn runtime_versions(mut self, minimum: (u32, u32), recommended: (u32, u32)) -> Self {
        self.config.min_runtime_version = minimum;
        self.config.recommended_runtime_version = recommended;
        self
    }

    /// Build the final config
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid
    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}
