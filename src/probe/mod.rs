//! Environment readiness: is the compiler installed, is the runtime new
//! enough, is there room and permission to write the output.
//!
//! Checks never abort each other. The probe and the detector each own
//! their cache; nothing here is process-global.

pub mod checks;
pub mod detector;
pub mod report;

pub use detector::{extract_version, StatusKind, ToolDetector, ToolInfo};
pub use report::{Severity, ValidationCheck, ValidationReport};

use crate::core::Config;
use std::path::Path;
use tracing::info;

/// Message returned by a passing [`EnvironmentProbe::quick_check`]
pub const READY_MESSAGE: &str = "Environment ready for compilation";

/// Runs the readiness checks and caches the full report
#[derive(Debug, Clone)]
pub struct EnvironmentProbe {
    config: Config,
    cached: Option<ValidationReport>,
}

impl EnvironmentProbe {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            cached: None,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Full battery: tool, runtime, disk space at the working directory,
    /// write permission (when `output_path` is given), memory and temp dir.
    ///
    /// The report is cached until `clear_cache` or `force_refresh`.
    pub async fn validate(
        &mut self,
        force_refresh: bool,
        output_path: Option<&Path>,
    ) -> ValidationReport {
        if !force_refresh {
            if let Some(report) = &self.cached {
                return report.clone();
            }
        }

        let mut report = ValidationReport::new();
        report.add_check(self.tool_check().await);
        report.add_check(self.runtime_check().await);
        report.add_check(
            checks::check_disk_space(
                None,
                self.config.min_disk_space_mb,
                self.config.recommended_disk_space_mb,
            )
            .await,
        );
        if let Some(output_path) = output_path {
            report.add_check(checks::check_write_permissions(output_path));
        }
        report.add_check(checks::check_system_memory(self.config.low_memory_mb).await);
        report.add_check(checks::check_temp_directory());

        info!(
            valid = report.overall_valid(),
            errors = report.errors().len(),
            warnings = report.warnings().len(),
            advisories = report.advisories().len(),
            "environment validation finished"
        );
        self.cached = Some(report.clone());
        report
    }

    /// Critical subset for one output path. Never cached.
    pub async fn validate_compilation_ready(&self, output_path: &Path) -> ValidationReport {
        let mut report = ValidationReport::new();
        report.add_check(self.tool_check().await);
        report.add_check(self.runtime_check().await);
        report.add_check(checks::check_write_permissions(output_path));
        report.add_check(
            checks::check_disk_space(
                Some(output_path),
                self.config.min_disk_space_mb,
                self.config.recommended_disk_space_mb,
            )
            .await,
        );
        report
    }

    /// Tool and runtime only; the first failure's message is returned
    pub async fn quick_check(&self) -> (bool, String) {
        let tool = self.tool_check().await;
        if !tool.passed {
            return (false, tool.message);
        }

        let runtime = self.runtime_check().await;
        if !runtime.passed {
            return (false, runtime.message);
        }

        (true, READY_MESSAGE.to_string())
    }

    /// The cached full report, if any
    pub fn cached_report(&self) -> Option<&ValidationReport> {
        self.cached.as_ref()
    }

    pub fn clear_cache(&mut self) {
        self.cached = None;
    }

    async fn tool_check(&self) -> ValidationCheck {
        checks::check_tool_installed(
            &self.config.tool_program,
            self.config.version_probe_timeout(),
        )
        .await
    }

    async fn runtime_check(&self) -> ValidationCheck {
        checks::check_runtime_version(
            &self.config.runtime_program,
            self.config.min_runtime_version,
            self.config.recommended_runtime_version,
            self.config.version_probe_timeout(),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn broken_config() -> Config {
        Config::builder()
            .tool_program("dxcom-runner-no-such-tool")
            .runtime_program("dxcom-runner-no-such-python")
            .version_probe_timeout_secs(1)
            .disk_space_mb(0, 0)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_missing_tool_fails_validation_but_runs_every_check() {
        let mut probe = EnvironmentProbe::new(broken_config());
        let report = probe.validate(false, None).await;

        assert!(!report.overall_valid());
        // tool, runtime, disk, memory, temp dir
        assert_eq!(report.checks().len(), 5);
        assert_eq!(report.errors().len(), 2);
        assert!(report.summary().starts_with("✗ Environment validation failed"));
        assert!(report
            .error_messages()
            .contains(&"DXCom compiler not found".to_string()));
    }

    #[tokio::test]
    async fn test_report_is_cached_until_cleared() {
        let dir = tempfile::tempdir().unwrap();
        let mut probe = EnvironmentProbe::new(broken_config());

        let first = probe.validate(false, None).await;
        assert_eq!(probe.cached_report(), Some(&first));

        // Cached: the output path is ignored until a refresh
        let cached = probe
            .validate(false, Some(&dir.path().join("model.dxnn")))
            .await;
        assert_eq!(cached.checks().len(), first.checks().len());

        let refreshed = probe
            .validate(true, Some(&dir.path().join("model.dxnn")))
            .await;
        assert_eq!(refreshed.checks().len(), first.checks().len() + 1);

        probe.clear_cache();
        assert!(probe.cached_report().is_none());
    }

    #[tokio::test]
    async fn test_compilation_ready_checks_output_path() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("build/model.dxnn");
        let probe = EnvironmentProbe::new(broken_config());

        let report = probe.validate_compilation_ready(&output).await;
        assert_eq!(report.checks().len(), 4);
        assert!(report.checks()[2].passed);
        assert!(dir.path().join("build").is_dir());
        assert!(probe.cached_report().is_none());
    }

    #[test]
    fn test_quick_check_reports_first_failure() {
        let probe = EnvironmentProbe::new(broken_config());
        let (ready, message) = tokio_test::block_on(probe.quick_check());
        assert!(!ready);
        assert_eq!(message, "DXCom compiler not found");
    }
}
