//! Check results and the aggregated readiness report

use serde::{Deserialize, Serialize};
use std::fmt;

/// How much a check matters to the overall verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// Result of one environment check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationCheck {
    pub passed: bool,
    pub message: String,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ValidationCheck {
    /// Passed, informational
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            passed: true,
            message: message.into(),
            severity: Severity::Info,
            details: None,
        }
    }

    /// Passed, but worth a warning
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            passed: true,
            message: message.into(),
            severity: Severity::Warning,
            details: None,
        }
    }

    /// Failed and blocks compilation
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            passed: false,
            message: message.into(),
            severity: Severity::Error,
            details: None,
        }
    }

    /// Failed without blocking compilation
    pub fn failed_warning(message: impl Into<String>) -> Self {
        Self {
            passed: false,
            ..Self::warning(message)
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// A failed check with error severity
    pub fn is_blocking(&self) -> bool {
        !self.passed && self.severity == Severity::Error
    }
}

impl fmt::Display for ValidationCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mark = if self.passed { "✓" } else { "✗" };
        write!(f, "{} {}", mark, self.message)
    }
}

/// Ordered check results with derived verdict and sublists
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    checks: Vec<ValidationCheck>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_check(&mut self, check: ValidationCheck) {
        self.checks.push(check);
    }

    pub fn checks(&self) -> &[ValidationCheck] {
        &self.checks
    }

    /// False if any error-severity check failed
    pub fn overall_valid(&self) -> bool {
        !self.checks.iter().any(ValidationCheck::is_blocking)
    }

    pub fn errors(&self) -> Vec<&ValidationCheck> {
        self.checks.iter().filter(|c| c.is_blocking()).collect()
    }

    /// Failed warning-severity checks
    pub fn warnings(&self) -> Vec<&ValidationCheck> {
        self.checks
            .iter()
            .filter(|c| !c.passed && c.severity == Severity::Warning)
            .collect()
    }

    /// Every warning-severity check, including passing ones such as
    /// "Low disk space"
    pub fn advisories(&self) -> Vec<&ValidationCheck> {
        self.checks
            .iter()
            .filter(|c| c.severity == Severity::Warning)
            .collect()
    }

    pub fn error_messages(&self) -> Vec<String> {
        self.errors().iter().map(|c| c.message.clone()).collect()
    }

    pub fn warning_messages(&self) -> Vec<String> {
        self.warnings().iter().map(|c| c.message.clone()).collect()
    }

    /// Overall status, then bulleted errors, then bulleted warnings
    pub fn summary(&self) -> String {
        let mut lines = Vec::new();

        if self.overall_valid() {
            lines.push("✓ Environment validation passed".to_string());
        } else {
            lines.push("✗ Environment validation failed".to_string());
        }

        for (title, group) in [("Errors", self.errors()), ("Warnings", self.warnings())] {
            if group.is_empty() {
                continue;
            }
            lines.push(String::new());
            lines.push(format!("{} ({}):", title, group.len()));
            for check in group {
                lines.push(format!("  • {}", check.message));
                if let Some(details) = &check.details {
                    lines.push(format!("    {}", details));
                }
            }
        }

        lines.join("\n")
    }
}

impl FromIterator<ValidationCheck> for ValidationReport {
    fn from_iter<I: IntoIterator<Item = ValidationCheck>>(iter: I) -> Self {
        Self {
            checks: iter.into_iter().collect(),
        }
    }
}
