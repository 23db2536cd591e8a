//! Failure classification for compiler runs
//!
//! Turns an exit code, the captured output and/or a launch fault into an
//! [`ErrorRecord`] with a category, a user-facing sentence, remediation
//! suggestions and a bounded excerpt of the relevant output.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::io;
use std::time::Duration;

/// Upper bound on technical-detail lines kept in a record
pub const MAX_DETAIL_LINES: usize = 20;

/// Marker used when there is no output to excerpt
pub const NO_OUTPUT_MARKER: &str = "No output available";

const DETAIL_KEYWORDS: &[&str] = &[
    "error",
    "fail",
    "exception",
    "fatal",
    "crash",
    "abort",
    "invalid",
    "cannot",
    "unable",
];

const RULE_WIDTH: usize = 60;

/// Flat failure taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    FileNotFound,
    Timeout,
    InputError,
    OutputError,
    MemoryError,
    UnsupportedOp,
    ConfigError,
    ProcessFailure,
    Crash,
    Unknown,
    /// Informational: the user asked the run to stop
    Cancelled,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FileNotFound => "file_not_found",
            Self::Timeout => "timeout",
            Self::InputError => "input_error",
            Self::OutputError => "output_error",
            Self::MemoryError => "memory_error",
            Self::UnsupportedOp => "unsupported_op",
            Self::ConfigError => "config_error",
            Self::ProcessFailure => "process_failure",
            Self::Crash => "crash",
            Self::Unknown => "unknown",
            Self::Cancelled => "cancelled",
        }
    }

    /// Remediation suggestions shown for this category
    pub fn suggestions(&self) -> &'static [&'static str] {
        match self {
            Self::FileNotFound => &[
                "Ensure dxcom is installed on your system",
                "Add dxcom to your system PATH",
                "Run `dxcom-runner detect` to verify the installation",
            ],
            Self::InputError => &[
                "Verify the input file path is correct",
                "Ensure the file is a valid ONNX model",
                "Check file permissions",
                "Try opening the model with another ONNX tool",
            ],
            Self::OutputError => &[
                "Check that the output directory exists",
                "Verify you have write permissions",
                "Ensure sufficient disk space is available",
                "Try a different output path",
            ],
            Self::MemoryError => &[
                "The model may be too large for available memory",
                "Close other applications to free up memory",
                "Try reducing optimization level",
                "Consider using a machine with more RAM",
            ],
            Self::UnsupportedOp => &[
                "The model uses operators not supported by dxcom",
                "Check dxcom documentation for supported operators",
                "Try simplifying the model",
                "Update to the latest version of dxcom",
            ],
            Self::ConfigError => &[
                "Verify the config file path is correct",
                "Ensure the config file is valid JSON",
                "Check that all required fields are present",
                "Try without a config file to use defaults",
            ],
            Self::Timeout => &[
                "The model may be too large or complex",
                "Try reducing optimization level",
                "Try with a smaller model first",
                "Ensure the system is not under heavy load",
                "Raise the timeout or pass --timeout 0 to disable it",
            ],
            Self::ProcessFailure => &[
                "Check the output log for error details",
                "Verify the input ONNX model is valid",
                "Try different compiler options",
                "Ensure the output path is writable",
            ],
            Self::Crash => &[
                "This may be a bug in the application",
                "Check the output log for details",
                "Report this issue to support",
            ],
            Self::Unknown => &[
                "Check the output log for details",
                "Verify input file is a valid ONNX model",
                "Try with different compiler options",
            ],
            Self::Cancelled => &["Start the compilation again when ready"],
        }
    }

    /// Short user-facing sentence for pattern-matched categories
    fn user_message(&self) -> &'static str {
        match self {
            Self::InputError => "Failed to read or parse input file",
            Self::OutputError => "Failed to write output file",
            Self::MemoryError => "Out of memory during compilation",
            Self::UnsupportedOp => "Model contains unsupported operators",
            Self::ConfigError => "Configuration file error",
            Self::Timeout => "Compilation timed out",
            Self::ProcessFailure => "Compilation failed",
            Self::FileNotFound => "DXCom compiler not found",
            Self::Crash => "Unexpected error",
            Self::Unknown => "An unknown error occurred during compilation",
            Self::Cancelled => "Compilation cancelled by user",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure raised while launching or reading the child, as opposed to the
/// child exiting with a non-zero status
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// The executable (tool or runtime) could not be found
    ToolNotFound { program: String, message: String },
    /// The run exceeded its wall-clock limit
    DeadlineExceeded { limit: Duration },
    /// Anything else; `kind` names the failure type
    Other { kind: String, message: String },
}

impl Fault {
    /// Map a spawn/read error for `program` onto a fault
    pub fn from_io(err: &io::Error, program: &str) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::ToolNotFound {
                program: program.to_string(),
                message: err.to_string(),
            },
            kind => Self::Other {
                kind: format!("{:?}", kind),
                message: err.to_string(),
            },
        }
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ToolNotFound { message, .. } => f.write_str(message),
            Self::DeadlineExceeded { limit } => {
                write!(f, "Compilation timed out after {} seconds", limit.as_secs())
            }
            Self::Other { message, .. } => f.write_str(message),
        }
    }
}

/// Structured description of a failed (or cancelled) run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub category: ErrorCategory,
    pub exit_code: Option<i32>,
    /// Raw or short message describing what happened
    pub message: String,
    /// Sentence suitable as the primary UI message
    pub user_message: String,
    /// Ordered, never empty
    pub suggestions: Vec<String>,
    /// Bounded output excerpt, secondary information
    pub technical_details: Option<String>,
}

impl ErrorRecord {
    fn new(
        category: ErrorCategory,
        exit_code: Option<i32>,
        message: impl Into<String>,
        user_message: impl Into<String>,
        technical_details: Option<String>,
    ) -> Self {
        Self {
            category,
            exit_code,
            message: message.into(),
            user_message: user_message.into(),
            suggestions: category.suggestions().iter().map(|s| s.to_string()).collect(),
            technical_details,
        }
    }

    /// Record for a run stopped on request. Informational, not a fault.
    pub fn cancelled() -> Self {
        let text = ErrorCategory::Cancelled.user_message();
        Self::new(ErrorCategory::Cancelled, None, text, text, None)
    }

    /// Whether this record describes a cancellation rather than a failure
    pub fn is_informational(&self) -> bool {
        self.category == ErrorCategory::Cancelled
    }

    /// Framed multi-line report for logs and terminals
    pub fn render(&self, include_technical: bool) -> String {
        let heavy = "═".repeat(RULE_WIDTH);
        let light = "-".repeat(RULE_WIDTH);
        let mut lines = vec![
            heavy.clone(),
            "COMPILATION ERROR".to_string(),
            heavy,
            String::new(),
            format!("Error: {}", self.user_message),
            String::new(),
        ];

        if let Some(code) = self.exit_code {
            lines.push(format!("Exit Code: {}", code));
            lines.push(String::new());
        }

        if !self.suggestions.is_empty() {
            lines.push("Suggestions:".to_string());
            lines.extend(self.suggestions.iter().map(|s| format!("  • {}", s)));
            lines.push(String::new());
        }

        if include_technical {
            if let Some(details) = &self.technical_details {
                lines.push("Technical Details:".to_string());
                lines.push(light.clone());
                lines.push(details.clone());
                lines.push(light);
            }
        }

        lines.join("\n")
    }
}

impl fmt::Display for ErrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.user_message)
    }
}

struct Pattern {
    regex: Regex,
    category: ErrorCategory,
    short_message: &'static str,
}

/// Most specific first; the first match wins
static ERROR_PATTERNS: Lazy<Vec<Pattern>> = Lazy::new(|| {
    let table: [(&str, ErrorCategory, &str); 8] = [
        (
            r"config.*(?:not\s+found|cannot\s+(?:open|read))",
            ErrorCategory::ConfigError,
            "Configuration file error",
        ),
        (
            r"(?:invalid|malformed|missing)\s+(?:config|configuration|option|parameter)",
            ErrorCategory::ConfigError,
            "Configuration error",
        ),
        (
            r"(?:cannot|failed to|unable to)\s+(?:write|create|save)\s+(?:to\s+)?output",
            ErrorCategory::OutputError,
            "Failed to write output file",
        ),
        (
            r"(?:cannot|failed to|unable to)\s+(?:open|read|load|parse)\s+(?:input|file|model)",
            ErrorCategory::InputError,
            "Failed to read input file",
        ),
        (
            r"(?:file|path)\s+not\s+(?:found|exist)",
            ErrorCategory::InputError,
            "File not found",
        ),
        (
            r"(?:invalid|corrupted|malformed)\s+(?:onnx|model|file)",
            ErrorCategory::InputError,
            "Invalid or corrupted ONNX model",
        ),
        (
            r"(?:out\s+of\s+memory|memory\s+allocation\s+failed|insufficient\s+memory)",
            ErrorCategory::MemoryError,
            "Out of memory",
        ),
        (
            r"(?:unsupported|unknown|not\s+supported)\s+(?:operator|operation|op|node|layer)",
            ErrorCategory::UnsupportedOp,
            "Unsupported ONNX operator",
        ),
    ];

    table
        .into_iter()
        .map(|(pattern, category, short_message)| Pattern {
            regex: Regex::new(&format!("(?i){}", pattern)).expect("error pattern is valid"),
            category,
            short_message,
        })
        .collect()
});

/// Classify a finished or failed run.
///
/// A fault takes precedence over the exit code. With neither a fault nor a
/// non-zero exit code the result is `Unknown`, which callers should never
/// produce in normal operation.
pub fn classify(exit_code: Option<i32>, output: &str, fault: Option<&Fault>) -> ErrorRecord {
    if let Some(fault) = fault {
        return classify_fault(fault, output);
    }

    match exit_code {
        Some(code) if code != 0 => classify_exit(code, output),
        _ => ErrorRecord::new(
            ErrorCategory::Unknown,
            exit_code,
            "Unknown error occurred",
            ErrorCategory::Unknown.user_message(),
            None,
        ),
    }
}

fn classify_fault(fault: &Fault, output: &str) -> ErrorRecord {
    match fault {
        Fault::ToolNotFound { program, message } => {
            let mut record = ErrorRecord::new(
                ErrorCategory::FileNotFound,
                None,
                message.clone(),
                ErrorCategory::FileNotFound.user_message(),
                Some(format!("Command '{}' not found in PATH", program)),
            );
            // The missing program may be the script runtime, not dxcom
            record.suggestions[0] = format!("Ensure {} is installed on your system", program);
            record.suggestions[1] = format!("Add {} to your system PATH", program);
            record
        }
        Fault::DeadlineExceeded { .. } => ErrorRecord::new(
            ErrorCategory::Timeout,
            None,
            fault.to_string(),
            ErrorCategory::Timeout.user_message(),
            Some(if output.is_empty() {
                "Process timed out".to_string()
            } else {
                extract_technical_details(output)
            }),
        ),
        Fault::Other { kind, message } => ErrorRecord::new(
            ErrorCategory::Crash,
            None,
            message.clone(),
            format!("{}: {}", ErrorCategory::Crash.user_message(), kind),
            Some(format!(
                "{}: {}\n\n{}",
                kind,
                message,
                extract_technical_details(output)
            )),
        ),
    }
}

fn classify_exit(exit_code: i32, output: &str) -> ErrorRecord {
    let details = extract_technical_details(output);

    if let Some(pattern) = ERROR_PATTERNS.iter().find(|p| p.regex.is_match(output)) {
        return ErrorRecord::new(
            pattern.category,
            Some(exit_code),
            pattern.short_message,
            pattern.category.user_message(),
            Some(details),
        );
    }

    ErrorRecord::new(
        ErrorCategory::ProcessFailure,
        Some(exit_code),
        format!("Process exited with code {}", exit_code),
        format!(
            "{} (exit code {})",
            ErrorCategory::ProcessFailure.user_message(),
            exit_code
        ),
        Some(details),
    )
}

/// Pull the lines around error keywords out of the output.
///
/// Each keyword line brings one line before and two after. The merged,
/// ordered excerpt is capped to its last [`MAX_DETAIL_LINES`] lines. With no
/// keyword hits the plain tail of the output is returned.
pub fn extract_technical_details(output: &str) -> String {
    if output.is_empty() {
        return NO_OUTPUT_MARKER.to_string();
    }

    let lines: Vec<&str> = output.split('\n').collect();

    let mut selected = BTreeSet::new();
    for (idx, line) in lines.iter().enumerate() {
        let lower = line.to_lowercase();
        if DETAIL_KEYWORDS.iter().any(|keyword| lower.contains(keyword)) {
            let start = idx.saturating_sub(1);
            let end = (idx + 3).min(lines.len());
            selected.extend(start..end);
        }
    }

    if selected.is_empty() {
        return tail_lines(&lines);
    }

    let excerpt: Vec<&str> = selected.iter().map(|&idx| lines[idx]).collect();
    tail_lines(&excerpt)
}

fn tail_lines(lines: &[&str]) -> String {
    lines[lines.len().saturating_sub(MAX_DETAIL_LINES)..].join("\n")
}
