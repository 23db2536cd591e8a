//! Terminal rendering for run events, readiness reports and detection status
//!
//! Compiler output goes to stdout untouched; progress and notices go to
//! stderr so the output stream stays clean when redirected.

use crate::cli::config::CliConfig;
use crate::probe::{Severity, StatusKind, ValidationCheck, ValidationReport};
use crate::runtime::ExecutionEvent;
use colored::Colorize;

/// Format one progress line
pub fn format_progress(percentage: u8, message: &str) -> String {
    format!("[{:>3}%] {}", percentage, message)
}

/// Format one check the way the summary marks it
pub fn format_check(check: &ValidationCheck) -> String {
    let mark = match (check.passed, check.severity) {
        (false, _) => "✗".red(),
        (true, Severity::Warning) => "!".yellow(),
        (true, _) => "✓".green(),
    };
    let mut line = format!("{} {}", mark, check.message);
    if let Some(details) = &check.details {
        line.push_str(&format!("\n    {}", details.dimmed()));
    }
    line
}

/// Prints to the terminal according to the quiet and progress settings
#[derive(Debug, Clone, Copy)]
pub struct Printer {
    quiet: bool,
    progress: bool,
}

impl Printer {
    pub fn new(config: &CliConfig) -> Self {
        Self {
            quiet: config.quiet,
            progress: config.output.progress && !config.quiet,
        }
    }

    /// Render one run event. `Finished` is left to the caller.
    pub fn event(&self, event: &ExecutionEvent) {
        match event {
            ExecutionEvent::Output(line) => {
                if !self.quiet {
                    println!("{}", line);
                }
            }
            ExecutionEvent::Progress {
                percentage,
                message,
            } => {
                if self.progress {
                    eprintln!("{}", format_progress(*percentage, message).dimmed());
                }
            }
            ExecutionEvent::Error(record) if record.is_informational() => {
                eprintln!("{}", record.user_message.yellow());
            }
            ExecutionEvent::Error(record) => {
                if self.quiet {
                    // The framed report only reaches stdout when not quiet
                    eprintln!("{}", record.render(true));
                }
            }
            ExecutionEvent::Finished(_) => {}
        }
    }

    /// Full report: every check, then the summary
    pub fn report(&self, report: &ValidationReport) {
        if !self.quiet {
            for check in report.checks() {
                println!("{}", format_check(check));
            }
            println!();
        }
        let summary = report.summary();
        if report.overall_valid() {
            println!("{}", summary.green());
        } else {
            println!("{}", summary.red());
        }
    }

    pub fn status(&self, kind: StatusKind, message: &str) {
        match kind {
            StatusKind::Success => println!("{} {}", "✓".green(), message),
            StatusKind::Error => println!("{} {}", "✗".red(), message),
        }
    }

    pub fn success(&self, message: &str) {
        println!("{} {}", "✓".green().bold(), message.green());
    }

    pub fn failure(&self, message: &str) {
        eprintln!("{} {}", "✗".red().bold(), message.red());
    }

    /// Informational line, suppressed in quiet mode
    pub fn notice(&self, message: &str) {
        if !self.quiet {
            eprintln!("{}", message.cyan());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_progress_pads_percentage() {
        assert_eq!(format_progress(5, "Loading"), "[  5%] Loading");
        assert_eq!(format_progress(100, "done"), "[100%] done");
    }

    #[test]
    fn test_format_check_marks() {
        colored::control::set_override(false);

        assert_eq!(format_check(&ValidationCheck::ok("fine")), "✓ fine");
        assert_eq!(format_check(&ValidationCheck::warning("meh")), "! meh");
        assert_eq!(
            format_check(&ValidationCheck::error("broken").with_details("why")),
            "✗ broken\n    why"
        );
    }

    #[test]
    fn test_quiet_disables_progress() {
        let mut config = CliConfig::default();
        config.quiet = true;
        let printer = Printer::new(&config);
        assert!(printer.quiet);
        assert!(!printer.progress);
    }
}
