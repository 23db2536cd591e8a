//! Compiler discovery and version detection with an explicit cache

use crate::core::Config;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tracing::debug;

/// Flags tried in order until one identifies the tool
const VERSION_FLAGS: [&str; 4] = ["--version", "-v", "--help", "-h"];

/// Any of these in the probe output identifies the compiler
const IDENTIFYING_KEYWORDS: [&str; 3] = ["dxcom", "deepx", "version"];

static VERSION_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)version\s+(\d+\.\d+\.\d+)",
        r"(?i)v(\d+\.\d+\.\d+)",
        r"(?i)dxcom\s+(\d+\.\d+\.\d+)",
        r"(\d+\.\d+\.\d+)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("version pattern is valid"))
    .collect()
});

/// Captured result of running a short-lived probe command
#[derive(Debug)]
pub(crate) enum ProbeRun {
    Completed { success: bool, output: String },
    TimedOut,
    Failed(io::Error),
}

/// Run `program args...` with both pipes captured, bounded by `limit`.
///
/// The child is killed if it outlives the limit.
pub(crate) async fn run_probe<P, A>(program: P, args: &[A], limit: Duration) -> ProbeRun
where
    P: AsRef<OsStr>,
    A: AsRef<OsStr>,
{
    let child = tokio::process::Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn();

    let child = match child {
        Ok(child) => child,
        Err(e) => return ProbeRun::Failed(e),
    };

    match tokio::time::timeout(limit, child.wait_with_output()).await {
        Ok(Ok(output)) => {
            let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
            text.push_str(&String::from_utf8_lossy(&output.stderr));
            ProbeRun::Completed {
                success: output.status.success(),
                output: text,
            }
        }
        Ok(Err(e)) => ProbeRun::Failed(e),
        Err(_) => ProbeRun::TimedOut,
    }
}

/// Pull a dotted version number out of probe output
pub fn extract_version(output: &str) -> Option<String> {
    VERSION_PATTERNS
        .iter()
        .find_map(|re| re.captures(output))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

fn identifies_tool(output: &str) -> bool {
    let lower = output.to_lowercase();
    IDENTIFYING_KEYWORDS.iter().any(|k| lower.contains(k))
}

/// What detection found out about the compiler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolInfo {
    pub available: bool,
    pub path: Option<PathBuf>,
    pub version: Option<String>,
    pub error_message: Option<String>,
}

impl ToolInfo {
    pub fn is_valid(&self) -> bool {
        self.available && self.path.is_some()
    }

    fn unavailable(path: Option<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            available: false,
            path,
            version: None,
            error_message: Some(message.into()),
        }
    }
}

/// Display class for a detection status line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusKind {
    Success,
    Error,
}

/// Finds the compiler and remembers the answer until told otherwise
#[derive(Debug, Clone)]
pub struct ToolDetector {
    program: String,
    probe_timeout: Duration,
    cached: Option<ToolInfo>,
}

impl ToolDetector {
    pub fn new(program: impl Into<String>, probe_timeout: Duration) -> Self {
        Self {
            program: program.into(),
            probe_timeout,
            cached: None,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.tool_program.clone(), config.version_probe_timeout())
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Detect the compiler, reusing the cached answer unless `force_refresh`
    pub async fn detect(&mut self, force_refresh: bool) -> ToolInfo {
        if !force_refresh {
            if let Some(info) = &self.cached {
                return info.clone();
            }
        }

        let info = self.detect_uncached().await;
        debug!(
            program = %self.program,
            available = info.available,
            version = ?info.version,
            "tool detection finished"
        );
        self.cached = Some(info.clone());
        info
    }

    async fn detect_uncached(&self) -> ToolInfo {
        let path = match which::which(&self.program) {
            Ok(path) => path,
            Err(_) => {
                return ToolInfo::unavailable(
                    None,
                    format!(
                        "{} command not found in PATH. Please install the dxcom compiler.",
                        self.program
                    ),
                )
            }
        };

        match self.probe_version(&path).await {
            Some(version) => ToolInfo {
                available: true,
                path: Some(path),
                version: Some(version),
                error_message: None,
            },
            None => ToolInfo::unavailable(
                Some(path),
                format!(
                    "Found '{}' command but could not verify it's the DEEPX compiler.",
                    self.program
                ),
            ),
        }
    }

    async fn probe_version(&self, path: &Path) -> Option<String> {
        for flag in VERSION_FLAGS {
            match run_probe(path, &[flag], self.probe_timeout).await {
                ProbeRun::Completed { output, .. } if identifies_tool(&output) => {
                    return Some(
                        extract_version(&output)
                            .unwrap_or_else(|| format!("installed (detected via {})", flag)),
                    );
                }
                ProbeRun::Completed { .. } => {}
                ProbeRun::TimedOut => debug!(flag, "version probe timed out"),
                ProbeRun::Failed(e) => debug!(flag, error = %e, "version probe failed"),
            }
        }
        None
    }

    /// One status line for display
    pub async fn status(&mut self) -> (StatusKind, String) {
        let info = self.detect(false).await;
        if !info.is_valid() {
            let message = info
                .error_message
                .unwrap_or_else(|| format!("{} not available", self.program));
            return (StatusKind::Error, message);
        }

        let path = info
            .path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        let message = match &info.version {
            Some(version) => format!("dxcom detected: {} at {}", version, path),
            None => format!("dxcom detected at {}", path),
        };
        (StatusKind::Success, message)
    }

    /// The cached answer, if any
    pub fn cached(&self) -> Option<&ToolInfo> {
        self.cached.as_ref()
    }

    pub fn clear_cache(&mut self) {
        self.cached = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_version_patterns() {
        assert_eq!(
            extract_version("DXCom Version 2.1.0 (build 42)").as_deref(),
            Some("2.1.0")
        );
        assert_eq!(extract_version("dxcom v1.40.2").as_deref(), Some("1.40.2"));
        assert_eq!(extract_version("dxcom 3.0.1").as_deref(), Some("3.0.1"));
        assert_eq!(extract_version("build 10.2.3-rc").as_deref(), Some("10.2.3"));
        assert_eq!(extract_version("usage: dxcom [options]"), None);
        assert_eq!(extract_version("version 2.1"), None);
    }

    #[test]
    fn test_identifying_keywords() {
        assert!(identifies_tool("DEEPX compiler"));
        assert!(identifies_tool("Usage: DXCOM -m MODEL"));
        assert!(!identifies_tool("hello world"));
    }

    #[tokio::test]
    async fn test_missing_tool_is_unavailable() {
        let mut detector =
            ToolDetector::new("dxcom-runner-no-such-tool", Duration::from_secs(1));
        let info = detector.detect(false).await;
        assert!(!info.available);
        assert!(!info.is_valid());
        assert!(info.error_message.unwrap().contains("not found in PATH"));

        let (kind, message) = detector.status().await;
        assert_eq!(kind, StatusKind::Error);
        assert!(message.contains("dxcom-runner-no-such-tool"));
    }

    #[cfg(unix)]
    mod fake_tool {
        use super::*;
        use std::os::unix::fs::PermissionsExt;
        use tempfile::TempDir;

        fn fake_tool(dir: &TempDir, body: &str) -> PathBuf {
            let path = dir.path().join("dxcom");
            std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        fn detector_for(path: &Path) -> ToolDetector {
            ToolDetector::new(path.to_string_lossy(), Duration::from_secs(5))
        }

        #[tokio::test]
        async fn test_version_is_extracted() {
            let dir = tempfile::tempdir().unwrap();
            let tool = fake_tool(&dir, "echo 'DXCom version 2.1.0'");
            let mut detector = detector_for(&tool);

            let info = detector.detect(false).await;
            assert!(info.is_valid());
            assert_eq!(info.version.as_deref(), Some("2.1.0"));
            assert_eq!(info.path.as_deref(), Some(tool.as_path()));

            let (kind, message) = detector.status().await;
            assert_eq!(kind, StatusKind::Success);
            assert!(message.starts_with("dxcom detected: 2.1.0 at "));
        }

        #[tokio::test]
        async fn test_help_flag_fallback() {
            let dir = tempfile::tempdir().unwrap();
            let tool = fake_tool(
                &dir,
                "case \"$1\" in --help) echo 'usage: dxcom [options]';; *) exit 2;; esac",
            );
            let info = detector_for(&tool).detect(false).await;
            assert!(info.available);
            assert_eq!(
                info.version.as_deref(),
                Some("installed (detected via --help)")
            );
        }

        #[tokio::test]
        async fn test_unidentified_tool_is_rejected() {
            let dir = tempfile::tempdir().unwrap();
            let tool = fake_tool(&dir, "echo hello");
            let info = detector_for(&tool).detect(false).await;
            assert!(!info.available);
            assert!(info.path.is_some());
            assert!(info.error_message.unwrap().contains("could not verify"));
        }

        #[tokio::test]
        async fn test_cache_until_refresh() {
            let dir = tempfile::tempdir().unwrap();
            let tool = fake_tool(&dir, "echo 'dxcom 1.0.0'");
            let mut detector = detector_for(&tool);

            assert!(detector.detect(false).await.available);
            std::fs::remove_file(&tool).unwrap();

            // Cached answer survives the tool disappearing
            assert!(detector.detect(false).await.available);
            assert!(!detector.detect(true).await.available);

            detector.clear_cache();
            assert!(detector.cached().is_none());
        }
    }
}
