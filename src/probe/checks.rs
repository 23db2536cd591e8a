//! Individual environment checks.
//!
//! Every check returns a [`ValidationCheck`]; none of them propagate errors.

use super::detector::{run_probe, ProbeRun};
use super::report::ValidationCheck;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use sysinfo::{Disks, System};
use tracing::debug;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

static RUNTIME_VERSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)python\s+(\d+)\.(\d+)").expect("runtime version pattern is valid"));

/// Tool is on the search path and answers `--version`.
///
/// Exit status 0 is accepted even without an identifying keyword, since
/// not every build prints one.
pub async fn check_tool_installed(program: &str, probe_timeout: Duration) -> ValidationCheck {
    let path = match which::which(program) {
        Ok(path) => path,
        Err(_) => {
            return ValidationCheck::error("DXCom compiler not found")
                .with_details("Please install dxcom and ensure it is in your system PATH")
        }
    };

    match run_probe(&path, &["--version"], probe_timeout).await {
        ProbeRun::Completed { success, output } => {
            let lower = output.to_lowercase();
            if lower.contains("dxcom") || lower.contains("deepx") || success {
                ValidationCheck::ok(format!("DXCom compiler found at {}", path.display()))
            } else {
                ValidationCheck::error("Found 'dxcom' but could not verify it's the DEEPX compiler")
                    .with_details(format!("Path: {}", path.display()))
            }
        }
        ProbeRun::TimedOut => ValidationCheck::failed_warning("DXCom compiler verification timed out")
            .with_details("The compiler exists but did not respond to --version"),
        ProbeRun::Failed(e) => {
            ValidationCheck::error("Could not verify dxcom compiler").with_details(e.to_string())
        }
    }
}

/// Parse `Python X.Y[.Z]` out of a `--version` banner
pub fn parse_runtime_version(output: &str) -> Option<(u32, u32)> {
    let caps = RUNTIME_VERSION.captures(output)?;
    let major = caps.get(1)?.as_str().parse().ok()?;
    let minor = caps.get(2)?.as_str().parse().ok()?;
    Some((major, minor))
}

/// Grade a runtime version against the minimum and recommended floors
pub fn evaluate_runtime_version(
    version: (u32, u32),
    minimum: (u32, u32),
    recommended: (u32, u32),
) -> ValidationCheck {
    let (major, minor) = version;

    if version < minimum {
        return ValidationCheck::error(format!("Python version too old: {}.{}", major, minor))
            .with_details(format!("Minimum required: {}.{}", minimum.0, minimum.1));
    }

    if version < recommended {
        return ValidationCheck::warning(format!("Python {}.{} is supported", major, minor))
            .with_details(format!(
                "Python {}.{}+ is recommended",
                recommended.0, recommended.1
            ));
    }

    ValidationCheck::ok(format!("Python version {}.{} is compatible", major, minor))
}

/// Script runtime is installed and new enough
pub async fn check_runtime_version(
    runtime: &str,
    minimum: (u32, u32),
    recommended: (u32, u32),
    probe_timeout: Duration,
) -> ValidationCheck {
    match run_probe(runtime, &["--version"], probe_timeout).await {
        ProbeRun::Completed { output, .. } => match parse_runtime_version(&output) {
            Some(version) => evaluate_runtime_version(version, minimum, recommended),
            None => ValidationCheck::error("Could not determine Python version")
                .with_details(format!("{} --version printed: {}", runtime, output.trim())),
        },
        ProbeRun::TimedOut => ValidationCheck::error("Python version check timed out")
            .with_details(format!("{} did not respond to --version", runtime)),
        ProbeRun::Failed(e) => ValidationCheck::error(format!("Python runtime not found: {}", runtime))
            .with_details(e.to_string()),
    }
}

/// Closest ancestor of `path` that exists, `path` itself included
pub fn nearest_existing_ancestor(path: &Path) -> Option<PathBuf> {
    path.ancestors()
        .filter(|p| !p.as_os_str().is_empty())
        .find(|p| p.exists())
        .map(Path::to_path_buf)
}

/// Directory whose file system is checked: the output path's nearest
/// existing parent, or the working directory
fn disk_check_target(output_path: Option<&Path>) -> std::io::Result<PathBuf> {
    let cwd = std::env::current_dir()?;
    let target = match output_path {
        Some(path) => {
            let absolute = cwd.join(path);
            let parent = absolute.parent().unwrap_or(&absolute).to_path_buf();
            nearest_existing_ancestor(&parent).unwrap_or(cwd)
        }
        None => cwd,
    };
    target.canonicalize()
}

/// Free bytes on the file system holding `path` (longest mount point match)
fn available_space_at(path: &Path) -> Option<u64> {
    let disks = Disks::new_with_refreshed_list();
    disks
        .list()
        .iter()
        .filter(|disk| path.starts_with(disk.mount_point()))
        .max_by_key(|disk| disk.mount_point().as_os_str().len())
        .map(|disk| disk.available_space())
}

/// Grade free space against the minimum and recommended floors
pub fn evaluate_disk_space(
    free_mb: f64,
    location: &Path,
    minimum_mb: u64,
    recommended_mb: u64,
) -> ValidationCheck {
    if free_mb < minimum_mb as f64 {
        return ValidationCheck::error(format!("Insufficient disk space: {:.1} MB free", free_mb))
            .with_details(format!(
                "Minimum {} MB required at {}",
                minimum_mb,
                location.display()
            ));
    }

    if free_mb < recommended_mb as f64 {
        return ValidationCheck::warning(format!("Low disk space: {:.1} MB free", free_mb))
            .with_details(format!("Recommended: {} MB or more", recommended_mb));
    }

    ValidationCheck::ok(format!("Sufficient disk space available: {:.1} MB", free_mb))
}

/// Enough free space where output will land. An unverifiable disk passes
/// with a warning.
pub async fn check_disk_space(
    output_path: Option<&Path>,
    minimum_mb: u64,
    recommended_mb: u64,
) -> ValidationCheck {
    let output_path = output_path.map(Path::to_path_buf);

    let measured = tokio::task::spawn_blocking(move || {
        let target = disk_check_target(output_path.as_deref())?;
        let free = available_space_at(&target).ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no mounted file system found for {}", target.display()),
            )
        })?;
        Ok::<_, std::io::Error>((target, free))
    })
    .await;

    match measured {
        Ok(Ok((target, free))) => {
            debug!(path = %target.display(), free_bytes = free, "measured free disk space");
            evaluate_disk_space(free as f64 / BYTES_PER_MB, &target, minimum_mb, recommended_mb)
        }
        Ok(Err(e)) => ValidationCheck::warning("Could not verify disk space").with_details(e.to_string()),
        Err(e) => ValidationCheck::warning("Could not verify disk space").with_details(e.to_string()),
    }
}

fn can_create_file_in(dir: &Path) -> std::io::Result<()> {
    let mut probe = tempfile::NamedTempFile::new_in(dir)?;
    probe.write_all(b"test")?;
    probe.flush()
}

/// The output path can be written, creating missing parent directories
pub fn check_write_permissions(output_path: &Path) -> ValidationCheck {
    if output_path.exists() {
        return match OpenOptions::new().append(true).open(output_path) {
            Ok(_) => ValidationCheck::ok("Write permissions verified for output path"),
            Err(_) => ValidationCheck::error("No write permission for output file")
                .with_details(format!("Cannot write to: {}", output_path.display())),
        };
    }

    let output_dir = match output_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    if !output_dir.exists() {
        if let Err(e) = std::fs::create_dir_all(&output_dir) {
            return ValidationCheck::error("Cannot create output directory").with_details(format!(
                "Failed to create: {}\nError: {}",
                output_dir.display(),
                e
            ));
        }
        debug!(dir = %output_dir.display(), "created output directory");
    }

    match can_create_file_in(&output_dir) {
        Ok(()) => ValidationCheck::ok("Write permissions verified for output path"),
        Err(_) => ValidationCheck::error("No write permission for output directory")
            .with_details(format!("Cannot write to: {}", output_dir.display())),
    }
}

/// Grade available memory; `None` means the platform could not report it
pub fn evaluate_memory(available_mb: Option<u64>, low_memory_mb: u64) -> ValidationCheck {
    match available_mb {
        None => ValidationCheck::ok("System resources not verified (platform dependent)"),
        Some(mb) if mb < low_memory_mb => {
            ValidationCheck::warning(format!("Low system memory: {} MB available", mb))
                .with_details("Compilation may be slow with limited memory")
        }
        Some(mb) => ValidationCheck::ok(format!("Adequate system memory: {} MB available", mb)),
    }
}

/// Best-effort available memory check. Never fails.
pub async fn check_system_memory(low_memory_mb: u64) -> ValidationCheck {
    let available_mb = tokio::task::spawn_blocking(|| {
        if !sysinfo::IS_SUPPORTED_SYSTEM {
            return None;
        }
        let mut system = System::new();
        system.refresh_memory();
        match system.available_memory() {
            0 => None,
            bytes => Some(bytes / (1024 * 1024)),
        }
    })
    .await;

    match available_mb {
        Ok(mb) => evaluate_memory(mb, low_memory_mb),
        Err(_) => ValidationCheck::ok("System resource check skipped"),
    }
}

/// The temp directory exists, is writable and accepts a real file
pub fn check_temp_directory() -> ValidationCheck {
    let temp_dir = std::env::temp_dir();

    if !temp_dir.exists() {
        return ValidationCheck::error("Temporary directory does not exist")
            .with_details(format!("Expected temp dir: {}", temp_dir.display()));
    }

    let readonly = std::fs::metadata(&temp_dir)
        .map(|m| m.permissions().readonly())
        .unwrap_or(false);
    if readonly {
        return ValidationCheck::error("Temporary directory is not writable")
            .with_details(format!("Cannot write to: {}", temp_dir.display()));
    }

    if let Err(e) = can_create_file_in(&temp_dir) {
        return ValidationCheck::error("Cannot create temporary files").with_details(e.to_string());
    }

    ValidationCheck::ok(format!(
        "Temporary directory accessible: {}",
        temp_dir.display()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::report::Severity;

    #[test]
    fn test_parse_runtime_version() {
        assert_eq!(parse_runtime_version("Python 3.11.4"), Some((3, 11)));
        assert_eq!(parse_runtime_version("Python 3.8\n"), Some((3, 8)));
        assert_eq!(parse_runtime_version("python 2.7.18"), Some((2, 7)));
        assert_eq!(parse_runtime_version("sh: command not found"), None);
    }

    #[test]
    fn test_runtime_version_grading() {
        let too_old = evaluate_runtime_version((3, 7), (3, 8), (3, 9));
        assert!(too_old.is_blocking());
        assert_eq!(too_old.message, "Python version too old: 3.7");

        let supported = evaluate_runtime_version((3, 8), (3, 8), (3, 9));
        assert!(supported.passed);
        assert_eq!(supported.severity, Severity::Warning);

        let good = evaluate_runtime_version((3, 12), (3, 8), (3, 9));
        assert!(good.passed);
        assert_eq!(good.severity, Severity::Info);

        // Tuple ordering, not lexical: 3.10 is newer than 3.9
        assert_eq!(
            evaluate_runtime_version((3, 10), (3, 8), (3, 9)).severity,
            Severity::Info
        );
    }

    #[test]
    fn test_disk_space_grading() {
        let at = Path::new("/data");
        let low = evaluate_disk_space(50.0, at, 100, 500);
        assert!(low.is_blocking());
        assert_eq!(low.message, "Insufficient disk space: 50.0 MB free");
        assert_eq!(low.details.as_deref(), Some("Minimum 100 MB required at /data"));

        let warn = evaluate_disk_space(300.0, at, 100, 500);
        assert!(warn.passed);
        assert_eq!(warn.severity, Severity::Warning);

        assert_eq!(evaluate_disk_space(2048.0, at, 100, 500).severity, Severity::Info);
    }

    #[test]
    fn test_memory_grading() {
        assert_eq!(
            evaluate_memory(None, 256).message,
            "System resources not verified (platform dependent)"
        );
        let low = evaluate_memory(Some(128), 256);
        assert!(low.passed);
        assert_eq!(low.severity, Severity::Warning);
        assert_eq!(evaluate_memory(Some(4096), 256).severity, Severity::Info);
    }

    #[test]
    fn test_nearest_existing_ancestor() {
        let dir = tempfile::tempdir().unwrap();
        let deep = dir.path().join("a/b/c/model.dxnn");
        assert_eq!(nearest_existing_ancestor(&deep).as_deref(), Some(dir.path()));
        assert_eq!(nearest_existing_ancestor(dir.path()).as_deref(), Some(dir.path()));
    }

    #[test]
    fn test_write_permissions_creates_missing_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("nested/out/model.dxnn");

        let check = check_write_permissions(&output);
        assert!(check.passed, "{:?}", check);
        assert!(dir.path().join("nested/out").is_dir());

        std::fs::write(&output, b"old").unwrap();
        assert!(check_write_permissions(&output).passed);
    }

    #[test]
    fn test_write_permissions_fails_when_parent_is_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"x").unwrap();

        let check = check_write_permissions(&blocker.join("out/model.dxnn"));
        assert!(check.is_blocking());
        assert_eq!(check.message, "Cannot create output directory");
    }

    #[test]
    fn test_temp_directory_is_usable() {
        let check = check_temp_directory();
        assert!(check.passed, "{:?}", check);
    }

    #[tokio::test]
    async fn test_disk_space_never_blocks_on_measurement_failure() {
        let dir = tempfile::tempdir().unwrap();
        let check = check_disk_space(Some(&dir.path().join("model.dxnn")), 0, 0).await;
        // Thresholds of zero can only pass, measured or not
        assert!(check.passed, "{:?}", check);
    }

    #[tokio::test]
    async fn test_memory_check_never_fails() {
        assert!(check_system_memory(256).await.passed);
    }

    #[tokio::test]
    async fn test_missing_tool_and_runtime() {
        let tool = check_tool_installed("dxcom-runner-no-such-tool", Duration::from_secs(1)).await;
        assert!(tool.is_blocking());
        assert_eq!(tool.message, "DXCom compiler not found");

        let runtime =
            check_runtime_version("dxcom-runner-no-such-python", (3, 8), (3, 9), Duration::from_secs(1))
                .await;
        assert!(runtime.is_blocking());
        assert!(runtime.message.contains("not found"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_tool_exiting_zero_is_accepted_without_keyword() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let tool = dir.path().join("compiler");
        std::fs::write(&tool, "#!/bin/sh\necho 1.0\n").unwrap();
        std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o755)).unwrap();

        let check = check_tool_installed(&tool.to_string_lossy(), Duration::from_secs(5)).await;
        assert!(check.passed, "{:?}", check);

        std::fs::write(&tool, "#!/bin/sh\necho nope\nexit 1\n").unwrap();
        let check = check_tool_installed(&tool.to_string_lossy(), Duration::from_secs(5)).await;
        assert!(check.is_blocking());
    }
}
