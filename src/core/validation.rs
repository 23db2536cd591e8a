//! Pre-flight checks on user-supplied paths and option values
//!
//! These run before a request is accepted. Each returns a human sentence
//! describing the first problem found.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use thiserror::Error;

static INVALID_NODE_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[<>:"/\\|?*\x00-\x1f]"#).expect("node name pattern is valid"));

/// Why a path or value was rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ValidationIssue(pub String);

impl ValidationIssue {
    fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case(ext))
        .unwrap_or(false)
}

/// Check that `path` looks like a readable ONNX model
pub fn validate_input_model(path: &Path) -> Result<(), ValidationIssue> {
    if path.as_os_str().is_empty() {
        return Err(ValidationIssue::new("Input ONNX file is required"));
    }
    if !path.exists() {
        return Err(ValidationIssue::new(format!(
            "Input file does not exist: {}",
            path.display()
        )));
    }
    if !path.is_file() {
        return Err(ValidationIssue::new(format!(
            "Input path is not a file: {}",
            path.display()
        )));
    }
    if !has_extension(path, "onnx") {
        return Err(ValidationIssue::new("Input file must have .onnx extension"));
    }

    let mut file = File::open(path).map_err(|e| {
        ValidationIssue::new(format!("Input file is not readable: {}: {}", path.display(), e))
    })?;
    let len = file.metadata().map(|m| m.len()).unwrap_or(0);
    if len == 0 {
        return Err(ValidationIssue::new("Input ONNX file is empty"));
    }

    // Protobuf payload; anything shorter than a few bytes cannot be a model.
    let mut header = Vec::with_capacity(4);
    file.by_ref()
        .take(4)
        .read_to_end(&mut header)
        .map_err(|e| ValidationIssue::new(format!("Error reading input file: {}", e)))?;
    if header.len() < 4 {
        return Err(ValidationIssue::new(
            "Input file is too small to be a valid ONNX model",
        ));
    }

    Ok(())
}

/// Check that `path` is an existing, parseable JSON config file
pub fn validate_config_file(path: &Path) -> Result<(), ValidationIssue> {
    if !path.exists() {
        return Err(ValidationIssue::new(format!(
            "Config file does not exist: {}",
            path.display()
        )));
    }
    if !path.is_file() {
        return Err(ValidationIssue::new(format!(
            "Config path is not a file: {}",
            path.display()
        )));
    }
    if !has_extension(path, "json") {
        return Err(ValidationIssue::new("Config file must have .json extension"));
    }

    let content = std::fs::read_to_string(path).map_err(|e| {
        ValidationIssue::new(format!("Config file is not readable: {}: {}", path.display(), e))
    })?;
    serde_json::from_str::<serde_json::Value>(&content)
        .map_err(|e| ValidationIssue::new(format!("Config file is not valid JSON: {}", e)))?;

    Ok(())
}

/// Check a comma-separated node list. Empty input is valid.
pub fn validate_node_list(nodes: &str) -> Result<(), ValidationIssue> {
    if nodes.trim().is_empty() {
        return Ok(());
    }

    for name in nodes.split(',').map(str::trim) {
        if name.is_empty() {
            return Err(ValidationIssue::new(
                "Node names cannot be empty (check for consecutive commas)",
            ));
        }
        if INVALID_NODE_CHARS.is_match(name) {
            return Err(ValidationIssue::new(format!(
                "Invalid characters in node name: {}",
                name
            )));
        }
    }

    Ok(())
}

/// Check that an output directory exists and is a directory, or can be
/// created under an existing parent
pub fn validate_output_dir(path: &Path) -> Result<(), ValidationIssue> {
    if path.as_os_str().is_empty() {
        return Err(ValidationIssue::new("Output directory cannot be empty"));
    }

    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };

    if absolute.exists() {
        if !absolute.is_dir() {
            return Err(ValidationIssue::new(format!(
                "Path is not a directory: {}",
                absolute.display()
            )));
        }
        let readonly = std::fs::metadata(&absolute)
            .map(|m| m.permissions().readonly())
            .unwrap_or(false);
        if readonly {
            return Err(ValidationIssue::new(format!(
                "Output directory is not writable: {}",
                absolute.display()
            )));
        }
        return Ok(());
    }

    match absolute.parent() {
        Some(parent) if parent.exists() => Ok(()),
        Some(parent) => Err(ValidationIssue::new(format!(
            "Parent directory does not exist: {}",
            parent.display()
        ))),
        None => Err(ValidationIssue::new(format!(
            "Output directory has no parent: {}",
            absolute.display()
        ))),
    }
}
