//! Command line front end for supervised dxcom compilation.
//! ## Usage
//!
//! ```bash
//! # Is everything installed?
//! dxcom-runner check --output build/model.dxnn
//!
//! # Compile a model, streaming compiler output
//! dxcom-runner compile -m model.onnx -o build/model.dxnn --opt-level 1
//!
//! # Show the exact compiler command line
//! dxcom-runner command -m model.onnx -o build/model.dxnn --calib-num 0
//!
//! # Which dxcom is on the PATH?
//! dxcom-runner detect
//! ```

pub mod app;
pub mod commands;
pub mod config;
pub mod error;
pub mod output;

#[cfg(test)]
mod error_test;


// Re-export commonly used types
pub use error::{CliError, Result, UserFriendlyError};

/// Version information for the command line
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default directory for storing the settings file
pub fn default_data_dir() -> std::path::PathBuf {
    directories::ProjectDirs::from("", "", "dxcom-runner")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| {
            // Fallback to home directory if project dirs not available
            dirs::home_dir()
                .unwrap_or_else(|| std::path::PathBuf::from("."))
                .join(".dxcom-runner")
        })
}

/// Initialize the data directory if it doesn't exist
pub fn ensure_data_dir() -> Result<std::path::PathBuf> {
    let data_dir = default_data_dir();
    if !data_dir.exists() {
        std::fs::create_dir_all(&data_dir)?;
    }
    Ok(data_dir)
}
