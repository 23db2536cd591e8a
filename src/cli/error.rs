use thiserror::Error;

/// Error type for the dxcom-runner command line
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Environment not ready: {0}")]
    EnvironmentNotReady(String),

    #[error("Compilation failed: {0}")]
    CompilationFailed(String),

    #[error("Compilation cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Runner error: {0}")]
    Runner(#[from] crate::core::error::Error),

    #[error("Async task error: {0}")]
    AsyncTask(#[from] tokio::task::JoinError),
}

impl CliError {
    /// Create a configuration error
    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create an environment error
    pub fn environment<S: Into<String>>(msg: S) -> Self {
        Self::EnvironmentNotReady(msg.into())
    }

    /// Create a compilation failure
    pub fn compilation_failed<S: Into<String>>(msg: S) -> Self {
        Self::CompilationFailed(msg.into())
    }

    /// Check if this error should be retried
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Io(_) | Self::AsyncTask(_) => true,
            Self::Runner(err) => err.is_retryable(),
            _ => false,
        }
    }

    /// Get user-friendly error message with suggestions
    pub fn user_message(&self) -> String {
        match self {
            Self::EnvironmentNotReady(msg) => {
                format!(
                    "Environment not ready: {}. Run 'dxcom-runner check' for the full report.",
                    msg
                )
            }
            Self::Cancelled => "Compilation cancelled by user.".to_string(),
            Self::InvalidInput(msg) => {
                format!("Invalid input: {}. Run 'dxcom-runner compile --help' for usage.", msg)
            }
            Self::Runner(err) => err.user_message(),
            _ => self.to_string(),
        }
    }
}

/// Convenient result type for the command line
pub type Result<T> = std::result::Result<T, CliError>;

/// Trait for converting errors to user-friendly messages
pub trait UserFriendlyError {
    fn user_message(&self) -> String;
}

impl UserFriendlyError for CliError {
    fn user_message(&self) -> String {
        self.user_message()
    }
}
