use thiserror::Error;

/// Error type for the dxcom-runner library
///
/// These are failures of the library itself: malformed requests, bad
/// configuration, I/O on our own files. Anything the compiler process does
/// wrong is reported as an [`ErrorRecord`](crate::core::ErrorRecord) on the
/// event channel instead.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config file parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Config file write error: {0}")]
    TomlWrite(#[from] toml::ser::Error),

    #[error("Async task error: {0}")]
    AsyncTask(#[from] tokio::task::JoinError),
}

impl Error {
    /// Create an invalid request error
    pub fn invalid_request<S: Into<String>>(msg: S) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Create a configuration error
    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }

    /// Check if this error should be retried
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_) | Self::AsyncTask(_))
    }

    /// Get user-friendly error message with suggestions
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidRequest(msg) => {
                format!("Invalid compilation request: {}. Check the input and output paths.", msg)
            }
            Self::Configuration(msg) => {
                format!("Configuration problem: {}. Fix the config file or pass the value on the command line.", msg)
            }
            Self::TomlParse(err) => {
                format!("Could not parse the config file: {}. Delete it to regenerate defaults.", err)
            }
            _ => self.to_string(),
        }
    }
}

/// Convenient result type for the library
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_error_creation_helpers() {
        match Error::invalid_request("input path is empty") {
            Error::InvalidRequest(msg) => assert_eq!(msg, "input path is empty"),
            other => panic!("Expected InvalidRequest error, got {:?}", other),
        }

        match Error::configuration("grace period must be positive") {
            Error::Configuration(msg) => assert_eq!(msg, "grace period must be positive"),
            other => panic!("Expected Configuration error, got {:?}", other),
        }
    }

    #[test]
    fn test_error_retry_logic() {
        let io_err = Error::Io(io::Error::new(io::ErrorKind::Interrupted, "interrupted"));
        assert!(io_err.is_retryable());

        assert!(!Error::invalid_request("bad").is_retryable());
        assert!(!Error::configuration("bad").is_retryable());
    }

    #[test]
    fn test_user_friendly_error_messages() {
        let message = Error::invalid_request("output path is empty").user_message();
        assert!(message.contains("output path is empty"));
        assert!(message.contains("Check the input and output paths"));

        let message = Error::configuration("tool_program is empty").user_message();
        assert!(message.contains("tool_program is empty"));

        let io_err = Error::Io(io::Error::new(io::ErrorKind::NotFound, "gone"));
        assert_eq!(io_err.user_message(), "IO error: gone");
    }

    #[test]
    fn test_error_type_conversions() {
        let err: Error = io::Error::new(io::ErrorKind::NotFound, "File not found").into();
        assert!(matches!(err, Error::Io(_)));

        let json_error = serde_json::from_str::<i32>("invalid json").unwrap_err();
        let err: Error = json_error.into();
        assert!(matches!(err, Error::Serialization(_)));

        let toml_error = toml::from_str::<toml::Value>("= nope").unwrap_err();
        let err: Error = toml_error.into();
        assert!(matches!(err, Error::TomlParse(_)));
    }

    #[test]
    fn test_error_display_messages() {
        let errors = vec![
            (Error::invalid_request("x"), "Invalid request: x"),
            (Error::configuration("y"), "Configuration error: y"),
        ];

        for (error, expected_message) in errors {
            assert_eq!(error.to_string(), expected_message);
        }
    }
}
