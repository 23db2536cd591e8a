use super::error::*;
use std::io;

#[cfg(test)]
mod error_creation_tests {
    use super::*;

    #[test]
    fn test_all_constructor_methods() {
        let errors = vec![
            (
                CliError::configuration("bad toml"),
                "Configuration",
                "bad toml",
            ),
            (
                CliError::invalid_input("Input file must have .onnx extension"),
                "InvalidInput",
                "Input file must have .onnx extension",
            ),
            (
                CliError::environment("DXCom compiler not found"),
                "EnvironmentNotReady",
                "DXCom compiler not found",
            ),
            (
                CliError::compilation_failed("Failed to write output file"),
                "CompilationFailed",
                "Failed to write output file",
            ),
        ];

        for (error, expected_variant, expected_msg) in errors {
            let error_str = format!("{:?}", error);
            assert!(
                error_str.contains(expected_variant),
                "Error {:?} should contain variant {}",
                error,
                expected_variant
            );
            assert!(
                error_str.contains(expected_msg),
                "Error {:?} should contain message {}",
                error,
                expected_msg
            );
        }
    }
}

#[cfg(test)]
mod error_message_tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let cases = vec![
            (CliError::configuration("x"), "Configuration error: x"),
            (CliError::invalid_input("y"), "Invalid input: y"),
            (
                CliError::compilation_failed("Compilation timed out"),
                "Compilation failed: Compilation timed out",
            ),
            (CliError::Cancelled, "Compilation cancelled"),
        ];
        for (error, expected) in cases {
            assert_eq!(error.to_string(), expected);
        }
    }

    #[test]
    fn test_user_messages_point_to_next_step() {
        let env = CliError::environment("DXCom compiler not found").user_message();
        assert!(env.contains("DXCom compiler not found"));
        assert!(env.contains("dxcom-runner check"));

        let input = CliError::invalid_input("Input ONNX file is empty").user_message();
        assert!(input.contains("compile --help"));

        assert!(CliError::Cancelled.user_message().contains("cancelled"));

        // Plain variants fall back to Display
        assert_eq!(
            CliError::configuration("missing").user_message(),
            "Configuration error: missing"
        );
    }

    #[test]
    fn test_runner_errors_use_library_message() {
        let inner = crate::core::Error::invalid_request("input path is empty");
        let expected = inner.user_message();
        let err: CliError = inner.into();
        assert_eq!(err.user_message(), expected);
    }

    #[test]
    fn test_trait_matches_inherent_method() {
        let err = CliError::environment("no disk");
        assert_eq!(UserFriendlyError::user_message(&err), err.user_message());
    }
}

#[cfg(test)]
mod error_conversion_tests {
    use super::*;

    #[test]
    fn test_from_conversions() {
        let err: CliError = io::Error::new(io::ErrorKind::PermissionDenied, "denied").into();
        assert!(matches!(err, CliError::Io(_)));

        let json_err = serde_json::from_str::<i32>("not json").unwrap_err();
        let err: CliError = json_err.into();
        assert!(matches!(err, CliError::Serialization(_)));

        let err: CliError = crate::core::Error::configuration("grace").into();
        assert!(matches!(err, CliError::Runner(_)));
    }

    #[test]
    fn test_retry_logic() {
        assert!(CliError::Io(io::Error::new(io::ErrorKind::Interrupted, "eintr")).is_retryable());
        assert!(!CliError::Cancelled.is_retryable());
        assert!(!CliError::invalid_input("x").is_retryable());
        assert!(!CliError::from(crate::core::Error::invalid_request("x")).is_retryable());
    }
}
