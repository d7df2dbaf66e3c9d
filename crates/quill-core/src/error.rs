use thiserror::Error;

/// Top-level error type for the Quill system.
///
/// Subsystem crates define their own error types and convert into
/// `QuillError` at crate boundaries so the `?` operator works seamlessly.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QuillError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Flow engine error: {0}")]
    Flow(String),

    #[error("Render error: {0}")]
    Render(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for QuillError {
    fn from(err: toml::de::Error) -> Self {
        QuillError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for QuillError {
    fn from(err: toml::ser::Error) -> Self {
        QuillError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for QuillError {
    fn from(err: serde_json::Error) -> Self {
        QuillError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Quill operations.
pub type Result<T> = std::result::Result<T, QuillError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = QuillError::Config("missing field".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing field");

        let err = QuillError::Flow("engine offline".to_string());
        assert_eq!(err.to_string(), "Flow engine error: engine offline");

        let err = QuillError::Render("bad layout".to_string());
        assert_eq!(err.to_string(), "Render error: bad layout");

        let err = QuillError::Session("not found".to_string());
        assert_eq!(err.to_string(), "Session error: not found");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: QuillError = io_err.into();
        assert!(matches!(err, QuillError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_toml_error_conversion() {
        let bad = "invalid = [[[";
        let parse: std::result::Result<toml::Value, _> = toml::from_str(bad);
        let err: QuillError = parse.unwrap_err().into();
        assert!(matches!(err, QuillError::Config(_)));
    }

    #[test]
    fn test_serde_json_error_conversion() {
        let parse: std::result::Result<serde_json::Value, _> =
            serde_json::from_str("{ not json }");
        let err: QuillError = parse.unwrap_err().into();
        assert!(matches!(err, QuillError::Serialization(_)));
    }

    #[test]
    fn test_result_type_with_question_mark() {
        fn inner() -> Result<String> {
            let io_result: std::result::Result<i32, std::io::Error> = Ok(42);
            let _value = io_result?;
            Ok("success".to_string())
        }

        assert_eq!(inner().unwrap(), "success");
    }
}
