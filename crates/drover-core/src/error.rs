//! Workspace-wide error and result types.

/// Top-level error type for the drover workspace.
///
/// Each variant corresponds to a subsystem that can produce errors.
#[derive(Debug, thiserror::Error)]
pub enum DroverError {
    /// An error originating from an agent invocation.
    #[error("Agent error: {0}")]
    Agent(String),

    /// An error raised while driving an item through the stage pipeline.
    #[error("Pipeline error: {0}")]
    Pipeline(String),

    /// An error from the model performance store.
    #[error("Store error: {0}")]
    Store(String),

    /// An error from the work item backlog.
    #[error("Backlog error: {0}")]
    Backlog(String),

    /// An error in configuration parsing or validation.
    #[error("Config error: {0}")]
    Config(String),

    /// An error from the desktop bridge layer.
    #[error("Bridge error: {0}")]
    Bridge(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convenience `Result` alias using [`DroverError`].
pub type DroverResult<T> = Result<T, DroverError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DroverError::Config("missing models.default".to_string());
        assert_eq!(err.to_string(), "Config error: missing models.default");
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: DroverError = io.into();
        assert!(matches!(err, DroverError::Io(_)));
    }

    #[test]
    fn test_json_error_conversion() {
        let bad = serde_json::from_str::<serde_json::Value>("{nope");
        let err: DroverError = bad.unwrap_err().into();
        assert!(err.to_string().starts_with("JSON error"));
    }
}
