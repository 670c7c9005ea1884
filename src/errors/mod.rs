//! # Error Handling
//!
//! Error types for the specsift inference engine, built with `thiserror`.
//! Every fallible public operation returns [`Result`].

/// Custom result type for specsift operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the specsift engine
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Malformed or unusable input (bad telemetry, invalid provided spec, ...)
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// A generated OpenAPI document failed meta-schema validation
    #[error("Document validation error: {message}")]
    Document { message: String },

    /// Persisted state could not be decoded
    #[error("State error: {message}")]
    State {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Resource lookup failures (unknown spec, unknown learned path, ...)
    #[error("Resource not found: {resource_type} '{id}'")]
    NotFound { resource_type: String, id: String },

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {context}")]
    Serialization {
        #[source]
        source: serde_json::Error,
        context: String,
    },
}

impl Error {
    /// Create a validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation { message: message.into() }
    }

    /// Create a document-validation error
    pub fn document<S: Into<String>>(message: S) -> Self {
        Self::Document { message: message.into() }
    }

    /// Create a state error
    pub fn state<S: Into<String>>(message: S) -> Self {
        Self::State { message: message.into(), source: None }
    }

    /// Create a state error with the underlying cause attached
    pub fn state_with_source<S: Into<String>>(
        message: S,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Self::State { message: message.into(), source: Some(source) }
    }

    /// Create a not-found error
    pub fn not_found<R: Into<String>, I: Into<String>>(resource_type: R, id: I) -> Self {
        Self::NotFound { resource_type: resource_type.into(), id: id.into() }
    }

    /// Create a serialization error with context
    pub fn serialization<S: Into<String>>(source: serde_json::Error, context: S) -> Self {
        Self::Serialization { source, context: context.into() }
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization { source: error, context: "JSON serialization failed".to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = Error::validation("bad query string");
        assert_eq!(error.to_string(), "Validation error: bad query string");

        let error = Error::not_found("spec", "example.com:8080");
        assert_eq!(error.to_string(), "Resource not found: spec 'example.com:8080'");
    }

    #[test]
    fn test_error_conversions() {
        let json_error = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let error: Error = json_error.into();
        assert!(matches!(error, Error::Serialization { .. }));

        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "missing file");
        let error: Error = io_error.into();
        assert!(matches!(error, Error::Io(_)));
    }
}
