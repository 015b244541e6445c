//! Crate-level error type for startup and wiring code
//!
//! Request-time failures never reach this type: they are written to the
//! client as envelopes. [`Error`] covers what can go wrong while loading
//! configuration, connecting storage, registering routes, and serving.

use thiserror::Error;

use crate::repository::RepositoryError;
use crate::routes::SignatureError;

/// Result alias for startup and wiring code
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(Box<figment::Error>),

    /// A route could not be registered
    #[error("Route registration failed: {0}")]
    Signature(#[from] SignatureError),

    /// Storage setup or access failed
    #[error("{0}")]
    Repository(#[from] RepositoryError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

// figment::Error is large; keep the enum small
impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Error::Config(Box::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::RepositoryOperation;

    #[test]
    fn test_signature_error_display() {
        let err: Error = SignatureError::EmptyPath.into();
        assert_eq!(
            err.to_string(),
            "Route registration failed: route path must not be empty"
        );
    }

    #[test]
    fn test_repository_error_is_transparent() {
        let repo = RepositoryError::database_error(RepositoryOperation::Sync, "disk full");
        let expected = repo.to_string();
        let err: Error = repo.into();
        assert_eq!(err.to_string(), expected);
    }

    #[test]
    fn test_figment_error_is_boxed() {
        let err: Error = figment::Error::from("bad value".to_string()).into();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().starts_with("Configuration error"));
    }
}
