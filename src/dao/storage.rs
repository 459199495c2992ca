use std::error::Error;
use thiserror::Error;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Backend-agnostic storage failure; every variant surfaces as a persistence failure.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend could not be reached or refused the operation.
    #[error("storage unavailable: {message}")]
    Unavailable {
        message: String,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// A stored document could not be turned back into a session.
    #[error("storage inconsistent: {0}")]
    Inconsistent(String),
}

impl StorageError {
    /// Wrap a backend-specific failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_keeps_the_backend_cause() {
        let err = StorageError::unavailable(
            "sessions write failed".into(),
            std::io::Error::other("connection reset"),
        );
        assert_eq!(err.to_string(), "storage unavailable: sessions write failed");
        assert_eq!(
            err.source().map(ToString::to_string).as_deref(),
            Some("connection reset")
        );
    }
}
