//! Error types module
//!
//! All domain errors are unified under the [`AppError`] enum. Data-integrity
//! failures (size/hash mismatch, missing chunk) are terminal for the session
//! that hit them and are surfaced through session status, never retried.

/// Application-wide error taxonomy.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Bad input at a boundary (init request, profile config, metadata).
    /// Rejected synchronously; no session or record is created.
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("File too large: {0}")]
    PayloadTooLarge(String),

    /// Assembled byte count did not match the declared size.
    #[error("Size mismatch: declared {declared} bytes, assembled {actual} bytes")]
    SizeMismatch { declared: u64, actual: u64 },

    /// Client-declared content hash did not match the computed hash.
    #[error("Integrity error: expected hash {expected}, computed {actual}")]
    Integrity { expected: String, actual: String },

    /// A chunk was absent at assembly time. Recovery requires a fresh upload.
    #[error("Missing chunk at index {index}")]
    MissingChunk { index: u32 },

    #[error("Storage error: {0}")]
    Store(String),

    /// Queue publication failed. Non-fatal to a `complete` session: the bytes
    /// are stored, only the handoff is missing.
    #[error("Publish error: {0}")]
    Publish(String),

    /// External codec failure, isolated per profile.
    #[error("Transcode failed for profile {profile}: {message}")]
    TranscodeTool { profile: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Machine-readable code for logs and HTTP bodies.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            AppError::SizeMismatch { .. } => "SIZE_MISMATCH",
            AppError::Integrity { .. } => "INTEGRITY_ERROR",
            AppError::MissingChunk { .. } => "MISSING_CHUNK",
            AppError::Store(_) => "STORE_ERROR",
            AppError::Publish(_) => "PUBLISH_ERROR",
            AppError::TranscodeTool { .. } => "TRANSCODE_ERROR",
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::Io(_) => "IO_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether the condition is worth a bounded local retry. Data-integrity
    /// and validation failures are terminal; dependency issues are not.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AppError::Store(_) | AppError::Publish(_) | AppError::Io(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integrity_errors_are_terminal() {
        let err = AppError::Integrity {
            expected: "aa".into(),
            actual: "bb".into(),
        };
        assert!(!err.is_recoverable());
        assert_eq!(err.code(), "INTEGRITY_ERROR");
    }

    #[test]
    fn dependency_errors_are_recoverable() {
        assert!(AppError::Store("unreachable".into()).is_recoverable());
        assert!(AppError::Publish("broker down".into()).is_recoverable());
        assert!(!AppError::MissingChunk { index: 3 }.is_recoverable());
    }
}
