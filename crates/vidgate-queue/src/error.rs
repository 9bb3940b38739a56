use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Publish failed: {0}")]
    PublishFailed(String),

    #[error("Receive failed: {0}")]
    ReceiveFailed(String),

    #[error("Settle failed: {0}")]
    SettleFailed(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<QueueError> for vidgate_core::AppError {
    fn from(err: QueueError) -> Self {
        vidgate_core::AppError::Publish(err.to_string())
    }
}

pub type QueueResult<T> = Result<T, QueueError>;
