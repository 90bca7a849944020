use thiserror::Error;

use crate::domain::value_objects::MediaKind;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Invalid publish URL: {0}")]
    InvalidPublishUrl(String),

    #[error("Invalid video config: {0}")]
    InvalidVideoConfig(String),

    #[error("Invalid bitrate: must be greater than zero")]
    InvalidBitrate,

    #[error("Invalid retry delay: delay cannot be zero")]
    InvalidRetryDelay,

    #[error("Invalid backoff multiplier: must be >= 1.0")]
    InvalidBackoffMultiplier,

    #[error("Invalid maximum retry delay: cannot be less than the initial delay")]
    InvalidMaxDelay,

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Invalid state: media pipeline could not prepare {0}")]
    PrepareFailed(MediaKind),

    #[error("Pipeline creation failed: {0}")]
    PipelineCreationFailed(String),

    #[error("Pipeline execution failed: {0}")]
    PipelineExecutionFailed(String),

    #[error("Transport send failed: {0}")]
    TransportSendFailed(String),

    #[error("Publish session closed")]
    SessionClosed,
}

impl DomainError {
    /// True for the errors the publish contract reports as an invalid state
    pub fn is_invalid_state(&self) -> bool {
        matches!(self, Self::InvalidState(_) | Self::PrepareFailed(_))
    }
}

pub type Result<T> = std::result::Result<T, DomainError>;
