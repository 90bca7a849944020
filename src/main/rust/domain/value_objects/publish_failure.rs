use std::fmt;

use serde::Serialize;

/// Capture half that failed to prepare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Audio,
    Video,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Audio => write!(f, "audio"),
            Self::Video => write!(f, "video"),
        }
    }
}

/// Terminal outcome of a publish attempt, as reported to the controller
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PublishFailure {
    /// Local capture could not be prepared (hardware busy, unsupported resolution)
    Prepare { media: MediaKind },
    /// The transport classified the failure as permanent
    Rejected { reason: String },
    /// Every retry in the budget failed
    RetriesExhausted { attempts: u32, reason: String },
}

impl PublishFailure {
    /// The original failure reason, when one exists
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Prepare { .. } => None,
            Self::Rejected { reason } | Self::RetriesExhausted { reason, .. } => Some(reason),
        }
    }
}

impl fmt::Display for PublishFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Prepare { media } => write!(f, "failed to prepare {}", media),
            Self::Rejected { reason } => write!(f, "connection rejected: {}", reason),
            Self::RetriesExhausted { attempts, reason } => write!(
                f,
                "connection failed after {} retries: {}",
                attempts, reason
            ),
        }
    }
}
