use std::fmt;

use serde::Serialize;

/// Publish session states (pure domain)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PublishState {
    /// No capture surface attached
    #[default]
    Idle,
    /// Surface attached, camera preview running, nothing published
    PreviewOnly,
    /// Stream started and a connection attempt is active
    Publishing,
    /// Connection lost, a retry is scheduled
    Retrying { attempt: u32 },
    /// Publish attempt ended with a reported failure
    Stopped,
}

impl fmt::Display for PublishState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "IDLE"),
            Self::PreviewOnly => write!(f, "PREVIEW_ONLY"),
            Self::Publishing => write!(f, "PUBLISHING"),
            Self::Retrying { attempt } => write!(f, "RETRYING (attempt {})", attempt),
            Self::Stopped => write!(f, "STOPPED"),
        }
    }
}

impl PublishState {
    /// Convert state to numeric value for metrics
    pub fn as_metric(&self) -> f64 {
        match self {
            Self::Idle => 0.0,
            Self::PreviewOnly => 1.0,
            Self::Publishing => 2.0,
            Self::Retrying { .. } => 3.0,
            Self::Stopped => 4.0,
        }
    }

    /// A publish attempt is in flight (connecting, connected or waiting to retry)
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Publishing | Self::Retrying { .. })
    }

    /// Whether a new publish may be requested from this state
    pub fn accepts_publish_request(&self) -> bool {
        matches!(self, Self::PreviewOnly | Self::Stopped)
    }

    pub fn is_problematic(&self) -> bool {
        matches!(self, Self::Retrying { .. } | Self::Stopped)
    }
}
