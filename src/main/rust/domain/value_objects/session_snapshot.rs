use serde::Serialize;

use super::{PublishState, VideoConfig};

/// Point-in-time view of a publish session, served on the status endpoint
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub session_id: String,
    #[serde(flatten)]
    pub state: PublishState,
    pub retry_count: u32,
    pub target_url: Option<String>,
    pub surface_ready: bool,
    pub streaming: bool,
    pub connected: bool,
    pub forwarding_paused: bool,
    pub video: VideoConfig,
}

impl SessionSnapshot {
    pub fn idle(session_id: String, video: VideoConfig) -> Self {
        Self {
            session_id,
            state: PublishState::Idle,
            retry_count: 0,
            target_url: None,
            surface_ready: false,
            streaming: false,
            connected: false,
            forwarding_paused: false,
            video,
        }
    }
}
