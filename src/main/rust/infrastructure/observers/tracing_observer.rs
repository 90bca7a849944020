use crate::domain::ports::SessionObserver;
use crate::domain::value_objects::{PublishFailure, PublishState};

/// Controller-side observer that surfaces session callbacks in the log
pub struct TracingObserver;

impl TracingObserver {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TracingObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionObserver for TracingObserver {
    fn on_state_changed(&self, state: &PublishState) {
        match state {
            PublishState::Retrying { attempt } => {
                tracing::warn!(attempt = *attempt, "Retrying publish connection")
            }
            PublishState::Publishing => tracing::info!("Publishing"),
            PublishState::PreviewOnly => tracing::info!("Preview running, not publishing"),
            PublishState::Idle => tracing::info!("Capture surface released"),
            PublishState::Stopped => tracing::warn!("Publish stopped after failure"),
        }
    }

    fn on_publish_failed(&self, failure: &PublishFailure) {
        tracing::error!(failure = %failure, "Failed to publish");
    }

    fn on_connected(&self) {
        tracing::info!("Connected, stream is live");
    }

    fn on_bitrate_update(&self, bitrate: u64) {
        tracing::debug!(bitrate, "Transport bitrate update");
    }
}
