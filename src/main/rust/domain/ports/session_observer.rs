use crate::domain::value_objects::{PublishFailure, PublishState};

/// Controller-facing callbacks emitted by a publish session
pub trait SessionObserver: Send + Sync {
    fn on_state_changed(&self, state: &PublishState);
    fn on_publish_failed(&self, failure: &PublishFailure);
    fn on_connected(&self);

    fn on_bitrate_update(&self, bitrate: u64) {
        let _ = bitrate;
    }
}
