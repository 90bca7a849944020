use crate::domain::errors::Result;
use crate::domain::value_objects::{EncodedFrame, PublishUrl};

/// Port for the network connection to the media server.
///
/// `connect` never blocks on the network: the outcome is delivered later on
/// the session event channel (`ConnectionSuccess`, `ConnectionFailed`, ...).
pub trait PublishTransport: Send {
    fn connect(&mut self, url: &PublishUrl);

    fn disconnect(&mut self);

    /// Send one encoded frame over the current connection
    fn send_frame(&mut self, frame: EncodedFrame) -> Result<()>;

    /// Protocol-specific knowledge of which failures are transient
    fn is_reason_retryable(&self, reason: &str) -> bool;
}
