use tokio::sync::mpsc;

use crate::domain::value_objects::EncodedFrame;

/// Identifies one scheduled retry; a timer carrying any other ticket is stale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RetryTicket(u64);

impl RetryTicket {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    pub fn next(&self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

/// Everything that happens to a publish session from the outside, as one
/// tagged stream: surface lifecycle, transport callbacks and retry timers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    SurfaceCreated,
    SurfaceChanged { width: u32, height: u32 },
    SurfaceDestroyed,
    ConnectionSuccess,
    ConnectionFailed(String),
    BitrateUpdate(u64),
    Disconnect,
    AuthError,
    AuthSuccess,
    RetryTimerFired(RetryTicket),
}

impl SessionEvent {
    /// Short label for logs and metrics
    pub fn name(&self) -> &'static str {
        match self {
            Self::SurfaceCreated => "surface_created",
            Self::SurfaceChanged { .. } => "surface_changed",
            Self::SurfaceDestroyed => "surface_destroyed",
            Self::ConnectionSuccess => "connection_success",
            Self::ConnectionFailed(_) => "connection_failed",
            Self::BitrateUpdate(_) => "bitrate_update",
            Self::Disconnect => "disconnect",
            Self::AuthError => "auth_error",
            Self::AuthSuccess => "auth_success",
            Self::RetryTimerFired(_) => "retry_timer_fired",
        }
    }
}

pub type SessionEventSender = mpsc::UnboundedSender<SessionEvent>;
pub type SessionEventReceiver = mpsc::UnboundedReceiver<SessionEvent>;

pub fn session_event_channel() -> (SessionEventSender, SessionEventReceiver) {
    mpsc::unbounded_channel()
}

/// Encoded frames queued between the media pipeline and the session
pub const FRAME_QUEUE_CAPACITY: usize = 256;

pub type FrameSender = mpsc::Sender<EncodedFrame>;
pub type FrameReceiver = mpsc::Receiver<EncodedFrame>;

pub fn frame_channel() -> (FrameSender, FrameReceiver) {
    mpsc::channel(FRAME_QUEUE_CAPACITY)
}
