pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

// Re-exports for convenience
pub use application::services::{
    PublishSession, SessionCommand, SessionHandle, SessionPorts, SessionRunner,
};
pub use config::Config;
pub use domain::entities::{PublishLifecycle, StateTransition};
pub use domain::errors::{DomainError, Result};
pub use domain::events::{
    frame_channel, session_event_channel, RetryTicket, SessionEvent, SessionEventSender,
};
pub use domain::ports::{
    MediaPipeline, MetricsReporter, PublishTransport, RetryHandle, RetryScheduler,
    SessionObserver,
};
pub use domain::value_objects::{
    EncodedFrame, MediaKind, PublishFailure, PublishState, PublishUrl, ResumePolicy, RetryPolicy,
    SessionConfig, SessionSnapshot, VideoConfig,
};
pub use infrastructure::gstreamer::{
    CaptureSettings, GStreamerMediaPipeline, GStreamerRtmpTransport, PipelineBuilder,
};
pub use infrastructure::metrics::{serve_metrics, PrometheusReporter};
pub use infrastructure::observers::TracingObserver;
pub use infrastructure::scheduling::TokioRetryScheduler;
