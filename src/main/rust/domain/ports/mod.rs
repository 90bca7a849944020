mod media_pipeline;
mod metrics_reporter;
mod publish_transport;
mod retry_scheduler;
mod session_observer;

pub use media_pipeline::MediaPipeline;
pub use metrics_reporter::MetricsReporter;
pub use publish_transport::PublishTransport;
pub use retry_scheduler::{RetryHandle, RetryScheduler};
pub use session_observer::SessionObserver;
