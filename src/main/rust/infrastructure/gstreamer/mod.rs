mod bus_monitor;
mod gstreamer_media;
mod gstreamer_transport;
mod pipeline_builder;
pub mod rtmp_failure;

pub use bus_monitor::BusMonitor;
pub use gstreamer_media::{CaptureSettings, GStreamerMediaPipeline};
pub use gstreamer_transport::{BusOutcome, GStreamerRtmpTransport};
pub use pipeline_builder::{CaptureLayout, PipelineBuilder};
