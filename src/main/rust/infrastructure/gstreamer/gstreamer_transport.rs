use anyhow::Context;
use gstreamer::prelude::*;

use super::bus_monitor::BusMonitor;
use super::pipeline_builder::{TRANSPORT_SINK_NAME, TRANSPORT_SOURCE_NAME};
use super::{rtmp_failure, PipelineBuilder};
use crate::domain::errors::{DomainError, Result};
use crate::domain::events::{SessionEvent, SessionEventSender};
use crate::domain::ports::PublishTransport;
use crate::domain::value_objects::{EncodedFrame, PublishUrl};

/// Leading bytes of an FLV file header
const FLV_SIGNATURE: &[u8] = b"FLV";

/// What a bus message means for the connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusOutcome {
    Continue,
    Playing,
    Failed(String),
    Closed,
}

struct Connection {
    pipeline: gstreamer::Pipeline,
    source: gstreamer_app::AppSrc,
    headers: Vec<gstreamer::Buffer>,
    monitor: BusMonitor,
}

impl Connection {
    /// Stream headers travel in the appsrc caps, so the sink sends them
    /// ahead of any media once the server accepts the publish.
    fn add_header(&mut self, buffer: gstreamer::Buffer, file_header: bool) {
        if file_header {
            self.headers.clear();
        }
        self.headers.push(buffer);

        let caps = gstreamer::Caps::builder("video/x-flv")
            .field(
                "streamheader",
                gstreamer::Array::from_values(self.headers.iter().map(|h| h.to_send_value())),
            )
            .build();
        self.source.set_caps(Some(&caps));

        tracing::debug!(headers = self.headers.len(), "Stream header updated");
    }
}

/// RTMP publish transport backed by `rtmp2sink`.
///
/// Connection progress is read from the pipeline bus on a monitor thread and
/// delivered as session events.
pub struct GStreamerRtmpTransport {
    events: SessionEventSender,
    connection: Option<Connection>,
}

impl GStreamerRtmpTransport {
    pub fn new(events: SessionEventSender) -> Self {
        Self {
            events,
            connection: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    fn create_pipeline(url: &PublishUrl) -> anyhow::Result<gstreamer::Pipeline> {
        let pipeline_str = PipelineBuilder::build_transport_pipeline(url);
        tracing::info!("Creating transport pipeline: {}", pipeline_str);

        let pipeline = gstreamer::parse::launch(&pipeline_str)
            .context("Failed to parse pipeline")?
            .downcast::<gstreamer::Pipeline>()
            .map_err(|_| anyhow::anyhow!("Failed to downcast to Pipeline"))?;

        Ok(pipeline)
    }

    fn open(&self, url: &PublishUrl) -> Result<Connection> {
        let pipeline = Self::create_pipeline(url)
            .map_err(|e| DomainError::PipelineCreationFailed(format!("{:#}", e)))?;

        let source = pipeline
            .by_name(TRANSPORT_SOURCE_NAME)
            .ok_or_else(|| {
                DomainError::PipelineCreationFailed("transport source not found".to_string())
            })?
            .downcast::<gstreamer_app::AppSrc>()
            .map_err(|_| {
                DomainError::PipelineCreationFailed("transport source is not an appsrc".to_string())
            })?;

        let sink = pipeline.by_name(TRANSPORT_SINK_NAME).ok_or_else(|| {
            DomainError::PipelineCreationFailed("transport sink not found".to_string())
        })?;

        let bus = pipeline
            .bus()
            .ok_or_else(|| DomainError::PipelineExecutionFailed("Failed to get bus".to_string()))?;

        pipeline
            .set_state(gstreamer::State::Playing)
            .map_err(|e| DomainError::PipelineExecutionFailed(e.to_string()))?;

        let monitor = BusMonitor::spawn(
            "rtmp-bus-monitor",
            bus,
            Self::connection_watch(pipeline.clone(), sink, self.events.clone()),
        );
        let monitor = match monitor {
            Ok(monitor) => monitor,
            Err(e) => {
                let _ = pipeline.set_state(gstreamer::State::Null);
                return Err(e);
            }
        };

        Ok(Connection {
            pipeline,
            source,
            headers: Vec::new(),
            monitor,
        })
    }

    /// Turns bus traffic into session events.
    ///
    /// The pipeline reaches PLAYING as soon as the sink prerolls on the first
    /// buffer, which can happen before the server accepts the publish, so
    /// success is announced once the sink also reports bytes on the wire.
    fn connection_watch(
        pipeline: gstreamer::Pipeline,
        sink: gstreamer::Element,
        events: SessionEventSender,
    ) -> impl FnMut(Option<&gstreamer::Message>) -> bool + Send + 'static {
        let mut playing = false;
        let mut announced = false;

        move |msg| {
            if let Some(msg) = msg {
                let event = match Self::process_bus_message(msg, &pipeline) {
                    BusOutcome::Continue => None,
                    BusOutcome::Playing => {
                        playing = true;
                        None
                    }
                    BusOutcome::Failed(reason) if rtmp_failure::is_auth_failure(&reason) => {
                        tracing::warn!("RTMP authentication rejected: {}", reason);
                        Some(SessionEvent::AuthError)
                    }
                    BusOutcome::Failed(reason) => Some(SessionEvent::ConnectionFailed(reason)),
                    BusOutcome::Closed => Some(SessionEvent::Disconnect),
                };

                if let Some(event) = event {
                    if events.send(event).is_err() {
                        tracing::debug!("Session gone, stopping bus monitor");
                    }
                    return false;
                }
            }

            if playing && !announced && Self::sink_has_sent(&sink) {
                announced = true;
                if events.send(SessionEvent::ConnectionSuccess).is_err() {
                    tracing::debug!("Session gone, stopping bus monitor");
                    return false;
                }
            }

            true
        }
    }

    /// Whether the sink reports outgoing bytes; sinks without byte counters
    /// count as connected once playing
    pub fn sink_has_sent(sink: &gstreamer::Element) -> bool {
        if sink.find_property("stats").is_none() {
            return true;
        }

        let stats = sink.property::<gstreamer::Structure>("stats");
        stats
            .get::<u64>("out-bytes-total")
            .map(|bytes| bytes > 0)
            .unwrap_or(true)
    }

    /// Map a bus message to a connection outcome
    pub fn process_bus_message(
        msg: &gstreamer::Message,
        pipeline: &gstreamer::Pipeline,
    ) -> BusOutcome {
        match msg.view() {
            gstreamer::MessageView::Eos(_) => {
                tracing::info!("End of stream");
                BusOutcome::Closed
            }
            gstreamer::MessageView::Error(err) => {
                let reason = err.error().to_string();
                tracing::error!(
                    "Error from {:?}: {} ({:?})",
                    err.src().map(|s| s.path_string()),
                    reason,
                    err.debug()
                );
                let _ = pipeline.set_state(gstreamer::State::Null);
                BusOutcome::Failed(reason)
            }
            gstreamer::MessageView::StateChanged(state_changed) => {
                if state_changed
                    .src()
                    .map(|s| s == pipeline)
                    .unwrap_or(false)
                {
                    tracing::debug!(
                        "Pipeline state changed from {:?} to {:?}",
                        state_changed.old(),
                        state_changed.current()
                    );
                    if state_changed.current() == gstreamer::State::Playing {
                        return BusOutcome::Playing;
                    }
                }
                BusOutcome::Continue
            }
            gstreamer::MessageView::Warning(warn) => {
                tracing::warn!(
                    "Warning from {:?}: {} ({:?})",
                    warn.src().map(|s| s.path_string()),
                    warn.error(),
                    warn.debug()
                );
                BusOutcome::Continue
            }
            _ => BusOutcome::Continue,
        }
    }
}

impl PublishTransport for GStreamerRtmpTransport {
    fn connect(&mut self, url: &PublishUrl) {
        // A retry reconnects over a fresh pipeline
        self.disconnect();

        match self.open(url) {
            Ok(connection) => {
                tracing::info!(url = %url, "Connecting to media server");
                self.connection = Some(connection);
            }
            Err(e) => {
                tracing::error!(url = %url, "Failed to open connection: {}", e);
                let _ = self
                    .events
                    .send(SessionEvent::ConnectionFailed(e.to_string()));
            }
        }
    }

    fn disconnect(&mut self) {
        let Some(mut connection) = self.connection.take() else {
            return;
        };

        connection.monitor.stop();
        let _ = connection.source.end_of_stream();
        let _ = connection.pipeline.set_state(gstreamer::State::Null);

        tracing::info!("Disconnected from media server");
    }

    fn send_frame(&mut self, frame: EncodedFrame) -> Result<()> {
        let connection = self
            .connection
            .as_mut()
            .ok_or_else(|| DomainError::TransportSendFailed("not connected".to_string()))?;

        let pts_us = frame.pts_us();
        let header = frame.is_header();
        let delta = !frame.is_keyframe();
        let file_header = frame.data().starts_with(FLV_SIGNATURE);

        let mut buffer = gstreamer::Buffer::from_mut_slice(frame.into_data());
        if let Some(buffer) = buffer.get_mut() {
            if let Some(pts_us) = pts_us {
                buffer.set_pts(gstreamer::ClockTime::from_useconds(pts_us));
            }
            if header {
                buffer.set_flags(gstreamer::BufferFlags::HEADER);
            }
            if delta {
                buffer.set_flags(gstreamer::BufferFlags::DELTA_UNIT);
            }
        }

        if header {
            connection.add_header(buffer, file_header);
            return Ok(());
        }

        connection
            .source
            .push_buffer(buffer)
            .map(|_| ())
            .map_err(|e| DomainError::TransportSendFailed(format!("{:?}", e)))
    }

    fn is_reason_retryable(&self, reason: &str) -> bool {
        rtmp_failure::is_retryable(reason)
    }
}

impl Drop for GStreamerRtmpTransport {
    fn drop(&mut self) {
        self.disconnect();
    }
}
