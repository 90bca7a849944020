use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;
use gstreamer::prelude::*;

use super::bus_monitor::BusMonitor;
use super::pipeline_builder::{
    CaptureLayout, AUDIO_VALVE_NAME, ENCODED_SINK_NAME, VIDEO_ENCODER_NAME, VIDEO_VALVE_NAME,
};
use super::PipelineBuilder;
use crate::domain::errors::{DomainError, Result};
use crate::domain::events::FrameSender;
use crate::domain::ports::MediaPipeline;
use crate::domain::value_objects::{EncodedFrame, VideoConfig};

/// Host-side capture settings (devices and preview target)
#[derive(Debug, Clone)]
pub struct CaptureSettings {
    /// Camera device paths; empty selects the platform default camera
    pub devices: Vec<String>,
    pub preview_sink: String,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            devices: Vec::new(),
            preview_sink: "autovideosink".to_string(),
        }
    }
}

/// Camera + microphone capture with H.264/AAC encoding into FLV.
///
/// Preview and encoder share one GStreamer pipeline; streaming is toggled by
/// opening and closing the encoder valves.
pub struct GStreamerMediaPipeline {
    settings: CaptureSettings,
    device_index: usize,
    video: VideoConfig,
    with_audio: bool,
    pipeline: Option<gstreamer::Pipeline>,
    monitor: Option<BusMonitor>,
    streaming: bool,
    forwarding: Arc<AtomicBool>,
    frames: FrameSender,
}

impl GStreamerMediaPipeline {
    pub fn new(settings: CaptureSettings, video: VideoConfig, frames: FrameSender) -> Self {
        Self {
            settings,
            device_index: 0,
            video,
            with_audio: false,
            pipeline: None,
            monitor: None,
            streaming: false,
            forwarding: Arc::new(AtomicBool::new(true)),
            frames,
        }
    }

    pub fn current_device(&self) -> Option<&str> {
        self.settings
            .devices
            .get(self.device_index)
            .map(String::as_str)
    }

    fn elements_available(names: &[&str]) -> bool {
        let missing: Vec<&str> = names
            .iter()
            .copied()
            .filter(|name| gstreamer::ElementFactory::find(name).is_none())
            .collect();

        if !missing.is_empty() {
            tracing::error!(missing = ?missing, "Required GStreamer elements not available");
            return false;
        }
        true
    }

    fn create_pipeline(&self) -> anyhow::Result<gstreamer::Pipeline> {
        let layout = CaptureLayout {
            device: self.current_device(),
            preview_sink: &self.settings.preview_sink,
            video: &self.video,
            with_audio: self.with_audio,
        };
        let pipeline_str = PipelineBuilder::build_capture_pipeline(&layout);
        tracing::info!("Creating capture pipeline: {}", pipeline_str);

        let pipeline = gstreamer::parse::launch(&pipeline_str)
            .context("Failed to parse capture pipeline")?
            .downcast::<gstreamer::Pipeline>()
            .map_err(|_| anyhow::anyhow!("Failed to downcast to Pipeline"))?;

        Ok(pipeline)
    }

    /// Build, wire and start the capture pipeline with its bus monitor
    fn launch(&mut self) -> Result<()> {
        let pipeline = self
            .create_pipeline()
            .map_err(|e| DomainError::PipelineCreationFailed(e.to_string()))?;

        Self::attach_frame_sink(&pipeline, self.frames.clone(), self.forwarding.clone())?;

        let bus = pipeline
            .bus()
            .ok_or_else(|| DomainError::PipelineExecutionFailed("Failed to get bus".to_string()))?;

        pipeline
            .set_state(gstreamer::State::Playing)
            .map_err(|e| DomainError::PipelineExecutionFailed(e.to_string()))?;

        let monitor = BusMonitor::spawn("capture-bus-monitor", bus, |msg| {
            msg.map_or(true, Self::capture_bus_flow)
        });
        match monitor {
            Ok(monitor) => self.monitor = Some(monitor),
            Err(e) => {
                let _ = pipeline.set_state(gstreamer::State::Null);
                return Err(e);
            }
        }

        self.pipeline = Some(pipeline);
        Ok(())
    }

    /// Log capture bus traffic; false once the pipeline has stopped producing
    pub fn capture_bus_flow(msg: &gstreamer::Message) -> bool {
        match msg.view() {
            gstreamer::MessageView::Eos(_) => {
                tracing::warn!("Capture pipeline reached end of stream");
                false
            }
            gstreamer::MessageView::Error(err) => {
                tracing::error!(
                    "Capture error from {:?}: {} ({:?})",
                    err.src().map(|s| s.path_string()),
                    err.error(),
                    err.debug()
                );
                false
            }
            gstreamer::MessageView::Warning(warn) => {
                tracing::warn!(
                    "Capture warning from {:?}: {} ({:?})",
                    warn.src().map(|s| s.path_string()),
                    warn.error(),
                    warn.debug()
                );
                true
            }
            _ => true,
        }
    }

    /// Forward muxed buffers into the frame channel, dropping when full.
    /// Headers pass even while forwarding is paused.
    fn attach_frame_sink(
        pipeline: &gstreamer::Pipeline,
        frames: FrameSender,
        forwarding: Arc<AtomicBool>,
    ) -> Result<()> {
        let sink = pipeline
            .by_name(ENCODED_SINK_NAME)
            .ok_or_else(|| {
                DomainError::PipelineCreationFailed("encoded sink not found".to_string())
            })?
            .downcast::<gstreamer_app::AppSink>()
            .map_err(|_| {
                DomainError::PipelineCreationFailed("encoded sink is not an appsink".to_string())
            })?;

        sink.set_callbacks(
            gstreamer_app::AppSinkCallbacks::builder()
                .new_sample(move |appsink| {
                    let sample = appsink
                        .pull_sample()
                        .map_err(|_| gstreamer::FlowError::Eos)?;
                    let buffer = sample.buffer().ok_or(gstreamer::FlowError::Error)?;
                    let map = buffer
                        .map_readable()
                        .map_err(|_| gstreamer::FlowError::Error)?;

                    let flags = buffer.flags();
                    let header = flags.contains(gstreamer::BufferFlags::HEADER);
                    if !header && !forwarding.load(Ordering::SeqCst) {
                        return Ok(gstreamer::FlowSuccess::Ok);
                    }

                    let mut frame = EncodedFrame::new(map.as_slice().to_vec())
                        .with_keyframe(!flags.contains(gstreamer::BufferFlags::DELTA_UNIT))
                        .with_header(header);
                    if let Some(pts) = buffer.pts() {
                        frame = frame.with_pts_us(pts.useconds());
                    }

                    if frames.try_send(frame).is_err() {
                        tracing::trace!("Frame queue full or closed, dropping encoded frame");
                    }

                    Ok(gstreamer::FlowSuccess::Ok)
                })
                .build(),
        );

        Ok(())
    }

    fn set_valves_open(&self, open: bool) {
        let Some(pipeline) = &self.pipeline else {
            return;
        };

        for name in [VIDEO_VALVE_NAME, AUDIO_VALVE_NAME] {
            if let Some(valve) = pipeline.by_name(name) {
                valve.set_property("drop", !open);
            }
        }
    }

    /// Rebuild a running pipeline after a structural change, keeping the
    /// streaming state
    fn relaunch(&mut self) -> bool {
        if self.pipeline.is_none() {
            return true;
        }

        let streaming = self.streaming;
        self.teardown();

        match self.launch() {
            Ok(()) => {
                if streaming {
                    self.set_valves_open(true);
                    self.streaming = true;
                }
                true
            }
            Err(e) => {
                tracing::error!("Failed to relaunch capture pipeline: {}", e);
                false
            }
        }
    }

    fn teardown(&mut self) {
        if let Some(mut monitor) = self.monitor.take() {
            monitor.stop();
        }
        if let Some(pipeline) = self.pipeline.take() {
            let _ = pipeline.set_state(gstreamer::State::Null);
        }
        self.streaming = false;
    }
}

impl MediaPipeline for GStreamerMediaPipeline {
    fn prepare_audio(&mut self) -> bool {
        if !Self::elements_available(PipelineBuilder::audio_elements()) {
            return false;
        }

        if self.with_audio {
            return true;
        }

        self.with_audio = true;
        self.relaunch()
    }

    fn prepare_video(&mut self, config: &VideoConfig) -> bool {
        if !Self::elements_available(PipelineBuilder::video_elements()) {
            return false;
        }

        if self.video == *config {
            return true;
        }

        self.video = *config;
        self.relaunch()
    }

    fn start_preview(&mut self) {
        if self.pipeline.is_some() {
            return;
        }

        match self.launch() {
            Ok(()) => tracing::info!(device = ?self.current_device(), "Preview started"),
            Err(e) => tracing::error!("Failed to start preview: {}", e),
        }
    }

    fn stop_preview(&mut self) {
        if self.pipeline.is_some() {
            tracing::info!("Preview stopped");
        }
        self.teardown();
    }

    fn switch_camera(&mut self) {
        let count = self.settings.devices.len();
        if count < 2 {
            tracing::warn!(devices = count, "No other camera to switch to");
            return;
        }

        self.device_index = (self.device_index + 1) % count;
        tracing::info!(device = ?self.current_device(), "Switching camera");
        self.relaunch();
    }

    fn set_bitrate(&mut self, bitrate: u32) {
        match self.video.with_bitrate(bitrate) {
            Ok(video) => self.video = video,
            Err(e) => {
                tracing::warn!("Ignoring bitrate change: {}", e);
                return;
            }
        }

        if let Some(encoder) = self
            .pipeline
            .as_ref()
            .and_then(|pipeline| pipeline.by_name(VIDEO_ENCODER_NAME))
        {
            encoder.set_property("bitrate", self.video.bitrate_kbps());
        }
    }

    fn start_stream(&mut self) {
        if self.pipeline.is_none() {
            tracing::warn!("Stream start requested without a running capture pipeline");
            return;
        }

        self.set_valves_open(true);
        self.streaming = true;
        tracing::info!("Encoded stream started");
    }

    fn stop_stream(&mut self) {
        if !self.streaming {
            return;
        }

        self.set_valves_open(false);
        self.streaming = false;
        self.forwarding.store(true, Ordering::SeqCst);
        tracing::info!("Encoded stream stopped");
    }

    fn pause_forwarding(&mut self) {
        if self.forwarding.swap(false, Ordering::SeqCst) {
            tracing::info!("Encoded frame forwarding paused");
        }
    }

    fn resume_forwarding(&mut self) {
        if !self.forwarding.swap(true, Ordering::SeqCst) {
            tracing::info!("Encoded frame forwarding resumed");
        }
    }

    fn is_streaming(&self) -> bool {
        self.streaming
    }
}

impl Drop for GStreamerMediaPipeline {
    fn drop(&mut self) {
        self.teardown();
    }
}
