use std::sync::Arc;

use uuid::Uuid;

use crate::domain::entities::PublishLifecycle;
use crate::domain::errors::{DomainError, Result};
use crate::domain::events::{RetryTicket, SessionEvent};
use crate::domain::ports::{
    MediaPipeline, MetricsReporter, PublishTransport, RetryHandle, RetryScheduler,
    SessionObserver,
};
use crate::domain::value_objects::{
    EncodedFrame, MediaKind, PublishFailure, PublishState, PublishUrl, SessionConfig,
    SessionSnapshot, VideoConfig,
};

/// Reason used when the server drops an established connection
pub const CONNECTION_CLOSED_REASON: &str = "connection closed by server";

/// Reason used when the server rejects the publish credentials
pub const AUTH_FAILED_REASON: &str = "authentication failed";

/// Collaborators a publish session drives
pub struct SessionPorts {
    pub media: Box<dyn MediaPipeline>,
    pub transport: Box<dyn PublishTransport>,
    pub scheduler: Box<dyn RetryScheduler>,
    pub observer: Arc<dyn SessionObserver>,
    pub metrics: Arc<dyn MetricsReporter>,
}

struct PendingRetry {
    ticket: RetryTicket,
    handle: Box<dyn RetryHandle>,
}

/// State machine coordinating capture surface, media pipeline and transport
/// into one publish lifecycle.
///
/// Every input is a plain method call; the caller is responsible for
/// serializing them (see `SessionRunner`).
pub struct PublishSession {
    id: String,
    media: Box<dyn MediaPipeline>,
    transport: Box<dyn PublishTransport>,
    scheduler: Box<dyn RetryScheduler>,
    observer: Arc<dyn SessionObserver>,
    metrics: Arc<dyn MetricsReporter>,
    lifecycle: PublishLifecycle,
    config: SessionConfig,
    target_url: Option<PublishUrl>,
    retry_count: u32,
    surface_ready: bool,
    stream_started: bool,
    connected: bool,
    resume_pending: bool,
    forwarding_paused: bool,
    stream_header: Vec<EncodedFrame>,
    header_closed: bool,
    pending_retry: Option<PendingRetry>,
    next_ticket: RetryTicket,
}

impl PublishSession {
    pub fn new(ports: SessionPorts, config: SessionConfig) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            media: ports.media,
            transport: ports.transport,
            scheduler: ports.scheduler,
            observer: ports.observer,
            metrics: ports.metrics,
            lifecycle: PublishLifecycle::new(),
            config,
            target_url: None,
            retry_count: 0,
            surface_ready: false,
            stream_started: false,
            connected: false,
            resume_pending: false,
            forwarding_paused: false,
            stream_header: Vec::new(),
            header_closed: false,
            pending_retry: None,
            next_ticket: RetryTicket::new(0),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> PublishState {
        *self.lifecycle.current_state()
    }

    pub fn lifecycle(&self) -> &PublishLifecycle {
        &self.lifecycle
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn video_config(&self) -> &VideoConfig {
        self.config.video()
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn target_url(&self) -> Option<&PublishUrl> {
        self.target_url.as_ref()
    }

    pub fn surface_ready(&self) -> bool {
        self.surface_ready
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn is_forwarding_paused(&self) -> bool {
        self.forwarding_paused
    }

    /// Header frames replayed to every new connection
    pub fn stream_header(&self) -> &[EncodedFrame] {
        &self.stream_header
    }

    pub fn has_pending_retry(&self) -> bool {
        self.pending_retry.is_some()
    }

    /// True only while publishing with a stream start issued
    pub fn is_streaming(&self) -> bool {
        self.state() == PublishState::Publishing && self.stream_started
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.id.clone(),
            state: self.state(),
            retry_count: self.retry_count,
            target_url: self.target_url.as_ref().map(|url| url.to_string()),
            surface_ready: self.surface_ready,
            streaming: self.is_streaming(),
            connected: self.connected,
            forwarding_paused: self.forwarding_paused,
            video: *self.config.video(),
        }
    }

    /// Single entry point for surface, transport and timer events
    pub fn handle_event(&mut self, event: SessionEvent) {
        tracing::trace!(session_id = %self.id, event = event.name(), "Handling session event");

        match event {
            SessionEvent::SurfaceCreated => self.on_surface_created(),
            SessionEvent::SurfaceChanged { width, height } => {
                self.on_surface_changed(width, height)
            }
            SessionEvent::SurfaceDestroyed => self.on_surface_destroyed(),
            SessionEvent::ConnectionSuccess => self.on_connection_success(),
            SessionEvent::ConnectionFailed(reason) => self.on_connection_failed(&reason),
            SessionEvent::BitrateUpdate(bitrate) => self.on_bitrate_update(bitrate),
            SessionEvent::Disconnect => self.on_disconnect(),
            SessionEvent::AuthError => self.on_auth_error(),
            SessionEvent::AuthSuccess => self.on_auth_success(),
            SessionEvent::RetryTimerFired(ticket) => self.on_retry_timer(ticket),
        }
    }

    /// Start publishing to `url` (use case)
    pub fn request_publish(&mut self, url: &str) -> Result<()> {
        let url = PublishUrl::parse(url)?;

        if !self.surface_ready {
            return Err(DomainError::InvalidState(
                "capture surface is not ready".to_string(),
            ));
        }

        let state = self.state();
        if !state.accepts_publish_request() {
            return Err(DomainError::InvalidState(format!(
                "cannot publish while {}",
                state
            )));
        }

        tracing::info!(session_id = %self.id, url = %url, "Publish requested");
        self.begin_publish(url)
    }

    /// Stop any publish attempt. Safe to call from every state.
    pub fn stop(&mut self) {
        match self.state() {
            PublishState::Publishing | PublishState::Retrying { .. } => {
                tracing::info!(session_id = %self.id, "Stopping publish");
                self.end_publish();
                self.retry_count = 0;
                self.resume_pending = false;
                self.settle("stopped by user");
            }
            PublishState::Stopped => {
                self.retry_count = 0;
                self.settle("stopped by user");
            }
            PublishState::Idle | PublishState::PreviewOnly => {
                // Also withdraws a resume left behind by a lost surface
                if std::mem::take(&mut self.resume_pending) {
                    tracing::info!(session_id = %self.id, "Pending resume cancelled");
                } else {
                    tracing::debug!(session_id = %self.id, state = %self.state(), "Stop ignored, nothing to stop");
                }
                self.retry_count = 0;
            }
        }
    }

    pub fn on_surface_created(&mut self) {
        if self.surface_ready {
            tracing::warn!(session_id = %self.id, "Surface created while one is attached, ignoring");
            return;
        }

        self.surface_ready = true;
        self.media.start_preview();
        self.lifecycle
            .transition_to_preview(Some("surface created".to_string()));
        self.report_state();

        let interrupted = std::mem::take(&mut self.resume_pending);
        if !self
            .config
            .resume()
            .should_resume(self.target_url.is_some(), interrupted)
        {
            return;
        }

        if let Some(url) = self.target_url.clone() {
            tracing::info!(session_id = %self.id, url = %url, "Resuming publish on recreated surface");
            if let Err(e) = self.begin_publish(url) {
                tracing::warn!(session_id = %self.id, error = %e, "Resume failed");
                if let DomainError::PrepareFailed(media) = e {
                    self.report_failure(&PublishFailure::Prepare { media });
                }
            }
        }
    }

    pub fn on_surface_changed(&mut self, width: u32, height: u32) {
        tracing::debug!(session_id = %self.id, width, height, "Surface changed");
    }

    /// Stream is stopped before the preview is released
    pub fn on_surface_destroyed(&mut self) {
        if !self.surface_ready {
            tracing::debug!(session_id = %self.id, "Surface destroyed without one attached, ignoring");
            return;
        }

        if self.state().is_active() {
            self.end_publish();
            self.retry_count = 0;
            self.resume_pending = true;
        }

        self.media.stop_preview();
        self.surface_ready = false;
        self.lifecycle
            .transition_to_idle(Some("surface destroyed".to_string()));
        self.report_state();
    }

    pub fn on_connection_success(&mut self) {
        if self.state() != PublishState::Publishing {
            tracing::debug!(session_id = %self.id, state = %self.state(), "Stale connection success ignored");
            return;
        }

        self.retry_count = 0;
        self.connected = true;
        self.lifecycle.mark_connected();
        self.metrics.report_connection_state(true);

        tracing::info!(session_id = %self.id, "Connected to media server");
        self.observer.on_connected();
    }

    /// Retry decision entry point
    pub fn on_connection_failed(&mut self, reason: &str) {
        if !self.state().is_active() {
            tracing::debug!(session_id = %self.id, reason, "Stale connection failure ignored");
            return;
        }

        if self.connected {
            self.connected = false;
            self.metrics.report_connection_state(false);
        }

        let retryable = self.transport.is_reason_retryable(reason);
        if !retryable {
            self.fail_publish(PublishFailure::Rejected {
                reason: reason.to_string(),
            });
        } else if self.config.retry().allows_retry(self.retry_count) {
            self.schedule_retry(reason);
        } else {
            self.fail_publish(PublishFailure::RetriesExhausted {
                attempts: self.retry_count,
                reason: reason.to_string(),
            });
        }
    }

    pub fn on_retry_timer(&mut self, ticket: RetryTicket) {
        let expected = matches!(&self.pending_retry, Some(pending) if pending.ticket == ticket);
        if !expected || !matches!(self.state(), PublishState::Retrying { .. }) {
            tracing::debug!(session_id = %self.id, ticket = ticket.value(), "Stale retry timer ignored");
            return;
        }

        self.pending_retry = None;

        let Some(url) = self.target_url.clone() else {
            self.fail_publish(PublishFailure::Rejected {
                reason: "no publish target".to_string(),
            });
            return;
        };

        tracing::info!(session_id = %self.id, attempt = self.retry_count, url = %url, "Retrying connection");
        self.lifecycle.transition_to_publishing();
        self.report_state();
        self.connect_transport(&url);
    }

    pub fn on_bitrate_update(&mut self, bitrate: u64) {
        self.metrics.report_bitrate(bitrate);
        self.observer.on_bitrate_update(bitrate);
    }

    /// An established connection dropping counts as a connection failure
    pub fn on_disconnect(&mut self) {
        if self.state() == PublishState::Publishing && self.connected {
            tracing::warn!(session_id = %self.id, "Server closed the connection");
            self.on_connection_failed(CONNECTION_CLOSED_REASON);
        } else {
            tracing::debug!(session_id = %self.id, state = %self.state(), "Transport disconnect ignored");
        }
    }

    pub fn on_auth_error(&mut self) {
        if !self.state().is_active() {
            tracing::debug!(session_id = %self.id, "Stale auth error ignored");
            return;
        }

        self.fail_publish(PublishFailure::Rejected {
            reason: AUTH_FAILED_REASON.to_string(),
        });
    }

    pub fn on_auth_success(&mut self) {
        tracing::info!(session_id = %self.id, "Publish credentials accepted");
    }

    /// Forward an encoded frame while publishing; dropped otherwise.
    ///
    /// Frames go out before the connection is confirmed because the sink only
    /// connects once media reaches it. Header frames are remembered in every
    /// state so a later connection can be primed with them.
    pub fn on_frame(&mut self, frame: EncodedFrame) {
        if frame.is_header() {
            self.remember_header(&frame);
        } else {
            self.header_closed = true;
        }

        if self.state() != PublishState::Publishing {
            return;
        }

        let bytes = frame.len();
        match self.transport.send_frame(frame) {
            Ok(()) => self.metrics.report_frame_sent(bytes),
            Err(e) => tracing::debug!(session_id = %self.id, error = %e, "Dropping frame"),
        }

        if let Some(uptime) = self.lifecycle.uptime() {
            self.metrics.report_uptime(uptime.as_secs_f64());
        }
    }

    pub fn switch_camera(&mut self) -> Result<()> {
        if !self.surface_ready {
            return Err(DomainError::InvalidState(
                "cannot switch camera without a capture surface".to_string(),
            ));
        }

        self.media.switch_camera();
        Ok(())
    }

    /// Hold encoded frames back while staying connected
    pub fn pause_forwarding(&mut self) -> Result<()> {
        self.ensure_publishing("pause forwarding")?;

        if !self.forwarding_paused {
            self.forwarding_paused = true;
            self.media.pause_forwarding();
            tracing::info!(session_id = %self.id, "Frame forwarding paused");
        }
        Ok(())
    }

    pub fn resume_forwarding(&mut self) -> Result<()> {
        self.ensure_publishing("resume forwarding")?;

        if self.forwarding_paused {
            self.forwarding_paused = false;
            self.media.resume_forwarding();
            tracing::info!(session_id = %self.id, "Frame forwarding resumed");
        }
        Ok(())
    }

    /// The only way to change the video config after construction
    pub fn set_bitrate(&mut self, bitrate: u32) -> Result<()> {
        let video = self.config.video().with_bitrate(bitrate)?;
        self.config = std::mem::take(&mut self.config).with_video(video);
        self.media.set_bitrate(bitrate);

        tracing::info!(session_id = %self.id, bitrate, "Video bitrate updated");
        Ok(())
    }

    /// Permanent teardown: stop publishing and release the surface
    pub fn shutdown(&mut self) {
        self.stop();
        self.on_surface_destroyed();
        self.resume_pending = false;
        tracing::info!(session_id = %self.id, "Publish session shut down");
    }

    fn begin_publish(&mut self, url: PublishUrl) -> Result<()> {
        if !self.media.prepare_audio() {
            return Err(DomainError::PrepareFailed(MediaKind::Audio));
        }

        if !self.media.prepare_video(self.config.video()) {
            return Err(DomainError::PrepareFailed(MediaKind::Video));
        }

        self.target_url = Some(url.clone());
        self.retry_count = 0;
        self.connected = false;

        self.media.start_stream();
        self.stream_started = true;
        self.lifecycle.transition_to_publishing();
        self.report_state();

        self.connect_transport(&url);
        Ok(())
    }

    /// Connect and prime the new connection with the cached stream header
    fn connect_transport(&mut self, url: &PublishUrl) {
        self.transport.connect(url);

        for frame in &self.stream_header {
            if let Err(e) = self.transport.send_frame(frame.clone()) {
                tracing::debug!(session_id = %self.id, error = %e, "Stream header not replayed");
                break;
            }
        }
    }

    /// A header arriving after payload starts a new header set
    fn remember_header(&mut self, frame: &EncodedFrame) {
        if std::mem::take(&mut self.header_closed) {
            self.stream_header.clear();
        }
        self.stream_header.push(frame.clone());
    }

    fn ensure_publishing(&self, action: &str) -> Result<()> {
        let state = self.state();
        if !state.is_active() {
            return Err(DomainError::InvalidState(format!(
                "cannot {} while {}",
                action, state
            )));
        }
        Ok(())
    }

    fn schedule_retry(&mut self, reason: &str) {
        self.cancel_pending_retry();

        self.retry_count += 1;
        let attempt = self.retry_count;
        let delay = self.config.retry().delay_for_attempt(attempt);

        let ticket = self.next_ticket;
        self.next_ticket = ticket.next();
        let handle = self.scheduler.schedule(delay, ticket);
        self.pending_retry = Some(PendingRetry { ticket, handle });

        tracing::info!(
            session_id = %self.id,
            attempt,
            max_attempts = self.config.retry().max_attempts(),
            delay_ms = delay.as_millis() as u64,
            reason,
            "Connection failed, retry scheduled"
        );

        self.metrics.report_retry_attempt();
        self.metrics.report_retry_delay(delay.as_secs_f64());
        self.lifecycle
            .transition_to_retrying(attempt, Some(reason.to_string()));
        self.report_state();
    }

    fn fail_publish(&mut self, failure: PublishFailure) {
        tracing::warn!(session_id = %self.id, failure = %failure, "Publish failed");

        self.end_publish();
        self.resume_pending = false;
        self.lifecycle.transition_to_stopped(Some(failure.to_string()));
        self.report_state();
        self.report_failure(&failure);
    }

    /// Cancel the retry, stop the stream, then disconnect
    fn end_publish(&mut self) {
        self.cancel_pending_retry();

        if self.stream_started {
            self.media.stop_stream();
            self.stream_started = false;
        }
        self.forwarding_paused = false;

        self.transport.disconnect();

        if self.connected {
            self.connected = false;
            self.metrics.report_connection_state(false);
        }
    }

    fn cancel_pending_retry(&mut self) {
        if let Some(mut pending) = self.pending_retry.take() {
            tracing::debug!(session_id = %self.id, ticket = pending.ticket.value(), "Cancelling pending retry");
            pending.handle.cancel();
        }
    }

    /// Land in PreviewOnly, or Idle when no surface is attached
    fn settle(&mut self, reason: &str) {
        if self.surface_ready {
            self.lifecycle.transition_to_preview(Some(reason.to_string()));
        } else {
            self.lifecycle.transition_to_idle(Some(reason.to_string()));
        }
        self.report_state();
    }

    fn report_state(&self) {
        let state = self.state();
        tracing::info!(session_id = %self.id, state = %state, "Publish state changed");
        self.metrics.report_state_change(&state);
        self.observer.on_state_changed(&state);
    }

    fn report_failure(&self, failure: &PublishFailure) {
        self.metrics.report_publish_failure();
        self.observer.on_publish_failed(failure);
    }
}
