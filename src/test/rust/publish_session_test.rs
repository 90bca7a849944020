use std::sync::{Arc, Mutex};
use std::time::Duration;

use pipeline_rtmp_publish::infrastructure::gstreamer::rtmp_failure;
use pipeline_rtmp_publish::{
    frame_channel, session_event_channel, DomainError, EncodedFrame, MediaKind, MediaPipeline,
    MetricsReporter, PipelineBuilder, PublishFailure, PublishSession, PublishState,
    PublishTransport, PublishUrl, ResumePolicy, RetryHandle, RetryPolicy, RetryScheduler,
    RetryTicket, SessionConfig, SessionEvent, SessionObserver, SessionPorts, SessionRunner,
    TokioRetryScheduler, VideoConfig,
};

const URL: &str = "rtmp://media.example.com/live/cam1";

#[derive(Debug, Clone, PartialEq)]
enum Call {
    PrepareAudio,
    PrepareVideo(VideoConfig),
    StartPreview,
    StopPreview,
    SwitchCamera,
    SetBitrate(u32),
    StartStream,
    StopStream,
    PauseForwarding,
    ResumeForwarding,
    Connect(String),
    Disconnect,
    SendFrame(usize),
    Schedule(Duration, RetryTicket),
    CancelRetry(RetryTicket),
}

type CallLog = Arc<Mutex<Vec<Call>>>;

fn record(log: &CallLog, call: Call) {
    log.lock().unwrap().push(call);
}

struct FakeMedia {
    log: CallLog,
    audio_ok: bool,
    video_ok: bool,
    streaming: bool,
}

impl MediaPipeline for FakeMedia {
    fn prepare_audio(&mut self) -> bool {
        record(&self.log, Call::PrepareAudio);
        self.audio_ok
    }

    fn prepare_video(&mut self, config: &VideoConfig) -> bool {
        record(&self.log, Call::PrepareVideo(*config));
        self.video_ok
    }

    fn start_preview(&mut self) {
        record(&self.log, Call::StartPreview);
    }

    fn stop_preview(&mut self) {
        record(&self.log, Call::StopPreview);
    }

    fn switch_camera(&mut self) {
        record(&self.log, Call::SwitchCamera);
    }

    fn set_bitrate(&mut self, bitrate: u32) {
        record(&self.log, Call::SetBitrate(bitrate));
    }

    fn start_stream(&mut self) {
        self.streaming = true;
        record(&self.log, Call::StartStream);
    }

    fn stop_stream(&mut self) {
        self.streaming = false;
        record(&self.log, Call::StopStream);
    }

    fn pause_forwarding(&mut self) {
        record(&self.log, Call::PauseForwarding);
    }

    fn resume_forwarding(&mut self) {
        record(&self.log, Call::ResumeForwarding);
    }

    fn is_streaming(&self) -> bool {
        self.streaming
    }
}

struct FakeTransport {
    log: CallLog,
    retryable: fn(&str) -> bool,
}

impl PublishTransport for FakeTransport {
    fn connect(&mut self, url: &PublishUrl) {
        record(&self.log, Call::Connect(url.as_str().to_string()));
    }

    fn disconnect(&mut self) {
        record(&self.log, Call::Disconnect);
    }

    fn send_frame(&mut self, frame: EncodedFrame) -> pipeline_rtmp_publish::Result<()> {
        record(&self.log, Call::SendFrame(frame.len()));
        Ok(())
    }

    fn is_reason_retryable(&self, reason: &str) -> bool {
        (self.retryable)(reason)
    }
}

struct FakeScheduler {
    log: CallLog,
}

struct FakeHandle {
    log: CallLog,
    ticket: RetryTicket,
}

impl RetryScheduler for FakeScheduler {
    fn schedule(&mut self, delay: Duration, ticket: RetryTicket) -> Box<dyn RetryHandle> {
        record(&self.log, Call::Schedule(delay, ticket));
        Box::new(FakeHandle {
            log: self.log.clone(),
            ticket,
        })
    }
}

impl RetryHandle for FakeHandle {
    fn cancel(&mut self) {
        record(&self.log, Call::CancelRetry(self.ticket));
    }
}

#[derive(Default)]
struct RecordingObserver {
    states: Mutex<Vec<PublishState>>,
    failures: Mutex<Vec<PublishFailure>>,
    connected: Mutex<u32>,
}

impl SessionObserver for RecordingObserver {
    fn on_state_changed(&self, state: &PublishState) {
        self.states.lock().unwrap().push(*state);
    }

    fn on_publish_failed(&self, failure: &PublishFailure) {
        self.failures.lock().unwrap().push(failure.clone());
    }

    fn on_connected(&self) {
        *self.connected.lock().unwrap() += 1;
    }
}

#[derive(Default)]
struct RecordingMetrics {
    retries: Mutex<u32>,
    frames: Mutex<Vec<usize>>,
    failures: Mutex<u32>,
}

impl MetricsReporter for RecordingMetrics {
    fn report_state_change(&self, _state: &PublishState) {}

    fn report_retry_attempt(&self) {
        *self.retries.lock().unwrap() += 1;
    }

    fn report_retry_delay(&self, _delay_secs: f64) {}

    fn report_connection_state(&self, _connected: bool) {}

    fn report_bitrate(&self, _bitrate: u64) {}

    fn report_frame_sent(&self, bytes: usize) {
        self.frames.lock().unwrap().push(bytes);
    }

    fn report_publish_failure(&self) {
        *self.failures.lock().unwrap() += 1;
    }

    fn report_uptime(&self, _uptime_secs: f64) {}
}

fn default_retryable(reason: &str) -> bool {
    !reason.contains("auth")
}

struct Harness {
    session: PublishSession,
    log: CallLog,
    observer: Arc<RecordingObserver>,
    metrics: Arc<RecordingMetrics>,
}

struct HarnessOptions {
    config: SessionConfig,
    audio_ok: bool,
    video_ok: bool,
    retryable: fn(&str) -> bool,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            config: SessionConfig::default(),
            audio_ok: true,
            video_ok: true,
            retryable: default_retryable,
        }
    }
}

fn ports(options: &HarnessOptions, log: &CallLog) -> (SessionPorts, Arc<RecordingObserver>, Arc<RecordingMetrics>) {
    let observer = Arc::new(RecordingObserver::default());
    let metrics = Arc::new(RecordingMetrics::default());

    let ports = SessionPorts {
        media: Box::new(FakeMedia {
            log: log.clone(),
            audio_ok: options.audio_ok,
            video_ok: options.video_ok,
            streaming: false,
        }),
        transport: Box::new(FakeTransport {
            log: log.clone(),
            retryable: options.retryable,
        }),
        scheduler: Box::new(FakeScheduler { log: log.clone() }),
        observer: observer.clone(),
        metrics: metrics.clone(),
    };

    (ports, observer, metrics)
}

fn harness_with(options: HarnessOptions) -> Harness {
    let log: CallLog = Arc::new(Mutex::new(Vec::new()));
    let (ports, observer, metrics) = ports(&options, &log);

    Harness {
        session: PublishSession::new(ports, options.config),
        log,
        observer,
        metrics,
    }
}

fn harness() -> Harness {
    harness_with(HarnessOptions::default())
}

impl Harness {
    fn calls(&self) -> Vec<Call> {
        self.log.lock().unwrap().clone()
    }

    fn count(&self, call: &Call) -> usize {
        self.calls().iter().filter(|c| *c == call).count()
    }

    fn scheduled(&self) -> Vec<(Duration, RetryTicket)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Schedule(delay, ticket) => Some((delay, ticket)),
                _ => None,
            })
            .collect()
    }

    fn clear(&self) {
        self.log.lock().unwrap().clear();
    }

    fn failures(&self) -> Vec<PublishFailure> {
        self.observer.failures.lock().unwrap().clone()
    }

    fn publishing(mut self) -> Self {
        self.session.handle_event(SessionEvent::SurfaceCreated);
        self.session.request_publish(URL).unwrap();
        self
    }

    fn connected(mut self) -> Self {
        self = self.publishing();
        self.session.handle_event(SessionEvent::ConnectionSuccess);
        self
    }

    fn fail(&mut self, reason: &str) {
        self.session
            .handle_event(SessionEvent::ConnectionFailed(reason.to_string()));
    }

    /// Fire the most recently scheduled retry
    fn fire_retry(&mut self) {
        let (_, ticket) = *self.scheduled().last().unwrap();
        self.session.handle_event(SessionEvent::RetryTimerFired(ticket));
    }
}

#[test]
fn test_gstreamer_init() {
    assert!(gstreamer::init().is_ok());
}

#[test]
fn test_new_session_is_idle() {
    let h = harness();

    assert_eq!(h.session.state(), PublishState::Idle);
    assert_eq!(h.session.retry_count(), 0);
    assert!(!h.session.is_streaming());
    assert!(h.session.target_url().is_none());
    assert!(h.calls().is_empty());
}

#[test]
fn test_surface_created_starts_preview() {
    let mut h = harness();
    h.session.handle_event(SessionEvent::SurfaceCreated);

    assert_eq!(h.session.state(), PublishState::PreviewOnly);
    assert!(h.session.surface_ready());
    assert_eq!(h.calls(), vec![Call::StartPreview]);
}

#[test]
fn test_request_publish_starts_stream_and_connects() {
    let h = harness().publishing();

    assert_eq!(h.session.state(), PublishState::Publishing);
    assert!(h.session.is_streaming());
    assert_eq!(h.count(&Call::StartStream), 1);
    assert_eq!(h.session.target_url().unwrap().as_str(), URL);
    assert_eq!(
        h.calls(),
        vec![
            Call::StartPreview,
            Call::PrepareAudio,
            Call::PrepareVideo(VideoConfig::default()),
            Call::StartStream,
            Call::Connect(URL.to_string()),
        ]
    );
}

#[test]
fn test_request_publish_requires_surface() {
    let mut h = harness();

    let err = h.session.request_publish(URL).unwrap_err();
    assert!(err.is_invalid_state());
    assert_eq!(h.session.state(), PublishState::Idle);
    assert!(h.calls().is_empty());
}

#[test]
fn test_request_publish_rejects_bad_url() {
    let mut h = harness();
    h.session.handle_event(SessionEvent::SurfaceCreated);

    let err = h.session.request_publish("http://example.com/live").unwrap_err();
    assert!(matches!(err, DomainError::InvalidPublishUrl(_)));
    assert_eq!(h.session.state(), PublishState::PreviewOnly);
}

#[test]
fn test_request_publish_while_active_is_rejected() {
    let mut h = harness().publishing();

    let err = h.session.request_publish(URL).unwrap_err();
    assert!(err.is_invalid_state());
    assert_eq!(h.count(&Call::StartStream), 1);
}

#[test]
fn test_prepare_failure_leaves_state_unchanged() {
    let mut h = harness_with(HarnessOptions {
        audio_ok: false,
        ..Default::default()
    });
    h.session.handle_event(SessionEvent::SurfaceCreated);

    let err = h.session.request_publish(URL).unwrap_err();
    assert!(matches!(err, DomainError::PrepareFailed(MediaKind::Audio)));
    assert!(err.to_string().starts_with("Invalid state"));
    assert_eq!(h.session.state(), PublishState::PreviewOnly);
    assert!(h.session.target_url().is_none());
    assert_eq!(h.count(&Call::StartStream), 0);

    let mut h = harness_with(HarnessOptions {
        video_ok: false,
        ..Default::default()
    });
    h.session.handle_event(SessionEvent::SurfaceCreated);

    let err = h.session.request_publish(URL).unwrap_err();
    assert!(matches!(err, DomainError::PrepareFailed(MediaKind::Video)));
    assert_eq!(h.session.state(), PublishState::PreviewOnly);
}

#[test]
fn test_retryable_failure_schedules_retry() {
    let mut h = harness().publishing();
    h.fail("timeout");

    assert_eq!(h.session.state(), PublishState::Retrying { attempt: 1 });
    assert_eq!(h.session.retry_count(), 1);
    assert!(h.session.has_pending_retry());
    assert!(!h.session.is_streaming());

    let scheduled = h.scheduled();
    assert_eq!(scheduled.len(), 1);
    assert_eq!(scheduled[0].0, Duration::from_millis(5000));
    assert_eq!(*h.metrics.retries.lock().unwrap(), 1);
}

#[test]
fn test_retry_timer_reconnects() {
    let mut h = harness().publishing();
    h.fail("timeout");
    h.clear();

    h.fire_retry();

    assert_eq!(h.session.state(), PublishState::Publishing);
    assert_eq!(h.session.retry_count(), 1);
    assert!(!h.session.has_pending_retry());
    assert_eq!(h.calls(), vec![Call::Connect(URL.to_string())]);
}

#[test]
fn test_connection_success_resets_retry_count() {
    let mut h = harness().publishing();
    h.fail("timeout");
    h.fire_retry();
    h.session.handle_event(SessionEvent::ConnectionSuccess);

    assert_eq!(h.session.retry_count(), 0);
    assert!(h.session.is_connected());
    assert_eq!(*h.observer.connected.lock().unwrap(), 1);
}

#[test]
fn test_retry_budget_exhaustion_reports_failure() {
    let mut h = harness().publishing();

    for attempt in 1..=10 {
        h.fail("timeout");
        assert_eq!(h.session.retry_count(), attempt);
        assert_eq!(h.session.state(), PublishState::Retrying { attempt });
        h.fire_retry();
    }

    h.fail("timeout");

    assert_eq!(h.session.state(), PublishState::Stopped);
    assert_eq!(h.scheduled().len(), 10);
    assert!(!h.session.has_pending_retry());
    assert_eq!(
        h.failures(),
        vec![PublishFailure::RetriesExhausted {
            attempts: 10,
            reason: "timeout".to_string(),
        }]
    );
    assert_eq!(*h.metrics.failures.lock().unwrap(), 1);
}

#[test]
fn test_failure_while_retrying_at_budget_stops() {
    let mut h = harness().publishing();
    for _ in 0..10 {
        h.fail("timeout");
    }
    assert_eq!(h.session.retry_count(), 10);
    assert_eq!(h.session.state(), PublishState::Retrying { attempt: 10 });

    h.fail("timeout");

    assert_eq!(h.session.state(), PublishState::Stopped);
    assert_eq!(h.scheduled().len(), 10);
    assert_eq!(h.failures().len(), 1);
}

#[test]
fn test_non_retryable_failure_stops_immediately() {
    let mut h = harness().publishing();
    h.fail("timeout");
    h.fire_retry();
    h.clear();

    h.fail("bad auth");

    assert_eq!(h.session.state(), PublishState::Stopped);
    assert_eq!(h.session.retry_count(), 1);
    assert!(h.scheduled().is_empty());
    assert_eq!(h.calls(), vec![Call::StopStream, Call::Disconnect]);
    assert_eq!(
        h.failures(),
        vec![PublishFailure::Rejected {
            reason: "bad auth".to_string(),
        }]
    );
}

#[test]
fn test_stopped_session_can_publish_again() {
    let mut h = harness().publishing();
    h.fail("bad auth");
    assert_eq!(h.session.state(), PublishState::Stopped);

    h.session.request_publish(URL).unwrap();

    assert_eq!(h.session.state(), PublishState::Publishing);
    assert_eq!(h.count(&Call::StartStream), 2);
}

#[test]
fn test_stop_from_each_state() {
    let mut h = harness();
    h.session.handle_event(SessionEvent::SurfaceCreated);
    h.session.stop();
    assert_eq!(h.session.state(), PublishState::PreviewOnly);
    assert_eq!(h.count(&Call::Disconnect), 0);

    let mut h = harness().publishing();
    h.session.stop();
    assert_eq!(h.session.state(), PublishState::PreviewOnly);
    assert_eq!(h.count(&Call::Disconnect), 1);

    let mut h = harness().publishing();
    h.fail("timeout");
    let (_, ticket) = h.scheduled()[0];
    h.session.stop();
    assert_eq!(h.session.state(), PublishState::PreviewOnly);
    assert_eq!(h.session.retry_count(), 0);
    assert_eq!(h.count(&Call::Disconnect), 1);
    assert_eq!(h.count(&Call::CancelRetry(ticket)), 1);
    assert!(!h.session.has_pending_retry());
}

#[test]
fn test_stop_is_idempotent() {
    let mut h = harness().connected();

    h.session.stop();
    let after_first = h.session.snapshot();
    h.session.stop();

    assert_eq!(h.session.snapshot(), after_first);
    assert_eq!(h.count(&Call::Disconnect), 1);
    assert_eq!(h.count(&Call::StopStream), 1);
}

#[test]
fn test_stale_retry_timer_is_ignored() {
    let mut h = harness().publishing();
    h.fail("timeout");
    let (_, ticket) = h.scheduled()[0];
    h.session.stop();
    h.clear();

    h.session.handle_event(SessionEvent::RetryTimerFired(ticket));

    assert_eq!(h.session.state(), PublishState::PreviewOnly);
    assert!(h.calls().is_empty());
}

#[test]
fn test_retry_timer_from_superseded_ticket_is_ignored() {
    let mut h = harness().publishing();
    h.fail("timeout");
    let (_, first) = h.scheduled()[0];
    h.fail("timeout");
    let (_, second) = h.scheduled()[1];
    assert_ne!(first, second);
    assert_eq!(h.count(&Call::CancelRetry(first)), 1);
    h.clear();

    h.session.handle_event(SessionEvent::RetryTimerFired(first));
    assert!(h.calls().is_empty());

    h.session.handle_event(SessionEvent::RetryTimerFired(second));
    assert_eq!(h.calls(), vec![Call::Connect(URL.to_string())]);
}

#[test]
fn test_surface_destroyed_stops_stream_before_preview() {
    let mut h = harness().connected();
    h.clear();

    h.session.handle_event(SessionEvent::SurfaceDestroyed);

    assert_eq!(h.session.state(), PublishState::Idle);
    assert_eq!(
        h.calls(),
        vec![Call::StopStream, Call::Disconnect, Call::StopPreview]
    );
    assert_eq!(h.session.target_url().unwrap().as_str(), URL);
    assert!(!h.session.is_connected());
}

#[test]
fn test_surface_destroyed_while_retrying_cancels_retry() {
    let mut h = harness().publishing();
    h.fail("timeout");
    let (_, ticket) = h.scheduled()[0];

    h.session.handle_event(SessionEvent::SurfaceDestroyed);

    assert_eq!(h.session.state(), PublishState::Idle);
    assert_eq!(h.count(&Call::CancelRetry(ticket)), 1);

    h.clear();
    h.session.handle_event(SessionEvent::RetryTimerFired(ticket));
    assert!(h.calls().is_empty());
    assert_eq!(h.session.state(), PublishState::Idle);
}

#[test]
fn test_surface_recreated_resumes_publish() {
    let mut h = harness().connected();
    h.session.handle_event(SessionEvent::SurfaceDestroyed);
    h.clear();

    h.session.handle_event(SessionEvent::SurfaceCreated);

    assert_eq!(h.session.state(), PublishState::Publishing);
    assert_eq!(h.session.target_url().unwrap().as_str(), URL);
    assert_eq!(
        h.calls(),
        vec![
            Call::StartPreview,
            Call::PrepareAudio,
            Call::PrepareVideo(VideoConfig::default()),
            Call::StartStream,
            Call::Connect(URL.to_string()),
        ]
    );
}

#[test]
fn test_no_stream_start_without_surface() {
    let mut h = harness().connected();
    h.session.handle_event(SessionEvent::SurfaceDestroyed);
    h.clear();

    h.fail("timeout");
    h.session.handle_event(SessionEvent::ConnectionSuccess);
    h.session.handle_event(SessionEvent::Disconnect);

    assert_eq!(h.session.state(), PublishState::Idle);
    assert_eq!(h.count(&Call::StartStream), 0);
    assert!(h.scheduled().is_empty());
}

#[test]
fn test_resume_policy_never() {
    let mut h = harness_with(HarnessOptions {
        config: SessionConfig::default().with_resume(ResumePolicy::Never),
        ..Default::default()
    })
    .connected();
    h.session.handle_event(SessionEvent::SurfaceDestroyed);
    h.session.handle_event(SessionEvent::SurfaceCreated);

    assert_eq!(h.session.state(), PublishState::PreviewOnly);
    assert_eq!(h.count(&Call::StartStream), 1);
}

#[test]
fn test_resume_after_stop_depends_on_policy() {
    // Default policy: a user stop is not an interruption
    let mut h = harness().connected();
    h.session.stop();
    h.session.handle_event(SessionEvent::SurfaceDestroyed);
    h.session.handle_event(SessionEvent::SurfaceCreated);
    assert_eq!(h.session.state(), PublishState::PreviewOnly);

    let mut h = harness_with(HarnessOptions {
        config: SessionConfig::default().with_resume(ResumePolicy::Always),
        ..Default::default()
    })
    .connected();
    h.session.stop();
    h.session.handle_event(SessionEvent::SurfaceDestroyed);
    h.session.handle_event(SessionEvent::SurfaceCreated);
    assert_eq!(h.session.state(), PublishState::Publishing);
}

#[test]
fn test_stop_while_surface_lost_cancels_resume() {
    let mut h = harness().connected();
    h.session.handle_event(SessionEvent::SurfaceDestroyed);
    assert_eq!(h.session.state(), PublishState::Idle);

    h.session.stop();
    h.clear();
    h.session.handle_event(SessionEvent::SurfaceCreated);

    assert_eq!(h.session.state(), PublishState::PreviewOnly);
    assert_eq!(h.calls(), vec![Call::StartPreview]);
    assert_eq!(h.session.target_url().unwrap().as_str(), URL);

    // Always still resumes whenever a target is known
    let mut h = harness_with(HarnessOptions {
        config: SessionConfig::default().with_resume(ResumePolicy::Always),
        ..Default::default()
    })
    .connected();
    h.session.handle_event(SessionEvent::SurfaceDestroyed);
    h.session.stop();
    h.session.handle_event(SessionEvent::SurfaceCreated);
    assert_eq!(h.session.state(), PublishState::Publishing);
}

#[test]
fn test_resume_prepare_failure_is_reported() {
    let log: CallLog = Arc::new(Mutex::new(Vec::new()));
    let observer = Arc::new(RecordingObserver::default());
    let media_ok = Arc::new(Mutex::new(true));

    struct FlakyMedia {
        inner: FakeMedia,
        ok: Arc<Mutex<bool>>,
    }

    impl MediaPipeline for FlakyMedia {
        fn prepare_audio(&mut self) -> bool {
            self.inner.prepare_audio() && *self.ok.lock().unwrap()
        }
        fn prepare_video(&mut self, config: &VideoConfig) -> bool {
            self.inner.prepare_video(config)
        }
        fn start_preview(&mut self) {
            self.inner.start_preview()
        }
        fn stop_preview(&mut self) {
            self.inner.stop_preview()
        }
        fn switch_camera(&mut self) {
            self.inner.switch_camera()
        }
        fn set_bitrate(&mut self, bitrate: u32) {
            self.inner.set_bitrate(bitrate)
        }
        fn start_stream(&mut self) {
            self.inner.start_stream()
        }
        fn stop_stream(&mut self) {
            self.inner.stop_stream()
        }
        fn pause_forwarding(&mut self) {
            self.inner.pause_forwarding()
        }
        fn resume_forwarding(&mut self) {
            self.inner.resume_forwarding()
        }
        fn is_streaming(&self) -> bool {
            self.inner.is_streaming()
        }
    }

    let ports = SessionPorts {
        media: Box::new(FlakyMedia {
            inner: FakeMedia {
                log: log.clone(),
                audio_ok: true,
                video_ok: true,
                streaming: false,
            },
            ok: media_ok.clone(),
        }),
        transport: Box::new(FakeTransport {
            log: log.clone(),
            retryable: default_retryable,
        }),
        scheduler: Box::new(FakeScheduler { log: log.clone() }),
        observer: observer.clone(),
        metrics: Arc::new(RecordingMetrics::default()),
    };
    let mut session = PublishSession::new(ports, SessionConfig::default());

    session.handle_event(SessionEvent::SurfaceCreated);
    session.request_publish(URL).unwrap();
    session.handle_event(SessionEvent::SurfaceDestroyed);

    *media_ok.lock().unwrap() = false;
    session.handle_event(SessionEvent::SurfaceCreated);

    assert_eq!(session.state(), PublishState::PreviewOnly);
    assert_eq!(
        *observer.failures.lock().unwrap(),
        vec![PublishFailure::Prepare {
            media: MediaKind::Audio
        }]
    );
}

#[test]
fn test_server_disconnect_is_retried() {
    let mut h = harness().connected();

    h.session.handle_event(SessionEvent::Disconnect);

    assert_eq!(h.session.state(), PublishState::Retrying { attempt: 1 });
    assert!(!h.session.is_connected());
    assert_eq!(h.scheduled().len(), 1);
}

#[test]
fn test_disconnect_before_connected_is_ignored() {
    let mut h = harness().publishing();

    h.session.handle_event(SessionEvent::Disconnect);

    assert_eq!(h.session.state(), PublishState::Publishing);
    assert!(h.scheduled().is_empty());
}

#[test]
fn test_auth_error_is_terminal() {
    let mut h = harness().publishing();

    h.session.handle_event(SessionEvent::AuthError);

    assert_eq!(h.session.state(), PublishState::Stopped);
    assert_eq!(
        h.failures(),
        vec![PublishFailure::Rejected {
            reason: "authentication failed".to_string(),
        }]
    );
}

fn header(len: usize) -> EncodedFrame {
    EncodedFrame::new(vec![0; len]).with_header(true)
}

#[test]
fn test_frames_forwarded_while_publishing() {
    let mut h = harness();
    h.session.handle_event(SessionEvent::SurfaceCreated);
    h.session.on_frame(EncodedFrame::new(vec![0; 16]));
    assert_eq!(h.count(&Call::SendFrame(16)), 0);

    h.session.request_publish(URL).unwrap();

    // The sink only connects once media reaches it
    h.session.on_frame(EncodedFrame::new(vec![0; 16]).with_keyframe(true));
    assert_eq!(h.count(&Call::SendFrame(16)), 1);
    assert!(!h.session.is_connected());

    h.session.handle_event(SessionEvent::ConnectionSuccess);
    h.session.on_frame(EncodedFrame::new(vec![0; 16]));
    assert_eq!(h.count(&Call::SendFrame(16)), 2);
    assert_eq!(*h.metrics.frames.lock().unwrap(), vec![16, 16]);

    h.fail("timeout");
    h.session.on_frame(EncodedFrame::new(vec![0; 16]));
    assert_eq!(h.count(&Call::SendFrame(16)), 2);

    h.session.stop();
    h.session.on_frame(EncodedFrame::new(vec![0; 16]));
    assert_eq!(h.count(&Call::SendFrame(16)), 2);
}

#[test]
fn test_stream_header_replayed_on_reconnect() {
    let mut h = harness().publishing();
    h.session.on_frame(header(13));
    h.session.on_frame(header(40));
    h.session.on_frame(EncodedFrame::new(vec![0; 100]).with_keyframe(true));
    assert_eq!(h.session.stream_header().len(), 2);

    h.fail("timeout");
    h.clear();
    h.fire_retry();

    assert_eq!(
        h.calls(),
        vec![
            Call::Connect(URL.to_string()),
            Call::SendFrame(13),
            Call::SendFrame(40),
        ]
    );
}

#[test]
fn test_header_after_payload_replaces_cache() {
    let mut h = harness();
    h.session.handle_event(SessionEvent::SurfaceCreated);

    // Cached even before publishing, without reaching the transport
    h.session.on_frame(header(13));
    h.session.on_frame(EncodedFrame::new(vec![0; 100]));
    h.session.on_frame(header(20));
    h.session.on_frame(header(30));
    assert_eq!(h.count(&Call::SendFrame(20)), 0);
    assert_eq!(h.session.stream_header().len(), 2);

    h.clear();
    h.session.request_publish(URL).unwrap();

    let calls = h.calls();
    assert_eq!(
        &calls[calls.len() - 3..],
        &[
            Call::Connect(URL.to_string()),
            Call::SendFrame(20),
            Call::SendFrame(30),
        ]
    );
}

#[test]
fn test_pause_and_resume_forwarding() {
    let mut h = harness();
    h.session.handle_event(SessionEvent::SurfaceCreated);
    assert!(h.session.pause_forwarding().unwrap_err().is_invalid_state());
    assert!(h.session.resume_forwarding().unwrap_err().is_invalid_state());

    let mut h = harness().connected();
    h.session.pause_forwarding().unwrap();
    h.session.pause_forwarding().unwrap();
    assert!(h.session.is_forwarding_paused());
    assert!(h.session.snapshot().forwarding_paused);
    assert_eq!(h.count(&Call::PauseForwarding), 1);
    assert_eq!(h.session.state(), PublishState::Publishing);
    assert!(h.session.is_connected());

    h.session.resume_forwarding().unwrap();
    assert!(!h.session.is_forwarding_paused());
    assert_eq!(h.count(&Call::ResumeForwarding), 1);

    h.session.pause_forwarding().unwrap();
    h.session.stop();
    assert!(!h.session.is_forwarding_paused());
}

#[test]
fn test_set_bitrate_updates_config() {
    let mut h = harness();

    h.session.set_bitrate(2_000_000).unwrap();
    assert_eq!(h.session.video_config().bitrate(), 2_000_000);
    assert_eq!(h.calls(), vec![Call::SetBitrate(2_000_000)]);

    assert!(h.session.set_bitrate(0).is_err());
    assert_eq!(h.session.video_config().bitrate(), 2_000_000);
}

#[test]
fn test_switch_camera_requires_surface() {
    let mut h = harness();
    assert!(h.session.switch_camera().unwrap_err().is_invalid_state());

    h.session.handle_event(SessionEvent::SurfaceCreated);
    h.session.switch_camera().unwrap();
    assert_eq!(h.count(&Call::SwitchCamera), 1);
}

#[test]
fn test_exponential_retry_delays() {
    let policy = RetryPolicy::exponential(
        5,
        Duration::from_millis(100),
        Duration::from_millis(300),
        2.0,
    )
    .unwrap();
    let mut h = harness_with(HarnessOptions {
        config: SessionConfig::default().with_retry(policy),
        ..Default::default()
    })
    .publishing();

    for _ in 0..3 {
        h.fail("timeout");
        h.fire_retry();
    }

    let delays: Vec<Duration> = h.scheduled().into_iter().map(|(d, _)| d).collect();
    assert_eq!(
        delays,
        vec![
            Duration::from_millis(100),
            Duration::from_millis(200),
            Duration::from_millis(300),
        ]
    );
}

#[test]
fn test_lifecycle_records_transitions() {
    let mut h = harness().publishing();
    h.fail("timeout");

    let lifecycle = h.session.lifecycle();
    assert_eq!(lifecycle.transition_count(), 3);
    let last = lifecycle.last_transition().unwrap();
    assert_eq!(last.from, PublishState::Publishing);
    assert_eq!(last.to, PublishState::Retrying { attempt: 1 });
    assert_eq!(last.reason.as_deref(), Some("timeout"));

    let states = h.observer.states.lock().unwrap().clone();
    assert_eq!(
        states,
        vec![
            PublishState::PreviewOnly,
            PublishState::Publishing,
            PublishState::Retrying { attempt: 1 },
        ]
    );
}

#[test]
fn test_shutdown_releases_everything() {
    let mut h = harness().connected();
    h.clear();

    h.session.shutdown();

    assert_eq!(h.session.state(), PublishState::Idle);
    assert_eq!(
        h.calls(),
        vec![Call::StopStream, Call::Disconnect, Call::StopPreview]
    );

    h.session.handle_event(SessionEvent::SurfaceCreated);
    assert_eq!(h.session.state(), PublishState::PreviewOnly);
}

#[test]
fn test_rtmp_failure_classification() {
    assert!(rtmp_failure::is_retryable("Could not connect: timeout"));
    assert!(!rtmp_failure::is_retryable("401 Unauthorized"));
    assert!(rtmp_failure::is_auth_failure("authentication failed"));
}

#[test]
fn test_transport_pipeline_targets_url() {
    let url = PublishUrl::parse(URL).unwrap();
    let pipeline = PipelineBuilder::build_transport_pipeline(&url);

    assert!(pipeline.contains("rtmp2sink"));
    assert!(pipeline.contains(URL));
}

#[tokio::test]
async fn test_runner_serializes_commands_and_events() {
    let log: CallLog = Arc::new(Mutex::new(Vec::new()));
    let (ports, observer, _metrics) = ports(&HarnessOptions::default(), &log);
    let session = PublishSession::new(ports, SessionConfig::default());

    let (event_tx, event_rx) = session_event_channel();
    let (_frame_tx, frame_rx) = frame_channel();
    let (runner, handle) = SessionRunner::new(session, event_tx, event_rx, frame_rx);
    let runner_task = tokio::spawn(runner.run());

    handle.surface_created().unwrap();
    handle.request_publish(URL).await.unwrap();
    assert_eq!(handle.snapshot().state, PublishState::Publishing);
    assert_eq!(handle.snapshot().target_url.as_deref(), Some(URL));

    handle.emit(SessionEvent::ConnectionSuccess).unwrap();
    handle.set_bitrate(900_000).await.unwrap();
    let snapshot = handle.snapshot();
    assert!(snapshot.connected);
    assert_eq!(snapshot.video.bitrate(), 900_000);

    let err = handle.request_publish(URL).await.unwrap_err();
    assert!(err.is_invalid_state());

    handle.pause_forwarding().await.unwrap();
    assert!(handle.snapshot().forwarding_paused);
    handle.resume_forwarding().await.unwrap();
    assert!(!handle.snapshot().forwarding_paused);

    handle.stop().await.unwrap();
    assert_eq!(handle.snapshot().state, PublishState::PreviewOnly);
    assert!(handle.pause_forwarding().await.unwrap_err().is_invalid_state());

    handle.shutdown().await.unwrap();
    let session = runner_task.await.unwrap();

    assert_eq!(session.state(), PublishState::Idle);
    assert_eq!(log.lock().unwrap().iter().filter(|c| **c == Call::PauseForwarding).count(), 1);
    assert_eq!(*observer.connected.lock().unwrap(), 1);
    assert!(matches!(
        handle.stop().await,
        Err(DomainError::SessionClosed)
    ));
}

#[tokio::test]
async fn test_runner_exits_when_handles_dropped() {
    let log: CallLog = Arc::new(Mutex::new(Vec::new()));
    let (ports, _observer, _metrics) = ports(&HarnessOptions::default(), &log);
    let session = PublishSession::new(ports, SessionConfig::default());

    let (event_tx, event_rx) = session_event_channel();
    let (_frame_tx, frame_rx) = frame_channel();
    let (runner, handle) = SessionRunner::new(session, event_tx, event_rx, frame_rx);
    let runner_task = tokio::spawn(runner.run());

    handle.surface_created().unwrap();
    handle.request_publish(URL).await.unwrap();
    drop(handle);

    let session = tokio::time::timeout(Duration::from_secs(5), runner_task)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(session.state(), PublishState::Idle);
    assert!(log.lock().unwrap().contains(&Call::Disconnect));
}

#[tokio::test]
async fn test_runner_retries_with_tokio_timer() {
    let log: CallLog = Arc::new(Mutex::new(Vec::new()));
    let (event_tx, event_rx) = session_event_channel();
    let (_frame_tx, frame_rx) = frame_channel();

    let options = HarnessOptions::default();
    let (mut ports, _observer, _metrics) = ports(&options, &log);
    ports.scheduler = Box::new(TokioRetryScheduler::new(event_tx.clone()));
    let config = SessionConfig::default()
        .with_retry(RetryPolicy::fixed(3, Duration::from_millis(20)).unwrap());
    let session = PublishSession::new(ports, config);

    let (runner, handle) = SessionRunner::new(session, event_tx, event_rx, frame_rx);
    let runner_task = tokio::spawn(runner.run());

    handle.surface_created().unwrap();
    handle.request_publish(URL).await.unwrap();
    handle
        .emit(SessionEvent::ConnectionFailed("timeout".to_string()))
        .unwrap();

    let mut status = handle.subscribe();
    tokio::time::timeout(
        Duration::from_secs(5),
        status.wait_for(|s| s.state == PublishState::Publishing && s.retry_count == 1),
    )
    .await
    .unwrap()
    .unwrap();

    let connects = log
        .lock()
        .unwrap()
        .iter()
        .filter(|c| matches!(c, Call::Connect(_)))
        .count();
    assert_eq!(connects, 2);

    handle.shutdown().await.unwrap();
    runner_task.await.unwrap();
}

#[tokio::test]
async fn test_tokio_scheduler_fires_ticket() {
    let (event_tx, mut event_rx) = session_event_channel();
    let mut scheduler = TokioRetryScheduler::new(event_tx);
    let ticket = RetryTicket::new(7);

    let _handle = scheduler.schedule(Duration::from_millis(10), ticket);

    let event = tokio::time::timeout(Duration::from_secs(5), event_rx.recv())
        .await
        .unwrap();
    assert_eq!(event, Some(SessionEvent::RetryTimerFired(ticket)));
}

#[tokio::test]
async fn test_tokio_scheduler_cancel_prevents_firing() {
    let (event_tx, mut event_rx) = session_event_channel();
    let mut scheduler = TokioRetryScheduler::new(event_tx);

    let mut handle = scheduler.schedule(Duration::from_millis(20), RetryTicket::new(1));
    handle.cancel();

    let result = tokio::time::timeout(Duration::from_millis(200), event_rx.recv()).await;
    assert!(result.is_err(), "cancelled retry must not fire");
}
