use lazy_static::lazy_static;
use prometheus::{Encoder, Gauge, IntCounter, IntGauge, Registry, TextEncoder};

use crate::domain::ports::MetricsReporter;
use crate::domain::value_objects::PublishState;

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // Publish state (0=Idle, 1=PreviewOnly, 2=Publishing, 3=Retrying, 4=Stopped)
    pub static ref PUBLISH_STATE: Gauge = Gauge::new(
        "publish_session_state",
        "Current publish session state"
    ).expect("metric can be created");

    pub static ref RETRY_ATTEMPTS: IntCounter = IntCounter::new(
        "publish_retry_attempts_total",
        "Total number of scheduled publish retries"
    ).expect("metric can be created");

    // Delay of the most recently scheduled retry
    pub static ref RETRY_DELAY_SECONDS: Gauge = Gauge::new(
        "publish_retry_delay_seconds",
        "Delay before the pending publish retry"
    ).expect("metric can be created");

    // 0=disconnected, 1=connected
    pub static ref CONNECTED: IntGauge = IntGauge::new(
        "publish_connected",
        "Media server connection state"
    ).expect("metric can be created");

    pub static ref BITRATE: Gauge = Gauge::new(
        "publish_bitrate_bits_per_second",
        "Outgoing bitrate reported by the transport"
    ).expect("metric can be created");

    pub static ref FRAMES_SENT: IntCounter = IntCounter::new(
        "publish_frames_sent_total",
        "Total encoded frames handed to the transport"
    ).expect("metric can be created");

    pub static ref BYTES_SENT: IntCounter = IntCounter::new(
        "publish_bytes_sent_total",
        "Total encoded bytes handed to the transport"
    ).expect("metric can be created");

    pub static ref FAILURES: IntCounter = IntCounter::new(
        "publish_failures_total",
        "Total terminal publish failures"
    ).expect("metric can be created");

    pub static ref UPTIME_SECONDS: Gauge = Gauge::new(
        "publish_uptime_seconds",
        "Time since the current connection was established"
    ).expect("metric can be created");
}

pub struct PrometheusReporter;

impl PrometheusReporter {
    pub fn new() -> Self {
        Self
    }

    pub fn init_metrics() -> Result<(), prometheus::Error> {
        REGISTRY.register(Box::new(PUBLISH_STATE.clone()))?;
        REGISTRY.register(Box::new(RETRY_ATTEMPTS.clone()))?;
        REGISTRY.register(Box::new(RETRY_DELAY_SECONDS.clone()))?;
        REGISTRY.register(Box::new(CONNECTED.clone()))?;
        REGISTRY.register(Box::new(BITRATE.clone()))?;
        REGISTRY.register(Box::new(FRAMES_SENT.clone()))?;
        REGISTRY.register(Box::new(BYTES_SENT.clone()))?;
        REGISTRY.register(Box::new(FAILURES.clone()))?;
        REGISTRY.register(Box::new(UPTIME_SECONDS.clone()))?;
        Ok(())
    }

    pub fn gather_metrics() -> Vec<u8> {
        let encoder = TextEncoder::new();
        let metric_families = REGISTRY.gather();
        let mut buffer = vec![];
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            tracing::error!("Failed to encode metrics: {}", e);
            return b"# Error encoding metrics\n".to_vec();
        }
        buffer
    }
}

impl Default for PrometheusReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsReporter for PrometheusReporter {
    fn report_state_change(&self, state: &PublishState) {
        PUBLISH_STATE.set(state.as_metric());
        if !state.is_active() {
            UPTIME_SECONDS.set(0.0);
        }
    }

    fn report_retry_attempt(&self) {
        RETRY_ATTEMPTS.inc();
    }

    fn report_retry_delay(&self, delay_secs: f64) {
        RETRY_DELAY_SECONDS.set(delay_secs);
    }

    fn report_connection_state(&self, connected: bool) {
        CONNECTED.set(if connected { 1 } else { 0 });
    }

    fn report_bitrate(&self, bitrate: u64) {
        BITRATE.set(bitrate as f64);
    }

    fn report_frame_sent(&self, bytes: usize) {
        FRAMES_SENT.inc();
        BYTES_SENT.inc_by(bytes as u64);
    }

    fn report_publish_failure(&self) {
        FAILURES.inc();
    }

    fn report_uptime(&self, uptime_secs: f64) {
        UPTIME_SECONDS.set(uptime_secs);
    }
}
