use crate::domain::value_objects::PublishState;

/// Port for metrics reporting
pub trait MetricsReporter: Send + Sync {
    fn report_state_change(&self, state: &PublishState);
    fn report_retry_attempt(&self);
    fn report_retry_delay(&self, delay_secs: f64);
    fn report_connection_state(&self, connected: bool);
    fn report_bitrate(&self, bitrate: u64);
    fn report_frame_sent(&self, bytes: usize);
    fn report_publish_failure(&self);
    fn report_uptime(&self, uptime_secs: f64);
}
