use std::time::Duration;

use clap::Parser;

use crate::domain::value_objects::{
    PublishUrl, ResumePolicy, RetryPolicy, SessionConfig, VideoConfig, DEFAULT_BITRATE,
    DEFAULT_HEIGHT, DEFAULT_RETRY_BUDGET, DEFAULT_WIDTH,
};
use crate::infrastructure::gstreamer::CaptureSettings;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "pipeline-rtmp-publish",
    version = "0.1.0",
    author = "Hawkeye Video Pipeline",
    about = "Camera preview with RTMP publishing and automatic retry"
)]
pub struct Config {
    /// RTMP publish URL; when absent the service runs preview only
    #[arg(long, env = "PUBLISH_URL")]
    pub publish_url: Option<String>,

    /// Encoded video width
    #[arg(long, default_value_t = DEFAULT_WIDTH)]
    pub width: u32,

    /// Encoded video height
    #[arg(long, default_value_t = DEFAULT_HEIGHT)]
    pub height: u32,

    /// Video bitrate in bits per second
    #[arg(long, default_value_t = DEFAULT_BITRATE)]
    pub bitrate: u32,

    /// Camera devices, comma separated; switch-camera cycles through them
    #[arg(long, env = "VIDEO_DEVICE", value_delimiter = ',')]
    pub video_device: Vec<String>,

    /// Sink element rendering the preview
    #[arg(long, default_value = "autovideosink")]
    pub preview_sink: String,

    /// Retries allowed after the first connection failure
    #[arg(long, default_value_t = DEFAULT_RETRY_BUDGET)]
    pub retry_budget: u32,

    /// Delay before the first retry in milliseconds
    #[arg(long, default_value = "5000")]
    pub retry_delay_ms: u64,

    /// Retry delay multiplier (1.0 keeps the delay fixed)
    #[arg(long, default_value = "1.0")]
    pub retry_multiplier: f64,

    /// Upper bound for the retry delay in milliseconds
    #[arg(long, default_value = "60000")]
    pub max_retry_delay_ms: u64,

    /// Republish after the capture surface is recreated
    #[arg(long, default_value = "after-interruption")]
    pub resume_policy: ResumePolicy,

    /// Metrics server port
    #[arg(long, env = "METRICS_PORT", default_value = "9003")]
    pub metrics_port: u16,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// Minimum allowed port (ports below 1024 are privileged)
const MIN_USER_PORT: u16 = 1024;

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        if let Some(url) = &self.publish_url {
            PublishUrl::parse(url)?;
        }

        Self::validate_port(self.metrics_port, "metrics")?;

        self.to_video_config()?;

        if self.video_device.iter().any(|device| device.trim().is_empty()) {
            anyhow::bail!("Video device paths cannot be empty");
        }

        if self.preview_sink.trim().is_empty() {
            anyhow::bail!("Preview sink cannot be empty");
        }

        if self.retry_multiplier < 1.0 {
            anyhow::bail!("Retry multiplier must be >= 1.0");
        }

        if self.retry_delay_ms == 0 {
            anyhow::bail!("Retry delay cannot be 0");
        }

        if self.retry_multiplier > 1.0 && self.max_retry_delay_ms < self.retry_delay_ms {
            anyhow::bail!(
                "Maximum retry delay ({}) cannot be less than retry delay ({})",
                self.max_retry_delay_ms,
                self.retry_delay_ms
            );
        }

        self.to_retry_policy()?;

        Ok(())
    }

    fn validate_port(port: u16, name: &str) -> anyhow::Result<()> {
        if port == 0 {
            anyhow::bail!("Invalid {} port: port cannot be 0", name);
        }
        if port < MIN_USER_PORT {
            anyhow::bail!(
                "Invalid {} port: {} is a privileged port (< {}). Use a port >= {}",
                name,
                port,
                MIN_USER_PORT,
                MIN_USER_PORT
            );
        }
        Ok(())
    }

    pub fn to_video_config(&self) -> crate::domain::errors::Result<VideoConfig> {
        VideoConfig::new(self.width, self.height, self.bitrate)
    }

    pub fn to_retry_policy(&self) -> crate::domain::errors::Result<RetryPolicy> {
        let delay = Duration::from_millis(self.retry_delay_ms);

        if self.retry_multiplier == 1.0 {
            return RetryPolicy::fixed(self.retry_budget, delay);
        }

        RetryPolicy::exponential(
            self.retry_budget,
            delay,
            Duration::from_millis(self.max_retry_delay_ms),
            self.retry_multiplier,
        )
    }

    pub fn to_session_config(&self) -> crate::domain::errors::Result<SessionConfig> {
        Ok(SessionConfig::new(
            self.to_video_config()?,
            self.to_retry_policy()?,
            self.resume_policy,
        ))
    }

    pub fn to_capture_settings(&self) -> CaptureSettings {
        CaptureSettings {
            devices: self
                .video_device
                .iter()
                .map(|device| device.trim().to_string())
                .collect(),
            preview_sink: self.preview_sink.clone(),
        }
    }
}
