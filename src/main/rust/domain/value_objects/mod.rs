mod encoded_frame;
mod publish_failure;
mod publish_state;
mod publish_url;
mod resume_policy;
mod retry_policy;
mod session_config;
mod session_snapshot;
mod video_config;

pub use encoded_frame::EncodedFrame;
pub use publish_failure::{MediaKind, PublishFailure};
pub use publish_state::PublishState;
pub use publish_url::PublishUrl;
pub use resume_policy::ResumePolicy;
pub use retry_policy::{RetryPolicy, DEFAULT_RETRY_BUDGET, DEFAULT_RETRY_DELAY};
pub use session_config::SessionConfig;
pub use session_snapshot::SessionSnapshot;
pub use video_config::{VideoConfig, DEFAULT_BITRATE, DEFAULT_HEIGHT, DEFAULT_WIDTH};
