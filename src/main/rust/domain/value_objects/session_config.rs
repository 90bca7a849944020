use super::{ResumePolicy, RetryPolicy, VideoConfig};

/// Everything a publish session is constructed with
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionConfig {
    video: VideoConfig,
    retry: RetryPolicy,
    resume: ResumePolicy,
}

impl SessionConfig {
    pub fn new(video: VideoConfig, retry: RetryPolicy, resume: ResumePolicy) -> Self {
        Self {
            video,
            retry,
            resume,
        }
    }

    pub fn with_video(mut self, video: VideoConfig) -> Self {
        self.video = video;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_resume(mut self, resume: ResumePolicy) -> Self {
        self.resume = resume;
        self
    }

    pub fn video(&self) -> &VideoConfig {
        &self.video
    }

    pub fn retry(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn resume(&self) -> ResumePolicy {
        self.resume
    }
}
