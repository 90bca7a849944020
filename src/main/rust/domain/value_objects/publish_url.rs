use std::fmt;

use crate::domain::errors::{DomainError, Result};

const ACCEPTED_SCHEMES: [&str; 2] = ["rtmp://", "rtmps://"];

/// Validated publish destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishUrl(String);

impl PublishUrl {
    pub fn parse(url: &str) -> Result<Self> {
        let trimmed = url.trim();

        if trimmed.is_empty() {
            return Err(DomainError::InvalidPublishUrl(
                "destination cannot be empty".to_string(),
            ));
        }

        let scheme = ACCEPTED_SCHEMES
            .iter()
            .find(|scheme| trimmed.starts_with(*scheme))
            .ok_or_else(|| DomainError::InvalidPublishUrl(trimmed.to_string()))?;

        if trimmed.len() == scheme.len() {
            return Err(DomainError::InvalidPublishUrl(trimmed.to_string()));
        }

        if trimmed.chars().any(char::is_whitespace) {
            return Err(DomainError::InvalidPublishUrl(trimmed.to_string()));
        }

        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_secure(&self) -> bool {
        self.0.starts_with("rtmps://")
    }
}

impl fmt::Display for PublishUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
