use std::fmt;
use std::str::FromStr;

/// Whether a recreated capture surface republishes to the retained target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumePolicy {
    Never,
    /// Only when the surface loss interrupted an active publish
    AfterInterruption,
    /// Whenever a target exists, even after a user stop
    Always,
}

impl ResumePolicy {
    pub fn should_resume(&self, has_target: bool, interrupted: bool) -> bool {
        match self {
            Self::Never => false,
            Self::AfterInterruption => has_target && interrupted,
            Self::Always => has_target,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Never => "never",
            Self::AfterInterruption => "after-interruption",
            Self::Always => "always",
        }
    }
}

impl Default for ResumePolicy {
    fn default() -> Self {
        Self::AfterInterruption
    }
}

impl fmt::Display for ResumePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResumePolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "never" => Ok(Self::Never),
            "after-interruption" => Ok(Self::AfterInterruption),
            "always" => Ok(Self::Always),
            other => Err(format!(
                "unknown resume policy '{}': expected never, after-interruption or always",
                other
            )),
        }
    }
}
