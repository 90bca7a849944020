use serde::Serialize;

use crate::domain::errors::{DomainError, Result};

pub const DEFAULT_WIDTH: u32 = 1080;
pub const DEFAULT_HEIGHT: u32 = 1920;
pub const DEFAULT_BITRATE: u32 = 1200 * 1024;

/// Largest edge accepted by the encoders we drive
const MAX_DIMENSION: u32 = 4096;

/// Encoded video geometry and target bitrate (bits per second)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VideoConfig {
    width: u32,
    height: u32,
    bitrate: u32,
}

impl VideoConfig {
    pub fn new(width: u32, height: u32, bitrate: u32) -> Result<Self> {
        Self::validate_dimension(width, "width")?;
        Self::validate_dimension(height, "height")?;
        Self::validate_bitrate(bitrate)?;

        Ok(Self {
            width,
            height,
            bitrate,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn bitrate(&self) -> u32 {
        self.bitrate
    }

    /// Bitrate in kbit/s, the unit most encoders take
    pub fn bitrate_kbps(&self) -> u32 {
        (self.bitrate / 1000).max(1)
    }

    /// The only mutation allowed after construction
    pub fn with_bitrate(mut self, bitrate: u32) -> Result<Self> {
        Self::validate_bitrate(bitrate)?;
        self.bitrate = bitrate;
        Ok(self)
    }

    fn validate_dimension(value: u32, name: &str) -> Result<()> {
        if value == 0 || value > MAX_DIMENSION {
            return Err(DomainError::InvalidVideoConfig(format!(
                "{} must be between 1 and {}, got {}",
                name, MAX_DIMENSION, value
            )));
        }
        // 4:2:0 chroma subsampling requires even dimensions
        if value % 2 != 0 {
            return Err(DomainError::InvalidVideoConfig(format!(
                "{} must be even, got {}",
                name, value
            )));
        }
        Ok(())
    }

    fn validate_bitrate(bitrate: u32) -> Result<()> {
        if bitrate == 0 {
            return Err(DomainError::InvalidBitrate);
        }
        Ok(())
    }
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            bitrate: DEFAULT_BITRATE,
        }
    }
}
