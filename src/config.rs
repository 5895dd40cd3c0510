//! Tunables for the navigation loop. Every field has a default, so a config
//! file only needs to mention what it changes:
//!
//! ```text
//! (arrival_radius_m: 5.0, camera_candidates: [0])
//! ```

use serde::{Deserialize, Serialize};
use std::{borrow::Cow, fmt, fs, path::Path, time::Duration};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavConfig {
    /// Distance below which the current waypoint counts as reached.
    pub arrival_radius_m: f64,
    pub scale_min: f64,
    pub scale_max: f64,
    /// Target arrow scale when standing on the waypoint.
    pub scale_near: f64,
    /// Meters over which the target scale drops by 1.0.
    pub scale_falloff_m: f64,
    /// Weight given to the previous smoothed scale each frame.
    pub smoothing: f64,
    pub initial_scale: f64,
    /// Vertical position of the arrow center, as a fraction of frame height
    /// from the top.
    pub anchor_fraction: f64,
    pub min_sprite_px: u32,
    pub frame_interval_ms: u64,
    pub read_retry_ms: u64,
    pub jpeg_quality: u8,
    /// Device indices tried in order when opening the camera.
    pub camera_candidates: Vec<u32>,
    pub banner: bool,
}

impl Default for NavConfig {
    fn default() -> Self {
        Self {
            arrival_radius_m: 4.0,
            scale_min: 0.4,
            scale_max: 1.4,
            scale_near: 1.2,
            scale_falloff_m: 50.0,
            smoothing: 0.9,
            initial_scale: 1.0,
            anchor_fraction: 0.65,
            min_sprite_px: 10,
            frame_interval_ms: 30,
            read_retry_ms: 20,
            jpeg_quality: 80,
            camera_candidates: vec![1, 0],
            banner: true,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    IoError(std::io::Error),
    RonSpannedError(ron::de::SpannedError),
    /// A value is outside the range the loop can work with.
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let msg = match self {
            ConfigError::IoError(error) => Cow::from(format!("io error: {}", error)),
            ConfigError::RonSpannedError(error) => Cow::from(format!("ron parse error: {}", error)),
            ConfigError::Invalid(what) => Cow::from(format!("invalid config: {}", what)),
        };

        write!(f, "{}", msg)
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        Self::IoError(value)
    }
}

impl From<ron::de::SpannedError> for ConfigError {
    fn from(value: ron::de::SpannedError) -> Self {
        Self::RonSpannedError(value)
    }
}

impl NavConfig {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_ron(&text)
    }

    pub fn from_ron(s: &str) -> Result<Self, ConfigError> {
        let config: NavConfig = ron::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        use ConfigError::Invalid;

        if !(self.arrival_radius_m.is_finite() && self.arrival_radius_m >= 0.0) {
            return Err(Invalid("arrival_radius_m must be a non-negative number"));
        }
        if !(self.scale_min > 0.0 && self.scale_min <= self.scale_max) {
            return Err(Invalid("scale_min must be positive and not above scale_max"));
        }
        if !(self.scale_falloff_m > 0.0) {
            return Err(Invalid("scale_falloff_m must be positive"));
        }
        if !(0.0..1.0).contains(&self.smoothing) {
            return Err(Invalid("smoothing must be in [0, 1)"));
        }
        if !(0.0..=1.0).contains(&self.anchor_fraction) {
            return Err(Invalid("anchor_fraction must be in [0, 1]"));
        }
        if self.camera_candidates.is_empty() {
            return Err(Invalid("camera_candidates must not be empty"));
        }
        if self.jpeg_quality == 0 || self.jpeg_quality > 100 {
            return Err(Invalid("jpeg_quality must be in 1..=100"));
        }
        Ok(())
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }

    pub fn read_retry(&self) -> Duration {
        Duration::from_millis(self.read_retry_ms)
    }
}
