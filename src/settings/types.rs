use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::camera::types::{Resolution, Size};
use crate::settings::error::{ConfigError, Result};

/// Sensor and display geometry plus the exposure/gain baseline the
/// operator controls are scaled against.
///
/// JSON keys follow the config file format (`default_width` is the capture
/// width, `display_width` the preview width).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    #[serde(rename = "default_width")]
    pub capture_width: u32,
    #[serde(rename = "default_height")]
    pub capture_height: u32,
    #[serde(rename = "display_width")]
    pub preview_width: u32,
    #[serde(rename = "display_height")]
    pub preview_height: u32,
    pub framerate: String,
    /// Lower exposure bound in ns.
    pub exposure_min: u64,
    /// Exposure ns added per slider step.
    pub exposure_multiplier: u64,
    pub gain_min: f32,
    pub gain_max: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            capture_width: 1640,
            capture_height: 1232,
            preview_width: 960,
            preview_height: 540,
            framerate: "30/1".to_string(),
            exposure_min: 13_000,
            exposure_multiplier: 3_000_000,
            gain_min: 1.0,
            gain_max: 1.0,
        }
    }
}

impl CameraConfig {
    pub fn resolution(&self) -> Resolution {
        Resolution::new(
            Size::new(self.capture_width, self.capture_height),
            Size::new(self.preview_width, self.preview_height),
        )
    }
}

/// Timing and device knobs for the capture session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionTuning {
    /// Backoff after a transient read failure.
    pub read_retry_ms: u64,
    /// Time between synthetic frames.
    pub synthetic_interval_ms: u64,
    /// Device opened when the primary pipeline fails.
    pub secondary_device: String,
    /// GStreamer launcher program.
    pub launcher: String,
    /// How long a launched pipeline may take to emit its first frame.
    pub open_timeout_ms: u64,
    /// How long a running pipeline may go silent before a read fails.
    pub read_timeout_ms: u64,
}

impl Default for SessionTuning {
    fn default() -> Self {
        Self {
            read_retry_ms: 50,
            synthetic_interval_ms: 100,
            secondary_device: "/dev/video0".to_string(),
            launcher: "gst-launch-1.0".to_string(),
            open_timeout_ms: 5_000,
            read_timeout_ms: 1_000,
        }
    }
}

impl SessionTuning {
    pub fn read_retry(&self) -> Duration {
        Duration::from_millis(self.read_retry_ms)
    }

    pub fn synthetic_interval(&self) -> Duration {
        Duration::from_millis(self.synthetic_interval_ms)
    }

    pub fn open_timeout(&self) -> Duration {
        Duration::from_millis(self.open_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

/// Process-wide configuration. Loaded once at startup, validated, then
/// shared read-only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub camera: CameraConfig,
    pub session: SessionTuning,
}

/// Slowest synthetic cadence that still gives 10 frames per second.
const MAX_SYNTHETIC_INTERVAL_MS: u64 = 100;

impl AppConfig {
    /// Default configuration with the given geometry.
    pub fn for_resolution(capture: Size, preview: Size) -> Self {
        Self {
            camera: CameraConfig {
                capture_width: capture.width,
                capture_height: capture.height,
                preview_width: preview.width,
                preview_height: preview.height,
                ..CameraConfig::default()
            },
            session: SessionTuning::default(),
        }
    }

    /// Check the invariants the rest of the crate relies on.
    pub fn validate(&self) -> Result<()> {
        let Resolution { capture, preview } = self.camera.resolution();
        if capture.is_empty() || preview.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "resolutions must be non-zero (capture {capture}, preview {preview})"
            )));
        }
        if capture.width < preview.width || capture.height < preview.height {
            return Err(ConfigError::Invalid(format!(
                "capture resolution {capture} is smaller than preview {preview}"
            )));
        }
        parse_framerate(&self.camera.framerate)?;
        if self.camera.gain_min > self.camera.gain_max {
            return Err(ConfigError::Invalid(format!(
                "gain_min {} exceeds gain_max {}",
                self.camera.gain_min, self.camera.gain_max
            )));
        }
        if self.session.synthetic_interval_ms == 0
            || self.session.synthetic_interval_ms > MAX_SYNTHETIC_INTERVAL_MS
        {
            return Err(ConfigError::Invalid(format!(
                "synthetic_interval_ms must be within 1..={MAX_SYNTHETIC_INTERVAL_MS}, got {}",
                self.session.synthetic_interval_ms
            )));
        }
        if self.session.open_timeout_ms == 0 || self.session.read_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "open_timeout_ms and read_timeout_ms must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Parse an `N/D` framerate fraction.
pub fn parse_framerate(framerate: &str) -> Result<(u32, u32)> {
    let invalid = || ConfigError::Invalid(format!("framerate must look like 30/1, got {framerate:?}"));
    let (num, den) = framerate.split_once('/').ok_or_else(invalid)?;
    let num: u32 = num.trim().parse().map_err(|_| invalid())?;
    let den: u32 = den.trim().parse().map_err(|_| invalid())?;
    if num == 0 || den == 0 {
        return Err(invalid());
    }
    Ok((num, den))
}
