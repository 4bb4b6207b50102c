// SPDX-License-Identifier: GPL-3.0-only

//! Pipeline configuration
//!
//! All settings are passed explicitly to the builder; nothing is read from
//! process-wide state.

use crate::backends::{RuntimeBackend, SyntheticSettings};
use crate::constants::{capture, timing, webcam};
use crate::errors::{PipelineError, PipelineResult};
use crate::frame::PixelFormat;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Capability bounds requested from a webcam source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebcamCaps {
    /// Encoded media type (e.g. "image/jpeg")
    pub media_type: String,
    pub min_width: u32,
    pub max_width: u32,
    pub min_framerate: u32,
    pub max_framerate: u32,
}

impl Default for WebcamCaps {
    fn default() -> Self {
        Self {
            media_type: webcam::MEDIA_TYPE.to_string(),
            min_width: webcam::MIN_WIDTH,
            max_width: webcam::MAX_WIDTH,
            min_framerate: webcam::MIN_FRAMERATE,
            max_framerate: webcam::MAX_FRAMERATE,
        }
    }
}

/// Settings for building and running a pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Display window title
    pub title: String,
    /// Video file path or URI; None selects the webcam chain
    pub video_input: Option<String>,
    /// Webcam device path; None selects the default device
    pub webcam_device: Option<String>,
    /// Webcam capability bounds
    pub webcam: WebcamCaps,
    /// Pixel format delivered by `get_frame`
    pub capture_format: PixelFormat,
    /// Graph runtime implementation
    pub backend: RuntimeBackend,
    /// Test-pattern settings for the synthetic runtime
    pub synthetic: SyntheticSettings,
    /// Upper bound for a blocking frame pull
    pub pull_timeout_ms: u64,
    /// Upper bound for a state query
    pub state_timeout_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            title: "framepipe".to_string(),
            video_input: None,
            webcam_device: None,
            webcam: WebcamCaps::default(),
            capture_format: capture::DEFAULT_FORMAT,
            backend: RuntimeBackend::default(),
            synthetic: SyntheticSettings::default(),
            pull_timeout_ms: timing::PULL_TIMEOUT.as_millis() as u64,
            state_timeout_ms: timing::STATE_QUERY_TIMEOUT.as_millis() as u64,
        }
    }
}

impl PipelineConfig {
    /// Load a config from a JSON file; missing keys take their defaults
    pub fn load(path: impl AsRef<Path>) -> PipelineResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config = Self::from_json(&contents)?;
        debug!(path = %path.display(), "Loaded pipeline config");
        Ok(config)
    }

    /// Parse and validate a JSON config
    pub fn from_json(json: &str) -> PipelineResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> PipelineResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject settings no runtime can satisfy
    pub fn validate(&self) -> PipelineResult<()> {
        let caps = &self.webcam;
        if caps.min_width == 0 || caps.min_width > caps.max_width {
            return Err(PipelineError::Config(format!(
                "invalid webcam width range [{}, {}]",
                caps.min_width, caps.max_width
            )));
        }
        if caps.min_framerate == 0 || caps.min_framerate > caps.max_framerate {
            return Err(PipelineError::Config(format!(
                "invalid webcam framerate range [{}, {}]",
                caps.min_framerate, caps.max_framerate
            )));
        }
        if self.pull_timeout_ms == 0 {
            return Err(PipelineError::Config(
                "pull_timeout_ms must be positive".to_string(),
            ));
        }
        if self.video_input.as_deref() == Some("") {
            return Err(PipelineError::Config("video_input is empty".to_string()));
        }
        self.synthetic.validate()
    }

    pub fn pull_timeout(&self) -> Duration {
        Duration::from_millis(self.pull_timeout_ms)
    }

    pub fn state_timeout(&self) -> Duration {
        Duration::from_millis(self.state_timeout_ms)
    }
}
