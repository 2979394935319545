//! Pipeline configuration, loaded from TOML.
//!
//! Every field has a default, so an empty file (or no file) yields the
//! standard tuning.

use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::audio::resample::ResampleSettings;
use crate::core::{ChannelLayout, TargetFormat};
use crate::error::{Error, Result};
use crate::playback::sync::DriftSettings;

/// Audio pipeline configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Format the sink receives
    pub target: TargetFormat,
    /// Drift beyond which the shared clock is corrected (seconds)
    pub drift_threshold: f64,
    /// Size of one drift correction (seconds)
    pub correction_step: f64,
    /// Extra output samples allocated per conversion
    pub resample_headroom: usize,
    /// Packets buffered between demuxer and audio thread
    pub queue_capacity: usize,
    /// Consecutive converter build failures before rebuilds are suspended (0 = never)
    pub rebuild_failure_threshold: u32,
    /// Frames passed through while rebuilds are suspended
    pub rebuild_cooldown_frames: u32,
    pub sink: SinkConfig,
}

/// Output device tuning
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    /// Length of the hand-off ring buffer (milliseconds of audio)
    pub buffer_ms: u32,
    /// How long a write may wait for room before it reports "not consumed"
    pub stall_timeout_ms: u64,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            buffer_ms: 200,
            stall_timeout_ms: 500,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let drift = DriftSettings::default();
        let resample = ResampleSettings::default();
        Self {
            target: TargetFormat::default(),
            drift_threshold: drift.threshold,
            correction_step: drift.step,
            resample_headroom: resample.headroom,
            queue_capacity: 256,
            rebuild_failure_threshold: resample.failure_threshold,
            rebuild_cooldown_frames: resample.cooldown_frames,
            sink: SinkConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: PipelineConfig =
            toml::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        config.validated()
    }

    /// Load from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        debug!(path = %path.display(), "Loading pipeline configuration");
        Self::from_toml_str(&text)
    }

    /// Check ranges and make the target layout agree with its channel count
    pub fn validated(mut self) -> Result<Self> {
        if self.target.channels == 0 {
            return Err(Error::Config("target channel count must be positive".into()));
        }
        if self.target.sample_rate == 0 {
            return Err(Error::Config("target sample rate must be positive".into()));
        }
        if self.target.format.is_planar() {
            return Err(Error::Config(format!(
                "target format {:?} must be packed",
                self.target.format
            )));
        }
        if !(self.drift_threshold > 0.0) || !(self.correction_step > 0.0) {
            return Err(Error::Config(
                "drift threshold and correction step must be positive".into(),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(Error::Config("queue capacity must be positive".into()));
        }
        self.target.layout = ChannelLayout::normalize(Some(self.target.layout), self.target.channels);
        Ok(self)
    }

    pub fn drift_settings(&self) -> DriftSettings {
        DriftSettings {
            threshold: self.drift_threshold,
            step: self.correction_step,
        }
    }

    pub fn resample_settings(&self) -> ResampleSettings {
        ResampleSettings {
            headroom: self.resample_headroom,
            failure_threshold: self.rebuild_failure_threshold,
            cooldown_frames: self.rebuild_cooldown_frames,
        }
    }
}
