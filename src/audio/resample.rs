//! Conversion of decoded frames to the sink's target format.
//!
//! [`ResampleManager`] keeps a converter built for the signature of the last
//! frame it saw. A frame with a different signature tears the converter down
//! and builds a new one; when no converter is available the frame's native
//! bytes are passed through untouched.

use tracing::{debug, warn};

use crate::audio::buffer::ResampleBuffer;
use crate::core::{DecodedFrame, SourceFormatSignature, TargetFormat};

/// Error type for resampling
#[derive(Debug, thiserror::Error)]
pub enum ResampleError {
    #[error("Failed to build converter: {0}")]
    Build(String),
    #[error("Conversion failed: {0}")]
    Convert(String),
    #[error("Failed to reset converter: {0}")]
    Reset(String),
}

/// A converter from one source signature to the target format
pub trait Converter {
    /// Convert `frame` into `out`, producing at most `out_count` samples per
    /// channel. Returns the number of samples per channel written.
    fn convert(
        &mut self,
        frame: &DecodedFrame,
        out: &mut [u8],
        out_count: usize,
    ) -> Result<usize, ResampleError>;

    /// Drop buffered state so the next conversion starts clean
    fn reset(&mut self) -> Result<(), ResampleError>;
}

/// Builds converters for (source signature, target) pairs
pub trait ConverterFactory {
    type Converter: Converter;

    fn build(
        &mut self,
        source: &SourceFormatSignature,
        target: &TargetFormat,
    ) -> Result<Self::Converter, ResampleError>;
}

/// Tuning for the resample manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResampleSettings {
    /// Extra output samples allowed per conversion
    pub headroom: usize,
    /// Consecutive build failures before rebuilding is suspended; 0 disables backoff
    pub failure_threshold: u32,
    /// Frames to pass through before building is attempted again
    pub cooldown_frames: u32,
}

impl Default for ResampleSettings {
    fn default() -> Self {
        Self {
            headroom: 256,
            failure_threshold: 3,
            cooldown_frames: 500,
        }
    }
}

/// Owns the converter and decides when it must be rebuilt
pub struct ResampleManager<F: ConverterFactory> {
    factory: F,
    target: TargetFormat,
    settings: ResampleSettings,
    converter: Option<F::Converter>,
    signature: Option<SourceFormatSignature>,
    builds: u64,
    consecutive_failures: u32,
    cooldown: u32,
}

impl<F: ConverterFactory> ResampleManager<F> {
    pub fn new(factory: F, target: TargetFormat, settings: ResampleSettings) -> Self {
        Self {
            factory,
            target,
            settings,
            converter: None,
            signature: None,
            builds: 0,
            consecutive_failures: 0,
            cooldown: 0,
        }
    }

    pub fn target(&self) -> &TargetFormat {
        &self.target
    }

    /// Number of build attempts so far
    pub fn builds(&self) -> u64 {
        self.builds
    }

    pub fn has_converter(&self) -> bool {
        self.converter.is_some()
    }

    /// Output samples to allocate for `samples` input samples at `source_rate`
    pub fn out_count(&self, samples: i32, source_rate: u32) -> usize {
        let samples = samples.max(0) as u64;
        let target_rate = self.target.sample_rate as u64;
        let scaled = if source_rate == 0 {
            samples
        } else {
            (samples * target_rate).div_ceil(source_rate as u64)
        };
        scaled as usize + self.settings.headroom
    }

    /// Convert `frame` to the target format.
    ///
    /// Returns the bytes to hand to the sink: a prefix of `buffer` when a
    /// converter is active, otherwise the frame's first plane.
    pub fn process<'a>(
        &mut self,
        frame: &'a DecodedFrame,
        buffer: &'a mut ResampleBuffer,
    ) -> Result<&'a [u8], ResampleError> {
        self.refresh(frame);

        let out_count = self.out_count(frame.samples, frame.sample_rate);
        let frame_bytes = self.target.frame_bytes();

        let Some(converter) = self.converter.as_mut() else {
            let native = frame.native_size();
            return Ok(match frame.planes.first() {
                Some(plane) => &plane[..native.min(plane.len())],
                None => &[],
            });
        };

        buffer.ensure(out_count * frame_bytes);

        let produced = converter.convert(frame, buffer.as_mut_slice(), out_count)?;
        if produced >= out_count {
            warn!(
                produced,
                out_count, "Audio buffer is probably too small, resetting converter"
            );
            if let Err(e) = converter.reset() {
                warn!("{}", e);
            }
        }

        let bytes = produced.min(out_count) * frame_bytes;
        Ok(&buffer.as_slice()[..bytes])
    }

    fn refresh(&mut self, frame: &DecodedFrame) {
        let signature = frame.signature();
        if self.signature == Some(signature) {
            return;
        }

        self.converter = None;
        if self.cooldown > 0 {
            self.cooldown -= 1;
            // Left unset so the frame after the cooldown triggers a build
            self.signature = None;
            return;
        }

        self.signature = Some(signature);
        self.builds += 1;
        match self.factory.build(&signature, &self.target) {
            Ok(converter) => {
                debug!(
                    format = ?signature.format,
                    layout = signature.layout.0,
                    rate = signature.sample_rate,
                    "Built audio converter"
                );
                self.converter = Some(converter);
                self.consecutive_failures = 0;
            }
            Err(e) => {
                warn!("{}, passing audio through", e);
                self.consecutive_failures += 1;
                let threshold = self.settings.failure_threshold;
                if threshold > 0 && self.consecutive_failures >= threshold {
                    warn!(
                        failures = self.consecutive_failures,
                        frames = self.settings.cooldown_frames,
                        "Suspending converter rebuilds"
                    );
                    self.consecutive_failures = 0;
                    self.cooldown = self.settings.cooldown_frames;
                    self.signature = None;
                }
            }
        }
    }
}
