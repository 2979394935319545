//! Decoded audio frames.

use super::format::{ChannelLayout, SampleFormat, SourceFormatSignature};

/// A decoded block of samples.
///
/// One instance is reused for every frame of a packet: decoders refill the
/// planes in place so their allocations survive across drain iterations.
#[derive(Debug, Clone)]
pub struct DecodedFrame {
    pub format: SampleFormat,
    pub channels: u16,
    /// Layout as declared by the decoder; may disagree with `channels`
    pub layout: Option<ChannelLayout>,
    pub sample_rate: u32,
    /// Samples per channel. Non-positive means there is nothing to render.
    pub samples: i32,
    /// One plane for packed formats, one per channel for planar formats
    pub planes: Vec<Vec<u8>>,
}

impl DecodedFrame {
    pub fn new() -> Self {
        Self {
            format: SampleFormat::S16,
            channels: 0,
            layout: None,
            sample_rate: 0,
            samples: 0,
            planes: Vec::new(),
        }
    }

    /// Byte size of the samples in their native format, all channels
    pub fn native_size(&self) -> usize {
        self.format.buffer_size(self.channels, self.samples)
    }

    /// Layout to feed the converter with
    pub fn effective_layout(&self) -> ChannelLayout {
        ChannelLayout::normalize(self.layout, self.channels)
    }

    pub fn signature(&self) -> SourceFormatSignature {
        SourceFormatSignature {
            format: self.format,
            layout: self.effective_layout(),
            sample_rate: self.sample_rate,
        }
    }

    /// Nominal play time of the frame's native bytes; zero when the rate is unknown
    pub fn nominal_duration(&self) -> f64 {
        let bytes_per_second =
            self.channels as usize * self.sample_rate as usize * self.format.bytes_per_sample();
        if bytes_per_second == 0 {
            return 0.0;
        }
        self.native_size() as f64 / bytes_per_second as f64
    }

    /// Resize the plane set to `count` planes of `len` bytes each, keeping allocations
    pub fn reset_planes(&mut self, count: usize, len: usize) {
        self.planes.resize_with(count, Vec::new);
        for plane in &mut self.planes {
            plane.clear();
            plane.resize(len, 0);
        }
    }
}

impl Default for DecodedFrame {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stereo_s16(samples: i32, rate: u32) -> DecodedFrame {
        DecodedFrame {
            format: SampleFormat::S16,
            channels: 2,
            layout: Some(ChannelLayout::STEREO),
            sample_rate: rate,
            samples,
            planes: vec![vec![0; samples.max(0) as usize * 4]],
        }
    }

    #[test]
    fn test_native_size() {
        assert_eq!(stereo_s16(1024, 48_000).native_size(), 4096);
        assert_eq!(stereo_s16(0, 48_000).native_size(), 0);
    }

    #[test]
    fn test_nominal_duration() {
        let frame = stereo_s16(1024, 48_000);
        assert!((frame.nominal_duration() - 0.021_333).abs() < 1e-5);
        assert_eq!(stereo_s16(1024, 0).nominal_duration(), 0.0);
    }

    #[test]
    fn test_reset_planes_keeps_capacity() {
        let mut frame = DecodedFrame::new();
        frame.reset_planes(2, 4096);
        let ptr = frame.planes[0].as_ptr();
        frame.reset_planes(2, 1024);
        assert_eq!(frame.planes.len(), 2);
        assert_eq!(frame.planes[0].len(), 1024);
        assert_eq!(frame.planes[0].as_ptr(), ptr);
    }

    #[test]
    fn test_signature_uses_normalized_layout() {
        let mut frame = stereo_s16(16, 44_100);
        frame.layout = Some(ChannelLayout::MONO);
        assert_eq!(frame.signature().layout, ChannelLayout::STEREO);
    }
}
