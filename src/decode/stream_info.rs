//! Stream metadata reported when a decoder is opened.

use std::fmt;

use crate::core::{SampleFormat, TimeBase};

/// Codec parameters of an audio stream
#[derive(Debug, Clone, PartialEq)]
pub struct AudioStreamInfo {
    pub index: usize,
    pub codec_name: String,
    pub time_base: TimeBase,
    pub sample_rate: u32,
    pub channels: u16,
    /// `None` when the codec's output format is not one we handle natively
    pub sample_format: Option<SampleFormat>,
}

impl fmt::Display for AudioStreamInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} {} {}Hz {}ch",
            self.index, self.codec_name, self.sample_rate, self.channels
        )?;
        if let Some(format) = self.sample_format {
            write!(f, " {:?}", format)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let info = AudioStreamInfo {
            index: 1,
            codec_name: "aac".into(),
            time_base: TimeBase::new(1, 48_000),
            sample_rate: 48_000,
            channels: 2,
            sample_format: Some(SampleFormat::F32p),
        };
        assert_eq!(info.to_string(), "#1 aac 48000Hz 2ch F32p");
    }
}
