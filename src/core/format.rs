//! Sample formats, channel layouts and the format signatures built from them.

use serde::Deserialize;

/// Audio sample formats, packed and planar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleFormat {
    U8,
    S16,
    S32,
    F32,
    F64,
    U8p,
    S16p,
    S32p,
    F32p,
    F64p,
}

impl SampleFormat {
    /// Bytes per sample of one channel
    pub const fn bytes_per_sample(self) -> usize {
        match self {
            Self::U8 | Self::U8p => 1,
            Self::S16 | Self::S16p => 2,
            Self::S32 | Self::S32p | Self::F32 | Self::F32p => 4,
            Self::F64 | Self::F64p => 8,
        }
    }

    /// Planar formats keep one data plane per channel
    pub const fn is_planar(self) -> bool {
        matches!(
            self,
            Self::U8p | Self::S16p | Self::S32p | Self::F32p | Self::F64p
        )
    }

    /// Size in bytes of `samples` samples over `channels` channels, without padding.
    /// Zero for non-positive inputs.
    pub fn buffer_size(self, channels: u16, samples: i32) -> usize {
        if samples <= 0 {
            return 0;
        }
        samples as usize * channels as usize * self.bytes_per_sample()
    }
}

/// Channel layout as a speaker bit mask
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(transparent)]
pub struct ChannelLayout(pub u64);

impl ChannelLayout {
    pub const FRONT_LEFT: u64 = 0x1;
    pub const FRONT_RIGHT: u64 = 0x2;
    pub const FRONT_CENTER: u64 = 0x4;
    pub const LOW_FREQUENCY: u64 = 0x8;
    pub const BACK_LEFT: u64 = 0x10;
    pub const BACK_RIGHT: u64 = 0x20;
    pub const BACK_CENTER: u64 = 0x100;
    pub const SIDE_LEFT: u64 = 0x200;
    pub const SIDE_RIGHT: u64 = 0x400;

    pub const MONO: ChannelLayout = ChannelLayout(Self::FRONT_CENTER);
    pub const STEREO: ChannelLayout = ChannelLayout(Self::FRONT_LEFT | Self::FRONT_RIGHT);

    /// Number of channels in the mask
    pub const fn channels(self) -> u16 {
        self.0.count_ones() as u16
    }

    /// Canonical layout for a channel count
    pub fn default_for(channels: u16) -> ChannelLayout {
        let stereo = Self::FRONT_LEFT | Self::FRONT_RIGHT;
        let surround = stereo | Self::FRONT_CENTER;
        let back = Self::BACK_LEFT | Self::BACK_RIGHT;
        let mask = match channels {
            0 => 0,
            1 => Self::FRONT_CENTER,
            2 => stereo,
            3 => surround,
            4 => stereo | back,
            5 => surround | back,
            6 => surround | back | Self::LOW_FREQUENCY,
            7 => surround | back | Self::LOW_FREQUENCY | Self::BACK_CENTER,
            8 => surround | back | Self::LOW_FREQUENCY | Self::SIDE_LEFT | Self::SIDE_RIGHT,
            n if n >= 64 => u64::MAX,
            n => (1u64 << n) - 1,
        };
        ChannelLayout(mask)
    }

    /// Layout to use for a frame: the declared layout only when it agrees with
    /// the frame's channel count, otherwise the canonical default.
    pub fn normalize(declared: Option<ChannelLayout>, channels: u16) -> ChannelLayout {
        match declared {
            Some(layout) if layout.0 != 0 && layout.channels() == channels => layout,
            _ => Self::default_for(channels),
        }
    }
}

/// Format description of the last decoded frame, used to decide converter rebuilds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceFormatSignature {
    pub format: SampleFormat,
    pub layout: ChannelLayout,
    pub sample_rate: u32,
}

/// Fixed output format required by the sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TargetFormat {
    pub format: SampleFormat,
    pub channels: u16,
    pub layout: ChannelLayout,
    pub sample_rate: u32,
}

impl TargetFormat {
    /// Target with the canonical layout for `channels`
    pub fn new(format: SampleFormat, channels: u16, sample_rate: u32) -> Self {
        Self {
            format,
            channels,
            layout: ChannelLayout::default_for(channels),
            sample_rate,
        }
    }

    /// Bytes per interleaved sample frame (all channels)
    pub fn frame_bytes(&self) -> usize {
        self.channels as usize * self.format.bytes_per_sample()
    }
}

impl Default for TargetFormat {
    /// Packed signed 16-bit stereo at 44.1kHz
    fn default() -> Self {
        Self::new(SampleFormat::S16, 2, 44_100)
    }
}
