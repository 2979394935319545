//! Compressed audio units as handed over by the demuxer.

use super::time::{Seconds, TimeBase};

/// One compressed unit of an audio stream.
///
/// A zero-length payload is a flush marker inserted by the demuxer around seeks;
/// it is never decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedPacket {
    pub stream: usize,
    pub pts: Option<i64>,
    pub time_base: TimeBase,
    pub data: Vec<u8>,
}

impl EncodedPacket {
    pub fn new(stream: usize, pts: Option<i64>, time_base: TimeBase, data: Vec<u8>) -> Self {
        Self {
            stream,
            pts,
            time_base,
            data,
        }
    }

    /// Flush marker for `stream`
    pub fn flush(stream: usize) -> Self {
        Self::new(stream, None, TimeBase::default(), Vec::new())
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_flush(&self) -> bool {
        self.data.is_empty()
    }

    /// Presentation time in seconds, if the packet is timestamped
    pub fn presentation_time(&self) -> Option<Seconds> {
        self.pts.map(|pts| self.time_base.ticks_to_seconds(pts))
    }
}
