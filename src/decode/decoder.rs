//! Decoder abstraction used by the packet handler.
//!
//! A backend owns the codec parameters of every stream in the input and keeps
//! at most one decoder open. Frames are written into a caller-owned
//! [`DecodedFrame`] so the plane allocations are reused.

use crate::core::{DecodedFrame, EncodedPacket};
use crate::decode::stream_info::AudioStreamInfo;

/// Error type for decoding operations
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("FFmpeg error: {0}")]
    FFmpeg(String),
    #[error("Unknown stream: {0}")]
    UnknownStream(usize),
    #[error("Codec not found")]
    CodecNotFound,
    #[error("Failed to open codec: {0}")]
    CodecOpenFailed(String),
    #[error("No decoder open")]
    NotOpen,
    #[error("Failed to submit packet: {0}")]
    SendFailed(String),
    #[error("Failed to receive frame: {0}")]
    ReceiveFailed(String),
    #[error("Unsupported sample format: {0}")]
    UnsupportedFormat(String),
}

/// Audio decoder backend
pub trait AudioDecoder {
    /// Close the current decoder, adopt `stream`'s codec parameters and open a
    /// decoder for them.
    fn open_stream(&mut self, stream: usize) -> Result<AudioStreamInfo, DecodeError>;

    /// Submit one compressed packet
    fn send_packet(&mut self, packet: &EncodedPacket) -> Result<(), DecodeError>;

    /// Write the next decoded frame into `frame`.
    /// Returns `Ok(false)` once the decoder needs more input.
    fn receive_frame(&mut self, frame: &mut DecodedFrame) -> Result<bool, DecodeError>;

    /// Release the open decoder, if any
    fn close(&mut self);
}

impl<D: AudioDecoder + ?Sized> AudioDecoder for Box<D> {
    fn open_stream(&mut self, stream: usize) -> Result<AudioStreamInfo, DecodeError> {
        (**self).open_stream(stream)
    }

    fn send_packet(&mut self, packet: &EncodedPacket) -> Result<(), DecodeError> {
        (**self).send_packet(packet)
    }

    fn receive_frame(&mut self, frame: &mut DecodedFrame) -> Result<bool, DecodeError> {
        (**self).receive_frame(frame)
    }

    fn close(&mut self) {
        (**self).close()
    }
}
