pub mod decoder;
#[cfg(feature = "ffmpeg")]
pub mod ffmpeg;
pub mod handler;
pub mod stream_info;

pub use decoder::{AudioDecoder, DecodeError};
#[cfg(feature = "ffmpeg")]
pub use self::ffmpeg::FfmpegDecoder;
pub use handler::{PacketHandler, PacketOutcome};
pub use stream_info::AudioStreamInfo;
