//! Audio rendering pipeline of a media player.
//!
//! A dedicated audio thread pulls compressed packets from a queue, decodes
//! them, converts the samples to a fixed output format, keeps its
//! presentation cursor in step with the clock shared with the video thread
//! and feeds an output sink.
//!
//! The decoder, converter and sink are traits; FFmpeg and cpal backends are
//! available behind the `ffmpeg` and `output` features.

pub mod audio;
pub mod config;
pub mod core;
pub mod decode;
pub mod error;
pub mod playback;

pub use config::PipelineConfig;
pub use error::{Error, Result};
pub use playback::{AudioComponents, AudioEngine, PacketQueue, PlaybackEvent, SyncController};
