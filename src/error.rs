//! Error types for the audio rendering pipeline.
//!
//! Each subsystem owns its own error enum; this module gathers them into the
//! crate-level [`Error`] that the audio thread reports when it terminates.

use crate::audio::resample::ResampleError;
use crate::audio::sink::SinkError;
use crate::decode::decoder::DecodeError;

/// Error type for the audio thread and its collaborators
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The first packet after (re)initialization carried no timestamp.
    /// The stream cannot be anchored, so the audio thread stops.
    #[error("No presentation timestamp on first audio packet of stream {stream}")]
    MissingTimestamp { stream: usize },

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Resample error: {0}")]
    Resample(#[from] ResampleError),

    #[error("Audio output error: {0}")]
    Sink(#[from] SinkError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Thread error: {0}")]
    Thread(String),

    /// Cooperative cancellation was observed at a suspension point.
    /// Not a failure; it unwinds the audio thread after its resources are released.
    #[error("Audio thread interrupted")]
    Interrupted,
}

impl Error {
    /// Returns true if this is the cancellation signal rather than a failure.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Interrupted)
    }
}

/// Result type alias for the pipeline
pub type Result<T> = std::result::Result<T, Error>;
