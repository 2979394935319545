//! Audio output sink abstraction.

use std::ops::{Deref, DerefMut};

use tracing::debug;

/// Error type for audio output
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("No audio device available")]
    NoDevice,
    #[error("Unsupported output format: {0}")]
    UnsupportedFormat(String),
    #[error("cpal error: {0}")]
    Backend(String),
}

/// Device the converted bytes end up in.
///
/// `initialize_thread` associates the sink with the calling thread and is
/// always paired with `deinitialize_thread` on the same thread.
pub trait AudioSink {
    fn initialize_thread(&mut self) -> Result<(), SinkError>;

    fn deinitialize_thread(&mut self);

    fn pause(&mut self);

    fn resume(&mut self);

    /// Queue `data` for playback. Returns false if the sink did not consume it,
    /// in which case the caller accounts for the elapsed time itself.
    fn write(&mut self, data: &[u8]) -> bool;
}

impl<S: AudioSink + ?Sized> AudioSink for Box<S> {
    fn initialize_thread(&mut self) -> Result<(), SinkError> {
        (**self).initialize_thread()
    }

    fn deinitialize_thread(&mut self) {
        (**self).deinitialize_thread()
    }

    fn pause(&mut self) {
        (**self).pause()
    }

    fn resume(&mut self) {
        (**self).resume()
    }

    fn write(&mut self, data: &[u8]) -> bool {
        (**self).write(data)
    }
}

/// Thread association with a sink, released when dropped
pub struct SinkSession<'a, S: AudioSink + ?Sized> {
    sink: &'a mut S,
}

impl<'a, S: AudioSink + ?Sized> SinkSession<'a, S> {
    pub fn begin(sink: &'a mut S) -> Result<Self, SinkError> {
        sink.initialize_thread()?;
        debug!("Audio sink attached to thread");
        Ok(Self { sink })
    }
}

impl<S: AudioSink + ?Sized> Deref for SinkSession<'_, S> {
    type Target = S;

    fn deref(&self) -> &S {
        self.sink
    }
}

impl<S: AudioSink + ?Sized> DerefMut for SinkSession<'_, S> {
    fn deref_mut(&mut self) -> &mut S {
        self.sink
    }
}

impl<S: AudioSink + ?Sized> Drop for SinkSession<'_, S> {
    fn drop(&mut self) {
        self.sink.deinitialize_thread();
        debug!("Audio sink detached from thread");
    }
}
