//! Conversion to the output format and the output sink.

pub mod buffer;
#[cfg(feature = "output")]
pub mod output;
pub mod resample;
pub mod sink;
#[cfg(feature = "ffmpeg")]
pub mod swr;

pub use buffer::ResampleBuffer;
#[cfg(feature = "output")]
pub use output::CpalSink;
pub use resample::{Converter, ConverterFactory, ResampleError, ResampleManager, ResampleSettings};
pub use sink::{AudioSink, SinkError, SinkSession};
#[cfg(feature = "ffmpeg")]
pub use swr::{SwrConverter, SwrFactory};
