//! Core types shared by the audio pipeline.
//!
//! Time values are `f64` seconds; stream timestamps are converted through
//! their [`TimeBase`].

pub mod clock;
pub mod format;
pub mod frame;
pub mod packet;
pub mod time;

pub use clock::AtomicF64;
pub use format::{ChannelLayout, SampleFormat, SourceFormatSignature, TargetFormat};
pub use frame::DecodedFrame;
pub use packet::EncodedPacket;
pub use time::{HiResClock, Seconds, SystemClock, TimeBase};
