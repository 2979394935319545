pub mod control;
pub mod decode_loop;
pub mod engine;
pub mod queue;
pub mod state;
pub mod sync;

pub use control::{CancelToken, PlaybackControl};
pub use decode_loop::DecodeLoop;
pub use engine::{AudioComponents, AudioEngine, PlaybackEvent, EVENT_CAPACITY};
pub use queue::{PacketQueue, PacketSource, Pop};
pub use state::DecodeLoopState;
pub use sync::{AudioSync, DriftSettings, SyncController};
