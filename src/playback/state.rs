//! Decode loop state machine.

/// State of the audio thread's decode loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeLoopState {
    /// Draining packets into the sink
    Running,
    /// Sink paused, blocked until resume or a seek-while-paused
    PausedWaiting,
    /// Woken by a seek while paused: anchoring on the first new packet
    SeekingWhilePaused,
    /// Cancellation observed; the thread is unwinding
    Cancelled,
    /// The packet source is exhausted
    Finished,
}

impl DecodeLoopState {
    pub fn is_running(&self) -> bool {
        matches!(self, DecodeLoopState::Running)
    }

    pub fn is_paused(&self) -> bool {
        matches!(
            self,
            DecodeLoopState::PausedWaiting | DecodeLoopState::SeekingWhilePaused
        )
    }

    /// No further transitions follow a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, DecodeLoopState::Cancelled | DecodeLoopState::Finished)
    }
}
