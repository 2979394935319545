//! Audio/video synchronization.
//!
//! The video thread owns the playback anchor (`video_start`): the wall time at
//! which presentation time zero would have been shown. The audio thread keeps
//! its own presentation cursor and nudges the anchor whenever the two drift
//! apart by more than the threshold. Neither value is ever locked.

use std::sync::Arc;

use tracing::trace;

use crate::core::{AtomicF64, HiResClock, Seconds};

/// Shared clock cells handed to the audio and video threads
#[derive(Debug, Clone, Default)]
pub struct SyncController {
    video_start: Arc<AtomicF64>,
    audio_cursor: Arc<AtomicF64>,
}

impl SyncController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Anchor read and written by the video thread
    pub fn video_start(&self) -> Arc<AtomicF64> {
        Arc::clone(&self.video_start)
    }

    /// Presentation time of the audio thread
    pub fn audio_cursor(&self) -> Arc<AtomicF64> {
        Arc::clone(&self.audio_cursor)
    }

    /// Anchor playback so that presentation time `position` is shown at `now`
    pub fn anchor(&self, position: Seconds, now: Seconds) {
        self.video_start.store(now - position);
    }

    /// Presentation time the video side should show at `now`
    pub fn position_at(&self, now: Seconds) -> Seconds {
        now - self.video_start.load()
    }

    /// Positive when audio runs ahead of the anchor
    pub fn drift_at(&self, now: Seconds) -> Seconds {
        self.video_start.load() + self.audio_cursor.load() - now
    }
}

/// Drift correction parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriftSettings {
    pub threshold: Seconds,
    pub step: Seconds,
}

impl Default for DriftSettings {
    fn default() -> Self {
        Self {
            threshold: 0.1,
            step: 0.05,
        }
    }
}

/// The audio thread's view of the shared clock
pub struct AudioSync {
    video_start: Arc<AtomicF64>,
    cursor: Arc<AtomicF64>,
    wall: Arc<dyn HiResClock>,
    settings: DriftSettings,
}

impl AudioSync {
    pub fn new(controller: &SyncController, wall: Arc<dyn HiResClock>, settings: DriftSettings) -> Self {
        Self {
            video_start: controller.video_start(),
            cursor: controller.audio_cursor(),
            wall,
            settings,
        }
    }

    pub fn cursor(&self) -> Seconds {
        self.cursor.load()
    }

    /// Reset the cursor to `position`, the only way it ever moves backwards
    pub fn reanchor(&self, position: Seconds) {
        self.cursor.store(position);
    }

    /// Move the shared anchor one step toward zero drift if the drift is over
    /// the threshold. Returns the correction applied.
    pub fn correct_drift(&self) -> Option<Seconds> {
        let delta = self.video_start.load() + self.cursor.load() - self.wall.now();
        if delta.abs() <= self.settings.threshold {
            return None;
        }
        let correction = if delta < 0.0 {
            self.settings.step
        } else {
            -self.settings.step
        };
        self.video_start.add(correction);
        trace!(delta, correction, "Audio drift correction");
        Some(correction)
    }

    /// Account for data the sink did not consume
    pub fn advance_cursor(&self, elapsed: Seconds) -> Seconds {
        self.cursor.add(elapsed.max(0.0))
    }
}
