//! Request flags shared between the player and the audio thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::error::{Error, Result};
use crate::playback::queue::PacketSource;

/// Cooperative cancellation flag
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// `Err(Interrupted)` once cancelled
    #[inline]
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Interrupted)
        } else {
            Ok(())
        }
    }
}

/// Pause, seek and cancellation requests for one audio thread.
///
/// Every setter wakes both the pause wait and any blocked dequeue so the audio
/// thread re-evaluates its state promptly.
pub struct PlaybackControl {
    paused: Mutex<bool>,
    pause_changed: Condvar,
    seek_requested: AtomicBool,
    seek_while_paused: AtomicBool,
    cancel: CancelToken,
    source: Arc<dyn PacketSource>,
}

impl PlaybackControl {
    pub fn new(source: Arc<dyn PacketSource>) -> Self {
        Self {
            paused: Mutex::new(false),
            pause_changed: Condvar::new(),
            seek_requested: AtomicBool::new(false),
            seek_while_paused: AtomicBool::new(false),
            cancel: CancelToken::new(),
            source,
        }
    }

    pub fn source(&self) -> &Arc<dyn PacketSource> {
        &self.source
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn is_paused(&self) -> bool {
        *self.paused.lock()
    }

    pub fn set_paused(&self, paused: bool) {
        *self.paused.lock() = paused;
        self.notify();
    }

    /// Ask the audio thread to re-anchor on the next packet
    pub fn request_seek(&self) {
        self.seek_requested.store(true, Ordering::Release);
        self.notify();
    }

    /// Returns and clears a pending seek request
    pub fn take_seek_request(&self) -> bool {
        self.seek_requested.swap(false, Ordering::AcqRel)
    }

    /// Seek while paused: the audio thread wakes, anchors on the first new
    /// packet and holds it until playback resumes.
    pub fn request_seek_while_paused(&self) {
        self.seek_while_paused.store(true, Ordering::Release);
        self.request_seek();
    }

    pub fn is_seeking_while_paused(&self) -> bool {
        self.seek_while_paused.load(Ordering::Acquire)
    }

    pub fn clear_seek_while_paused(&self) {
        self.seek_while_paused.store(false, Ordering::Release);
    }

    /// True while the audio thread should not take packets
    pub fn should_hold(&self) -> bool {
        self.is_paused() && !self.is_seeking_while_paused()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
        self.notify();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Block while paused without a pending seek-while-paused.
    /// Cancellation is checked before and after every wait.
    pub fn wait_while_paused(&self) -> Result<()> {
        let mut paused = self.paused.lock();
        loop {
            self.cancel.check()?;
            if !*paused || self.is_seeking_while_paused() {
                return Ok(());
            }
            self.pause_changed.wait(&mut paused);
        }
    }

    fn notify(&self) {
        {
            let _paused = self.paused.lock();
            self.pause_changed.notify_all();
        }
        self.source.wake_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::queue::PacketQueue;
    use std::thread;
    use std::time::Duration;

    fn control() -> Arc<PlaybackControl> {
        Arc::new(PlaybackControl::new(Arc::new(PacketQueue::new(4))))
    }

    #[test]
    fn test_hold_predicate() {
        let control = control();
        assert!(!control.should_hold());
        control.set_paused(true);
        assert!(control.should_hold());
        control.request_seek_while_paused();
        assert!(!control.should_hold());
        assert!(control.take_seek_request());
        assert!(!control.take_seek_request());
    }

    #[test]
    fn test_resume_wakes_pause_wait() {
        let control = control();
        control.set_paused(true);
        let handle = {
            let control = Arc::clone(&control);
            thread::spawn(move || control.wait_while_paused())
        };
        thread::sleep(Duration::from_millis(20));
        control.set_paused(false);
        assert!(handle.join().unwrap().is_ok());
    }

    #[test]
    fn test_cancel_interrupts_pause_wait() {
        let control = control();
        control.set_paused(true);
        let handle = {
            let control = Arc::clone(&control);
            thread::spawn(move || control.wait_while_paused())
        };
        thread::sleep(Duration::from_millis(20));
        control.cancel();
        let result = handle.join().unwrap();
        assert!(matches!(result, Err(Error::Interrupted)));
    }

    #[test]
    fn test_seek_while_paused_releases_wait() {
        let control = control();
        control.set_paused(true);
        let handle = {
            let control = Arc::clone(&control);
            thread::spawn(move || control.wait_while_paused())
        };
        thread::sleep(Duration::from_millis(20));
        control.request_seek_while_paused();
        assert!(handle.join().unwrap().is_ok());
        assert!(control.is_paused());
    }
}
