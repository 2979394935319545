//! Audio thread lifecycle.
//! The engine talks to its owner over crossbeam channels.

use std::sync::Arc;
use std::thread;

use crossbeam::channel::{self, Receiver};
use tracing::{error, info, warn};

use crate::audio::resample::{ConverterFactory, ResampleManager};
use crate::audio::sink::AudioSink;
use crate::config::PipelineConfig;
use crate::core::{HiResClock, Seconds};
use crate::decode::decoder::AudioDecoder;
use crate::decode::handler::PacketHandler;
use crate::error::{Error, Result};
use crate::playback::control::PlaybackControl;
use crate::playback::decode_loop::DecodeLoop;
use crate::playback::queue::PacketSource;
use crate::playback::state::DecodeLoopState;
use crate::playback::sync::{AudioSync, SyncController};

/// Events buffered for the owner before new ones are dropped
pub const EVENT_CAPACITY: usize = 64;

/// Notification sent by the audio thread
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
    /// The audio cursor was (re)anchored at `position`
    PositionChanged { position: Seconds, advance: Seconds },
    StateChanged(DecodeLoopState),
    /// The thread has exited; `error` is set for failures, not for cancellation
    Terminated { error: Option<String> },
}

/// Collaborators built on the audio thread itself
pub struct AudioComponents<D, F, S> {
    pub decoder: D,
    pub converters: F,
    pub sink: S,
}

/// Handle to a running audio thread
pub struct AudioEngine {
    control: Arc<PlaybackControl>,
    sync: SyncController,
    events: Receiver<PlaybackEvent>,
    handle: Option<thread::JoinHandle<()>>,
}

impl AudioEngine {
    /// Spawn the audio thread.
    ///
    /// `build` runs on the new thread, so decoders and sinks that must stay
    /// on the thread that created them are fine.
    pub fn start<D, F, S, B>(
        config: &PipelineConfig,
        source: Arc<dyn PacketSource>,
        sync: SyncController,
        wall: Arc<dyn HiResClock>,
        build: B,
    ) -> Result<Self>
    where
        D: AudioDecoder + 'static,
        F: ConverterFactory + 'static,
        S: AudioSink + 'static,
        B: FnOnce() -> Result<AudioComponents<D, F, S>> + Send + 'static,
    {
        let control = Arc::new(PlaybackControl::new(source));
        let (event_tx, event_rx) = channel::bounded(EVENT_CAPACITY);

        let thread_control = Arc::clone(&control);
        let audio_sync = AudioSync::new(&sync, wall, config.drift_settings());
        let target = config.target;
        let settings = config.resample_settings();

        let handle = thread::Builder::new()
            .name("audio".into())
            .spawn(move || {
                let result = build().and_then(|mut parts| {
                    let resampler = ResampleManager::new(parts.converters, target, settings);
                    let handler = PacketHandler::new(parts.decoder, resampler, audio_sync);
                    let mut decode_loop =
                        DecodeLoop::new(thread_control, handler, event_tx.clone());
                    decode_loop.run(&mut parts.sink)
                });

                let error = match result {
                    Ok(()) | Err(Error::Interrupted) => None,
                    Err(e) => {
                        error!("Audio thread failed: {}", e);
                        Some(e.to_string())
                    }
                };
                if event_tx.try_send(PlaybackEvent::Terminated { error }).is_err() {
                    warn!("Event channel full, termination not reported");
                }
            })
            .map_err(|e| Error::Thread(e.to_string()))?;

        info!("Audio engine started");
        Ok(Self {
            control,
            sync,
            events: event_rx,
            handle: Some(handle),
        })
    }

    pub fn control(&self) -> &Arc<PlaybackControl> {
        &self.control
    }

    pub fn sync(&self) -> &SyncController {
        &self.sync
    }

    /// Bounded to [`EVENT_CAPACITY`]; events sent while it is full are lost
    pub fn events(&self) -> &Receiver<PlaybackEvent> {
        &self.events
    }

    pub fn pause(&self) {
        self.control.set_paused(true);
    }

    pub fn resume(&self) {
        self.control.set_paused(false);
    }

    pub fn seek(&self) {
        self.control.request_seek();
    }

    pub fn seek_while_paused(&self) {
        self.control.request_seek_while_paused();
    }

    pub fn cancel(&self) {
        self.control.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    /// Wait for the audio thread to exit
    pub fn join(mut self) -> Result<()> {
        self.join_inner()
    }

    fn join_inner(&mut self) -> Result<()> {
        match self.handle.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| Error::Thread("audio thread panicked".into())),
            None => Ok(()),
        }
    }
}

impl Drop for AudioEngine {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.control.cancel();
            let _ = self.join_inner();
        }
    }
}
