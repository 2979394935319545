//! The audio thread's main loop.
//!
//! Each outer iteration handles pause, resumes the sink, flushes a postponed
//! packet and then drains the packet source until it runs dry, the player
//! pauses or a packet fails.

use std::sync::Arc;

use crossbeam::channel::{Sender, TrySendError};
use tracing::{debug, info, trace};

use crate::audio::buffer::ResampleBuffer;
use crate::audio::resample::ConverterFactory;
use crate::audio::sink::{AudioSink, SinkSession};
use crate::core::EncodedPacket;
use crate::decode::decoder::AudioDecoder;
use crate::decode::handler::{PacketHandler, PacketOutcome};
use crate::error::{Error, Result};
use crate::playback::control::{CancelToken, PlaybackControl};
use crate::playback::engine::PlaybackEvent;
use crate::playback::queue::Pop;
use crate::playback::state::DecodeLoopState;

/// Why a drain pass ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Drain {
    /// Pause, a failed packet or a postponed packet
    Left,
    /// The source has no more packets
    Exhausted,
}

pub struct DecodeLoop<D: AudioDecoder, F: ConverterFactory> {
    control: Arc<PlaybackControl>,
    handler: PacketHandler<D, F>,
    buffer: ResampleBuffer,
    events: Sender<PlaybackEvent>,
    state: DecodeLoopState,
    initialized: bool,
    /// First packet after a seek-while-paused, held until playback resumes
    postponed: Option<EncodedPacket>,
    sink_paused: bool,
}

impl<D: AudioDecoder, F: ConverterFactory> DecodeLoop<D, F> {
    pub fn new(
        control: Arc<PlaybackControl>,
        handler: PacketHandler<D, F>,
        events: Sender<PlaybackEvent>,
    ) -> Self {
        Self {
            control,
            handler,
            buffer: ResampleBuffer::new(),
            events,
            state: DecodeLoopState::Running,
            initialized: false,
            postponed: None,
            sink_paused: false,
        }
    }

    pub fn state(&self) -> DecodeLoopState {
        self.state
    }

    pub fn handler(&self) -> &PacketHandler<D, F> {
        &self.handler
    }

    pub fn resample_buffer(&self) -> &ResampleBuffer {
        &self.buffer
    }

    /// Run until cancellation, end of input or a fatal error.
    ///
    /// The sink is attached to the calling thread for the duration of the call
    /// and detached on every exit path.
    pub fn run<S: AudioSink + ?Sized>(&mut self, sink: &mut S) -> Result<()> {
        info!("Audio thread started");
        let mut session = SinkSession::begin(sink)?;
        let result = self.drive(&mut *session);

        if self.postponed.take().is_some() {
            debug!("Released postponed audio packet");
        }
        match &result {
            Ok(()) => self.set_state(DecodeLoopState::Finished),
            Err(Error::Interrupted) => {
                info!("Audio thread interrupted");
                self.set_state(DecodeLoopState::Cancelled);
            }
            Err(_) => {}
        }
        result
    }

    fn drive<S: AudioSink + ?Sized>(&mut self, sink: &mut S) -> Result<()> {
        let cancel = self.control.cancel_token().clone();

        loop {
            if self.control.should_hold() {
                if !self.sink_paused {
                    sink.pause();
                    self.sink_paused = true;
                }
                self.set_state(DecodeLoopState::PausedWaiting);
                self.control.wait_while_paused()?;
                continue;
            }

            let seeking_while_paused = self.control.is_seeking_while_paused();
            if self.sink_paused && !seeking_while_paused {
                sink.resume();
                self.sink_paused = false;
            }
            self.set_state(if seeking_while_paused {
                DecodeLoopState::SeekingWhilePaused
            } else {
                DecodeLoopState::Running
            });

            if let Some(packet) = self.postponed.take() {
                if !self.control.is_seeking_while_paused() {
                    // Outcome ignored: the drain below decides whether to go on
                    self.handler
                        .handle(&packet, &mut self.buffer, sink, &cancel);
                }
            }

            if self.drain(sink, &cancel)? == Drain::Exhausted {
                info!("Audio packet source exhausted");
                return Ok(());
            }

            cancel.check()?;
        }
    }

    fn drain<S: AudioSink + ?Sized>(&mut self, sink: &mut S, cancel: &CancelToken) -> Result<Drain> {
        let control = Arc::clone(&self.control);
        let hold = move || control.should_hold();

        loop {
            let packet = match self.control.source().pop_unless(&hold, cancel) {
                Pop::Packet(packet) => packet,
                Pop::Interrupted => {
                    cancel.check()?;
                    return Ok(Drain::Left);
                }
                Pop::Closed => return Ok(Drain::Exhausted),
            };

            // Checked per packet so a request made while blocked applies to it
            if self.control.take_seek_request() {
                self.initialized = false;
            }

            if packet.is_flush() {
                debug!(stream = packet.stream, "Flush packet");
                continue;
            }

            if !self.initialized {
                let position = packet
                    .presentation_time()
                    .ok_or(Error::MissingTimestamp {
                        stream: packet.stream,
                    })?;
                self.handler.sync().reanchor(position);
                self.emit(PlaybackEvent::PositionChanged {
                    position,
                    advance: 0.0,
                });

                if self.control.is_seeking_while_paused() {
                    self.control.clear_seek_while_paused();
                    trace!(position, "Postponing first packet after seek while paused");
                    // Left uninitialized: the packet after this one anchors again
                    self.postponed = Some(packet);
                    return Ok(Drain::Left);
                }
                self.initialized = true;
            }

            let outcome = self.handler.handle(&packet, &mut self.buffer, sink, cancel);
            if outcome == PacketOutcome::Stop || self.control.should_hold() {
                return Ok(Drain::Left);
            }
        }
    }

    fn set_state(&mut self, state: DecodeLoopState) {
        if self.state == state {
            return;
        }
        trace!(from = ?self.state, to = ?state, "Decode loop state");
        self.state = state;
        self.emit(PlaybackEvent::StateChanged(state));
    }

    /// Never blocks the audio thread; a full or disconnected channel drops the event
    fn emit(&self, event: PlaybackEvent) {
        if let Err(TrySendError::Full(event)) = self.events.try_send(event) {
            trace!(?event, "Event channel full, event dropped");
        }
    }
}
