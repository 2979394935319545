//! Scripted collaborators for driving the decode loop without FFmpeg or a device.

#![allow(dead_code)]

use std::sync::Arc;

use crossbeam::channel::{self, Receiver};
use parking_lot::Mutex;

use avplay_audio::audio::{
    AudioSink, Converter, ConverterFactory, ResampleError, ResampleManager, ResampleSettings,
    SinkError,
};
use avplay_audio::core::{
    ChannelLayout, DecodedFrame, EncodedPacket, HiResClock, SampleFormat, Seconds,
    SourceFormatSignature, TargetFormat, TimeBase,
};
use avplay_audio::decode::{AudioDecoder, AudioStreamInfo, DecodeError, PacketHandler};
use avplay_audio::playback::{
    AudioSync, DecodeLoop, DriftSettings, PacketQueue, PlaybackControl, PlaybackEvent,
    SyncController,
};

pub const SOURCE_RATE: u32 = 48_000;

/// Wall clock that only moves when told to
pub struct FixedClock(pub Mutex<Seconds>);

impl FixedClock {
    pub fn at(now: Seconds) -> Arc<Self> {
        Arc::new(Self(Mutex::new(now)))
    }
}

impl HiResClock for FixedClock {
    fn now(&self) -> Seconds {
        *self.0.lock()
    }
}

/// What the decoder was asked to do
#[derive(Debug, Default)]
pub struct DecoderLog {
    pub opened: Vec<usize>,
    pub sent: Vec<Option<i64>>,
}

/// Each packet decodes into one S16 stereo frame; four payload bytes per sample
pub struct ScriptedDecoder {
    pub log: Arc<Mutex<DecoderLog>>,
    pub rate: u32,
    pub format: SampleFormat,
    pending: Option<i32>,
}

impl ScriptedDecoder {
    pub fn new(log: Arc<Mutex<DecoderLog>>) -> Self {
        Self {
            log,
            rate: SOURCE_RATE,
            format: SampleFormat::S16,
            pending: None,
        }
    }
}

impl AudioDecoder for ScriptedDecoder {
    fn open_stream(&mut self, stream: usize) -> Result<AudioStreamInfo, DecodeError> {
        self.log.lock().opened.push(stream);
        Ok(AudioStreamInfo {
            index: stream,
            codec_name: "pcm_s16le".into(),
            time_base: TimeBase::new(1, self.rate as i32),
            sample_rate: self.rate,
            channels: 2,
            sample_format: Some(self.format),
        })
    }

    fn send_packet(&mut self, packet: &EncodedPacket) -> Result<(), DecodeError> {
        self.log.lock().sent.push(packet.pts);
        self.pending = Some((packet.size() / 4) as i32);
        Ok(())
    }

    fn receive_frame(&mut self, frame: &mut DecodedFrame) -> Result<bool, DecodeError> {
        let Some(samples) = self.pending.take() else {
            return Ok(false);
        };
        frame.format = self.format;
        frame.channels = 2;
        frame.layout = Some(ChannelLayout::STEREO);
        frame.sample_rate = self.rate;
        frame.samples = samples;
        let len = frame.native_size();
        frame.reset_planes(1, len);
        Ok(true)
    }

    fn close(&mut self) {}
}

/// Produces exactly the rate-scaled number of samples, all silence
pub struct RateConverter {
    source_rate: u32,
    target_rate: u32,
}

impl Converter for RateConverter {
    fn convert(
        &mut self,
        frame: &DecodedFrame,
        _out: &mut [u8],
        out_count: usize,
    ) -> Result<usize, ResampleError> {
        let produced = (frame.samples.max(0) as u64 * self.target_rate as u64)
            .div_ceil(self.source_rate as u64) as usize;
        Ok(produced.min(out_count))
    }

    fn reset(&mut self) -> Result<(), ResampleError> {
        Ok(())
    }
}

pub struct RateConverterFactory {
    pub builds: Arc<Mutex<u32>>,
    pub fail: bool,
}

impl RateConverterFactory {
    pub fn new() -> Self {
        Self {
            builds: Arc::new(Mutex::new(0)),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            builds: Arc::new(Mutex::new(0)),
            fail: true,
        }
    }
}

impl ConverterFactory for RateConverterFactory {
    type Converter = RateConverter;

    fn build(
        &mut self,
        source: &SourceFormatSignature,
        target: &TargetFormat,
    ) -> Result<RateConverter, ResampleError> {
        *self.builds.lock() += 1;
        if self.fail {
            return Err(ResampleError::Build("scripted failure".into()));
        }
        Ok(RateConverter {
            source_rate: source.sample_rate,
            target_rate: target.sample_rate,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SinkCall {
    Init,
    Deinit,
    Pause,
    Resume,
    Write(usize),
}

/// Records every call; `consume` decides what `write` reports
pub struct RecordingSink {
    pub calls: Arc<Mutex<Vec<SinkCall>>>,
    pub consume: bool,
}

impl RecordingSink {
    pub fn new(consume: bool) -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            consume,
        }
    }

    pub fn count(calls: &Mutex<Vec<SinkCall>>, call: &SinkCall) -> usize {
        calls.lock().iter().filter(|c| *c == call).count()
    }

    pub fn writes(calls: &Mutex<Vec<SinkCall>>) -> Vec<usize> {
        calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                SinkCall::Write(n) => Some(*n),
                _ => None,
            })
            .collect()
    }
}

impl AudioSink for RecordingSink {
    fn initialize_thread(&mut self) -> Result<(), SinkError> {
        self.calls.lock().push(SinkCall::Init);
        Ok(())
    }

    fn deinitialize_thread(&mut self) {
        self.calls.lock().push(SinkCall::Deinit);
    }

    fn pause(&mut self) {
        self.calls.lock().push(SinkCall::Pause);
    }

    fn resume(&mut self) {
        self.calls.lock().push(SinkCall::Resume);
    }

    fn write(&mut self, data: &[u8]) -> bool {
        self.calls.lock().push(SinkCall::Write(data.len()));
        self.consume
    }
}

/// A decode loop wired to a fresh queue, with handles to inspect it
pub struct Harness {
    pub queue: Arc<PacketQueue>,
    pub control: Arc<PlaybackControl>,
    pub sync: SyncController,
    pub clock: Arc<FixedClock>,
    pub decoder_log: Arc<Mutex<DecoderLog>>,
    pub builds: Arc<Mutex<u32>>,
    pub events: Receiver<PlaybackEvent>,
    pub decode_loop: DecodeLoop<ScriptedDecoder, RateConverterFactory>,
}

impl Harness {
    pub fn new(factory: RateConverterFactory, now: Seconds) -> Self {
        Self::with_event_capacity(factory, now, None)
    }

    /// `capacity` bounds the event channel; `None` leaves it unbounded
    pub fn with_event_capacity(
        factory: RateConverterFactory,
        now: Seconds,
        capacity: Option<usize>,
    ) -> Self {
        let queue = Arc::new(PacketQueue::new(64));
        let control = Arc::new(PlaybackControl::new(queue.clone()));
        let sync = SyncController::new();
        let clock = FixedClock::at(now);
        let decoder_log = Arc::new(Mutex::new(DecoderLog::default()));
        let builds = Arc::clone(&factory.builds);

        let audio_sync = AudioSync::new(&sync, clock.clone(), DriftSettings::default());
        let resampler =
            ResampleManager::new(factory, TargetFormat::default(), ResampleSettings::default());
        let handler = PacketHandler::new(
            ScriptedDecoder::new(Arc::clone(&decoder_log)),
            resampler,
            audio_sync,
        );
        let (event_tx, events) = match capacity {
            Some(capacity) => channel::bounded(capacity),
            None => channel::unbounded(),
        };
        let decode_loop = DecodeLoop::new(Arc::clone(&control), handler, event_tx);

        Self {
            queue,
            control,
            sync,
            clock,
            decoder_log,
            builds,
            events,
            decode_loop,
        }
    }

    /// Passthrough pipeline: converter builds always fail
    pub fn passthrough() -> Self {
        Self::new(RateConverterFactory::failing(), 0.0)
    }

    pub fn push(&self, packet: EncodedPacket) {
        assert!(self.queue.push(packet, self.control.cancel_token()));
    }

    pub fn positions(&self) -> Vec<Seconds> {
        self.events
            .try_iter()
            .filter_map(|event| match event {
                PlaybackEvent::PositionChanged { position, advance } => {
                    assert_eq!(advance, 0.0);
                    Some(position)
                }
                _ => None,
            })
            .collect()
    }
}

/// `samples` S16 stereo samples at `pts` in a 1/48000 time base
pub fn packet_at(stream: usize, pts: Option<i64>, samples: usize) -> EncodedPacket {
    EncodedPacket::new(
        stream,
        pts,
        TimeBase::new(1, SOURCE_RATE as i32),
        vec![0; samples * 4],
    )
}

pub fn seconds(pts: f64) -> i64 {
    (pts * SOURCE_RATE as f64).round() as i64
}
