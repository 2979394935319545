//! Turns one compressed packet into sink writes.
//!
//! Per packet: switch decoder if the stream changed, submit, then for every
//! decoded frame convert, correct drift and write.

use tracing::{debug, info, warn};

use crate::audio::buffer::ResampleBuffer;
use crate::audio::resample::{ConverterFactory, ResampleManager};
use crate::audio::sink::AudioSink;
use crate::core::{DecodedFrame, EncodedPacket};
use crate::decode::decoder::AudioDecoder;
use crate::playback::control::CancelToken;
use crate::playback::sync::AudioSync;

/// Whether the decode loop may keep draining the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketOutcome {
    Continue,
    Stop,
}

/// Decoder state plus everything a frame passes through on its way to the sink
pub struct PacketHandler<D: AudioDecoder, F: ConverterFactory> {
    decoder: D,
    resampler: ResampleManager<F>,
    sync: AudioSync,
    frame: DecodedFrame,
    active_stream: Option<usize>,
}

impl<D: AudioDecoder, F: ConverterFactory> PacketHandler<D, F> {
    pub fn new(decoder: D, resampler: ResampleManager<F>, sync: AudioSync) -> Self {
        Self {
            decoder,
            resampler,
            sync,
            frame: DecodedFrame::new(),
            active_stream: None,
        }
    }

    pub fn sync(&self) -> &AudioSync {
        &self.sync
    }

    pub fn resampler(&self) -> &ResampleManager<F> {
        &self.resampler
    }

    pub fn active_stream(&self) -> Option<usize> {
        self.active_stream
    }

    pub fn handle<S: AudioSink + ?Sized>(
        &mut self,
        packet: &EncodedPacket,
        buffer: &mut ResampleBuffer,
        sink: &mut S,
        cancel: &CancelToken,
    ) -> PacketOutcome {
        if self.active_stream != Some(packet.stream) {
            self.decoder.close();
            // Adopted even if opening fails; later packets of this stream are
            // then rejected by the decoder until the stream changes again.
            self.active_stream = Some(packet.stream);
            match self.decoder.open_stream(packet.stream) {
                Ok(stream) => info!(%stream, "Audio stream opened"),
                Err(e) => {
                    warn!(stream = packet.stream, "Cannot open audio decoder: {}", e);
                    return PacketOutcome::Stop;
                }
            }
        }

        if let Err(e) = self.decoder.send_packet(packet) {
            warn!(stream = packet.stream, "{}", e);
            return PacketOutcome::Stop;
        }

        loop {
            match self.decoder.receive_frame(&mut self.frame) {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => {
                    debug!("{}", e);
                    break;
                }
            }

            let frame = &self.frame;
            if frame.samples <= 0 {
                continue;
            }

            let data = match self.resampler.process(frame, buffer) {
                Ok(data) => data,
                Err(e) => {
                    warn!("{}", e);
                    break;
                }
            };

            self.sync.correct_drift();

            if data.is_empty() {
                continue;
            }
            if cancel.is_cancelled() {
                return PacketOutcome::Stop;
            }
            if !sink.write(data) && frame.sample_rate > 0 {
                self.sync.advance_cursor(frame.nominal_duration());
            }
        }

        PacketOutcome::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::resample::{Converter, ResampleError, ResampleSettings};
    use crate::core::{
        ChannelLayout, HiResClock, SampleFormat, Seconds, SourceFormatSignature, TargetFormat,
        TimeBase,
    };
    use crate::decode::decoder::DecodeError;
    use crate::decode::stream_info::AudioStreamInfo;
    use crate::playback::sync::{DriftSettings, SyncController};
    use crate::audio::sink::SinkError;
    use std::collections::VecDeque;
    use std::sync::Arc;

    /// Yields `frames_per_packet` S16 stereo frames of `samples` samples per packet
    struct FakeDecoder {
        opens: Vec<usize>,
        fail_open: bool,
        pending: VecDeque<i32>,
        frames_per_packet: Vec<i32>,
        rate: u32,
    }

    impl FakeDecoder {
        fn new(frames_per_packet: Vec<i32>) -> Self {
            Self {
                opens: Vec::new(),
                fail_open: false,
                pending: VecDeque::new(),
                frames_per_packet,
                rate: 48_000,
            }
        }
    }

    impl AudioDecoder for FakeDecoder {
        fn open_stream(&mut self, stream: usize) -> Result<AudioStreamInfo, DecodeError> {
            self.opens.push(stream);
            if self.fail_open {
                return Err(DecodeError::CodecNotFound);
            }
            Ok(AudioStreamInfo {
                index: stream,
                codec_name: "pcm_s16le".into(),
                time_base: TimeBase::new(1, self.rate as i32),
                sample_rate: self.rate,
                channels: 2,
                sample_format: Some(SampleFormat::S16),
            })
        }

        fn send_packet(&mut self, _packet: &EncodedPacket) -> Result<(), DecodeError> {
            if self.fail_open {
                return Err(DecodeError::NotOpen);
            }
            self.pending.extend(self.frames_per_packet.iter().copied());
            Ok(())
        }

        fn receive_frame(&mut self, frame: &mut DecodedFrame) -> Result<bool, DecodeError> {
            let Some(samples) = self.pending.pop_front() else {
                return Ok(false);
            };
            frame.format = SampleFormat::S16;
            frame.channels = 2;
            frame.layout = Some(ChannelLayout::STEREO);
            frame.sample_rate = self.rate;
            frame.samples = samples;
            frame.reset_planes(1, frame.native_size());
            Ok(true)
        }

        fn close(&mut self) {}
    }

    struct NoConverter;

    impl Converter for NoConverter {
        fn convert(
            &mut self,
            _frame: &DecodedFrame,
            _out: &mut [u8],
            _out_count: usize,
        ) -> Result<usize, ResampleError> {
            Ok(0)
        }

        fn reset(&mut self) -> Result<(), ResampleError> {
            Ok(())
        }
    }

    /// Always fails, so every frame passes through
    struct FailingFactory;

    impl ConverterFactory for FailingFactory {
        type Converter = NoConverter;

        fn build(
            &mut self,
            _source: &SourceFormatSignature,
            _target: &TargetFormat,
        ) -> Result<NoConverter, ResampleError> {
            Err(ResampleError::Build("unavailable".into()))
        }
    }

    struct BrokenConverter;

    impl Converter for BrokenConverter {
        fn convert(
            &mut self,
            _frame: &DecodedFrame,
            _out: &mut [u8],
            _out_count: usize,
        ) -> Result<usize, ResampleError> {
            Err(ResampleError::Convert("negative sample count".into()))
        }

        fn reset(&mut self) -> Result<(), ResampleError> {
            Ok(())
        }
    }

    struct BrokenFactory;

    impl ConverterFactory for BrokenFactory {
        type Converter = BrokenConverter;

        fn build(
            &mut self,
            _source: &SourceFormatSignature,
            _target: &TargetFormat,
        ) -> Result<BrokenConverter, ResampleError> {
            Ok(BrokenConverter)
        }
    }

    struct RecordingSink {
        consume: bool,
        writes: Vec<usize>,
    }

    impl AudioSink for RecordingSink {
        fn initialize_thread(&mut self) -> Result<(), SinkError> {
            Ok(())
        }
        fn deinitialize_thread(&mut self) {}
        fn pause(&mut self) {}
        fn resume(&mut self) {}
        fn write(&mut self, data: &[u8]) -> bool {
            self.writes.push(data.len());
            self.consume
        }
    }

    struct FixedClock(Seconds);

    impl HiResClock for FixedClock {
        fn now(&self) -> Seconds {
            self.0
        }
    }

    fn handler(decoder: FakeDecoder) -> (SyncController, PacketHandler<FakeDecoder, FailingFactory>) {
        let controller = SyncController::new();
        let sync = AudioSync::new(
            &controller,
            Arc::new(FixedClock(0.0)),
            DriftSettings::default(),
        );
        let resampler = ResampleManager::new(
            FailingFactory,
            TargetFormat::default(),
            ResampleSettings::default(),
        );
        (controller, PacketHandler::new(decoder, resampler, sync))
    }

    fn packet(stream: usize) -> EncodedPacket {
        EncodedPacket::new(stream, Some(0), TimeBase::new(1, 48_000), vec![0; 16])
    }

    #[test]
    fn test_not_consumed_write_advances_cursor() {
        let (_, mut handler) = handler(FakeDecoder::new(vec![1024]));
        let mut sink = RecordingSink { consume: false, writes: Vec::new() };
        let mut buffer = ResampleBuffer::new();
        let outcome = handler.handle(&packet(0), &mut buffer, &mut sink, &CancelToken::new());
        assert_eq!(outcome, PacketOutcome::Continue);
        assert_eq!(sink.writes, vec![4096]);
        assert!((handler.sync().cursor() - 4096.0 / 192_000.0).abs() < 1e-9);
    }

    #[test]
    fn test_consumed_write_leaves_cursor() {
        let (_, mut handler) = handler(FakeDecoder::new(vec![1024, 512]));
        let mut sink = RecordingSink { consume: true, writes: Vec::new() };
        let mut buffer = ResampleBuffer::new();
        handler.handle(&packet(0), &mut buffer, &mut sink, &CancelToken::new());
        assert_eq!(sink.writes, vec![4096, 2048]);
        assert_eq!(handler.sync().cursor(), 0.0);
    }

    #[test]
    fn test_empty_frames_are_skipped() {
        let (_, mut handler) = handler(FakeDecoder::new(vec![0, -3, 256]));
        let mut sink = RecordingSink { consume: true, writes: Vec::new() };
        let mut buffer = ResampleBuffer::new();
        handler.handle(&packet(0), &mut buffer, &mut sink, &CancelToken::new());
        assert_eq!(sink.writes, vec![1024]);
    }

    #[test]
    fn test_stream_switch_reopens_decoder() {
        let (_, mut handler) = handler(FakeDecoder::new(vec![16]));
        let mut sink = RecordingSink { consume: true, writes: Vec::new() };
        let mut buffer = ResampleBuffer::new();
        let cancel = CancelToken::new();
        handler.handle(&packet(1), &mut buffer, &mut sink, &cancel);
        handler.handle(&packet(1), &mut buffer, &mut sink, &cancel);
        handler.handle(&packet(2), &mut buffer, &mut sink, &cancel);
        assert_eq!(handler.decoder.opens, vec![1, 2]);
        assert_eq!(handler.active_stream(), Some(2));
    }

    #[test]
    fn test_open_failure_stops() {
        let mut decoder = FakeDecoder::new(vec![16]);
        decoder.fail_open = true;
        let (_, mut handler) = handler(decoder);
        let mut sink = RecordingSink { consume: true, writes: Vec::new() };
        let mut buffer = ResampleBuffer::new();
        let cancel = CancelToken::new();
        assert_eq!(
            handler.handle(&packet(3), &mut buffer, &mut sink, &cancel),
            PacketOutcome::Stop
        );
        // Stream stays adopted: no reopen, the submit fails instead
        assert_eq!(
            handler.handle(&packet(3), &mut buffer, &mut sink, &cancel),
            PacketOutcome::Stop
        );
        assert_eq!(handler.decoder.opens, vec![3]);
        assert!(sink.writes.is_empty());
    }

    #[test]
    fn test_cancel_before_write_stops() {
        let (_, mut handler) = handler(FakeDecoder::new(vec![1024]));
        let mut sink = RecordingSink { consume: true, writes: Vec::new() };
        let mut buffer = ResampleBuffer::new();
        let cancel = CancelToken::new();
        cancel.cancel();
        assert_eq!(
            handler.handle(&packet(0), &mut buffer, &mut sink, &cancel),
            PacketOutcome::Stop
        );
        assert!(sink.writes.is_empty());
    }

    #[test]
    fn test_conversion_failure_stops_draining_packet() {
        let controller = SyncController::new();
        let sync = AudioSync::new(
            &controller,
            Arc::new(FixedClock(0.0)),
            DriftSettings::default(),
        );
        let resampler = ResampleManager::new(
            BrokenFactory,
            TargetFormat::default(),
            ResampleSettings::default(),
        );
        let mut handler = PacketHandler::new(FakeDecoder::new(vec![256, 256, 256]), resampler, sync);
        let mut sink = RecordingSink { consume: true, writes: Vec::new() };
        let mut buffer = ResampleBuffer::new();

        let outcome = handler.handle(&packet(0), &mut buffer, &mut sink, &CancelToken::new());
        // The packet is abandoned but the loop may go on with the next one
        assert_eq!(outcome, PacketOutcome::Continue);
        assert!(sink.writes.is_empty());
        assert_eq!(handler.decoder.pending.len(), 2);
        assert_eq!(handler.resampler().builds(), 1);
    }
}
