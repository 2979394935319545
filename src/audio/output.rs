//! cpal output sink.
//!
//! Converted bytes go through a lock-free ring buffer to the device callback.
//! The stream is created in `initialize_thread`, on the audio thread, because
//! cpal streams may not be moved between threads on every platform.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SizedSample, StreamConfig};
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use tracing::{debug, error, warn};

use crate::audio::sink::{AudioSink, SinkError};
use crate::config::SinkConfig;
use crate::core::{AtomicF64, SampleFormat, TargetFormat};

/// Wait between attempts to push into a full ring buffer
const WRITE_POLL: Duration = Duration::from_millis(2);

/// Plays the target format on the default output device
pub struct CpalSink {
    target: TargetFormat,
    config: SinkConfig,
    /// Advanced by the device callback as samples are played
    cursor: Option<Arc<AtomicF64>>,
    stream: Option<cpal::Stream>,
    producer: Option<HeapProd<u8>>,
}

impl CpalSink {
    pub fn new(target: TargetFormat, config: SinkConfig) -> Self {
        Self {
            target,
            config,
            cursor: None,
            stream: None,
            producer: None,
        }
    }

    /// Advance `cursor` by the duration of every sample the device plays
    pub fn with_cursor(mut self, cursor: Arc<AtomicF64>) -> Self {
        self.cursor = Some(cursor);
        self
    }

    fn ring_len(&self) -> usize {
        let frames = self.target.sample_rate as usize * self.config.buffer_ms as usize / 1000;
        frames.max(1024) * self.target.frame_bytes()
    }

    fn build_stream<T>(
        &self,
        device: &cpal::Device,
        mut consumer: HeapCons<u8>,
    ) -> Result<cpal::Stream, SinkError>
    where
        T: SizedSample + Default + FromNeBytes,
    {
        let config = StreamConfig {
            channels: self.target.channels,
            sample_rate: cpal::SampleRate(self.target.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };
        let sample_bytes = self.target.format.bytes_per_sample();
        let frame_seconds = 1.0 / self.target.sample_rate as f64;
        let channels = self.target.channels as usize;
        let cursor = self.cursor.clone();
        let mut scratch: Vec<u8> = Vec::new();

        device
            .build_output_stream(
                &config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    let wanted = data.len() * sample_bytes;
                    let available = consumer.occupied_len().min(wanted);
                    let available = available - available % sample_bytes;
                    if scratch.len() < available {
                        scratch.resize(wanted, 0);
                    }
                    let read = consumer.pop_slice(&mut scratch[..available]);

                    let filled = read / sample_bytes;
                    for (out, bytes) in data.iter_mut().zip(scratch[..read].chunks_exact(sample_bytes)) {
                        *out = T::from_ne_bytes(bytes);
                    }
                    for out in &mut data[filled..] {
                        *out = T::default();
                    }

                    if let Some(cursor) = &cursor {
                        let frames = filled / channels;
                        if frames > 0 {
                            cursor.add(frames as f64 * frame_seconds);
                        }
                    }
                },
                |err| error!("Audio stream error: {}", err),
                None,
            )
            .map_err(|e| SinkError::Backend(e.to_string()))
    }
}

impl AudioSink for CpalSink {
    fn initialize_thread(&mut self) -> Result<(), SinkError> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(SinkError::NoDevice)?;

        let ring = HeapRb::<u8>::new(self.ring_len());
        let (producer, consumer) = ring.split();

        let stream = match self.target.format {
            SampleFormat::S16 => self.build_stream::<i16>(&device, consumer)?,
            SampleFormat::F32 => self.build_stream::<f32>(&device, consumer)?,
            other => {
                return Err(SinkError::UnsupportedFormat(format!("{:?}", other)));
            }
        };
        stream
            .play()
            .map_err(|e| SinkError::Backend(e.to_string()))?;

        debug!(
            rate = self.target.sample_rate,
            channels = self.target.channels,
            "Output stream started"
        );
        self.stream = Some(stream);
        self.producer = Some(producer);
        Ok(())
    }

    fn deinitialize_thread(&mut self) {
        self.stream = None;
        self.producer = None;
    }

    fn pause(&mut self) {
        if let Some(stream) = &self.stream {
            if let Err(e) = stream.pause() {
                warn!("Cannot pause output stream: {}", e);
            }
        }
    }

    fn resume(&mut self) {
        if let Some(stream) = &self.stream {
            if let Err(e) = stream.play() {
                warn!("Cannot resume output stream: {}", e);
            }
        }
    }

    fn write(&mut self, mut data: &[u8]) -> bool {
        let Some(producer) = self.producer.as_mut() else {
            return false;
        };
        let stall_timeout = Duration::from_millis(self.config.stall_timeout_ms);
        let mut last_progress = Instant::now();

        while !data.is_empty() {
            let pushed = producer.push_slice(data);
            if pushed > 0 {
                data = &data[pushed..];
                last_progress = Instant::now();
                continue;
            }
            if last_progress.elapsed() >= stall_timeout {
                debug!(remaining = data.len(), "Output stalled");
                return false;
            }
            thread::sleep(WRITE_POLL);
        }
        true
    }
}

/// Sample types decodable from native-endian bytes
pub trait FromNeBytes {
    fn from_ne_bytes(bytes: &[u8]) -> Self;
}

impl FromNeBytes for i16 {
    fn from_ne_bytes(bytes: &[u8]) -> Self {
        i16::from_ne_bytes([bytes[0], bytes[1]])
    }
}

impl FromNeBytes for f32 {
    fn from_ne_bytes(bytes: &[u8]) -> Self {
        f32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
    }
}
