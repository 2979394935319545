//! FFmpeg decoder backend.
//! All unsafe FFmpeg access of the decode side is contained in this module.

use std::collections::HashMap;
use std::path::Path;

use ffmpeg_next as ffmpeg;
use ffmpeg::{codec, ffi, format, frame, media};
use tracing::debug;

use crate::core::{ChannelLayout, DecodedFrame, EncodedPacket, SampleFormat, TimeBase};
use crate::decode::decoder::{AudioDecoder, DecodeError};
use crate::decode::stream_info::AudioStreamInfo;

/// Planes addressable through `AVFrame::data`
const MAX_PLANES: usize = 8;

struct StreamEntry {
    parameters: codec::Parameters,
    time_base: TimeBase,
}

/// Decoder over the audio streams of one input
pub struct FfmpegDecoder {
    streams: HashMap<usize, StreamEntry>,
    decoder: Option<codec::decoder::Audio>,
    scratch: frame::Audio,
}

impl FfmpegDecoder {
    /// Collect the codec parameters of every audio stream in `input`
    pub fn from_input(input: &format::context::Input) -> Self {
        let streams = input
            .streams()
            .filter(|stream| stream.parameters().medium() == media::Type::Audio)
            .map(|stream| {
                let time_base = stream.time_base();
                let entry = StreamEntry {
                    // Detached copy, so the input may be closed afterwards
                    parameters: stream.parameters().clone(),
                    time_base: TimeBase::new(time_base.numerator(), time_base.denominator()),
                };
                (stream.index(), entry)
            })
            .collect();

        Self {
            streams,
            decoder: None,
            scratch: frame::Audio::empty(),
        }
    }

    /// Open `path` just long enough to read its stream parameters
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DecodeError> {
        ffmpeg::init().map_err(|e| DecodeError::FFmpeg(e.to_string()))?;
        let input = format::input(path.as_ref()).map_err(|e| DecodeError::FFmpeg(e.to_string()))?;
        Ok(Self::from_input(&input))
    }

    pub fn audio_streams(&self) -> impl Iterator<Item = usize> + '_ {
        self.streams.keys().copied()
    }
}

impl AudioDecoder for FfmpegDecoder {
    fn open_stream(&mut self, stream: usize) -> Result<AudioStreamInfo, DecodeError> {
        let entry = self
            .streams
            .get(&stream)
            .ok_or(DecodeError::UnknownStream(stream))?;

        let codec = ffmpeg::decoder::find(entry.parameters.id()).ok_or(DecodeError::CodecNotFound)?;
        let codec_name = codec.name().to_string();

        let context = codec::context::Context::from_parameters(entry.parameters.clone())
            .map_err(|e| DecodeError::FFmpeg(e.to_string()))?;
        let decoder = context
            .decoder()
            .open_as(codec)
            .and_then(|opened| opened.audio())
            .map_err(|e| DecodeError::CodecOpenFailed(e.to_string()))?;

        // SAFETY: the context is open and owned by `decoder`
        let channels = unsafe { (*decoder.as_ptr()).ch_layout.nb_channels.max(0) as u16 };
        let info = AudioStreamInfo {
            index: stream,
            codec_name,
            time_base: entry.time_base,
            sample_rate: decoder.rate(),
            channels,
            sample_format: sample_format_from_ffmpeg(decoder.format()),
        };
        debug!(%info, "Opened FFmpeg audio decoder");

        self.decoder = Some(decoder);
        Ok(info)
    }

    fn send_packet(&mut self, packet: &EncodedPacket) -> Result<(), DecodeError> {
        let decoder = self.decoder.as_mut().ok_or(DecodeError::NotOpen)?;

        let mut ffmpeg_packet = ffmpeg::Packet::copy(&packet.data);
        ffmpeg_packet.set_pts(packet.pts);
        ffmpeg_packet.set_stream(packet.stream);

        decoder
            .send_packet(&ffmpeg_packet)
            .map_err(|e| DecodeError::SendFailed(e.to_string()))
    }

    fn receive_frame(&mut self, frame: &mut DecodedFrame) -> Result<bool, DecodeError> {
        let decoder = self.decoder.as_mut().ok_or(DecodeError::NotOpen)?;

        match decoder.receive_frame(&mut self.scratch) {
            Ok(()) => {}
            Err(ffmpeg::Error::Other { errno }) if errno == ffmpeg::util::error::EAGAIN => {
                return Ok(false)
            }
            Err(ffmpeg::Error::Eof) => return Ok(false),
            Err(e) => return Err(DecodeError::ReceiveFailed(e.to_string())),
        }

        copy_frame(&self.scratch, frame)?;
        Ok(true)
    }

    fn close(&mut self) {
        self.decoder = None;
    }
}

/// Copy an FFmpeg frame into the reusable frame, keeping plane allocations
fn copy_frame(source: &frame::Audio, frame: &mut DecodedFrame) -> Result<(), DecodeError> {
    let format = sample_format_from_ffmpeg(source.format())
        .ok_or_else(|| DecodeError::UnsupportedFormat(format!("{:?}", source.format())))?;

    // SAFETY: `source` holds a frame just returned by the decoder
    let (channels, mask) = unsafe {
        let layout = &(*source.as_ptr()).ch_layout;
        let mask = if layout.order == ffi::AVChannelOrder::AV_CHANNEL_ORDER_NATIVE {
            layout.u.mask
        } else {
            0
        };
        (layout.nb_channels.max(0) as u16, mask)
    };

    let samples = source.samples();
    frame.format = format;
    frame.channels = channels;
    frame.layout = (mask != 0).then_some(ChannelLayout(mask));
    frame.sample_rate = source.rate();
    frame.samples = samples as i32;

    let (planes, plane_len) = if format.is_planar() {
        (
            (channels as usize).min(MAX_PLANES),
            samples * format.bytes_per_sample(),
        )
    } else {
        (1, samples * channels as usize * format.bytes_per_sample())
    };

    frame.planes.resize_with(planes, Vec::new);
    for (index, plane) in frame.planes.iter_mut().enumerate() {
        let data = source.data(index);
        let len = plane_len.min(data.len());
        plane.clear();
        plane.extend_from_slice(&data[..len]);
    }
    Ok(())
}

fn sample_format_from_ffmpeg(sample: format::Sample) -> Option<SampleFormat> {
    use format::sample::Type::{Packed, Planar};
    use format::Sample;

    match sample {
        Sample::U8(Packed) => Some(SampleFormat::U8),
        Sample::U8(Planar) => Some(SampleFormat::U8p),
        Sample::I16(Packed) => Some(SampleFormat::S16),
        Sample::I16(Planar) => Some(SampleFormat::S16p),
        Sample::I32(Packed) => Some(SampleFormat::S32),
        Sample::I32(Planar) => Some(SampleFormat::S32p),
        Sample::F32(Packed) => Some(SampleFormat::F32),
        Sample::F32(Planar) => Some(SampleFormat::F32p),
        Sample::F64(Packed) => Some(SampleFormat::F64),
        Sample::F64(Planar) => Some(SampleFormat::F64p),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use format::sample::Type;

    #[test]
    fn test_sample_format_mapping() {
        assert_eq!(
            sample_format_from_ffmpeg(format::Sample::F32(Type::Planar)),
            Some(SampleFormat::F32p)
        );
        assert_eq!(
            sample_format_from_ffmpeg(format::Sample::I16(Type::Packed)),
            Some(SampleFormat::S16)
        );
        assert_eq!(sample_format_from_ffmpeg(format::Sample::None), None);
    }
}
