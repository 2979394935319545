//! libswresample converter backend.
//!
//! The context is driven through raw FFI so conversion writes straight into
//! the caller's buffer.

use std::os::raw::c_int;
use std::ptr;

use ffmpeg_next::ffi;

use crate::audio::resample::{Converter, ConverterFactory, ResampleError};
use crate::core::{DecodedFrame, SampleFormat, SourceFormatSignature, TargetFormat};

const MAX_PLANES: usize = 8;

/// Builds [`SwrConverter`]s
#[derive(Debug, Default, Clone, Copy)]
pub struct SwrFactory;

impl ConverterFactory for SwrFactory {
    type Converter = SwrConverter;

    fn build(
        &mut self,
        source: &SourceFormatSignature,
        target: &TargetFormat,
    ) -> Result<SwrConverter, ResampleError> {
        SwrConverter::new(source, target)
    }
}

/// An initialized `SwrContext`
pub struct SwrConverter {
    context: *mut ffi::SwrContext,
    target: TargetFormat,
}

impl SwrConverter {
    pub fn new(source: &SourceFormatSignature, target: &TargetFormat) -> Result<Self, ResampleError> {
        let mut context: *mut ffi::SwrContext = ptr::null_mut();

        // SAFETY: layouts are initialized by av_channel_layout_from_mask before
        // use and uninitialized afterwards; the context is freed on failure.
        unsafe {
            let mut in_layout: ffi::AVChannelLayout = std::mem::zeroed();
            let mut out_layout: ffi::AVChannelLayout = std::mem::zeroed();
            if ffi::av_channel_layout_from_mask(&mut in_layout, source.layout.0) < 0
                || ffi::av_channel_layout_from_mask(&mut out_layout, target.layout.0) < 0
            {
                return Err(ResampleError::Build(format!(
                    "invalid channel layout {:#x} -> {:#x}",
                    source.layout.0, target.layout.0
                )));
            }

            let ret = ffi::swr_alloc_set_opts2(
                &mut context,
                &out_layout,
                to_av_format(target.format),
                target.sample_rate as c_int,
                &in_layout,
                to_av_format(source.format),
                source.sample_rate as c_int,
                0,
                ptr::null_mut(),
            );
            ffi::av_channel_layout_uninit(&mut in_layout);
            ffi::av_channel_layout_uninit(&mut out_layout);

            if ret < 0 || context.is_null() {
                ffi::swr_free(&mut context);
                return Err(ResampleError::Build(format!(
                    "swr_alloc_set_opts2 failed ({})",
                    ret
                )));
            }
            let ret = ffi::swr_init(context);
            if ret < 0 {
                ffi::swr_free(&mut context);
                return Err(ResampleError::Build(format!(
                    "{:?} {}Hz -> {:?} {}Hz: swr_init failed ({})",
                    source.format, source.sample_rate, target.format, target.sample_rate, ret
                )));
            }
        }

        Ok(Self {
            context,
            target: *target,
        })
    }
}

impl Converter for SwrConverter {
    fn convert(
        &mut self,
        frame: &DecodedFrame,
        out: &mut [u8],
        out_count: usize,
    ) -> Result<usize, ResampleError> {
        let needed_planes = if frame.format.is_planar() {
            frame.channels as usize
        } else {
            1
        };
        if needed_planes > MAX_PLANES || frame.planes.len() < needed_planes {
            return Err(ResampleError::Convert(format!(
                "frame has {} of {} planes",
                frame.planes.len(),
                needed_planes
            )));
        }
        if out.len() < out_count * self.target.frame_bytes() {
            return Err(ResampleError::Convert("output buffer too small".into()));
        }

        let mut inputs = [ptr::null::<u8>(); MAX_PLANES];
        for (slot, plane) in inputs.iter_mut().zip(&frame.planes) {
            *slot = plane.as_ptr();
        }
        let mut output = out.as_mut_ptr();

        // SAFETY: every input plane holds `samples` samples and `out` holds
        // `out_count` target frames, both checked above.
        let ret = unsafe {
            ffi::swr_convert(
                self.context,
                &mut output,
                out_count as c_int,
                inputs.as_mut_ptr(),
                frame.samples,
            )
        };
        if ret < 0 {
            return Err(ResampleError::Convert(format!("swr_convert failed ({})", ret)));
        }
        Ok(ret as usize)
    }

    fn reset(&mut self) -> Result<(), ResampleError> {
        // SAFETY: the context stays valid for the converter's lifetime
        let ret = unsafe { ffi::swr_init(self.context) };
        if ret < 0 {
            return Err(ResampleError::Reset(format!("swr_init failed ({})", ret)));
        }
        Ok(())
    }
}

impl Drop for SwrConverter {
    fn drop(&mut self) {
        // SAFETY: allocated by swr_alloc_set_opts2 and freed only here
        unsafe { ffi::swr_free(&mut self.context) };
    }
}

fn to_av_format(format: SampleFormat) -> ffi::AVSampleFormat {
    use ffi::AVSampleFormat::*;

    match format {
        SampleFormat::U8 => AV_SAMPLE_FMT_U8,
        SampleFormat::S16 => AV_SAMPLE_FMT_S16,
        SampleFormat::S32 => AV_SAMPLE_FMT_S32,
        SampleFormat::F32 => AV_SAMPLE_FMT_FLT,
        SampleFormat::F64 => AV_SAMPLE_FMT_DBL,
        SampleFormat::U8p => AV_SAMPLE_FMT_U8P,
        SampleFormat::S16p => AV_SAMPLE_FMT_S16P,
        SampleFormat::S32p => AV_SAMPLE_FMT_S32P,
        SampleFormat::F32p => AV_SAMPLE_FMT_FLTP,
        SampleFormat::F64p => AV_SAMPLE_FMT_DBLP,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ChannelLayout;

    #[test]
    fn test_resample_48k_to_44k() {
        let source = SourceFormatSignature {
            format: SampleFormat::F32p,
            layout: ChannelLayout::STEREO,
            sample_rate: 48_000,
        };
        let target = TargetFormat::default();
        let mut converter = SwrFactory.build(&source, &target).unwrap();

        let frame = DecodedFrame {
            format: SampleFormat::F32p,
            channels: 2,
            layout: Some(ChannelLayout::STEREO),
            sample_rate: 48_000,
            samples: 1024,
            planes: vec![vec![0; 4096], vec![0; 4096]],
        };
        let out_count = 1197;
        let mut out = vec![0u8; out_count * target.frame_bytes()];
        let produced = converter.convert(&frame, &mut out, out_count).unwrap();
        assert!(produced < out_count);
        assert!(converter.reset().is_ok());
    }

    #[test]
    fn test_missing_planes_rejected() {
        let source = SourceFormatSignature {
            format: SampleFormat::S16p,
            layout: ChannelLayout::STEREO,
            sample_rate: 44_100,
        };
        let target = TargetFormat::default();
        let mut converter = SwrFactory.build(&source, &target).unwrap();
        let frame = DecodedFrame {
            format: SampleFormat::S16p,
            channels: 2,
            layout: None,
            sample_rate: 44_100,
            samples: 16,
            planes: vec![vec![0; 32]],
        };
        let mut out = vec![0u8; 1024];
        assert!(converter.convert(&frame, &mut out, 100).is_err());
    }
}
