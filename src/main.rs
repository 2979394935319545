//! `avplay`: plays the audio of a media file through the default output device.
//!
//! A demux thread feeds the packet queue; the audio engine decodes, converts
//! and plays. Playback position is logged once per second.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::Parser;
use crossbeam::channel::RecvTimeoutError;
use ffmpeg_next as ffmpeg;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use avplay_audio::audio::{CpalSink, SwrFactory};
use avplay_audio::core::time::{format_time, hires_now};
use avplay_audio::core::{EncodedPacket, SystemClock, TimeBase};
use avplay_audio::decode::FfmpegDecoder;
use avplay_audio::playback::CancelToken;
use avplay_audio::{
    AudioComponents, AudioEngine, Error, PacketQueue, PipelineConfig, PlaybackEvent, Result,
    SyncController,
};

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "avplay")]
#[command(about = "Play the audio track of a media file", long_about = None)]
struct Args {
    /// Media file to play
    input: PathBuf,

    /// Pipeline configuration file (TOML)
    #[arg(short, long, env = "AVPLAY_CONFIG")]
    config: Option<PathBuf>,

    /// Start paused and resume after this many milliseconds
    #[arg(long)]
    start_paused_ms: Option<u64>,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "avplay_audio=debug,avplay=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    info!(input = %args.input.display(), "Starting avplay");

    ffmpeg::init().map_err(|e| Error::Config(format!("FFmpeg init failed: {}", e)))?;

    let queue = Arc::new(PacketQueue::new(config.queue_capacity));
    let sync = SyncController::new();

    let input = args.input.clone();
    let target = config.target;
    let sink_config = config.sink.clone();
    let cursor = sync.audio_cursor();
    let engine = AudioEngine::start(
        &config,
        queue.clone(),
        sync.clone(),
        Arc::new(SystemClock),
        move || {
            Ok(AudioComponents {
                decoder: FfmpegDecoder::open(&input)?,
                converters: SwrFactory,
                sink: CpalSink::new(target, sink_config).with_cursor(cursor),
            })
        },
    )?;

    if args.start_paused_ms.is_some() {
        engine.pause();
    }

    let demuxer = {
        let queue = Arc::clone(&queue);
        let cancel = engine.control().cancel_token().clone();
        let input = args.input.clone();
        thread::Builder::new()
            .name("demux".into())
            .spawn(move || demux(&input, &queue, &cancel))
            .map_err(|e| Error::Thread(e.to_string()))?
    };

    let resume_at = args
        .start_paused_ms
        .map(|ms| hires_now() + ms as f64 / 1000.0);
    let mut resumed = resume_at.is_none();

    loop {
        match engine.events().recv_timeout(Duration::from_secs(1)) {
            Ok(PlaybackEvent::PositionChanged { position, .. }) => {
                sync.anchor(position, hires_now());
                info!(position = %format_time(position), "Audio position anchored");
            }
            Ok(PlaybackEvent::StateChanged(state)) => debug!(?state, "Decode loop state"),
            Ok(PlaybackEvent::Terminated { error }) => {
                if let Some(error) = error {
                    warn!("Audio thread ended with error: {}", error);
                }
                break;
            }
            Err(RecvTimeoutError::Timeout) => {
                info!(position = %format_time(sync.position_at(hires_now())), "Playing");
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }

        if !resumed && resume_at.is_some_and(|at| hires_now() >= at) {
            engine.resume();
            resumed = true;
        }
    }

    engine.cancel();
    queue.close();
    if demuxer.join().is_err() {
        warn!("Demux thread panicked");
    }
    engine.join()
}

/// Push the packets of the best audio stream of `path` into the queue, then close it
fn demux(path: &Path, queue: &PacketQueue, cancel: &CancelToken) {
    let mut input = match ffmpeg::format::input(path) {
        Ok(input) => input,
        Err(e) => {
            warn!("Cannot open {}: {}", path.display(), e);
            queue.close();
            return;
        }
    };

    let Some(audio_index) = input
        .streams()
        .best(ffmpeg::media::Type::Audio)
        .map(|stream| stream.index())
    else {
        warn!("No audio stream in {}", path.display());
        queue.close();
        return;
    };

    let mut pushed = 0usize;
    for (stream, packet) in input.packets() {
        if stream.index() != audio_index {
            continue;
        }
        let time_base = stream.time_base();
        let packet = EncodedPacket::new(
            stream.index(),
            packet.pts(),
            TimeBase::new(time_base.numerator(), time_base.denominator()),
            packet.data().map(<[u8]>::to_vec).unwrap_or_default(),
        );
        if !queue.push(packet, cancel) {
            break;
        }
        pushed += 1;
    }

    debug!(pushed, "Demuxing finished");
    queue.close();
}
