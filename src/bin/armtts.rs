//! Command-line demo — speaks Armenian text or writes it to a WAV file.
//!
//! Usage:
//!   armtts --bundle ArmTTS.bundle --api-key KEY --text "Ողջույն" --output out.wav
//!   armtts --bundle ArmTTS.bundle --api-key KEY --text "Ողջույն" --speed 1.2
//!   armtts --chunks-only --text "..."
//!
//! The API key may also be given through `ARMTTS_API_KEY`.
//! Set `RUST_LOG=armtts=debug` to trace each chunk.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use armtts::{
    audio::{PlaybackSink, WavFileSink},
    bundle::ResourceBundle,
    ArmTts, Chunker, TtsConfig,
};

#[derive(Debug, Parser)]
#[command(name = "armtts", about = "Armenian text-to-speech")]
struct Args {
    /// Directory holding the ONNX model and optional config.json.
    #[arg(long, default_value = "ArmTTS.bundle")]
    bundle: PathBuf,

    #[arg(long, env = "ARMTTS_API_KEY", default_value = "")]
    api_key: String,

    #[arg(long, default_value = "Ողջույն, իմ անունը Գոռ է։")]
    text: String,

    /// 1.0 = normal; clamped to the configured range (0.5–1.5 by default).
    #[arg(long, default_value_t = 1.0)]
    speed: f32,

    /// Write a WAV file instead of playing on the speaker.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Print the chunks and exit without calling the API.
    #[arg(long)]
    chunks_only: bool,

    /// Tokenize the next chunk while the current one is synthesised.
    #[arg(long)]
    prefetch: bool,
}

#[cfg(feature = "playback")]
fn speaker() -> Box<dyn PlaybackSink> {
    Box::new(armtts::playback::CpalSink::new())
}

#[cfg(not(feature = "playback"))]
fn speaker() -> Box<dyn PlaybackSink> {
    Box::new(armtts::audio::NullSink)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = match ResourceBundle::open(&args.bundle) {
        Ok(bundle) => bundle.config().clone(),
        Err(_) if args.chunks_only => TtsConfig::default(),
        Err(e) => return Err(e).context("cannot open bundle"),
    };

    if args.chunks_only {
        for (i, chunk) in Chunker::new(config.chunking).chunk(&args.text).iter().enumerate() {
            println!("{i:>3}: {chunk}");
        }
        return Ok(());
    }

    let config = TtsConfig { prefetch: args.prefetch || config.prefetch, ..config };
    let bundle = ResourceBundle::with_config(&args.bundle, config);

    let sink: Box<dyn PlaybackSink> = match &args.output {
        Some(path) => Box::new(WavFileSink::new(path)),
        None => speaker(),
    };
    let tts = ArmTts::from_bundle(&bundle, &args.api_key, sink).context("initialisation failed")?;

    let summary = tts.speak(&args.text, args.speed)?;
    println!(
        "Spoke {} chunks, {:.2} s of audio{}",
        summary.chunks,
        summary.duration.as_secs_f32(),
        if summary.skipped_chunks.is_empty() {
            String::new()
        } else {
            format!(" ({} chunks skipped)", summary.skipped_chunks.len())
        }
    );

    if args.output.is_none() {
        wait_for_playback(summary.duration);
    }
    Ok(())
}

/// Playback runs on a background thread; keep the process alive for it.
#[cfg(feature = "playback")]
fn wait_for_playback(duration: std::time::Duration) {
    let margin = std::time::Duration::from_millis(300);
    std::thread::sleep(armtts::playback::DEFAULT_START_DELAY + duration + margin);
}

#[cfg(not(feature = "playback"))]
fn wait_for_playback(_duration: std::time::Duration) {}
