//! # armtts
//!
//! Armenian text-to-speech SDK: hosted preprocessing plus on-device ONNX
//! synthesis.
//!
//! ## Quick start
//!
//! ```no_run
//! use std::path::Path;
//! use armtts::{ArmTts, audio::WavFileSink};
//!
//! // The bundle holds `arm-gor.onnx` and an optional `config.json`.
//! let tts = ArmTts::load(
//!     Path::new("ArmTTS.bundle"),
//!     "YOUR_RAPIDAPI_KEY",
//!     Box::new(WavFileSink::new("output.wav")),
//! )?;
//!
//! tts.speak("Ողջույն, իմ անունը Գոռ է։", 1.0)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Mobile (iOS / Android)
//!
//! The crate builds as a `staticlib`; [`ffi`] exposes `armtts_load`,
//! `armtts_speak`, `armtts_speak_to_file` and the matching free functions.
//! Enable the `playback` feature to play through the device speaker.
//!
//! ## Pipeline
//! 1. **Chunking** — text split into ≤ 140-character pieces at sentence,
//!    phrase or word boundaries ([`chunker`]).
//! 2. **Preprocessing** — each chunk is POSTed to the hosted API, which
//!    returns model token IDs ([`tokenize`]).
//! 3. **ONNX inference** — token IDs + length scale → f32 waveform
//!    ([`model`]).
//! 4. **Concat** — per-chunk audio appended in order.
//! 5. **Playback** — the whole utterance handed to the sink once ([`audio`]).
//!
//! A preprocessing failure on any chunk aborts the utterance before anything
//! is played.

pub mod audio;
pub mod bundle;
pub mod chunker;
pub mod config;
pub mod error;

// C FFI for iOS / Android — exposes armtts_load / speak / free.
pub mod ffi;

pub mod model;
pub mod multipart;
#[cfg(feature = "playback")]
pub mod playback;
pub mod tokenize;
pub mod tts;

// ─── Re-exports for convenience ─────────────────────────────────────────────

pub use chunker::{chunk, Chunker};
pub use config::TtsConfig;
pub use error::{InitError, SpeakError};
pub use tts::{ArmTts, SpeakSummary};
