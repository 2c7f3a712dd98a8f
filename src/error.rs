//! Error kinds surfaced by the SDK.
//!
//! | Kind                  | Raised by            | Effect on `speak`                       |
//! |-----------------------|----------------------|-----------------------------------------|
//! | [`InitError`]         | bundle / model load  | no instance is produced                 |
//! | [`TokenizerError`]    | preprocessing API    | utterance aborted, partial audio dropped|
//! | [`InferenceError`]    | ONNX synthesis       | chunk skipped or utterance aborted      |
//! | [`PlaybackError`]     | playback sink        | reported after synthesis completed      |

use std::path::PathBuf;

use thiserror::Error;

/// The SDK could not be brought into a usable state.
#[derive(Debug, Error)]
pub enum InitError {
    #[error("resource bundle not found: {0}")]
    MissingBundle(PathBuf),

    #[error("model file '{0}' is missing")]
    MissingModel(PathBuf),

    #[error("invalid config {path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Values that parse but cannot be used together.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to initialise ONNX session: {0:#}")]
    Session(anyhow::Error),
}

/// A single preprocessing call failed.
#[derive(Debug, Error)]
pub enum TokenizerError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out")]
    Timeout,

    /// The service answered with a `message` instead of `ids`.
    #[error("service error: {0}")]
    Service(String),

    /// The response was neither `{"ids": [...]}` nor `{"message": "..."}`.
    #[error("protocol violation (HTTP {status}): {detail}")]
    Protocol { status: u16, detail: String },

    #[error("service returned an empty token sequence")]
    EmptySequence,
}

/// ONNX synthesis failed for one chunk.
#[derive(Debug, Error)]
#[error("synthesis failed: {0:#}")]
pub struct InferenceError(#[from] pub anyhow::Error);

/// The audio could not be handed to the output.
#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("no audio output device available")]
    NoDevice,

    #[error("unsupported output format: {0}")]
    UnsupportedFormat(String),

    #[error("audio device error: {0}")]
    Device(String),

    #[error("cannot write {path}: {source}")]
    Wav {
        path: PathBuf,
        #[source]
        source: hound::Error,
    },
}

/// Structured outcome of a failed [`speak`](crate::ArmTts::speak) call.
#[derive(Debug, Error)]
pub enum SpeakError {
    /// The inference backend is not loaded; nothing was done.
    #[error("the engine is not initialised")]
    NotInitialized,

    /// Preprocessing failed on `chunk`; no audio was played.
    #[error("preprocessing failed on chunk {chunk}: {source}")]
    Tokenizer {
        chunk: usize,
        #[source]
        source: TokenizerError,
    },

    /// Synthesis failed on `chunk` under [`InferenceFailurePolicy::Abort`](crate::config::InferenceFailurePolicy::Abort).
    #[error("synthesis failed on chunk {chunk}: {source}")]
    Inference {
        chunk: usize,
        #[source]
        source: InferenceError,
    },

    #[error(transparent)]
    Playback(#[from] PlaybackError),
}
