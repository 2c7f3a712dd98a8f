//! Runtime configuration.
//!
//! Every field has a default matching the stock `arm-gor` model and the
//! hosted preprocessing API, so an empty `config.json` (or none at all) is
//! valid.  Keys that are absent fall back to [`TtsConfig::default`].

use std::path::Path;

use serde::Deserialize;

use crate::{chunker::ChunkerConfig, error::InitError};

/// Hosted preprocessing endpoint.
pub const DEFAULT_API_URL: &str = "https://armtts1.p.rapidapi.com/v2/preprocess";

/// Header carrying the API key.
pub const DEFAULT_API_KEY_HEADER: &str = "X-RapidAPI-Key";

/// Model shipped in the stock bundle.
pub const DEFAULT_MODEL_FILE: &str = "arm-gor.onnx";

/// What to do when synthesis of a single chunk fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InferenceFailurePolicy {
    /// Log, contribute no audio for that chunk, carry on.
    #[default]
    Skip,
    /// Stop the utterance and play nothing, like a preprocessing failure.
    Abort,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TtsConfig {
    pub api_url: String,
    pub api_key_header: String,
    /// Upper bound on one preprocessing round-trip.
    pub request_timeout_secs: u64,

    /// Acoustic model, relative to the bundle directory.
    pub model_file: String,
    /// Optional second stage fed with the acoustic model's output.
    pub vocoder_file: Option<String>,
    /// Must equal the rate the model emits.
    pub sample_rate: u32,
    pub noise_scale: f32,
    pub noise_scale_w: f32,

    /// User-facing speed is clamped into `[min_speed, max_speed]`.
    pub min_speed: f32,
    pub max_speed: f32,

    pub chunking: ChunkerConfig,
    pub inference_failure: InferenceFailurePolicy,
    /// Tokenize chunk N+1 while chunk N is being synthesised.
    pub prefetch: bool,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_key_header: DEFAULT_API_KEY_HEADER.to_string(),
            request_timeout_secs: 30,
            model_file: DEFAULT_MODEL_FILE.to_string(),
            vocoder_file: None,
            sample_rate: 44_100,
            noise_scale: 0.0,
            noise_scale_w: 0.0,
            min_speed: 0.5,
            max_speed: 1.5,
            chunking: ChunkerConfig::default(),
            inference_failure: InferenceFailurePolicy::Skip,
            prefetch: false,
        }
    }
}

impl TtsConfig {
    /// Parse and validate a JSON config file.
    pub fn from_file(path: &Path) -> Result<Self, InitError> {
        let bytes = std::fs::read(path).map_err(|source| InitError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_slice(&bytes).map_err(|source| InitError::Config {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject combinations that would fail only once speaking starts.
    pub fn validate(&self) -> Result<(), InitError> {
        let invalid = |msg: String| Err(InitError::InvalidConfig(msg));
        if !self.min_speed.is_finite() || !self.max_speed.is_finite() {
            return invalid(format!(
                "speed bounds must be finite (min_speed = {}, max_speed = {})",
                self.min_speed, self.max_speed
            ));
        }
        if self.min_speed > self.max_speed {
            return invalid(format!(
                "min_speed ({}) is greater than max_speed ({})",
                self.min_speed, self.max_speed
            ));
        }
        if self.sample_rate == 0 {
            return invalid("sample_rate must be positive".to_string());
        }
        Ok(())
    }

    /// Clamp the user speed and convert it to the model's length scale.
    ///
    /// The model takes a duration multiplier, so faster speech means a
    /// smaller value: `2 − speed`.
    pub fn effective_speed(&self, speed: f32) -> f32 {
        let speed = if speed.is_nan() { 1.0 } else { speed };
        // max/min rather than clamp: an unvalidated range must not panic.
        2.0 - speed.max(self.min_speed).min(self.max_speed)
    }
}
