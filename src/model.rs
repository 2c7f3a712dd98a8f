//! ONNX model runner — token IDs → raw f32 waveform.
//!
//! Uses [`ort`] (ONNX Runtime Rust bindings) for inference.
//! The acoustic model takes three inputs:
//!
//! | Name            | Shape          | dtype   |
//! |-----------------|----------------|---------|
//! | `input`         | `[1, seq_len]` | int64   |
//! | `input_lengths` | `[1]`          | int64   |
//! | `scales`        | `[3]`          | float32 |
//!
//! `scales` is `[noise_scale, length_scale, noise_scale_w]`; the effective
//! speed goes into the middle slot.  The `output` tensor is the waveform,
//! unless a vocoder is configured, in which case it is fed unchanged to the
//! vocoder's first input and the vocoder's first output is the waveform.

use std::{
    path::Path,
    sync::{Mutex, MutexGuard},
};

use anyhow::{Context, Result};
use ort::{session::Session, value::Tensor};

use crate::{config::TtsConfig, error::InferenceError, error::InitError};

/// Token sequence + speed → audio samples for one chunk.
///
/// Implementations may run one or several stages; the orchestrator only sees
/// the final waveform.
pub trait Synthesizer: Send {
    fn synthesize(&self, ids: &[i32], speed: f32) -> Result<Vec<f32>, InferenceError>;
}

/// The main inference handle.
pub struct OnnxSynthesizer {
    acoustic: Mutex<Session>,
    vocoder: Option<Mutex<Session>>,
    noise_scale: f32,
    noise_scale_w: f32,
}

fn load_session(path: &Path) -> Result<Session> {
    Session::builder()
        .context("Failed to create ORT session builder")?
        .commit_from_file(path)
        .with_context(|| format!("Cannot load ONNX model: {}", path.display()))
}

fn lock(session: &Mutex<Session>) -> MutexGuard<'_, Session> {
    session.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl OnnxSynthesizer {
    /// Load the acoustic model and, if given, the vocoder.
    pub fn load(
        model_path: &Path,
        vocoder_path: Option<&Path>,
        config: &TtsConfig,
    ) -> Result<Self, InitError> {
        log::info!("Loading acoustic model from {}", model_path.display());
        let acoustic = load_session(model_path).map_err(InitError::Session)?;

        let vocoder = match vocoder_path {
            Some(path) => {
                log::info!("Loading vocoder from {}", path.display());
                Some(Mutex::new(load_session(path).map_err(InitError::Session)?))
            }
            None => None,
        };

        Ok(Self {
            acoustic: Mutex::new(acoustic),
            vocoder,
            noise_scale: config.noise_scale,
            noise_scale_w: config.noise_scale_w,
        })
    }

    fn run(&self, ids: &[i32], speed: f32) -> Result<Vec<f32>> {
        let seq_len = ids.len();
        let ids: Vec<i64> = ids.iter().map(|&id| i64::from(id)).collect();

        let t_input = Tensor::<i64>::from_array(([1usize, seq_len], ids))
            .context("Failed to build input tensor")?;
        let t_lengths = Tensor::<i64>::from_array(([1usize], vec![seq_len as i64]))
            .context("Failed to build input_lengths tensor")?;
        let t_scales = Tensor::<f32>::from_array((
            [3usize],
            vec![self.noise_scale, speed, self.noise_scale_w],
        ))
        .context("Failed to build scales tensor")?;

        let mut acoustic = lock(&self.acoustic);
        let outputs = acoustic
            .run(ort::inputs![
                "input" => t_input,
                "input_lengths" => t_lengths,
                "scales" => t_scales,
            ])
            .context("ONNX inference failed")?;

        let (shape, data) = outputs["output"]
            .try_extract_tensor::<f32>()
            .context("Failed to extract model output")?;

        let Some(vocoder) = &self.vocoder else {
            return Ok(data.to_vec());
        };

        let t_features = Tensor::<f32>::from_array((shape.clone(), data.to_vec()))
            .context("Failed to build vocoder input")?;
        drop(outputs);
        drop(acoustic);

        let mut vocoder = lock(vocoder);
        let outputs = vocoder
            .run(ort::inputs![t_features])
            .context("Vocoder inference failed")?;
        let (_shape, audio) = outputs[0]
            .try_extract_tensor::<f32>()
            .context("Failed to extract vocoder output")?;
        Ok(audio.to_vec())
    }
}

impl Synthesizer for OnnxSynthesizer {
    fn synthesize(&self, ids: &[i32], speed: f32) -> Result<Vec<f32>, InferenceError> {
        Ok(self.run(ids, speed)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_model_is_session_error() {
        let err = OnnxSynthesizer::load(
            Path::new("/nonexistent/arm-gor.onnx"),
            None,
            &TtsConfig::default(),
        )
        .err()
        .expect("loading a missing file must fail");
        assert!(matches!(err, InitError::Session(_)), "got: {err}");
    }
}
