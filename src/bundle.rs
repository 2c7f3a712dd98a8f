//! Resource bundle — the directory of model files shipped with the app.
//!
//! ```text
//! ArmTTS.bundle/
//! ├── config.json      # optional, see TtsConfig
//! ├── arm-gor.onnx     # acoustic model (TtsConfig::model_file)
//! └── vocoder.onnx     # only when TtsConfig::vocoder_file is set
//! ```
//!
//! Mobile apps copy this directory into their resources and pass its runtime
//! path to [`ArmTts::load`](crate::ArmTts::load).

use std::path::{Path, PathBuf};

use crate::{config::TtsConfig, error::InitError, model::OnnxSynthesizer};

/// Name of the optional config file inside a bundle.
pub const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone)]
pub struct ResourceBundle {
    root: PathBuf,
    config: TtsConfig,
}

impl ResourceBundle {
    /// Open `root`, reading `config.json` when present.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, InitError> {
        let root = root.into();
        if !root.is_dir() {
            log::error!("resource bundle not found: {}", root.display());
            return Err(InitError::MissingBundle(root));
        }

        let config_path = root.join(CONFIG_FILE);
        let config = if config_path.is_file() {
            log::info!("Loading config from {}", config_path.display());
            TtsConfig::from_file(&config_path)?
        } else {
            log::debug!("{} not found, using defaults", config_path.display());
            TtsConfig::default()
        };
        Ok(Self { root, config })
    }

    /// Use `config` instead of whatever the bundle carries.
    pub fn with_config(root: impl Into<PathBuf>, config: TtsConfig) -> Self {
        Self { root: root.into(), config }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &TtsConfig {
        &self.config
    }

    fn require(&self, file: &str) -> Result<PathBuf, InitError> {
        let path = self.root.join(file);
        if path.is_file() {
            Ok(path)
        } else {
            log::error!("'{file}' is missing from {}", self.root.display());
            Err(InitError::MissingModel(path))
        }
    }

    pub fn model_path(&self) -> Result<PathBuf, InitError> {
        self.require(&self.config.model_file)
    }

    pub fn vocoder_path(&self) -> Result<Option<PathBuf>, InitError> {
        self.config.vocoder_file.as_deref().map(|f| self.require(f)).transpose()
    }

    /// Resolve every model file, then start the ONNX sessions.
    pub fn load_synthesizer(&self) -> Result<OnnxSynthesizer, InitError> {
        let model = self.model_path()?;
        let vocoder = self.vocoder_path()?;
        OnnxSynthesizer::load(&model, vocoder.as_deref(), &self.config)
    }
}
