//! Remote preprocessing client — text chunk → model token IDs.
//!
//! Armenian text normalisation and grapheme-to-phoneme conversion run on the
//! hosted preprocessing API.  Each chunk is POSTed as `multipart/form-data`
//! with a single `text` field; the service answers with one of
//!
//! ```json
//! { "ids": [12, 7, 33, …] }
//! { "message": "Invalid API key" }
//! ```
//!
//! Anything else is a protocol violation.  The call blocks the calling thread
//! and is bounded by [`TtsConfig::request_timeout_secs`].

use std::time::Duration;

use serde::Deserialize;
use ureq::Agent;

use crate::{config::TtsConfig, error::TokenizerError, multipart::MultipartForm};

/// Model-vocabulary indices for one chunk.
pub type TokenSequence = Vec<i32>;

/// Outcome of one preprocessing call: a token sequence or an error, never both.
pub type ProcessResult = Result<TokenSequence, TokenizerError>;

/// Turns one chunk of text into a token sequence.
pub trait Tokenizer: Send + Sync {
    fn process(&self, chunk: &str) -> ProcessResult;
}

#[derive(Debug, Deserialize)]
struct PreprocessResponse {
    ids: Option<Vec<i32>>,
    message: Option<String>,
}

/// Decode a preprocessing response body.
pub fn parse_response(status: u16, body: &[u8]) -> ProcessResult {
    let parsed: PreprocessResponse =
        serde_json::from_slice(body).map_err(|e| TokenizerError::Protocol {
            status,
            detail: format!("invalid JSON body: {e}"),
        })?;

    match parsed {
        PreprocessResponse { ids: Some(ids), .. } if !ids.is_empty() => Ok(ids),
        PreprocessResponse { ids: Some(_), .. } => Err(TokenizerError::EmptySequence),
        PreprocessResponse { message: Some(message), .. } => Err(TokenizerError::Service(message)),
        PreprocessResponse { ids: None, message: None } => Err(TokenizerError::Protocol {
            status,
            detail: "neither `ids` nor `message` in response".to_string(),
        }),
    }
}

/// Blocking HTTP client for the hosted preprocessing API.
pub struct RemoteTokenizer {
    agent: Agent,
    url: String,
    key_header: String,
    api_key: String,
}

impl RemoteTokenizer {
    pub fn new(config: &TtsConfig, api_key: impl Into<String>) -> Self {
        let agent: Agent = Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.request_timeout_secs.max(1))))
            // Error bodies carry the `message` field, so 4xx/5xx are read, not raised.
            .http_status_as_error(false)
            .build()
            .into();

        Self {
            agent,
            url: config.api_url.clone(),
            key_header: config.api_key_header.clone(),
            api_key: api_key.into(),
        }
    }
}

fn transport_error(e: ureq::Error) -> TokenizerError {
    match e {
        ureq::Error::Timeout(_) => TokenizerError::Timeout,
        e => TokenizerError::Network(e.to_string()),
    }
}

impl Tokenizer for RemoteTokenizer {
    fn process(&self, chunk: &str) -> ProcessResult {
        let form = MultipartForm::new().text("text", chunk);
        let content_type = form.content_type();
        let body = form.finish();

        log::debug!("POST {} ({} chars)", self.url, chunk.chars().count());

        let response = self
            .agent
            .post(self.url.as_str())
            .header(self.key_header.as_str(), self.api_key.as_str())
            .header("Content-Type", content_type.as_str())
            .send(&body[..])
            .map_err(transport_error)?;

        let status = response.status().as_u16();
        let bytes = response.into_body().read_to_vec().map_err(transport_error)?;
        parse_response(status, &bytes)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
