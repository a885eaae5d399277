//! Completion model access.
//!
//! [`CompletionModel`] is the seam between the translator and the hosted
//! model; [`OpenAiClient`] is the production implementation.

pub mod openai;

pub use openai::OpenAiClient;

use crate::error::AppResult;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::future::Future;
use std::time::Duration;

pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo-instruct";
pub const DEFAULT_TEMPERATURE: f64 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 256;

/// A hosted text-generation service.
pub trait CompletionModel: Send + Sync {
    /// Complete `prompt` and return the generated text unmodified.
    fn complete(&self, prompt: &str) -> impl Future<Output = AppResult<String>> + Send;

    /// Model identifier for logging.
    fn model_name(&self) -> &str;
}

/// Generation parameters from `models.openai.params`.
///
/// Keys without a typed field are kept in `extra` and forwarded to the API
/// as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionParams {
    #[serde(alias = "model", default = "default_model")]
    pub model_name: String,
    #[serde(default = "default_temperature")]
    pub temperature: Option<f64>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub top_p: Option<f64>,
    #[serde(default)]
    pub frequency_penalty: Option<f64>,
    #[serde(default)]
    pub presence_penalty: Option<f64>,
    #[serde(default)]
    pub n: Option<u32>,
    #[serde(default)]
    pub best_of: Option<u32>,
    #[serde(default)]
    pub stop: Option<Vec<String>>,
    /// Whole-request timeout in seconds. Client-side only, never sent.
    #[serde(default)]
    pub request_timeout: Option<f64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, JsonValue>,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_temperature() -> Option<f64> {
    Some(DEFAULT_TEMPERATURE)
}

fn default_max_tokens() -> Option<u32> {
    Some(DEFAULT_MAX_TOKENS)
}

impl Default for CompletionParams {
    fn default() -> Self {
        Self {
            model_name: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            top_p: None,
            frequency_penalty: None,
            presence_penalty: None,
            n: None,
            best_of: None,
            stop: None,
            request_timeout: None,
            extra: serde_json::Map::new(),
        }
    }
}

impl CompletionParams {
    /// Client-side request timeout. Unset or zero means none.
    ///
    /// Fails for negative, non-finite or out-of-range values.
    pub fn request_timeout_duration(&self) -> Result<Option<Duration>, String> {
        match self.request_timeout {
            None => Ok(None),
            Some(secs) if secs == 0.0 => Ok(None),
            Some(secs) => Duration::try_from_secs_f64(secs).map(Some).map_err(|e| {
                format!(
                    "models.openai.params.request_timeout must be a finite, non-negative number of seconds (got {}): {}",
                    secs, e
                )
            }),
        }
    }
}
