//! OpenAI-compatible text-completion client.
//!
//! Sends `POST {base_url}/completions` with the rendered prompt and the
//! configured generation parameters and returns `choices[0].text`.
//! The API key comes from [`OpenAiConfig`]; the process environment is never
//! consulted or modified.

use crate::config::OpenAiConfig;
use crate::error::{AppError, AppResult};
use crate::llm::{CompletionModel, CompletionParams};
use serde::Deserialize;
use serde_json::{Value as JsonValue, json};
use std::time::Instant;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    #[serde(default)]
    text: String,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
    #[serde(default, rename = "type")]
    kind: Option<String>,
}

pub struct OpenAiClient {
    http: reqwest::Client,
    completions_url: String,
    /// Sensitive - never logged.
    api_key: String,
    params: CompletionParams,
}

impl OpenAiClient {
    pub fn new(config: OpenAiConfig) -> AppResult<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config
            .params
            .request_timeout_duration()
            .map_err(AppError::invalid_input)?
        {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| AppError::internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            completions_url: format!("{}/completions", config.base_url_or_default()),
            api_key: config.api_key,
            params: config.params,
        })
    }

    pub fn params(&self) -> &CompletionParams {
        &self.params
    }

    /// JSON request body for `prompt`. Typed parameters override same-named
    /// keys in `extra`.
    pub fn request_body(&self, prompt: &str) -> JsonValue {
        let p = &self.params;
        let mut body = p.extra.clone();

        body.insert("model".to_string(), json!(p.model_name));
        body.insert("prompt".to_string(), json!(prompt));

        let optional = [
            ("temperature", p.temperature.map(|v| json!(v))),
            ("max_tokens", p.max_tokens.map(|v| json!(v))),
            ("top_p", p.top_p.map(|v| json!(v))),
            ("frequency_penalty", p.frequency_penalty.map(|v| json!(v))),
            ("presence_penalty", p.presence_penalty.map(|v| json!(v))),
            ("n", p.n.map(|v| json!(v))),
            ("best_of", p.best_of.map(|v| json!(v))),
            ("stop", p.stop.as_ref().map(|v| json!(v))),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                body.insert(key.to_string(), value);
            }
        }

        JsonValue::Object(body)
    }
}

impl CompletionModel for OpenAiClient {
    async fn complete(&self, prompt: &str) -> AppResult<String> {
        let start = Instant::now();
        debug!(
            model = %self.params.model_name,
            prompt_chars = prompt.len(),
            "Requesting completion"
        );

        let response = self
            .http
            .post(&self.completions_url)
            .bearer_auth(&self.api_key)
            .json(&self.request_body(prompt))
            .send()
            .await
            .map_err(|e| {
                AppError::completion(
                    format!("Completion request failed: {}", e),
                    "Check network connectivity and models.openai.base_url",
                )
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            AppError::completion(
                format!("Failed to read completion response: {}", e),
                "Retry the question",
            )
        })?;

        if !status.is_success() {
            return Err(api_error(status.as_u16(), &body));
        }

        let text = extract_text(&body)?;
        debug!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            completion_chars = text.len(),
            "Completion received"
        );
        Ok(text)
    }

    fn model_name(&self) -> &str {
        &self.params.model_name
    }
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("completions_url", &self.completions_url)
            .field("api_key", &"<redacted>")
            .field("params", &self.params)
            .finish()
    }
}

/// Pull `choices[0].text` out of a successful response body.
pub(crate) fn extract_text(body: &str) -> AppResult<String> {
    let response: CompletionResponse = serde_json::from_str(body).map_err(|e| {
        AppError::completion(
            format!("Malformed completion response: {}", e),
            "Check that models.openai.base_url points at a text-completion API",
        )
    })?;

    if let Some(usage) = &response.usage {
        debug!(
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            "Token usage"
        );
    }

    let choice = response.choices.into_iter().next().ok_or_else(|| {
        AppError::completion("Completion response has no choices", "Retry the question")
    })?;
    if choice.finish_reason.as_deref() == Some("length") {
        debug!("Completion stopped at max_tokens");
    }
    Ok(choice.text)
}

/// Map a non-2xx completion response to an error.
pub(crate) fn api_error(status: u16, body: &str) -> AppError {
    let (message, kind) = match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => (envelope.error.message, envelope.error.kind),
        Err(_) => (body.trim().to_string(), None),
    };

    let suggestion = match (status, kind.as_deref()) {
        (401, _) => "Check models.openai.api_key",
        (429, Some("insufficient_quota")) => "The account has no remaining quota",
        (429, _) => "Rate limited; wait before asking again",
        (404, _) => "Check models.openai.params.model_name",
        (400, _) => "Check the generation parameters in models.openai.params",
        _ => "The completion service failed; try again later",
    };

    AppError::completion(format!("HTTP {}: {}", status, message), suggestion)
}
