//! Blocking HTTP client for `models/{model}:generateContent`.

use super::{GenerateContentRequest, GenerateContentResponse};
use crate::config::GeminiConfig;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GeminiError {
    #[error("request to Gemini API failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Gemini API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },
    #[error("failed to decode Gemini response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Gemini returned no candidates (finish reason: {0})")]
    NoCandidates(String),
}

/// Anything that can answer a generateContent request.
///
/// The chat session and the orchestrator only talk to this trait, so tests
/// can script model replies without a network.
pub trait ChatModel {
    fn model_name(&self) -> &str;

    fn generate_content(
        &self,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, GeminiError>;
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    message: String,
}

pub struct GeminiClient {
    http: reqwest::blocking::Client,
    base_url: String,
    model: String,
    api_key: SecretString,
}

impl GeminiClient {
    pub fn new(config: &GeminiConfig, api_key: SecretString) -> Result<Self, GeminiError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl ChatModel for GeminiClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn generate_content(
        &self,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, GeminiError> {
        tracing::debug!(
            model = %self.model,
            turns = request.contents.len(),
            "sending generateContent request"
        );

        let resp = self
            .http
            .post(self.endpoint())
            .query(&[("key", self.api_key.expose_secret())])
            .json(request)
            .send()
            // the URL carries the API key
            .map_err(|e| GeminiError::Http(e.without_url()))?;

        let status = resp.status();
        let body = resp.text().map_err(|e| GeminiError::Http(e.without_url()))?;

        if !status.is_success() {
            let message = serde_json::from_str::<ApiErrorBody>(&body)
                .map(|b| b.error.message)
                .unwrap_or(body);
            return Err(GeminiError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&body)?;
        if let Some(usage) = &parsed.usage_metadata {
            tracing::debug!(
                prompt_tokens = usage.prompt_token_count,
                output_tokens = usage.candidates_token_count,
                "generateContent usage"
            );
        }
        Ok(parsed)
    }
}
