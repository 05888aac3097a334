//! Google Gemini `generateContent` client.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::trait_def::{GeneratorError, TextGenerator};

/// Gemini client configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeminiConfig {
    /// API key, sent in the `x-goog-api-key` header.
    pub api_key: String,
    /// Model name (e.g. "gemini-2.0-flash").
    pub model: String,
    /// Base endpoint URL, without a trailing `/models`.
    pub endpoint: String,
    /// Transport-level request timeout in seconds.
    pub timeout_secs: u64,
}

impl GeminiConfig {
    pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
    pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

    /// Config for `api_key` with the default model, endpoint and timeout.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: Self::DEFAULT_MODEL.to_string(),
            endpoint: Self::DEFAULT_ENDPOINT.to_string(),
            timeout_secs: Self::DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Gemini text generator.
pub struct GeminiClient {
    client: reqwest::Client,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Result<Self, GeneratorError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    fn url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.endpoint.trim_end_matches('/'),
            self.config.model
        )
    }
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("model", &self.config.model)
            .field("endpoint", &self.config.endpoint)
            .finish_non_exhaustive()
    }
}

// Wire types for generateContent.

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: [Part<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

/// Concatenate the text parts of the first candidate.
fn response_text(response: GenerateResponse) -> Result<String, GeneratorError> {
    if let Some(error) = response.error {
        return Err(GeneratorError::Api(error.message));
    }

    let text: String = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|content| content.parts.into_iter().filter_map(|p| p.text).collect::<String>())
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(GeneratorError::EmptyResponse);
    }
    Ok(text)
}

/// Body of a non-2xx response, or a note saying why it could not be read.
fn error_body<E: std::fmt::Display>(body: Result<String, E>) -> String {
    body.unwrap_or_else(|e| format!("<unreadable body: {e}>"))
}

#[async_trait]
impl TextGenerator for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn complete(&self, prompt: &str) -> Result<String, GeneratorError> {
        let body = GenerateRequest {
            contents: [Content {
                role: "user",
                parts: [Part { text: prompt }],
            }],
        };

        let response = self
            .client
            .post(self.url())
            .header("x-goog-api-key", &self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = error_body(response.text().await);
            return Err(GeneratorError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateResponse = response.json().await?;
        response_text(parsed)
    }
}
