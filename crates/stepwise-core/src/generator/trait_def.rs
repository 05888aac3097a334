//! The `TextGenerator` trait, the seam between the plan adapter and an
//! external generative text service.

use async_trait::async_trait;
use thiserror::Error;

/// Failures talking to a generative text service.
#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("request to generative service failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("generative service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("generative service error: {0}")]
    Api(String),

    #[error("generative service returned no text")]
    EmptyResponse,
}

/// A single-turn text completion service.
///
/// One call is one round trip: no streaming, no conversation state. The
/// trait is object-safe so services can hold `Arc<dyn TextGenerator>`.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Short name for logs (e.g. "gemini").
    fn name(&self) -> &str;

    /// Send `prompt` and return the raw text of the response.
    async fn complete(&self, prompt: &str) -> Result<String, GeneratorError>;
}

const _: () = {
    fn _assert_object_safe(_: &dyn TextGenerator) {}
};
