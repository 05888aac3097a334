//! Prompt/response adapter: goal in, validated plan out, via a
//! [`TextGenerator`].
//!
//! Every step is fallible and reports a [`GenerationError`]; the adapter
//! never retries. Callers decide what a failure means (see
//! [`super::service::PlanService`]).

use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;

use crate::generator::{GeneratorError, TextGenerator};

use super::model::{Goal, Plan, PlanValidationError, SchemaVariant};
use super::prompt::build_generation_prompt;

/// Why the generative path did not produce a plan.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("no text generator configured")]
    NotConfigured,

    #[error(transparent)]
    Generator(#[from] GeneratorError),

    #[error("response contains no JSON object")]
    NoJsonObject,

    #[error("response JSON is malformed: {0}")]
    Parse(#[source] serde_json::Error),

    #[error("response JSON does not match the plan schema: {0}")]
    Schema(#[source] serde_json::Error),

    #[error("generated plan is invalid: {0}")]
    InvalidPlan(#[from] PlanValidationError),
}

/// Locate the candidate JSON payload in free text.
///
/// Returns the slice from the first `{` through the last `}` inclusive, or
/// `None` when either brace is missing or the last `}` precedes the first `{`.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

/// Turn raw generator output into a plan of the given schema.
pub fn parse_generated_plan(text: &str, variant: SchemaVariant) -> Result<Plan, GenerationError> {
    let candidate = extract_json_object(text).ok_or(GenerationError::NoJsonObject)?;
    let value: serde_json::Value =
        serde_json::from_str(candidate).map_err(GenerationError::Parse)?;
    let plan = Plan::deserialize(value).map_err(GenerationError::Schema)?;
    Ok(plan.conform(variant)?)
}

/// Generates plans through an optional [`TextGenerator`].
#[derive(Clone)]
pub struct PlanAdapter {
    generator: Option<Arc<dyn TextGenerator>>,
    variant: SchemaVariant,
}

impl PlanAdapter {
    pub fn new(generator: Option<Arc<dyn TextGenerator>>, variant: SchemaVariant) -> Self {
        Self { generator, variant }
    }

    pub fn generator_name(&self) -> Option<&str> {
        self.generator.as_deref().map(|g| g.name())
    }

    /// One prompt, one round trip, one parse.
    pub async fn generate(&self, goal: &Goal) -> Result<Plan, GenerationError> {
        let generator = self
            .generator
            .as_ref()
            .ok_or(GenerationError::NotConfigured)?;

        let prompt = build_generation_prompt(goal, self.variant);
        let text = generator.complete(&prompt).await?;
        tracing::debug!(
            generator = generator.name(),
            response_len = text.len(),
            "generator responded"
        );
        parse_generated_plan(&text, self.variant)
    }
}

impl std::fmt::Debug for PlanAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlanAdapter")
            .field("generator", &self.generator_name())
            .field("variant", &self.variant)
            .finish()
    }
}
