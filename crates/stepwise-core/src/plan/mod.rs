//! Plans: the data model, the generative adapter, the fallback synthesizer,
//! and the service that ties them together.

pub mod adapter;
pub mod model;
pub mod prompt;
pub mod service;
pub mod synthesize;

pub use adapter::{GenerationError, PlanAdapter, extract_json_object, parse_generated_plan};
pub use model::{
    Goal, GoalError, Plan, PlanEnvelope, PlanValidationError, Priority, SchemaVariant, Task,
    TaskDetail,
};
pub use prompt::build_generation_prompt;
pub use service::{PlanOutcome, PlanService};
pub use synthesize::{synthesize, synthesize_with};
