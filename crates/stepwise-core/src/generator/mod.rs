//! Text generation backends for the plan adapter.
//!
//! ```text
//! PlanAdapter
//!     |
//!     | complete(prompt)
//!     v
//! &dyn TextGenerator ---> GeminiClient ---> POST {endpoint}/models/{model}:generateContent
//!     |
//!     v
//! Result<String, GeneratorError>
//! ```

pub mod gemini;
pub mod trait_def;

pub use gemini::{GeminiClient, GeminiConfig};
pub use trait_def::{GeneratorError, TextGenerator};
