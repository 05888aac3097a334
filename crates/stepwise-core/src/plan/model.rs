//! Plan data model: goals, plans, tasks and the two task schema variants.
//!
//! A [`Plan`] serializes to the wire shape clients consume. Task fields are
//! flattened, so a priority task looks like
//! `{"title", "description", "subtasks", "priority"}` and an emoji task like
//! `{"title", "description", "emoji"}`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use unicode_segmentation::UnicodeSegmentation;

// ---------------------------------------------------------------------------
// Goal
// ---------------------------------------------------------------------------

/// A non-blank, user-supplied goal.
///
/// The text is kept verbatim; trimming is only used to decide whether the
/// goal is blank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Goal(String);

/// Errors from validating a goal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GoalError {
    #[error("Goal is required")]
    Empty,
}

impl Goal {
    /// Validate `raw` and wrap it. Empty or whitespace-only input is rejected.
    pub fn parse(raw: impl Into<String>) -> Result<Self, GoalError> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(GoalError::Empty);
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Goal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Which task shape a deployment produces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaVariant {
    /// Tasks carry `subtasks` and `priority`; plans carry a `timeline`.
    #[default]
    Priority,
    /// Tasks carry a single `emoji`; plans have no timeline.
    Emoji,
}

impl fmt::Display for SchemaVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Priority => "priority",
            Self::Emoji => "emoji",
        };
        f.write_str(s)
    }
}

impl FromStr for SchemaVariant {
    type Err = SchemaVariantParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "priority" => Ok(Self::Priority),
            "emoji" => Ok(Self::Emoji),
            _ => Err(SchemaVariantParseError(s.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`SchemaVariant`] string.
#[derive(Debug, Clone, Error)]
#[error("invalid plan schema: {0:?} (expected priority or emoji)")]
pub struct SchemaVariantParseError(pub String);

// ---------------------------------------------------------------------------

/// Task priority in the priority schema.
///
/// Serializes lowercase. Deserialization is case-insensitive since the
/// generative service does not always respect casing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Priority::High, Priority::Medium, Priority::Low];
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        };
        f.write_str(s)
    }
}

impl FromStr for Priority {
    type Err = PriorityParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            _ => Err(PriorityParseError(s.to_owned())),
        }
    }
}

impl TryFrom<String> for Priority {
    type Error = PriorityParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Error returned when parsing an invalid [`Priority`] string.
#[derive(Debug, Clone, Error)]
#[error("invalid priority: {0:?} (expected high, medium, or low)")]
pub struct PriorityParseError(pub String);

// ---------------------------------------------------------------------------
// Plan and tasks
// ---------------------------------------------------------------------------

/// A structured plan for a goal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Only present in the priority schema.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeline: Option<String>,
    /// Tasks in execution order.
    pub tasks: Vec<Task>,
}

/// One actionable step within a [`Plan`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(flatten)]
    pub detail: TaskDetail,
}

/// Variant-specific task fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TaskDetail {
    Priority {
        #[serde(default)]
        subtasks: Vec<String>,
        priority: Priority,
    },
    Emoji {
        emoji: String,
    },
}

impl TaskDetail {
    pub fn variant(&self) -> SchemaVariant {
        match self {
            Self::Priority { .. } => SchemaVariant::Priority,
            Self::Emoji { .. } => SchemaVariant::Emoji,
        }
    }
}

/// Structural problems found by [`Plan::conform`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanValidationError {
    #[error("plan title is empty")]
    EmptyTitle,

    #[error("task {index} has an empty title")]
    EmptyTaskTitle { index: usize },

    #[error("task {index} is a {found} task but the plan schema is {expected}")]
    VariantMismatch {
        index: usize,
        expected: SchemaVariant,
        found: SchemaVariant,
    },

    #[error("task {index} has an empty emoji")]
    EmptyEmoji { index: usize },

    #[error("task {index} emoji must be a single glyph, got {emoji:?}")]
    InvalidEmoji { index: usize, emoji: String },
}

impl Plan {
    /// Check that the plan is a valid instance of `variant` and normalize it.
    ///
    /// Rejects empty titles, empty task titles, tasks of the other variant and
    /// any emoji that is not exactly one grapheme cluster. A `timeline` under
    /// the emoji schema is dropped.
    pub fn conform(mut self, variant: SchemaVariant) -> Result<Self, PlanValidationError> {
        if self.title.trim().is_empty() {
            return Err(PlanValidationError::EmptyTitle);
        }

        for (index, task) in self.tasks.iter().enumerate() {
            if task.title.trim().is_empty() {
                return Err(PlanValidationError::EmptyTaskTitle { index });
            }
            let found = task.detail.variant();
            if found != variant {
                return Err(PlanValidationError::VariantMismatch {
                    index,
                    expected: variant,
                    found,
                });
            }
            if let TaskDetail::Emoji { emoji } = &task.detail {
                let glyph = emoji.trim();
                if glyph.is_empty() {
                    return Err(PlanValidationError::EmptyEmoji { index });
                }
                if glyph.graphemes(true).nth(1).is_some() {
                    return Err(PlanValidationError::InvalidEmoji {
                        index,
                        emoji: emoji.clone(),
                    });
                }
            }
        }

        if variant == SchemaVariant::Emoji {
            self.timeline = None;
        }

        Ok(self)
    }
}

/// The JSON body returned to callers on success: `{"plan": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanEnvelope {
    pub plan: Plan,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
