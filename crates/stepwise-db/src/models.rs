use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Which path produced a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PlanSource {
    /// Returned by the external generative service.
    Generated,
    /// Built locally by the fallback synthesizer.
    Synthesized,
}

impl fmt::Display for PlanSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Generated => "generated",
            Self::Synthesized => "synthesized",
        };
        f.write_str(s)
    }
}

impl FromStr for PlanSource {
    type Err = PlanSourceParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "generated" => Ok(Self::Generated),
            "synthesized" => Ok(Self::Synthesized),
            other => Err(PlanSourceParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`PlanSource`] string.
#[derive(Debug, Clone)]
pub struct PlanSourceParseError(pub String);

impl fmt::Display for PlanSourceParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid plan source: {:?}", self.0)
    }
}

impl std::error::Error for PlanSourceParseError {}

// ---------------------------------------------------------------------------
// Rows
// ---------------------------------------------------------------------------

/// A stored plan: the goal it was produced for and the plan body as JSON.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct StoredPlan {
    pub id: Uuid,
    pub goal: String,
    pub plan: serde_json::Value,
    pub source: PlanSource,
    pub created_at: DateTime<Utc>,
}

/// Stored plan totals, split by which path produced them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, FromRow)]
pub struct PlanCounts {
    pub generated: i64,
    pub synthesized: i64,
}

impl PlanCounts {
    pub fn total(&self) -> i64 {
        self.generated + self.synthesized
    }
}
