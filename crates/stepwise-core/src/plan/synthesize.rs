//! Fallback plan synthesis.
//!
//! Builds a schema-valid plan from a fixed catalog of task templates with no
//! external dependency. Content is randomized; the shape is not: between
//! [`MIN_TASKS`] and `CATALOG.len()` distinct tasks, every title non-empty.

use rand::Rng;

use super::model::{Goal, Plan, Priority, SchemaVariant, Task, TaskDetail};

/// A canned task used by the synthesizer.
#[derive(Debug, Clone, Copy)]
pub struct TaskTemplate {
    pub title: &'static str,
    pub description: &'static str,
    pub subtasks: [&'static str; 3],
    pub emoji: &'static str,
}

/// The fixed template catalog.
pub const CATALOG: &[TaskTemplate] = &[
    TaskTemplate {
        title: "Research and Planning",
        description: "Gather information and plan the approach",
        subtasks: [
            "Identify key requirements",
            "Research best practices",
            "Create initial outline",
        ],
        emoji: "🔍",
    },
    TaskTemplate {
        title: "Initial Setup",
        description: "Set up the basic structure and environment",
        subtasks: [
            "Install necessary tools",
            "Configure development environment",
            "Set up version control",
        ],
        emoji: "🧰",
    },
    TaskTemplate {
        title: "Core Implementation",
        description: "Implement the main functionality",
        subtasks: [
            "Develop core features",
            "Write unit tests",
            "Implement error handling",
        ],
        emoji: "🔨",
    },
    TaskTemplate {
        title: "Testing and Refinement",
        description: "Test the implementation and make improvements",
        subtasks: [
            "Perform integration testing",
            "Gather feedback",
            "Refine based on feedback",
        ],
        emoji: "🧪",
    },
    TaskTemplate {
        title: "Deployment",
        description: "Prepare and deploy the solution",
        subtasks: [
            "Prepare deployment package",
            "Deploy to production",
            "Monitor after deployment",
        ],
        emoji: "🚀",
    },
];

/// Lower bound on the number of synthesized tasks.
pub const MIN_TASKS: usize = 3;

/// Prefix of every synthesized plan title.
pub const TITLE_PREFIX: &str = "Plan for: ";

/// Goal characters kept in a synthesized title before truncation.
pub const TITLE_GOAL_CHARS: usize = 50;

/// Synthesize a plan using the thread-local RNG.
pub fn synthesize(goal: &Goal, variant: SchemaVariant) -> Plan {
    synthesize_with(goal, variant, &mut rand::rng())
}

/// Synthesize a plan drawing randomness from `rng`.
pub fn synthesize_with<R: Rng + ?Sized>(goal: &Goal, variant: SchemaVariant, rng: &mut R) -> Plan {
    let count = task_count(rng);

    let tasks: Vec<Task> = pick_distinct(rng, count)
        .into_iter()
        .map(|index| {
            let template = &CATALOG[index];
            let detail = match variant {
                SchemaVariant::Priority => TaskDetail::Priority {
                    subtasks: template.subtasks.iter().map(|s| s.to_string()).collect(),
                    priority: Priority::ALL[rng.random_range(0..Priority::ALL.len())],
                },
                SchemaVariant::Emoji => TaskDetail::Emoji {
                    emoji: template.emoji.to_string(),
                },
            };
            Task {
                title: template.title.to_string(),
                description: template.description.to_string(),
                detail,
            }
        })
        .collect();

    let (timeline, detail_phrase) = match variant {
        SchemaVariant::Priority => (Some(format_timeline(count)), " with subtasks"),
        SchemaVariant::Emoji => (None, ""),
    };

    Plan {
        title: synthesized_title(goal.as_str()),
        description: format!(
            "This is a generated plan to help you achieve your goal: \"{goal}\". \
             The plan includes {count} main tasks{detail_phrase} to guide you through the process."
        ),
        timeline,
        tasks,
    }
}

/// Draw the task count: uniform in `1..=5`, clamped to `[MIN_TASKS, CATALOG.len()]`.
fn task_count<R: Rng + ?Sized>(rng: &mut R) -> usize {
    rng.random_range(1..=5usize)
        .max(MIN_TASKS)
        .min(CATALOG.len())
}

/// Rejection-sample `count` distinct catalog indices, in draw order.
///
/// Terminates because `count <= CATALOG.len()`.
fn pick_distinct<R: Rng + ?Sized>(rng: &mut R, count: usize) -> Vec<usize> {
    debug_assert!(count <= CATALOG.len());
    let mut picked = Vec::with_capacity(count);
    while picked.len() < count {
        let index = rng.random_range(0..CATALOG.len());
        if !picked.contains(&index) {
            picked.push(index);
        }
    }
    picked
}

/// `"Approximately {count * 1.5} weeks"`, singular when the value is exactly 1.
pub fn format_timeline(count: usize) -> String {
    let weeks = count as f64 * 1.5;
    let unit = if weeks == 1.0 { "week" } else { "weeks" };
    format!("Approximately {weeks} {unit}")
}

/// `"Plan for: "` plus the first 50 characters of the goal, with `"..."`
/// appended when the goal is longer.
pub fn synthesized_title(goal: &str) -> String {
    match goal.char_indices().nth(TITLE_GOAL_CHARS) {
        Some((cut, _)) => format!("{TITLE_PREFIX}{}...", &goal[..cut]),
        None => format!("{TITLE_PREFIX}{goal}"),
    }
}
