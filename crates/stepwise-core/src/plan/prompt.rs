//! Generation prompt construction.
//!
//! Pure string assembly: the prompt names the exact JSON shape for the
//! configured schema, embeds the goal verbatim and asks for the JSON object
//! alone.

use super::model::{Goal, SchemaVariant};

/// JSON shape for the priority schema.
const PRIORITY_SHAPE: &str = r#"{
  "title": "Goal title",
  "description": "Brief description of the goal",
  "timeline": "Estimated timeline",
  "tasks": [
    {
      "title": "Task title",
      "description": "Task description",
      "subtasks": ["subtask 1", "subtask 2"],
      "priority": "high/medium/low"
    }
  ]
}"#;

/// JSON shape for the emoji schema.
const EMOJI_SHAPE: &str = r#"{
  "title": "Goal title",
  "description": "Brief description of the goal",
  "tasks": [
    {
      "title": "Task title",
      "description": "Task description",
      "emoji": "a single emoji that represents the task"
    }
  ]
}"#;

/// Field rules listed after the shape.
fn field_rules(variant: SchemaVariant) -> &'static str {
    match variant {
        SchemaVariant::Priority => {
            "- Every task needs a non-empty \"title\".\n\
             - \"priority\" must be exactly one of \"high\", \"medium\" or \"low\".\n\
             - \"subtasks\" is a list of short strings and may be empty.\n\
             - List tasks in the order they should be done.\n"
        }
        SchemaVariant::Emoji => {
            "- Every task needs a non-empty \"title\".\n\
             - \"emoji\" is exactly one emoji character.\n\
             - Do not add subtasks, priorities or a timeline.\n\
             - List tasks in the order they should be done.\n"
        }
    }
}

/// Build the single-turn instruction sent to the generative service.
pub fn build_generation_prompt(goal: &Goal, variant: SchemaVariant) -> String {
    let shape = match variant {
        SchemaVariant::Priority => PRIORITY_SHAPE,
        SchemaVariant::Emoji => EMOJI_SHAPE,
    };

    let mut prompt = String::with_capacity(1024 + goal.as_str().len());
    prompt.push_str(
        "You are a helpful assistant that breaks down goals into actionable steps. \
         For the given goal, create a detailed plan with an ordered list of tasks.\n\n",
    );
    prompt.push_str("Return the response as a valid JSON object with this structure:\n");
    prompt.push_str(shape);
    prompt.push_str("\n\n");
    prompt.push_str(field_rules(variant));
    prompt.push_str("\nGoal: ");
    prompt.push_str(goal.as_str());
    prompt.push_str(
        "\n\nReturn ONLY the JSON object. Do not add any text, explanation or \
         markdown fences before or after it.",
    );
    prompt
}
