//! Plan service: goal validation, generation with fallback, persistence.
//!
//! ```text
//! TRY_GENERATE --ok--------------------------> DONE(Generated)
//!      |
//!      +--any GenerationError--> FALLBACK ---> DONE(Synthesized)
//! ```
//!
//! The synthesizer cannot fail, so every valid goal reaches `DONE`. The
//! plan is then offered to the sink; sink errors are logged and dropped.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use stepwise_db::models::PlanSource;

use crate::generator::TextGenerator;
use crate::store::{PlanRecord, PlanSink};

use super::adapter::{GenerationError, PlanAdapter};
use super::model::{Goal, GoalError, Plan, SchemaVariant};
use super::synthesize::synthesize;

/// A plan and the path that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanOutcome {
    pub plan: Plan,
    pub source: PlanSource,
}

/// Turns goals into plans. Built once at startup and shared read-only.
#[derive(Clone)]
pub struct PlanService {
    adapter: PlanAdapter,
    sink: Option<Arc<dyn PlanSink>>,
    variant: SchemaVariant,
}

impl PlanService {
    pub fn new(
        generator: Option<Arc<dyn TextGenerator>>,
        sink: Option<Arc<dyn PlanSink>>,
        variant: SchemaVariant,
    ) -> Self {
        Self {
            adapter: PlanAdapter::new(generator, variant),
            sink,
            variant,
        }
    }

    pub fn variant(&self) -> SchemaVariant {
        self.variant
    }

    /// Validate `raw_goal`, produce a plan, and offer it to the sink.
    ///
    /// Only an empty or blank goal is an error; generation failures are
    /// absorbed by the fallback.
    pub async fn create_plan(&self, raw_goal: &str) -> Result<PlanOutcome, GoalError> {
        let goal = Goal::parse(raw_goal)?;
        let outcome = self.resolve_plan(&goal).await;
        self.record(&goal, &outcome).await;
        Ok(outcome)
    }

    /// Try the adapter; on any failure synthesize instead.
    pub async fn resolve_plan(&self, goal: &Goal) -> PlanOutcome {
        match self.adapter.generate(goal).await {
            Ok(plan) => {
                info!(tasks = plan.tasks.len(), "plan generated");
                PlanOutcome {
                    plan,
                    source: PlanSource::Generated,
                }
            }
            Err(err) => {
                if matches!(err, GenerationError::NotConfigured) {
                    debug!("no generator configured, synthesizing plan");
                } else {
                    warn!(error = %err, "plan generation failed, falling back to synthesized plan");
                }
                let plan = synthesize(goal, self.variant);
                info!(tasks = plan.tasks.len(), "plan synthesized");
                PlanOutcome {
                    plan,
                    source: PlanSource::Synthesized,
                }
            }
        }
    }

    async fn record(&self, goal: &Goal, outcome: &PlanOutcome) {
        let Some(sink) = &self.sink else {
            return;
        };

        let record = PlanRecord {
            goal: goal.as_str().to_owned(),
            plan: outcome.plan.clone(),
            source: outcome.source,
            created_at: Utc::now(),
        };
        if let Err(err) = sink.record(&record).await {
            warn!(
                sink = sink.name(),
                error = %format!("{err:#}"),
                "failed to save plan, continuing without save"
            );
        }
    }
}

impl std::fmt::Debug for PlanService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlanService")
            .field("adapter", &self.adapter)
            .field("sink", &self.sink.as_deref().map(|s| s.name()))
            .field("variant", &self.variant)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::generator::GeneratorError;
    use crate::plan::model::TaskDetail;
    use crate::plan::synthesize::{CATALOG, MIN_TASKS, TITLE_PREFIX};

    struct ScriptedGenerator {
        reply: Option<String>,
        calls: AtomicUsize,
    }

    impl ScriptedGenerator {
        fn replying(text: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Some(text.to_string()),
                calls: AtomicUsize::new(0),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                reply: None,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TextGenerator for ScriptedGenerator {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, _prompt: &str) -> Result<String, GeneratorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.reply
                .clone()
                .ok_or_else(|| GeneratorError::Api("service unavailable".to_string()))
        }
    }

    #[derive(Default)]
    struct MemorySink {
        records: Mutex<Vec<PlanRecord>>,
        fail: bool,
    }

    #[async_trait]
    impl PlanSink for MemorySink {
        fn name(&self) -> &str {
            "memory"
        }

        async fn record(&self, record: &PlanRecord) -> anyhow::Result<()> {
            if self.fail {
                anyhow::bail!("disk full");
            }
            self.records.lock().unwrap().push(record.clone());
            Ok(())
        }
    }

    fn assert_synthesized(outcome: &PlanOutcome) {
        assert_eq!(outcome.source, PlanSource::Synthesized);
        let n = outcome.plan.tasks.len();
        assert!((MIN_TASKS..=CATALOG.len()).contains(&n), "got {n} tasks");
        assert!(outcome.plan.title.starts_with(TITLE_PREFIX));
    }

    #[tokio::test]
    async fn empty_goal_is_rejected_before_generation() {
        let generator = ScriptedGenerator::replying("{}");
        let sink = Arc::new(MemorySink::default());
        let service = PlanService::new(
            Some(generator.clone()),
            Some(sink.clone()),
            SchemaVariant::Priority,
        );

        assert_eq!(service.create_plan("").await, Err(GoalError::Empty));
        assert_eq!(service.create_plan("   ").await, Err(GoalError::Empty));
        assert_eq!(generator.calls(), 0);
        assert!(sink.records.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn generated_plan_is_returned_as_is() {
        let generator =
            ScriptedGenerator::replying(r#"Sure! {"title":"X","description":"Y","tasks":[]}"#);
        let service = PlanService::new(Some(generator.clone()), None, SchemaVariant::Priority);

        let outcome = service.create_plan("anything").await.unwrap();
        assert_eq!(outcome.source, PlanSource::Generated);
        assert_eq!(outcome.plan.title, "X");
        assert_eq!(outcome.plan.description, "Y");
        assert!(outcome.plan.tasks.is_empty());
        assert_eq!(generator.calls(), 1);
    }

    #[tokio::test]
    async fn generator_error_falls_back_to_synthesizer() {
        let generator = ScriptedGenerator::failing();
        let service = PlanService::new(Some(generator.clone()), None, SchemaVariant::Priority);

        let outcome = service.create_plan("learn rust").await.unwrap();
        assert_synthesized(&outcome);
        assert_eq!(generator.calls(), 1, "no retries");
    }

    #[tokio::test]
    async fn response_without_braces_falls_back() {
        let generator = ScriptedGenerator::replying("I'd be happy to help with that goal!");
        let service = PlanService::new(Some(generator), None, SchemaVariant::Emoji);

        let outcome = service.create_plan("learn rust").await.unwrap();
        assert_synthesized(&outcome);
        assert!(outcome.plan.timeline.is_none());
    }

    #[tokio::test]
    async fn schema_invalid_response_falls_back() {
        let generator = ScriptedGenerator::replying(r#"{"title":"","tasks":[]}"#);
        let service = PlanService::new(Some(generator), None, SchemaVariant::Priority);

        let outcome = service.create_plan("learn rust").await.unwrap();
        assert_synthesized(&outcome);
    }

    #[tokio::test]
    async fn multi_glyph_emoji_response_falls_back() {
        let generator = ScriptedGenerator::replying(
            r#"{"title":"X","tasks":[{"title":"a","emoji":"rocket ship 🚀🚀"}]}"#,
        );
        let service = PlanService::new(Some(generator), None, SchemaVariant::Emoji);

        let outcome = service.create_plan("launch a newsletter").await.unwrap();
        assert_synthesized(&outcome);
        for task in &outcome.plan.tasks {
            let TaskDetail::Emoji { emoji } = &task.detail else {
                panic!("expected emoji task, got {task:?}");
            };
            assert_eq!(emoji.chars().count(), 1, "{emoji:?}");
        }
    }

    #[tokio::test]
    async fn missing_generator_synthesizes() {
        let service = PlanService::new(None, None, SchemaVariant::Priority);
        let outcome = service.create_plan("learn rust").await.unwrap();
        assert_synthesized(&outcome);
        assert!(outcome.plan.timeline.is_some());
    }

    #[tokio::test]
    async fn sink_receives_goal_plan_and_source() {
        let sink = Arc::new(MemorySink::default());
        let service = PlanService::new(None, Some(sink.clone()), SchemaVariant::Emoji);

        let outcome = service.create_plan(" paint the fence ").await.unwrap();

        let records = sink.records.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].goal, " paint the fence ");
        assert_eq!(records[0].plan, outcome.plan);
        assert_eq!(records[0].source, PlanSource::Synthesized);
    }

    #[tokio::test]
    async fn sink_failure_does_not_change_outcome() {
        let sink = Arc::new(MemorySink {
            fail: true,
            ..MemorySink::default()
        });
        let generator = ScriptedGenerator::replying(r#"{"title":"X","tasks":[]}"#);
        let service = PlanService::new(Some(generator), Some(sink), SchemaVariant::Priority);

        let outcome = service.create_plan("goal").await.unwrap();
        assert_eq!(outcome.source, PlanSource::Generated);
        assert_eq!(outcome.plan.title, "X");
    }

    #[test]
    fn debug_lists_collaborators() {
        let service = PlanService::new(
            Some(ScriptedGenerator::failing()),
            Some(Arc::new(MemorySink::default())),
            SchemaVariant::Emoji,
        );
        let debug = format!("{service:?}");
        assert!(debug.contains("scripted"));
        assert!(debug.contains("memory"));
        assert!(debug.contains("Emoji"));
    }
}
