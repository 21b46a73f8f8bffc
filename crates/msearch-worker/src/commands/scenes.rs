//! Per-scene script extraction through the scene pool.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use msearch_genai::{Part, QuotaAwareModel};
use msearch_models::sample::example_scene_json;

use crate::config::SharedConfig;
use crate::cor::{Command, ExecutionContext, Slot, Value};
use crate::error::{WorkerError, WorkerResult};
use crate::scene_pool::{PoolOutcome, SceneJob, ScenePool};
use crate::templates::{SceneVars, TemplateService};

pub const STEP: &str = "extract-media-scenes";

/// Fans the summary's time stamps out to the scene pool. Each failed
/// segment is recorded as its own error; successful fragments go to
/// [`Slot::Scenes`] and the implicit output.
pub struct SceneExtractor {
    model: QuotaAwareModel,
    templates: Arc<TemplateService>,
    config: SharedConfig,
}

impl SceneExtractor {
    pub fn new(model: QuotaAwareModel, templates: Arc<TemplateService>, config: SharedConfig) -> Self {
        Self {
            model,
            templates,
            config,
        }
    }

    async fn run(&self, ctx: &ExecutionContext) -> WorkerResult<PoolOutcome> {
        let summary = ctx.summary().ok_or_else(|| WorkerError::missing_input("media summary"))?;
        let object = ctx.object().ok_or_else(|| WorkerError::missing_input("media object"))?;
        let (width, default_type) = {
            let config = self.config.read().await;
            (config.application.thread_pool_size, config.content_type.default_type.clone())
        };
        let content_type = ctx.content_type().unwrap_or(default_type.as_str());

        let document = summary.as_document();
        let example = example_scene_json();
        let mut jobs = Vec::with_capacity(summary.scene_time_stamps.len());
        for (index, span) in summary.scene_time_stamps.iter().enumerate() {
            let sequence = index as u32;
            let prompt = self
                .templates
                .render_scene(
                    content_type,
                    &SceneVars {
                        sequence,
                        summary_document: &document,
                        time_start: &span.start,
                        time_end: &span.end,
                        example_json: &example,
                    },
                )
                .await?;
            jobs.push(SceneJob {
                sequence,
                span: span.clone(),
                prompt,
            });
        }

        let pool = ScenePool::new(
            self.model.clone(),
            width,
            STEP,
            Part::file(object.gs_uri(), &object.mime_type),
        )
        .with_system_instruction(self.templates.system_instructions(content_type).await);

        let segments = jobs.len();
        let outcome = pool.run(jobs, ctx.trace().cancel_token()).await;
        info!(
            media = %object,
            segments,
            extracted = outcome.fragments.len(),
            failed = outcome.failures.len(),
            dropped = outcome.dropped,
            "Scene extraction finished"
        );
        Ok(outcome)
    }
}

#[async_trait]
impl Command for SceneExtractor {
    fn name(&self) -> &str {
        STEP
    }

    fn input_slot(&self) -> Slot {
        Slot::Summary
    }

    fn is_eligible(&self, ctx: &ExecutionContext) -> bool {
        ctx.trace().is_active() && ctx.summary().is_some() && ctx.object().is_some()
    }

    async fn execute(&self, ctx: &mut ExecutionContext) {
        let outcome = match self.run(ctx).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(step = STEP, "Step failed: {}", e);
                ctx.add_error(STEP, e);
                return;
            }
        };

        for failure in outcome.failures {
            ctx.add_error(STEP, WorkerError::scene_failed(failure.sequence, failure.error));
        }
        ctx.set(Slot::Scenes, Value::Fragments(outcome.fragments.clone()));
        ctx.set(self.output_slot(), Value::Fragments(outcome.fragments));
    }
}
