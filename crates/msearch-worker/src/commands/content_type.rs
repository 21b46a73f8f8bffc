//! Classify the media content type with the model.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use msearch_genai::{Content, Part, QuotaAwareModel};

use crate::config::SharedConfig;
use crate::cor::{record_outcome, Command, ExecutionContext, Slot};
use crate::error::{WorkerError, WorkerResult};
use crate::metrics;
use crate::templates::{ContentTypeVars, TemplateService};

pub const STEP: &str = "get-media-content-type";

pub struct MediaContentType {
    model: QuotaAwareModel,
    templates: Arc<TemplateService>,
    config: SharedConfig,
}

/// First configured type mentioned in the answer, ignoring case.
pub fn pick_content_type(answer: &str, types: &[String]) -> Option<String> {
    let answer = answer.trim().to_lowercase();
    types
        .iter()
        .find(|t| !t.is_empty() && answer.contains(&t.to_lowercase()))
        .cloned()
}

impl MediaContentType {
    pub fn new(model: QuotaAwareModel, templates: Arc<TemplateService>, config: SharedConfig) -> Self {
        Self {
            model,
            templates,
            config,
        }
    }

    async fn run(&self, ctx: &ExecutionContext) -> WorkerResult<String> {
        let object = ctx.object().ok_or_else(|| WorkerError::missing_input("media object"))?;
        let (types, default_type) = {
            let config = self.config.read().await;
            (config.content_type.types.clone(), config.content_type.default_type.clone())
        };

        let prompt = self
            .templates
            .render_content_type(&ContentTypeVars {
                content_types: &types.join(", "),
            })
            .await?;
        let contents = vec![Content::user(vec![
            Part::text(prompt),
            Part::file(object.gs_uri(), &object.mime_type),
        ])];

        let generation = self
            .model
            .generate(None, &contents, None, ctx.trace().cancel_token())
            .await?;
        metrics::record_generation(STEP, &generation);

        Ok(match pick_content_type(&generation.text, &types) {
            Some(content_type) => {
                info!(media = %object, content_type = %content_type, "Classified media");
                content_type
            }
            None => {
                warn!(
                    media = %object,
                    answer = %generation.text.trim(),
                    "Unrecognised content type, using {}", default_type
                );
                default_type
            }
        })
    }
}

#[async_trait]
impl Command for MediaContentType {
    fn name(&self) -> &str {
        STEP
    }

    fn input_slot(&self) -> Slot {
        Slot::Object
    }

    async fn execute(&self, ctx: &mut ExecutionContext) {
        let result = self.run(ctx).await;
        if let Some(content_type) = record_outcome(ctx, STEP, result) {
            ctx.set(Slot::ContentType, content_type.clone());
            ctx.set(self.output_slot(), content_type);
        }
    }
}
