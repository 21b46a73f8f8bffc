//! Generate and parse the media summary.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use msearch_genai::{Content, Part, QuotaAwareModel};
use msearch_models::sample::example_summary_json;
use msearch_models::schema::media_summary_schema;
use msearch_models::MediaSummary;

use crate::config::SharedConfig;
use crate::cor::{record_outcome, Command, ExecutionContext, Slot};
use crate::error::{WorkerError, WorkerResult};
use crate::metrics;
use crate::templates::{SummaryVars, TemplateService};

pub const CREATE_STEP: &str = "generate-media-summary";
pub const PARSE_STEP: &str = "convert-media-summary";

/// Render category definitions one per line, sorted by name.
pub fn format_categories(categories: &HashMap<String, String>) -> String {
    let mut names: Vec<&String> = categories.keys().collect();
    names.sort();
    names
        .into_iter()
        .map(|name| format!("{}: {}\n", name, categories[name]))
        .collect()
}

/// Asks the model for a structured summary of the whole media file. The raw
/// JSON answer goes to [`Slot::SummaryJson`] and the implicit output.
pub struct MediaSummaryCreator {
    model: QuotaAwareModel,
    templates: Arc<TemplateService>,
    config: SharedConfig,
}

impl MediaSummaryCreator {
    pub fn new(model: QuotaAwareModel, templates: Arc<TemplateService>, config: SharedConfig) -> Self {
        Self {
            model,
            templates,
            config,
        }
    }

    async fn run(&self, ctx: &ExecutionContext) -> WorkerResult<String> {
        let object = ctx.object().ok_or_else(|| WorkerError::missing_input("media object"))?;
        let content_type = ctx
            .content_type()
            .ok_or_else(|| WorkerError::missing_input("content type"))?;
        let length = ctx.duration().ok_or_else(|| WorkerError::missing_input("media length"))?;

        let categories = format_categories(&self.config.read().await.category_definitions());
        let example = example_summary_json();
        let prompt = self
            .templates
            .render_summary(
                content_type,
                &SummaryVars {
                    categories: &categories,
                    example_json: &example,
                    video_length: length,
                },
            )
            .await?;
        let system = self.templates.system_instructions(content_type).await;

        let contents = vec![Content::user(vec![
            Part::text(prompt),
            Part::file(object.gs_uri(), &object.mime_type),
        ])];
        let generation = self
            .model
            .generate(
                system.as_deref(),
                &contents,
                Some(media_summary_schema()),
                ctx.trace().cancel_token(),
            )
            .await?;
        metrics::record_generation(CREATE_STEP, &generation);

        info!(media = %object, attempts = generation.attempts, "Generated media summary");
        Ok(generation.text)
    }
}

#[async_trait]
impl Command for MediaSummaryCreator {
    fn name(&self) -> &str {
        CREATE_STEP
    }

    fn input_slot(&self) -> Slot {
        Slot::ContentType
    }

    fn is_eligible(&self, ctx: &ExecutionContext) -> bool {
        ctx.trace().is_active() && ctx.object().is_some() && ctx.content_type().is_some()
    }

    async fn execute(&self, ctx: &mut ExecutionContext) {
        let result = self.run(ctx).await;
        if let Some(json) = record_outcome(ctx, CREATE_STEP, result) {
            ctx.set(Slot::SummaryJson, json.clone());
            ctx.set(self.output_slot(), json);
        }
    }
}

/// Parses the summary JSON from the implicit input into a [`MediaSummary`].
#[derive(Debug, Default)]
pub struct MediaSummaryParser;

impl MediaSummaryParser {
    fn parse(ctx: &ExecutionContext) -> WorkerResult<MediaSummary> {
        let json = ctx
            .input_text()
            .ok_or_else(|| WorkerError::missing_input("summary JSON"))?;
        let mut summary: MediaSummary =
            serde_json::from_str(json).map_err(|e| WorkerError::parse_failed(format!("media summary: {}", e)))?;

        if let Some(object) = ctx.object() {
            summary.media_url = Some(object.public_url());
        }
        Ok(summary)
    }
}

#[async_trait]
impl Command for MediaSummaryParser {
    fn name(&self) -> &str {
        PARSE_STEP
    }

    async fn execute(&self, ctx: &mut ExecutionContext) {
        let result = Self::parse(ctx);
        if let Some(summary) = record_outcome(ctx, PARSE_STEP, result) {
            info!(
                title = %summary.title,
                scenes = summary.scene_time_stamps.len(),
                "Parsed media summary"
            );
            ctx.set(Slot::Summary, summary.clone());
            ctx.set(self.output_slot(), summary);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cor::TraceHandle;
    use msearch_models::MediaObject;
    use tracing::Span;

    fn context(input: &str) -> ExecutionContext {
        let mut ctx = ExecutionContext::new(TraceHandle::new(Span::none()));
        ctx.set(Slot::Input, input);
        ctx.set(Slot::Object, MediaObject::new("hi-res", "serenity.mp4", "video/mp4"));
        ctx
    }

    #[tokio::test]
    async fn test_parser_sets_public_media_url() {
        let mut ctx = context(&example_summary_json());
        MediaSummaryParser.execute(&mut ctx).await;

        assert!(!ctx.has_errors());
        let summary = ctx.summary().unwrap();
        assert_eq!(summary.title, "Serenity");
        assert_eq!(
            summary.media_url.as_deref(),
            Some("https://storage.mtls.cloud.google.com/hi-res/serenity.mp4")
        );
        assert_eq!(summary.scene_time_stamps.len(), 2);
        assert!(ctx.get(&Slot::Output).and_then(|v| v.as_summary()).is_some());
    }

    #[tokio::test]
    async fn test_parser_rejects_malformed_json() {
        let mut ctx = context("{\"title\": ");
        MediaSummaryParser.execute(&mut ctx).await;

        assert!(matches!(ctx.errors()[0].error, WorkerError::ParseFailed(_)));
        assert!(ctx.summary().is_none());
    }

    #[test]
    fn test_format_categories_is_sorted() {
        let categories = HashMap::from([
            ("trailer".to_string(), "A short promotional cut".to_string()),
            ("movie".to_string(), "A feature film".to_string()),
        ]);
        assert_eq!(
            format_categories(&categories),
            "movie: A feature film\ntrailer: A short promotional cut\n"
        );
    }

    #[test]
    fn test_creator_needs_object_and_content_type() {
        use crate::config::AppConfig;
        use msearch_genai::{GenerationConfig, GovernorLimiter};
        use tokio::sync::RwLock;

        struct Unused;
        #[async_trait]
        impl msearch_genai::GenerationTransport for Unused {
            async fn generate(
                &self,
                _: &str,
                _: &[Content],
                _: &GenerationConfig,
            ) -> msearch_genai::GenAiResult<msearch_genai::GenerateResponse> {
                Ok(Default::default())
            }
        }

        let config = AppConfig::default();
        let step = MediaSummaryCreator::new(
            QuotaAwareModel::new(
                "creative-flash",
                GenerationConfig::default(),
                Arc::new(Unused),
                Arc::new(GovernorLimiter::per_second(1)),
            ),
            Arc::new(TemplateService::from_config(&config).unwrap()),
            Arc::new(RwLock::new(config)),
        );

        let mut ctx = context("{}");
        assert!(!step.is_eligible(&ctx));
        ctx.set(Slot::ContentType, "movie");
        assert!(step.is_eligible(&ctx));
    }
}
