//! Prompt templates compiled from configuration.

use handlebars::Handlebars;
use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::info;

use crate::config::AppConfig;
use crate::error::{WorkerError, WorkerResult};

const CONTENT_TYPE_TEMPLATE: &str = "content-type";

/// Vocabulary of the per-scene prompt.
#[derive(Debug, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct SceneVars<'a> {
    pub sequence: u32,
    pub summary_document: &'a str,
    pub time_start: &'a str,
    pub time_end: &'a str,
    pub example_json: &'a str,
}

/// Vocabulary of the summary prompt.
#[derive(Debug, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct SummaryVars<'a> {
    pub categories: &'a str,
    pub example_json: &'a str,
    pub video_length: u32,
}

/// Vocabulary of the content type classification prompt.
#[derive(Debug, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct ContentTypeVars<'a> {
    pub content_types: &'a str,
}

struct Compiled {
    registry: Handlebars<'static>,
    system_instructions: HashMap<String, String>,
}

fn summary_name(content_type: &str) -> String {
    format!("summary/{}", content_type.to_ascii_lowercase())
}

fn scene_name(content_type: &str) -> String {
    format!("scene/{}", content_type.to_ascii_lowercase())
}

impl Compiled {
    fn from_config(config: &AppConfig) -> WorkerResult<Self> {
        let mut registry = Handlebars::new();
        registry.register_escape_fn(handlebars::no_escape);

        let mut system_instructions = HashMap::new();
        for (content_type, template) in &config.prompt_templates {
            registry
                .register_template_string(&summary_name(content_type), &template.summary)
                .map_err(|e| WorkerError::template(format!("summary/{}: {}", content_type, e)))?;
            registry
                .register_template_string(&scene_name(content_type), &template.scene)
                .map_err(|e| WorkerError::template(format!("scene/{}: {}", content_type, e)))?;
            system_instructions.insert(
                content_type.to_ascii_lowercase(),
                template.system_instructions.clone(),
            );
        }

        registry
            .register_template_string(CONTENT_TYPE_TEMPLATE, &config.content_type.prompt_template)
            .map_err(|e| WorkerError::template(format!("{}: {}", CONTENT_TYPE_TEMPLATE, e)))?;

        Ok(Self {
            registry,
            system_instructions,
        })
    }
}

/// Renders prompts by content type. Recompiled wholesale on reload.
pub struct TemplateService {
    compiled: RwLock<Compiled>,
}

impl TemplateService {
    pub fn from_config(config: &AppConfig) -> WorkerResult<Self> {
        Ok(Self {
            compiled: RwLock::new(Compiled::from_config(config)?),
        })
    }

    /// Replace every template. On error the previous set stays active.
    pub async fn reload(&self, config: &AppConfig) -> WorkerResult<()> {
        let compiled = Compiled::from_config(config)?;
        let count = compiled.system_instructions.len();
        *self.compiled.write().await = compiled;
        info!("Reloaded prompt templates for {} content types", count);
        Ok(())
    }

    async fn render<T: Serialize>(&self, name: &str, vars: &T) -> WorkerResult<String> {
        let compiled = self.compiled.read().await;
        if !compiled.registry.has_template(name) {
            return Err(WorkerError::template(format!("no template named {}", name)));
        }
        compiled
            .registry
            .render(name, vars)
            .map_err(|e| WorkerError::template(format!("{}: {}", name, e)))
    }

    pub async fn render_summary(&self, content_type: &str, vars: &SummaryVars<'_>) -> WorkerResult<String> {
        self.render(&summary_name(content_type), vars).await
    }

    pub async fn render_scene(&self, content_type: &str, vars: &SceneVars<'_>) -> WorkerResult<String> {
        self.render(&scene_name(content_type), vars).await
    }

    pub async fn render_content_type(&self, vars: &ContentTypeVars<'_>) -> WorkerResult<String> {
        self.render(CONTENT_TYPE_TEMPLATE, vars).await
    }

    /// System instruction for a content type, if one is configured.
    pub async fn system_instructions(&self, content_type: &str) -> Option<String> {
        self.compiled
            .read()
            .await
            .system_instructions
            .get(&content_type.to_ascii_lowercase())
            .filter(|s| !s.is_empty())
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PromptTemplate;

    fn config(scene: &str) -> AppConfig {
        let mut config = AppConfig::default();
        config.prompt_templates.insert(
            "Movie".to_string(),
            PromptTemplate {
                system_instructions: "You are a film archivist.".to_string(),
                summary: "Categories: {{CATEGORIES}} Length: {{VIDEO_LENGTH}} Example: {{EXAMPLE_JSON}}".to_string(),
                scene: scene.to_string(),
            },
        );
        config.content_type.prompt_template = "Choose from: {{CONTENT_TYPES}}".to_string();
        config
    }

    #[tokio::test]
    async fn test_render_scene_without_escaping() {
        let service = TemplateService::from_config(&config(
            "#{{SEQUENCE}} {{TIME_START}}-{{TIME_END}}\n{{SUMMARY_DOCUMENT}}\n{{EXAMPLE_JSON}}",
        ))
        .unwrap();

        let prompt = service
            .render_scene(
                "movie",
                &SceneVars {
                    sequence: 2,
                    summary_document: "Title:Serenity",
                    time_start: "00:00:05",
                    time_end: "00:00:10",
                    example_json: r#"{"script":"<b>"}"#,
                },
            )
            .await
            .unwrap();

        assert_eq!(prompt, "#2 00:00:05-00:00:10\nTitle:Serenity\n{\"script\":\"<b>\"}");
    }

    #[tokio::test]
    async fn test_render_summary_and_content_type() {
        let service = TemplateService::from_config(&config("")).unwrap();

        let summary = service
            .render_summary(
                "MOVIE",
                &SummaryVars {
                    categories: "trailer: short promo",
                    example_json: "{}",
                    video_length: 120,
                },
            )
            .await
            .unwrap();
        assert_eq!(summary, "Categories: trailer: short promo Length: 120 Example: {}");

        let classify = service
            .render_content_type(&ContentTypeVars {
                content_types: "movie, trailer",
            })
            .await
            .unwrap();
        assert_eq!(classify, "Choose from: movie, trailer");

        assert_eq!(
            service.system_instructions("movie").await.as_deref(),
            Some("You are a film archivist.")
        );
    }

    #[tokio::test]
    async fn test_unknown_content_type_is_an_error() {
        let service = TemplateService::from_config(&config("")).unwrap();
        let err = service
            .render_summary(
                "documentary",
                &SummaryVars {
                    categories: "",
                    example_json: "",
                    video_length: 0,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, WorkerError::Template(_)));
    }

    #[tokio::test]
    async fn test_reload_replaces_templates() {
        let service = TemplateService::from_config(&config("old {{SEQUENCE}}")).unwrap();
        service.reload(&config("new {{SEQUENCE}}")).await.unwrap();

        let prompt = service
            .render_scene(
                "movie",
                &SceneVars {
                    sequence: 0,
                    summary_document: "",
                    time_start: "",
                    time_end: "",
                    example_json: "",
                },
            )
            .await
            .unwrap();
        assert_eq!(prompt, "new 0");
    }

    #[tokio::test]
    async fn test_broken_reload_keeps_previous_templates() {
        let service = TemplateService::from_config(&config("ok")).unwrap();
        assert!(service.reload(&config("{{#if}}")).await.is_err());
        assert!(service.system_instructions("movie").await.is_some());
    }
}
