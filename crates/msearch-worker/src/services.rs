//! Dependencies shared by every workflow, constructed once at startup.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::info;

use msearch_genai::{
    default_safety_settings, GenerationConfig, GenerationTransport, GovernorLimiter, QuotaAwareModel,
    QuotaPolicy,
};
use msearch_media::{DurationProbe, FfmpegRunner};

use crate::config::{AgentModelConfig, AppConfig, ConfigLocation, PipelineConfig, SharedConfig};
use crate::error::{WorkerError, WorkerResult};
use crate::sink::MediaSink;
use crate::templates::TemplateService;

/// Explicitly wired collaborators handed to the workflow builders.
#[derive(Clone)]
pub struct Services {
    pub config: SharedConfig,
    pub location: ConfigLocation,
    pub templates: Arc<TemplateService>,
    pub models: Arc<HashMap<String, QuotaAwareModel>>,
    pub probe: DurationProbe,
    pub ffmpeg: FfmpegRunner,
    pub sink: Arc<dyn MediaSink>,
}

impl Services {
    pub fn new(
        config: AppConfig,
        location: ConfigLocation,
        transport: Arc<dyn GenerationTransport>,
        sink: Arc<dyn MediaSink>,
    ) -> WorkerResult<Self> {
        let templates = TemplateService::from_config(&config)?;
        let models = build_agent_models(&config, transport);
        info!("Configured {} agent models", models.len());

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            location,
            templates: Arc::new(templates),
            models: Arc::new(models),
            probe: DurationProbe::default(),
            ffmpeg: FfmpegRunner::default(),
            sink,
        })
    }

    pub fn with_probe(mut self, probe: DurationProbe) -> Self {
        self.probe = probe;
        self
    }

    pub fn with_ffmpeg(mut self, ffmpeg: FfmpegRunner) -> Self {
        self.ffmpeg = ffmpeg;
        self
    }

    /// Look up an agent model by its configuration key.
    pub fn model(&self, key: &str) -> WorkerResult<QuotaAwareModel> {
        self.models
            .get(&key.to_ascii_lowercase())
            .cloned()
            .ok_or_else(|| WorkerError::config_error(format!("unknown agent model: {}", key)))
    }
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

fn base_config(model: &AgentModelConfig) -> GenerationConfig {
    GenerationConfig {
        temperature: Some(model.temperature),
        top_p: Some(model.top_p),
        top_k: Some(model.top_k),
        max_output_tokens: Some(model.max_tokens),
        response_mime_type: non_empty(&model.output_format),
        response_schema: None,
        system_instruction: non_empty(&model.system_instructions),
        safety_settings: default_safety_settings(),
    }
}

fn quota_policy(pipeline: &PipelineConfig) -> QuotaPolicy {
    QuotaPolicy {
        max_attempts: pipeline.generation_max_attempts,
        throttle_backoff: Duration::from_secs(pipeline.quota_backoff_secs),
        cooldown: Duration::from_secs(pipeline.generation_cooldown_secs),
    }
}

/// One quota-aware client per configured agent model, each with its own
/// limiter. Keys are lowercased.
pub fn build_agent_models(
    config: &AppConfig,
    transport: Arc<dyn GenerationTransport>,
) -> HashMap<String, QuotaAwareModel> {
    let policy = quota_policy(&config.pipeline);

    config
        .agent_models
        .iter()
        .map(|(key, model)| {
            let limiter = Arc::new(GovernorLimiter::per_second(model.rate_limit));
            let client = QuotaAwareModel::new(&model.model, base_config(model), transport.clone(), limiter)
                .with_policy(policy.clone());
            (key.to_ascii_lowercase(), client)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use msearch_genai::{Content, GenAiResult, GenerateResponse};

    struct Unused;

    #[async_trait]
    impl GenerationTransport for Unused {
        async fn generate(
            &self,
            _model: &str,
            _contents: &[Content],
            _config: &GenerationConfig,
        ) -> GenAiResult<GenerateResponse> {
            Ok(GenerateResponse::default())
        }
    }

    #[test]
    fn test_agent_models_carry_configured_generation_settings() {
        let mut config = AppConfig::default();
        config.agent_models.insert(
            "Creative-Flash".to_string(),
            AgentModelConfig {
                model: "gemini-2.0-flash".to_string(),
                system_instructions: "Answer in JSON.".to_string(),
                temperature: 0.4,
                top_k: 32,
                ..AgentModelConfig::default()
            },
        );

        let models = build_agent_models(&config, Arc::new(Unused));
        let model = models.get("creative-flash").unwrap();

        assert_eq!(model.model(), "gemini-2.0-flash");
        let base = model.base_config();
        assert_eq!(base.temperature, Some(0.4));
        assert_eq!(base.top_k, Some(32));
        assert_eq!(base.response_mime_type.as_deref(), Some("application/json"));
        assert_eq!(base.system_instruction.as_deref(), Some("Answer in JSON."));
        assert_eq!(base.safety_settings.len(), 4);
    }

    #[test]
    fn test_unknown_model_is_a_config_error() {
        let services = Services::new(
            AppConfig::default(),
            ConfigLocation::default(),
            Arc::new(Unused),
            Arc::new(crate::sink::MemorySink::new()),
        )
        .unwrap();

        assert!(matches!(services.model("missing"), Err(WorkerError::ConfigError(_))));
    }
}
