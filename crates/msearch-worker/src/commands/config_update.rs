//! Reload the application configuration after an upload.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use msearch_media::wait_for_recent_update;
use msearch_models::MediaObject;

use crate::config::{ConfigLocation, SharedConfig};
use crate::cor::{record_outcome, Command, ExecutionContext, Slot, Value};
use crate::error::{WorkerError, WorkerResult};
use crate::templates::TemplateService;

pub const STEP: &str = "config-update-command";

/// Triggered by a configuration object landing in the config directory.
/// Waits for the file to look freshly written, reloads the layered
/// configuration, recompiles the templates and swaps the shared config.
///
/// Agent models keep the settings they were built with.
pub struct ConfigUpdate {
    config: SharedConfig,
    location: ConfigLocation,
    templates: Arc<TemplateService>,
}

impl ConfigUpdate {
    pub fn new(config: SharedConfig, location: ConfigLocation, templates: Arc<TemplateService>) -> Self {
        Self {
            config,
            location,
            templates,
        }
    }

    fn input_object(ctx: &ExecutionContext) -> Option<&MediaObject> {
        ctx.get(&Slot::Input).and_then(Value::as_object)
    }

    async fn run(&self, object: MediaObject) -> WorkerResult<PathBuf> {
        let path = self.location.resolve(&object.name);
        let (attempts, delay, threshold) = {
            let config = self.config.read().await;
            (
                config.pipeline.file_check_retries,
                config.pipeline.file_check_delay(),
                config.pipeline.config_recent_threshold(),
            )
        };

        if !wait_for_recent_update(&path, attempts, delay, threshold).await {
            warn!(path = %path.display(), "Configuration file was not recently updated, reloading anyway");
        }

        let location = self.location.clone();
        let fresh = tokio::task::spawn_blocking(move || location.load())
            .await
            .map_err(|e| WorkerError::config_error(format!("reload task failed: {}", e)))??;

        self.templates.reload(&fresh).await?;
        *self.config.write().await = fresh;

        info!(path = %path.display(), "Configuration reloaded");
        Ok(path)
    }
}

#[async_trait]
impl Command for ConfigUpdate {
    fn name(&self) -> &str {
        STEP
    }

    fn is_eligible(&self, ctx: &ExecutionContext) -> bool {
        ctx.trace().is_active() && Self::input_object(ctx).is_some()
    }

    async fn execute(&self, ctx: &mut ExecutionContext) {
        let result = match Self::input_object(ctx).cloned() {
            Some(object) => self.run(object).await,
            None => Err(WorkerError::missing_input("configuration object")),
        };
        if let Some(path) = record_outcome(ctx, STEP, result) {
            ctx.set(self.output_slot(), Value::Path(path));
        }
    }
}
