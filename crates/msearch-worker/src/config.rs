//! Worker configuration.
//!
//! Two layers: [`WorkerConfig`] holds process settings read from the
//! environment once at startup, [`AppConfig`] holds the pipeline
//! configuration loaded from TOML files and reloaded at runtime.

use config::{Config, Environment, File};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use msearch_genai::DEFAULT_BASE_URL;
use msearch_media::{DEFAULT_FFMPEG, DEFAULT_FFPROBE};

use crate::error::WorkerResult;

/// Process settings.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum trigger messages processed at once
    pub max_concurrent_triggers: usize,
    /// Port of the Prometheus exporter
    pub metrics_port: u16,
    pub gemini_api_key: String,
    pub gemini_base_url: String,
    pub ffprobe_path: String,
    pub ffmpeg_path: String,
    /// Kill ffprobe/ffmpeg runs that exceed this many seconds
    pub media_tool_timeout_secs: u64,
    /// Agent model used by the media reader pipeline
    pub agent_model: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_triggers: 4,
            metrics_port: 9090,
            gemini_api_key: String::new(),
            gemini_base_url: DEFAULT_BASE_URL.to_string(),
            ffprobe_path: DEFAULT_FFPROBE.to_string(),
            ffmpeg_path: DEFAULT_FFMPEG.to_string(),
            media_tool_timeout_secs: 3600,
            agent_model: "creative-flash".to_string(),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_concurrent_triggers: std::env::var("WORKER_MAX_CONCURRENT_TRIGGERS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_concurrent_triggers),
            metrics_port: std::env::var("METRICS_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.metrics_port),
            gemini_api_key: std::env::var("GEMINI_API_KEY").unwrap_or(defaults.gemini_api_key),
            gemini_base_url: std::env::var("GEMINI_BASE_URL").unwrap_or(defaults.gemini_base_url),
            ffprobe_path: std::env::var("FFPROBE_PATH").unwrap_or(defaults.ffprobe_path),
            ffmpeg_path: std::env::var("FFMPEG_PATH").unwrap_or(defaults.ffmpeg_path),
            media_tool_timeout_secs: std::env::var("MEDIA_TOOL_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.media_tool_timeout_secs),
            agent_model: std::env::var("AGENT_MODEL").unwrap_or(defaults.agent_model),
        }
    }

    pub fn media_tool_timeout(&self) -> Duration {
        Duration::from_secs(self.media_tool_timeout_secs)
    }
}

/// Where the application configuration lives.
#[derive(Debug, Clone)]
pub struct ConfigLocation {
    pub prefix: PathBuf,
    pub runtime: String,
}

impl Default for ConfigLocation {
    fn default() -> Self {
        Self {
            prefix: PathBuf::from("config"),
            runtime: "test".to_string(),
        }
    }
}

impl ConfigLocation {
    pub fn new(prefix: impl Into<PathBuf>, runtime: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            runtime: runtime.into(),
        }
    }

    /// Read `MSEARCH_CONFIG_PREFIX` and `MSEARCH_RUNTIME`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            prefix: std::env::var("MSEARCH_CONFIG_PREFIX")
                .map(PathBuf::from)
                .unwrap_or(defaults.prefix),
            runtime: std::env::var("MSEARCH_RUNTIME").unwrap_or(defaults.runtime),
        }
    }

    pub fn base_file(&self) -> PathBuf {
        self.prefix.join(".env.toml")
    }

    pub fn runtime_file(&self) -> PathBuf {
        self.prefix.join(format!(".env.{}.toml", self.runtime))
    }

    /// Path of a file dropped into the configuration directory.
    pub fn resolve(&self, name: &str) -> PathBuf {
        self.prefix.join(name)
    }

    /// Load the layered configuration. Missing files are skipped.
    pub fn load(&self) -> WorkerResult<AppConfig> {
        let settings = Config::builder()
            .add_source(File::from(self.base_file()).required(false))
            .add_source(File::from(self.runtime_file()).required(false))
            .add_source(
                Environment::with_prefix("MSEARCH")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}

/// Running configuration shared by every workflow, replaced on reload.
pub type SharedConfig = Arc<RwLock<AppConfig>>;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub application: ApplicationConfig,
    pub storage: StorageConfig,
    pub big_query_data_source: DataSourceConfig,
    pub prompt_templates: HashMap<String, PromptTemplate>,
    pub topic_subscriptions: HashMap<String, TopicSubscription>,
    pub agent_models: HashMap<String, AgentModelConfig>,
    pub categories: HashMap<String, Category>,
    pub content_type: ContentTypeConfig,
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    pub name: String,
    pub google_project_id: String,
    pub location: String,
    /// Scene worker pool width
    pub thread_pool_size: usize,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: "msearch".to_string(),
            google_project_id: String::new(),
            location: String::new(),
            thread_pool_size: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub high_res_input_bucket: String,
    pub low_res_output_bucket: String,
    pub gcs_fuse_mount_point: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            high_res_input_bucket: String::new(),
            low_res_output_bucket: String::new(),
            gcs_fuse_mount_point: PathBuf::from("/mnt/gcs"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DataSourceConfig {
    pub dataset: String,
    pub media_table: String,
    pub embedding_table: String,
}

impl Default for DataSourceConfig {
    fn default() -> Self {
        Self {
            dataset: "media_ds".to_string(),
            media_table: "media".to_string(),
            embedding_table: "scene_embeddings".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PromptTemplate {
    pub system_instructions: String,
    pub summary: String,
    pub scene: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TopicSubscription {
    pub name: String,
    pub dead_letter_topic: String,
    pub timeout_in_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentModelConfig {
    pub model: String,
    pub system_instructions: String,
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub max_tokens: u32,
    pub output_format: String,
    /// Requests per second
    pub rate_limit: u32,
}

impl Default for AgentModelConfig {
    fn default() -> Self {
        Self {
            model: String::new(),
            system_instructions: String::new(),
            temperature: 1.0,
            top_p: 0.95,
            top_k: 40,
            max_tokens: 8192,
            output_format: "application/json".to_string(),
            rate_limit: 1,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Category {
    pub name: String,
    pub definition: String,
    pub system_instructions: String,
    pub summary: String,
    pub scene: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ContentTypeConfig {
    pub types: Vec<String>,
    pub prompt_template: String,
    pub default_type: String,
}

impl Default for ContentTypeConfig {
    fn default() -> Self {
        Self {
            types: Vec::new(),
            prompt_template: String::new(),
            default_type: "movie".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub file_check_retries: u32,
    pub file_check_delay_secs: u64,
    pub config_recent_threshold_secs: u64,
    pub resize_width: u32,
    pub generation_max_attempts: u32,
    pub generation_cooldown_secs: u64,
    pub quota_backoff_secs: u64,
    pub persistence_root: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            file_check_retries: 5,
            file_check_delay_secs: 10,
            config_recent_threshold_secs: 30,
            resize_width: 240,
            generation_max_attempts: 3,
            generation_cooldown_secs: 60,
            quota_backoff_secs: 5,
            persistence_root: PathBuf::from("/var/lib/msearch"),
        }
    }
}

impl PipelineConfig {
    pub fn file_check_delay(&self) -> Duration {
        Duration::from_secs(self.file_check_delay_secs)
    }

    pub fn config_recent_threshold(&self) -> Duration {
        Duration::from_secs(self.config_recent_threshold_secs)
    }
}

/// Key lookup ignoring ASCII case; the config loader may fold keys.
fn lookup<'a, V>(map: &'a HashMap<String, V>, key: &str) -> Option<&'a V> {
    map.get(key)
        .or_else(|| map.iter().find(|(k, _)| k.eq_ignore_ascii_case(key)).map(|(_, v)| v))
}

impl AppConfig {
    pub fn topic(&self, key: &str) -> Option<&TopicSubscription> {
        lookup(&self.topic_subscriptions, key)
    }

    pub fn prompt_template(&self, content_type: &str) -> Option<&PromptTemplate> {
        lookup(&self.prompt_templates, content_type)
    }

    pub fn agent_model(&self, key: &str) -> Option<&AgentModelConfig> {
        lookup(&self.agent_models, key)
    }

    /// Mount path of an object in the high resolution bucket layout.
    pub fn mount_point(&self) -> &Path {
        &self.storage.gcs_fuse_mount_point
    }

    /// Category name to definition, as handed to the summary template.
    pub fn category_definitions(&self) -> HashMap<String, String> {
        self.categories
            .values()
            .map(|c| (c.name.clone(), c.definition.clone()))
            .collect()
    }
}
