//! Worker error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Invalid trigger: {0}")]
    InvalidTrigger(String),

    #[error("Missing context value: {0}")]
    MissingInput(String),

    #[error("Scene {sequence} failed: {source}")]
    SceneFailed {
        sequence: u32,
        #[source]
        source: msearch_genai::GenAiError,
    },

    #[error("Failed to parse model output: {0}")]
    ParseFailed(String),

    #[error("Template error: {0}")]
    Template(String),

    #[error("Persistence failed: {0}")]
    PersistFailed(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Media error: {0}")]
    Media(#[from] msearch_media::MediaError),

    #[error("Generation error: {0}")]
    GenAi(#[from] msearch_genai::GenAiError),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn invalid_trigger(msg: impl Into<String>) -> Self {
        Self::InvalidTrigger(msg.into())
    }

    pub fn missing_input(what: impl Into<String>) -> Self {
        Self::MissingInput(what.into())
    }

    pub fn scene_failed(sequence: u32, source: msearch_genai::GenAiError) -> Self {
        Self::SceneFailed { sequence, source }
    }

    pub fn parse_failed(msg: impl Into<String>) -> Self {
        Self::ParseFailed(msg.into())
    }

    pub fn template(msg: impl Into<String>) -> Self {
        Self::Template(msg.into())
    }

    pub fn persist_failed(msg: impl Into<String>) -> Self {
        Self::PersistFailed(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Whether the invocation was cancelled rather than failing on its own.
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            WorkerError::GenAi(msearch_genai::GenAiError::Cancelled)
                | WorkerError::SceneFailed {
                    source: msearch_genai::GenAiError::Cancelled,
                    ..
                }
        )
    }
}
