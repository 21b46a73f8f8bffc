//! Workflow assembly and topic routing.

use std::fmt;
use std::str::FromStr;

use crate::commands::{
    ConfigUpdate, MediaAssembly, MediaContentType, MediaLength, MediaPersist, MediaSummaryCreator,
    MediaSummaryParser, SceneExtractor, TriggerToObject, VideoResize,
};
use crate::cor::Chain;
use crate::error::{WorkerError, WorkerResult};
use crate::services::Services;

pub const MEDIA_READER_PIPELINE: &str = "media-reader-pipeline";
pub const MEDIA_RESIZE_WORKFLOW: &str = "media-resize-workflow";
pub const CONFIG_UPDATE_WORKFLOW: &str = "media-config-update-workflow";

/// Decode, measure, classify, summarise, extract scenes, assemble, persist.
pub fn media_reader_pipeline(services: &Services, agent_model: &str) -> WorkerResult<Chain> {
    let model = services.model(agent_model)?;

    Ok(Chain::builder(MEDIA_READER_PIPELINE)
        .step(TriggerToObject)
        .step(MediaLength::new(services.probe.clone(), services.config.clone()))
        .step(MediaContentType::new(
            model.clone(),
            services.templates.clone(),
            services.config.clone(),
        ))
        .step(MediaSummaryCreator::new(
            model.clone(),
            services.templates.clone(),
            services.config.clone(),
        ))
        .step(MediaSummaryParser)
        .step(SceneExtractor::new(model, services.templates.clone(), services.config.clone()))
        .step(MediaAssembly)
        .step(MediaPersist::new(services.sink.clone(), services.config.clone()))
        .build())
}

pub fn media_resize_workflow(services: &Services) -> Chain {
    Chain::builder(MEDIA_RESIZE_WORKFLOW)
        .step(TriggerToObject)
        .step(VideoResize::new(services.ffmpeg.clone(), services.config.clone()))
        .build()
}

pub fn config_update_workflow(services: &Services) -> Chain {
    Chain::builder(CONFIG_UPDATE_WORKFLOW)
        .step(TriggerToObject)
        .step(ConfigUpdate::new(
            services.config.clone(),
            services.location.clone(),
            services.templates.clone(),
        ))
        .build()
}

/// Trigger topics the worker subscribes to, by configuration key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// New high resolution upload
    HiRes,
    /// Low resolution copy ready for analysis
    LowRes,
    /// Configuration file uploaded
    Config,
}

impl Topic {
    pub const ALL: [Topic; 3] = [Topic::HiRes, Topic::LowRes, Topic::Config];

    pub fn key(&self) -> &'static str {
        match self {
            Topic::HiRes => "HiResTopic",
            Topic::LowRes => "LowResTopic",
            Topic::Config => "ConfigTopic",
        }
    }

    /// Build the workflow bound to this topic.
    pub fn workflow(&self, services: &Services, agent_model: &str) -> WorkerResult<Chain> {
        match self {
            Topic::HiRes => Ok(media_resize_workflow(services)),
            Topic::LowRes => media_reader_pipeline(services, agent_model),
            Topic::Config => Ok(config_update_workflow(services)),
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Topic {
    type Err = WorkerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Topic::ALL
            .into_iter()
            .find(|t| t.key().eq_ignore_ascii_case(s))
            .ok_or_else(|| WorkerError::config_error(format!("unknown topic: {}", s)))
    }
}
