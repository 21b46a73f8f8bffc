//! Media ingestion worker.
//!
//! This crate provides:
//! - The chain engine ([`cor`]): execution context, commands and chains
//! - The pipeline steps ([`commands`]) and the scene worker pool
//! - Prompt templates, configuration and persistence sinks
//! - Workflow assembly and the trigger listener

pub mod commands;
pub mod config;
pub mod cor;
pub mod error;
pub mod listener;
pub mod metrics;
pub mod scene_pool;
pub mod services;
pub mod sink;
pub mod templates;
pub mod workflow;

pub use config::{AppConfig, ConfigLocation, SharedConfig, WorkerConfig};
pub use cor::{Chain, Command, ExecutionContext, Slot, TraceHandle, Value};
pub use error::{WorkerError, WorkerResult};
pub use listener::{process_message, TriggerListener};
pub use services::Services;
pub use sink::{JsonLinesSink, MediaSink, MemorySink};
pub use templates::TemplateService;
pub use workflow::Topic;
