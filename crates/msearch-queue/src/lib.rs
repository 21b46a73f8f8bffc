//! Trigger delivery for the ingestion worker.
//!
//! This crate provides:
//! - The [`TriggerSource`] abstraction with ack-on-receive semantics
//! - A Redis Streams source using consumer groups
//! - An in-process channel source

pub mod error;
pub mod redis_source;
pub mod source;

pub use error::{QueueError, QueueResult};
pub use redis_source::{QueueConfig, RedisTriggerSource, PAYLOAD_FIELD};
pub use source::{ChannelTriggerSource, TriggerMessage, TriggerSource};
