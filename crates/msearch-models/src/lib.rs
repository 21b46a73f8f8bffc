//! Shared data models for the media ingestion pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Trigger notifications and storage object references
//! - Media summaries, scenes and the persisted media record
//! - Structured-output schemas and prompt examples
//! - Timestamp correction and scene reconciliation

pub mod media;
pub mod object;
pub mod sample;
pub mod schema;
pub mod timestamp;

// Re-export common types
pub use media::{CastMember, Media, MediaId, MediaSummary, Scene, TimeSpan};
pub use object::{MediaObject, ObjectNotification};
pub use timestamp::{correct_timestamp, format_seconds, reconcile_scenes, TimestampError};
