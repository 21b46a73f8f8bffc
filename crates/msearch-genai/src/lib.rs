//! Quota-aware client for the Gemini `generateContent` API.
//!
//! This crate provides:
//! - The [`GenerationTransport`] boundary and its REST implementation
//! - Request/response wire types and default safety settings
//! - A token-bucket [`RequestLimiter`] backed by `governor`
//! - [`QuotaAwareModel`], which adds throttling and a bounded retry ladder

pub mod client;
pub mod error;
pub mod limiter;
pub mod transport;
pub mod types;

pub use client::{Generation, QuotaAwareModel, QuotaPolicy};
pub use error::{GenAiError, GenAiResult};
pub use limiter::{GovernorLimiter, RequestLimiter};
pub use transport::{GeminiTransport, GenerationTransport, DEFAULT_BASE_URL};
pub use types::{
    default_safety_settings, Content, GenerateResponse, GenerationConfig, Part, SafetySetting,
    UsageMetadata,
};
