//! Prometheus metrics for the worker.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use std::net::{Ipv4Addr, SocketAddr};

use msearch_genai::Generation;

/// Install the Prometheus recorder with an HTTP listener on `port`.
pub fn init_metrics(port: u16) -> Result<(), BuildError> {
    PrometheusBuilder::new()
        .with_http_listener(SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)))
        .install()
}

/// Metric names as constants for consistency.
pub mod names {
    // Pipeline steps
    pub const STEP_SUCCESS_TOTAL: &str = "msearch_step_success_total";
    pub const STEP_ERROR_TOTAL: &str = "msearch_step_error_total";
    pub const STEP_DURATION_SECONDS: &str = "msearch_step_duration_seconds";

    // Generation cost
    pub const GEMINI_INPUT_TOKENS_TOTAL: &str = "msearch_gemini_input_tokens_total";
    pub const GEMINI_OUTPUT_TOKENS_TOTAL: &str = "msearch_gemini_output_tokens_total";
    pub const GEMINI_RETRIES_TOTAL: &str = "msearch_gemini_retries_total";

    // Triggers
    pub const TRIGGERS_RECEIVED_TOTAL: &str = "msearch_triggers_received_total";
}

/// Record the outcome of one executed step.
pub fn record_step(step: &str, succeeded: bool, duration_secs: f64) {
    let labels = [("step", step.to_string())];

    if succeeded {
        counter!(names::STEP_SUCCESS_TOTAL, &labels).increment(1);
    } else {
        counter!(names::STEP_ERROR_TOTAL, &labels).increment(1);
    }
    histogram!(names::STEP_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Attribute the cost of one generation call to the calling step.
pub fn record_generation(step: &str, generation: &Generation) {
    let labels = [("step", step.to_string())];

    counter!(names::GEMINI_INPUT_TOKENS_TOTAL, &labels).increment(generation.usage.prompt_token_count);
    counter!(names::GEMINI_OUTPUT_TOKENS_TOTAL, &labels).increment(generation.usage.candidates_token_count);
    if generation.retries() > 0 {
        counter!(names::GEMINI_RETRIES_TOTAL, &labels).increment(u64::from(generation.retries()));
    }
}

/// Record a received trigger message.
pub fn record_trigger(topic: &str) {
    counter!(names::TRIGGERS_RECEIVED_TOTAL, "topic" => topic.to_string()).increment(1);
}
