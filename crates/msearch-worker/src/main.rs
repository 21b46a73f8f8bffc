//! Media ingestion worker binary.

use std::sync::Arc;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use msearch_genai::GeminiTransport;
use msearch_media::{DurationProbe, FfmpegRunner};
use msearch_queue::{QueueConfig, RedisTriggerSource};
use msearch_worker::metrics::init_metrics;
use msearch_worker::{ConfigLocation, JsonLinesSink, Services, Topic, TriggerListener, WorkerConfig};

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("msearch=info".parse().expect("valid directive"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    info!("Starting msearch-worker");

    let worker_config = WorkerConfig::from_env();
    info!(
        max_concurrent_triggers = worker_config.max_concurrent_triggers,
        agent_model = %worker_config.agent_model,
        "Worker config loaded"
    );

    if let Err(e) = init_metrics(worker_config.metrics_port) {
        error!("Failed to start metrics exporter: {}", e);
        std::process::exit(1);
    }

    let location = ConfigLocation::from_env();
    let app_config = match location.load() {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to load configuration from {}: {}", location.prefix.display(), e);
            std::process::exit(1);
        }
    };

    let transport = match GeminiTransport::with_base_url(&worker_config.gemini_api_key, &worker_config.gemini_base_url) {
        Ok(t) => t,
        Err(e) => {
            error!("Failed to create Gemini transport: {}", e);
            std::process::exit(1);
        }
    };

    let sink = Arc::new(JsonLinesSink::new(app_config.pipeline.persistence_root.clone()));
    let topics = app_config.topic_subscriptions.clone();
    let services = match Services::new(app_config, location, Arc::new(transport), sink) {
        Ok(s) => s
            .with_probe(DurationProbe::new(&worker_config.ffprobe_path).with_timeout(worker_config.media_tool_timeout()))
            .with_ffmpeg(FfmpegRunner::new(&worker_config.ffmpeg_path).with_timeout(worker_config.media_tool_timeout())),
        Err(e) => {
            error!("Failed to build services: {}", e);
            std::process::exit(1);
        }
    };

    let queue_config = QueueConfig::from_env();
    let shutdown = CancellationToken::new();
    let mut listeners = JoinSet::new();

    for topic in Topic::ALL {
        let Some(subscription) = topics
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(topic.key()))
            .map(|(_, s)| s.clone())
        else {
            warn!("No subscription configured for {}, skipping", topic);
            continue;
        };

        let workflow = match topic.workflow(&services, &worker_config.agent_model) {
            Ok(w) => w,
            Err(e) => {
                error!("Failed to build workflow for {}: {}", topic, e);
                std::process::exit(1);
            }
        };

        let source = match RedisTriggerSource::new(&subscription.name, queue_config.clone()) {
            Ok(s) => s,
            Err(e) => {
                error!("Failed to create trigger source {}: {}", subscription.name, e);
                std::process::exit(1);
            }
        };
        if let Err(e) = source.init().await {
            error!("Failed to initialize trigger source {}: {}", subscription.name, e);
            std::process::exit(1);
        }

        let listener = TriggerListener::new(
            Arc::new(source),
            Arc::new(workflow),
            worker_config.max_concurrent_triggers,
            shutdown.clone(),
        );
        listeners.spawn(async move { listener.run().await });
    }

    if listeners.is_empty() {
        error!("No topic subscriptions configured");
        std::process::exit(1);
    }

    // Cancelling the root token cancels every in-flight invocation.
    let signal = shutdown.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal");
        signal.cancel();
    });

    while let Some(joined) = listeners.join_next().await {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("Listener error: {}", e),
            Err(e) => error!("Listener task failed: {}", e),
        }
    }

    info!("Worker shutdown complete");
}
