//! Bounded fan-out of per-scene generation requests.
//!
//! One job per time segment is pushed through a bounded channel to
//! `min(width, jobs)` workers. Each worker keeps its own result list; the
//! lists are merged once every worker has finished. A failing segment never
//! cancels its siblings.

use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info_span, warn, Instrument, Span};

use msearch_genai::{Content, GenAiError, Part, QuotaAwareModel};
use msearch_models::schema::scene_schema;
use msearch_models::TimeSpan;

use crate::metrics;

/// One segment to describe.
#[derive(Debug, Clone)]
pub struct SceneJob {
    pub sequence: u32,
    pub span: TimeSpan,
    pub prompt: String,
}

#[derive(Debug)]
pub struct SceneFailure {
    pub sequence: u32,
    pub error: GenAiError,
}

/// Merged results of one pool run.
#[derive(Debug, Default)]
pub struct PoolOutcome {
    /// Raw JSON fragments, ordered by job sequence
    pub fragments: Vec<String>,
    pub failures: Vec<SceneFailure>,
    /// Segments whose answer was empty and were dropped
    pub dropped: usize,
}

#[derive(Default)]
struct WorkerResults {
    fragments: Vec<(u32, String)>,
    failures: Vec<SceneFailure>,
    dropped: usize,
}

pub struct ScenePool {
    model: QuotaAwareModel,
    width: usize,
    /// Step the generation cost is attributed to
    step: String,
    system_instruction: Option<String>,
    media: Part,
}

impl ScenePool {
    pub fn new(model: QuotaAwareModel, width: usize, step: impl Into<String>, media: Part) -> Self {
        Self {
            model,
            width,
            step: step.into(),
            system_instruction: None,
            media,
        }
    }

    pub fn with_system_instruction(mut self, instruction: Option<String>) -> Self {
        self.system_instruction = instruction;
        self
    }

    /// Run every job and wait for all of them.
    pub async fn run(&self, jobs: Vec<SceneJob>, cancel: &CancellationToken) -> PoolOutcome {
        if jobs.is_empty() {
            return PoolOutcome::default();
        }

        let workers = self.width.max(1).min(jobs.len());
        let (tx, rx) = mpsc::channel::<SceneJob>(workers);
        let rx = Arc::new(Mutex::new(rx));
        let mut set = JoinSet::new();

        debug!(jobs = jobs.len(), workers, "Starting scene workers");

        for worker in 0..workers {
            let rx = Arc::clone(&rx);
            let model = self.model.clone();
            let step = self.step.clone();
            let system = self.system_instruction.clone();
            let media = self.media.clone();
            let cancel = cancel.clone();

            set.spawn(
                async move {
                    let mut results = WorkerResults::default();
                    loop {
                        if cancel.is_cancelled() {
                            debug!(worker, "Cancelled, leaving remaining jobs");
                            break;
                        }
                        let next = rx.lock().await.recv().await;
                        let Some(job) = next else { break };

                        let span = info_span!(
                            "scene_job",
                            worker,
                            sequence = job.sequence,
                            start = %job.span.start,
                            end = %job.span.end
                        );
                        run_job(&model, &step, system.as_deref(), &media, job, &cancel, &mut results)
                            .instrument(span)
                            .await;
                    }
                    results
                }
                .instrument(Span::current()),
            );
        }

        for job in jobs {
            if cancel.is_cancelled() {
                break;
            }
            if tx.send(job).await.is_err() {
                if !cancel.is_cancelled() {
                    error!("Scene workers exited before all jobs were submitted");
                }
                break;
            }
        }
        drop(tx);

        let mut fragments = Vec::new();
        let mut outcome = PoolOutcome::default();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(results) => {
                    fragments.extend(results.fragments);
                    outcome.failures.extend(results.failures);
                    outcome.dropped += results.dropped;
                }
                Err(e) => error!("Scene worker task failed: {}", e),
            }
        }

        fragments.sort_by_key(|(sequence, _)| *sequence);
        outcome.fragments = fragments.into_iter().map(|(_, fragment)| fragment).collect();
        outcome.failures.sort_by_key(|f| f.sequence);
        outcome
    }
}

async fn run_job(
    model: &QuotaAwareModel,
    step: &str,
    system_instruction: Option<&str>,
    media: &Part,
    job: SceneJob,
    cancel: &CancellationToken,
    results: &mut WorkerResults,
) {
    let contents = vec![Content::user(vec![Part::text(job.prompt), media.clone()])];

    match model
        .generate(system_instruction, &contents, Some(scene_schema()), cancel)
        .await
    {
        Ok(generation) => {
            metrics::record_generation(step, &generation);
            let text = generation.text.trim();
            if text.is_empty() || text == "{}" {
                debug!("Dropping empty scene answer");
                results.dropped += 1;
            } else {
                results.fragments.push((job.sequence, text.to_string()));
            }
        }
        Err(error) => {
            warn!("Scene generation failed: {}", error);
            results.failures.push(SceneFailure {
                sequence: job.sequence,
                error,
            });
        }
    }
}
