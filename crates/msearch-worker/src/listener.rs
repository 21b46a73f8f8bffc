//! Binds a trigger source to a workflow.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use msearch_queue::{TriggerMessage, TriggerSource};

use crate::cor::{Command, ExecutionContext, Slot, TraceHandle};
use crate::error::WorkerResult;
use crate::metrics;

const RECEIVE_BACKOFF: Duration = Duration::from_secs(5);

/// Receives trigger messages and runs one workflow invocation per message.
///
/// Messages are acknowledged by the source as they are received, before
/// processing, so a failed invocation is not redelivered.
pub struct TriggerListener {
    source: Arc<dyn TriggerSource>,
    workflow: Arc<dyn Command>,
    semaphore: Arc<Semaphore>,
    shutdown: CancellationToken,
}

impl TriggerListener {
    pub fn new(
        source: Arc<dyn TriggerSource>,
        workflow: Arc<dyn Command>,
        max_concurrent: usize,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            source,
            workflow,
            semaphore: Arc::new(Semaphore::new(max_concurrent.max(1))),
            shutdown,
        }
    }

    /// Consume until shutdown or until the source closes, then wait for
    /// in-flight invocations.
    pub async fn run(&self) -> WorkerResult<()> {
        let topic = self.source.name().to_string();
        info!(
            topic = %topic,
            workflow = %self.workflow.name(),
            "Listening with {} max concurrent triggers",
            self.semaphore.available_permits()
        );

        let mut tasks = JoinSet::new();
        'receive: loop {
            let batch = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                batch = self.source.receive() => batch,
            };

            let messages = match batch {
                Ok(messages) => messages,
                Err(e) if e.is_closed() => {
                    info!(topic = %topic, "Trigger source closed");
                    break;
                }
                Err(e) => {
                    error!(topic = %topic, "Error receiving triggers: {}", e);
                    tokio::select! {
                        _ = self.shutdown.cancelled() => break,
                        _ = tokio::time::sleep(RECEIVE_BACKOFF) => continue,
                    }
                }
            };

            for message in messages {
                metrics::record_trigger(&topic);

                let permit = tokio::select! {
                    _ = self.shutdown.cancelled() => break 'receive,
                    permit = self.semaphore.clone().acquire_owned() => permit,
                };
                let Ok(permit) = permit else { break 'receive };

                let workflow = Arc::clone(&self.workflow);
                let topic = topic.clone();
                let cancel = self.shutdown.child_token();
                tasks.spawn(async move {
                    let _permit = permit;
                    process_message(workflow.as_ref(), &topic, message, cancel).await;
                });
            }

            while tasks.try_join_next().is_some() {}
        }

        debug!(topic = %topic, in_flight = tasks.len(), "Waiting for in-flight triggers");
        while tasks.join_next().await.is_some() {}
        info!(topic = %topic, "Listener stopped");
        Ok(())
    }
}

/// Run `workflow` over one message. The returned context is already closed.
pub async fn process_message(
    workflow: &dyn Command,
    topic: &str,
    message: TriggerMessage,
    cancel: CancellationToken,
) -> ExecutionContext {
    let span = info_span!("receive-message", topic = %topic, message_id = %message.id);
    let mut ctx = ExecutionContext::new(TraceHandle::with_token(span.clone(), cancel));
    ctx.set(Slot::Input, message.payload);

    workflow.execute(&mut ctx).instrument(span.clone()).await;

    span.in_scope(|| {
        if ctx.has_errors() {
            for e in ctx.errors() {
                if e.error.is_cancelled() {
                    warn!(step = %e.step, "Workflow {} cancelled", workflow.name());
                } else {
                    error!(step = %e.step, "Workflow {} failed: {}", workflow.name(), e.error);
                }
            }
        } else {
            info!("Workflow {} completed", workflow.name());
        }
    });

    ctx.close();
    ctx
}
