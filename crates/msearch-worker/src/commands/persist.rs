//! Persist the assembled media record.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, info};

use crate::config::SharedConfig;
use crate::cor::{record_outcome, Command, ExecutionContext, Slot};
use crate::error::{WorkerError, WorkerResult};
use crate::sink::MediaSink;

pub const STEP: &str = "persist-media";

pub struct MediaPersist {
    sink: Arc<dyn MediaSink>,
    config: SharedConfig,
}

impl MediaPersist {
    pub fn new(sink: Arc<dyn MediaSink>, config: SharedConfig) -> Self {
        Self { sink, config }
    }

    async fn run(&self, ctx: &ExecutionContext) -> WorkerResult<()> {
        let media = ctx.media().ok_or_else(|| WorkerError::missing_input("media record"))?;
        let (dataset, table) = {
            let config = self.config.read().await;
            (
                config.big_query_data_source.dataset.clone(),
                config.big_query_data_source.media_table.clone(),
            )
        };

        match self.sink.insert(&dataset, &table, std::slice::from_ref(media)).await {
            Ok(()) => {
                info!(id = %media.id, title = %media.title, "Persisted media to {}.{}", dataset, table);
                Ok(())
            }
            Err(e) => {
                error!(title = %media.title, "Failed to persist media: {}", e);
                Err(WorkerError::persist_failed(format!("{}: {}", media.title, e)))
            }
        }
    }
}

#[async_trait]
impl Command for MediaPersist {
    fn name(&self) -> &str {
        STEP
    }

    fn input_slot(&self) -> Slot {
        Slot::Media
    }

    async fn execute(&self, ctx: &mut ExecutionContext) {
        let result = self.run(ctx).await;
        if record_outcome(ctx, STEP, result).is_some() {
            if let Some(media) = ctx.media().cloned() {
                ctx.set(self.output_slot(), media);
            }
        }
    }
}
