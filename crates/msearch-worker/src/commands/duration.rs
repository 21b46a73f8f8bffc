//! Probe the media duration.

use async_trait::async_trait;
use tracing::info;

use msearch_media::{wait_for_file, DurationProbe};

use crate::config::SharedConfig;
use crate::cor::{record_outcome, Command, ExecutionContext, Slot, Value};
use crate::error::{WorkerError, WorkerResult};

pub const STEP: &str = "get-media-length";

/// Waits for the object to appear under the bucket mount, then measures
/// it with `ffprobe`. Publishes whole seconds to [`Slot::Duration`].
pub struct MediaLength {
    probe: DurationProbe,
    config: SharedConfig,
}

impl MediaLength {
    pub fn new(probe: DurationProbe, config: SharedConfig) -> Self {
        Self { probe, config }
    }

    async fn run(&self, ctx: &ExecutionContext) -> WorkerResult<u32> {
        let object = ctx.object().ok_or_else(|| WorkerError::missing_input("media object"))?;
        let (path, attempts, delay) = {
            let config = self.config.read().await;
            (
                object.mounted_path(config.mount_point()),
                config.pipeline.file_check_retries,
                config.pipeline.file_check_delay(),
            )
        };

        wait_for_file(&path, attempts, delay).await?;
        let seconds = self.probe.duration_secs(&path).await?;
        info!(media = %object, seconds, "Measured media length");
        Ok(seconds)
    }
}

#[async_trait]
impl Command for MediaLength {
    fn name(&self) -> &str {
        STEP
    }

    fn input_slot(&self) -> Slot {
        Slot::Object
    }

    async fn execute(&self, ctx: &mut ExecutionContext) {
        let result = self.run(ctx).await;
        if let Some(seconds) = record_outcome(ctx, STEP, result) {
            ctx.set(Slot::Duration, Value::Seconds(seconds));
            ctx.set(self.output_slot(), Value::Seconds(seconds));
        }
    }
}
