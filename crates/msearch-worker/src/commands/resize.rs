//! Produce the low resolution copy of an uploaded video.

use async_trait::async_trait;
use std::path::PathBuf;
use tracing::info;

use msearch_media::{move_file, scratch_path, wait_for_file, FfmpegCommand, FfmpegRunner};
use msearch_models::MediaObject;

use crate::config::SharedConfig;
use crate::cor::{record_outcome, Command, ExecutionContext, Slot, Value};
use crate::error::{WorkerError, WorkerResult};

pub const STEP: &str = "video-resize";

const SCRATCH_PREFIX: &str = "ffmpeg-output-";

/// Transcodes `{mount}/{bucket}/{name}` to the configured width and moves
/// the result to `{mount}/{low_res_bucket}/{name}`. The object comes from
/// the implicit input.
pub struct VideoResize {
    ffmpeg: FfmpegRunner,
    config: SharedConfig,
}

impl VideoResize {
    pub fn new(ffmpeg: FfmpegRunner, config: SharedConfig) -> Self {
        Self { ffmpeg, config }
    }

    fn input_object(ctx: &ExecutionContext) -> Option<&MediaObject> {
        ctx.get(&Slot::Input).and_then(Value::as_object)
    }

    async fn run(&self, ctx: &mut ExecutionContext) -> WorkerResult<PathBuf> {
        let object = Self::input_object(ctx)
            .cloned()
            .ok_or_else(|| WorkerError::missing_input("media object"))?;
        let (source, destination, width, attempts, delay) = {
            let config = self.config.read().await;
            let mount = config.mount_point();
            (
                object.mounted_path(mount),
                mount.join(&config.storage.low_res_output_bucket).join(&object.name),
                config.pipeline.resize_width,
                config.pipeline.file_check_retries,
                config.pipeline.file_check_delay(),
            )
        };

        wait_for_file(&source, attempts, delay).await?;

        let scratch = scratch_path(SCRATCH_PREFIX, ".mp4")?;
        ctx.add_temp_artifact(&scratch);

        self.ffmpeg.run(&FfmpegCommand::resize(&source, &scratch, width)).await?;

        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        move_file(&scratch, &destination).await?;

        info!(media = %object, width, "Wrote low resolution copy to {}", destination.display());
        Ok(destination)
    }
}

#[async_trait]
impl Command for VideoResize {
    fn name(&self) -> &str {
        STEP
    }

    fn is_eligible(&self, ctx: &ExecutionContext) -> bool {
        ctx.trace().is_active() && Self::input_object(ctx).is_some()
    }

    async fn execute(&self, ctx: &mut ExecutionContext) {
        let result = self.run(ctx).await;
        if let Some(destination) = record_outcome(ctx, STEP, result) {
            ctx.set(self.output_slot(), Value::Path(destination));
        }
    }
}
