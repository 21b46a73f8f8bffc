//! Merge the summary and extracted scenes into the media record.

use async_trait::async_trait;
use tracing::info;

use msearch_models::{reconcile_scenes, Media, Scene};

use crate::cor::{record_outcome, Command, ExecutionContext, Slot};
use crate::error::{WorkerError, WorkerResult};

pub const STEP: &str = "assemble-media-scenes";

/// Parse scene fragments as one JSON array.
pub fn parse_fragments(fragments: &[String]) -> WorkerResult<Vec<Scene>> {
    let joined = format!("[ {} ]", fragments.join(","));
    serde_json::from_str(&joined).map_err(|e| WorkerError::parse_failed(format!("scene fragments: {}", e)))
}

/// Reconciles scene timestamps against the probed length and builds the
/// [`Media`] record. With no scenes, one scene spanning the whole media
/// carries the summary text.
#[derive(Debug, Default)]
pub struct MediaAssembly;

impl MediaAssembly {
    fn assemble(ctx: &ExecutionContext) -> WorkerResult<Media> {
        let summary = ctx.summary().ok_or_else(|| WorkerError::missing_input("media summary"))?;
        let object = ctx.object().ok_or_else(|| WorkerError::missing_input("media object"))?;
        let fragments = ctx.fragments().unwrap_or_default();
        let length = ctx.duration().unwrap_or(summary.length_in_seconds);

        let scenes = reconcile_scenes(parse_fragments(fragments)?, length, &summary.summary);
        Ok(Media::assemble(&object.name, summary, length, scenes))
    }
}

#[async_trait]
impl Command for MediaAssembly {
    fn name(&self) -> &str {
        STEP
    }

    fn input_slot(&self) -> Slot {
        Slot::Scenes
    }

    fn is_eligible(&self, ctx: &ExecutionContext) -> bool {
        ctx.trace().is_active() && ctx.summary().is_some() && ctx.object().is_some()
    }

    async fn execute(&self, ctx: &mut ExecutionContext) {
        let result = Self::assemble(ctx);
        if let Some(media) = record_outcome(ctx, STEP, result) {
            info!(id = %media.id, title = %media.title, scenes = media.scenes.len(), "Assembled media");
            ctx.set(Slot::Media, media.clone());
            ctx.set(self.output_slot(), media);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cor::{TraceHandle, Value};
    use msearch_models::{MediaId, MediaObject, MediaSummary};
    use tracing::Span;

    fn context(fragments: Vec<String>, duration: u32) -> ExecutionContext {
        let mut ctx = ExecutionContext::new(TraceHandle::new(Span::none()));
        ctx.set(Slot::Object, MediaObject::new("hi-res", "serenity.mp4", "video/mp4"));
        ctx.set(
            Slot::Summary,
            MediaSummary {
                title: "Serenity".to_string(),
                summary: "A crew on the run.".to_string(),
                length_in_seconds: 999,
                ..Default::default()
            },
        );
        ctx.set(Slot::Duration, Value::Seconds(duration));
        ctx.set(Slot::Scenes, Value::Fragments(fragments));
        ctx
    }

    fn fragment(start: &str, end: &str, script: &str) -> String {
        format!(r#"{{"sequence":7,"start":"{}","end":"{}","script":"{}"}}"#, start, end, script)
    }

    #[tokio::test]
    async fn test_scenes_are_sorted_and_renumbered() {
        let mut ctx = context(
            vec![
                fragment("00:01:00", "00:01:30", "c"),
                fragment("00:00:05", "00:00:30", "a"),
                fragment("00:00:30", "00:01:00", "b"),
            ],
            120,
        );
        MediaAssembly.execute(&mut ctx).await;

        let media = ctx.media().unwrap();
        let order: Vec<(u32, &str)> = media
            .scenes
            .iter()
            .map(|s| (s.sequence_number, s.script.as_str()))
            .collect();
        assert_eq!(order, vec![(0, "a"), (1, "b"), (2, "c")]);
        assert_eq!(media.length_in_seconds, 120);
        assert_eq!(media.id, MediaId::for_source("serenity.mp4"));
        assert_eq!(media.title, "Serenity");
    }

    #[tokio::test]
    async fn test_no_fragments_fall_back_to_one_scene() {
        let mut ctx = context(Vec::new(), 90);
        MediaAssembly.execute(&mut ctx).await;

        let media = ctx.media().unwrap();
        assert_eq!(media.scenes.len(), 1);
        let scene = &media.scenes[0];
        assert_eq!(scene.sequence_number, 0);
        assert_eq!(scene.start, "00:00:00");
        assert_eq!(scene.end, "00:01:30");
        assert_eq!(scene.script, "A crew on the run.");
    }

    #[tokio::test]
    async fn test_out_of_range_timestamps_are_corrected() {
        let mut ctx = context(vec![fragment("02:05:00", "03:00:00", "late")], 7200);
        MediaAssembly.execute(&mut ctx).await;

        let scene = &ctx.media().unwrap().scenes[0];
        assert_eq!(scene.start, "00:02:05");
        assert_eq!(scene.end, "00:03:00");
    }

    #[tokio::test]
    async fn test_malformed_fragment_fails_step() {
        let mut ctx = context(vec!["{\"start\":".to_string()], 60);
        MediaAssembly.execute(&mut ctx).await;

        assert!(matches!(ctx.errors()[0].error, WorkerError::ParseFailed(_)));
        assert!(ctx.media().is_none());
    }
}
