//! Decode an object-storage notification.

use async_trait::async_trait;
use tracing::info;

use msearch_models::{MediaObject, ObjectNotification};

use crate::cor::{record_outcome, Command, ExecutionContext, Slot};
use crate::error::{WorkerError, WorkerResult};

pub const STEP: &str = "media-trigger-to-gcs-object";

/// Reads the notification document from the implicit input and publishes
/// the object to [`Slot::Object`] and the implicit output.
#[derive(Debug, Default)]
pub struct TriggerToObject;

impl TriggerToObject {
    fn decode(payload: &str) -> WorkerResult<MediaObject> {
        let notification: ObjectNotification =
            serde_json::from_str(payload).map_err(|e| WorkerError::invalid_trigger(e.to_string()))?;

        if notification.bucket.is_empty() || notification.name.is_empty() {
            return Err(WorkerError::invalid_trigger("notification without bucket or name"));
        }
        Ok(MediaObject::from(notification))
    }
}

#[async_trait]
impl Command for TriggerToObject {
    fn name(&self) -> &str {
        STEP
    }

    async fn execute(&self, ctx: &mut ExecutionContext) {
        let result = match ctx.input_text() {
            Some(payload) => Self::decode(payload),
            None => Err(WorkerError::missing_input("trigger payload")),
        };

        if let Some(object) = record_outcome(ctx, STEP, result) {
            info!(media = %object, "Received object notification");
            ctx.set(Slot::Object, object.clone());
            ctx.set(self.output_slot(), object);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cor::TraceHandle;
    use tracing::Span;

    fn run(payload: &str) -> ExecutionContext {
        let mut ctx = ExecutionContext::new(TraceHandle::new(Span::none()));
        ctx.set(Slot::Input, payload);
        tokio_test::block_on(TriggerToObject.execute(&mut ctx));
        ctx
    }

    #[test]
    fn test_decodes_notification() {
        let ctx = run(
            r#"{"kind":"storage#object","name":"trailers/serenity.mp4","bucket":"hi-res",
                "contentType":"video/mp4","size":"1024","metageneration":"1"}"#,
        );

        assert!(!ctx.has_errors());
        let object = ctx.object().unwrap();
        assert_eq!(object.bucket, "hi-res");
        assert_eq!(object.name, "trailers/serenity.mp4");
        assert_eq!(object.mime_type, "video/mp4");
        assert_eq!(ctx.get(&Slot::Output).and_then(|v| v.as_object()), Some(object));
    }

    #[test]
    fn test_malformed_payload_is_recorded() {
        let ctx = run("not json");
        assert_eq!(ctx.error_count(), 1);
        assert!(matches!(ctx.errors()[0].error, WorkerError::InvalidTrigger(_)));
        assert!(ctx.object().is_none());
    }

    #[test]
    fn test_missing_name_is_rejected() {
        let ctx = run(r#"{"bucket":"hi-res"}"#);
        assert!(ctx.has_errors());
    }
}
