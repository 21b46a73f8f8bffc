//! Trigger source abstraction.

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};

use crate::error::{QueueError, QueueResult};

/// One delivered trigger. `payload` is the raw notification document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerMessage {
    pub id: String,
    pub payload: String,
}

impl TriggerMessage {
    pub fn new(id: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            payload: payload.into(),
        }
    }
}

/// A subscription that yields trigger messages.
///
/// Messages are acknowledged before `receive` returns them: a message that
/// fails later in processing is not redelivered.
#[async_trait]
pub trait TriggerSource: Send + Sync {
    /// Subscription name, used in logs and metrics.
    fn name(&self) -> &str;

    /// Wait for the next batch. An empty batch means the wait timed out.
    /// Returns [`QueueError::Closed`] once the source is exhausted.
    async fn receive(&self) -> QueueResult<Vec<TriggerMessage>>;
}

/// In-process source fed through an mpsc channel.
pub struct ChannelTriggerSource {
    name: String,
    rx: Mutex<mpsc::Receiver<TriggerMessage>>,
}

impl ChannelTriggerSource {
    /// Create a source and the sender that feeds it. Dropping every sender
    /// closes the source.
    pub fn new(name: impl Into<String>, capacity: usize) -> (mpsc::Sender<TriggerMessage>, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            tx,
            Self {
                name: name.into(),
                rx: Mutex::new(rx),
            },
        )
    }
}

#[async_trait]
impl TriggerSource for ChannelTriggerSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn receive(&self) -> QueueResult<Vec<TriggerMessage>> {
        let mut rx = self.rx.lock().await;
        match rx.recv().await {
            Some(first) => {
                let mut batch = vec![first];
                while let Ok(next) = rx.try_recv() {
                    batch.push(next);
                }
                Ok(batch)
            }
            None => Err(QueueError::Closed(self.name.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_source_batches_then_closes() {
        let (tx, source) = ChannelTriggerSource::new("HiResTopic", 8);
        tx.send(TriggerMessage::new("1", "{}")).await.unwrap();
        tx.send(TriggerMessage::new("2", "{}")).await.unwrap();
        drop(tx);

        let batch = source.receive().await.unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[1].id, "2");

        let err = source.receive().await.unwrap_err();
        assert!(err.is_closed());
        assert_eq!(source.name(), "HiResTopic");
    }
}
