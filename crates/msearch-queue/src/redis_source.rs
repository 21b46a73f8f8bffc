//! Trigger delivery over Redis Streams.

use async_trait::async_trait;
use redis::streams::{StreamId, StreamReadReply};
use tracing::{debug, info, warn};

use crate::error::{QueueError, QueueResult};
use crate::source::{TriggerMessage, TriggerSource};

/// Stream entry field holding the notification document.
pub const PAYLOAD_FIELD: &str = "payload";

/// Consumer settings shared by every stream the worker subscribes to.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub redis_url: String,
    pub consumer_group: String,
    pub consumer_name: String,
    /// How long one XREADGROUP call blocks
    pub block_ms: u64,
    pub batch_size: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            consumer_group: "msearch:workers".to_string(),
            consumer_name: format!("worker-{}", uuid::Uuid::new_v4()),
            block_ms: 5000,
            batch_size: 10,
        }
    }
}

impl QueueConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            redis_url: std::env::var("REDIS_URL").unwrap_or(defaults.redis_url),
            consumer_group: std::env::var("QUEUE_CONSUMER_GROUP").unwrap_or(defaults.consumer_group),
            consumer_name: std::env::var("QUEUE_CONSUMER_NAME").unwrap_or(defaults.consumer_name),
            block_ms: std::env::var("QUEUE_BLOCK_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.block_ms),
            batch_size: std::env::var("QUEUE_BATCH_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.batch_size),
        }
    }
}

/// One Redis stream read through a consumer group.
pub struct RedisTriggerSource {
    client: redis::Client,
    stream: String,
    config: QueueConfig,
}

impl RedisTriggerSource {
    pub fn new(stream: impl Into<String>, config: QueueConfig) -> QueueResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str())?;
        Ok(Self {
            client,
            stream: stream.into(),
            config,
        })
    }

    async fn connection(&self) -> QueueResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| QueueError::connection_failed(format!("{}: {}", self.stream, e)))
    }

    /// Create the consumer group (and stream) if missing.
    pub async fn init(&self) -> QueueResult<()> {
        let mut conn = self.connection().await?;

        let result: Result<(), redis::RedisError> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(&self.stream)
            .arg(&self.config.consumer_group)
            .arg("$")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;

        match result {
            Ok(_) => info!(stream = %self.stream, "Created consumer group: {}", self.config.consumer_group),
            Err(e) if e.to_string().contains("BUSYGROUP") => {
                debug!(stream = %self.stream, "Consumer group already exists: {}", self.config.consumer_group);
            }
            Err(e) => return Err(QueueError::Redis(e)),
        }

        Ok(())
    }

    /// Append a notification to the stream. Returns the message ID.
    pub async fn publish(&self, payload: &str) -> QueueResult<String> {
        let mut conn = self.connection().await?;

        let message_id: String = redis::cmd("XADD")
            .arg(&self.stream)
            .arg("*")
            .arg(PAYLOAD_FIELD)
            .arg(payload)
            .query_async(&mut conn)
            .await
            .map_err(|e| QueueError::publish_failed(e.to_string()))?;

        debug!(stream = %self.stream, "Published trigger {}", message_id);
        Ok(message_id)
    }

    async fn ack(&self, conn: &mut redis::aio::MultiplexedConnection, message_id: &str) -> QueueResult<()> {
        redis::cmd("XACK")
            .arg(&self.stream)
            .arg(&self.config.consumer_group)
            .arg(message_id)
            .query_async::<()>(conn)
            .await?;

        redis::cmd("XDEL")
            .arg(&self.stream)
            .arg(message_id)
            .query_async::<()>(conn)
            .await?;

        Ok(())
    }
}

#[async_trait]
impl TriggerSource for RedisTriggerSource {
    fn name(&self) -> &str {
        &self.stream
    }

    async fn receive(&self) -> QueueResult<Vec<TriggerMessage>> {
        let mut conn = self.connection().await?;

        let reply: Option<StreamReadReply> = redis::cmd("XREADGROUP")
            .arg("GROUP")
            .arg(&self.config.consumer_group)
            .arg(&self.config.consumer_name)
            .arg("COUNT")
            .arg(self.config.batch_size)
            .arg("BLOCK")
            .arg(self.config.block_ms)
            .arg("STREAMS")
            .arg(&self.stream)
            .arg(">")
            .query_async(&mut conn)
            .await?;

        let mut messages = Vec::new();
        for key in reply.map(|r| r.keys).unwrap_or_default() {
            for entry in key.ids {
                // Processing outlives any reasonable pending deadline, so the
                // entry is acknowledged as soon as it is read.
                self.ack(&mut conn, &entry.id).await?;

                match decode_entry(&entry) {
                    Some(message) => messages.push(message),
                    None => warn!(stream = %self.stream, "Dropping entry {} without {} field", entry.id, PAYLOAD_FIELD),
                }
            }
        }

        Ok(messages)
    }
}

/// Extract the payload of a stream entry.
fn decode_entry(entry: &StreamId) -> Option<TriggerMessage> {
    let payload = match entry.map.get(PAYLOAD_FIELD)? {
        redis::Value::BulkString(bytes) => String::from_utf8_lossy(bytes).to_string(),
        redis::Value::SimpleString(s) => s.clone(),
        _ => return None,
    };
    Some(TriggerMessage::new(entry.id.clone(), payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn entry(field: &str, value: redis::Value) -> StreamId {
        StreamId {
            id: "1700000000000-0".to_string(),
            map: HashMap::from([(field.to_string(), value)]),
        }
    }

    #[test]
    fn test_decode_entry() {
        let message = decode_entry(&entry(
            PAYLOAD_FIELD,
            redis::Value::BulkString(br#"{"name":"a.mp4"}"#.to_vec()),
        ))
        .unwrap();
        assert_eq!(message.id, "1700000000000-0");
        assert_eq!(message.payload, r#"{"name":"a.mp4"}"#);
    }

    #[test]
    fn test_decode_entry_without_payload() {
        assert!(decode_entry(&entry("job", redis::Value::BulkString(b"{}".to_vec()))).is_none());
        assert!(decode_entry(&entry(PAYLOAD_FIELD, redis::Value::Nil)).is_none());
    }

    #[tokio::test]
    async fn test_unreachable_server_is_connection_failure() {
        let config = QueueConfig {
            redis_url: "redis://127.0.0.1:1".to_string(),
            ..QueueConfig::default()
        };
        let source = RedisTriggerSource::new("msearch:test", config).unwrap();

        let err = source.init().await.unwrap_err();
        assert!(matches!(err, QueueError::ConnectionFailed(_)), "{}", err);
    }

    #[test]
    fn test_config_defaults() {
        let config = QueueConfig::default();
        assert_eq!(config.consumer_group, "msearch:workers");
        assert!(config.consumer_name.starts_with("worker-"));
        assert_eq!(config.block_ms, 5000);
    }
}
