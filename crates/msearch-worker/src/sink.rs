//! Persistence sinks for assembled media records.

use async_trait::async_trait;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

use msearch_models::Media;

use crate::error::{WorkerError, WorkerResult};

/// Append-only row sink. No upsert semantics are assumed.
#[async_trait]
pub trait MediaSink: Send + Sync {
    async fn insert(&self, dataset: &str, table: &str, rows: &[Media]) -> WorkerResult<()>;
}

/// Appends rows as JSON lines to `{root}/{dataset}/{table}.jsonl`.
#[derive(Debug, Clone)]
pub struct JsonLinesSink {
    root: PathBuf,
}

impl JsonLinesSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn table_path(&self, dataset: &str, table: &str) -> PathBuf {
        self.root.join(dataset).join(format!("{}.jsonl", table))
    }
}

#[async_trait]
impl MediaSink for JsonLinesSink {
    async fn insert(&self, dataset: &str, table: &str, rows: &[Media]) -> WorkerResult<()> {
        let path = self.table_path(dataset, table);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut buf = Vec::new();
        for row in rows {
            serde_json::to_writer(&mut buf, row)
                .map_err(|e| WorkerError::persist_failed(format!("{}: {}", row.title, e)))?;
            buf.push(b'\n');
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| WorkerError::persist_failed(format!("{}: {}", path.display(), e)))?;
        file.write_all(&buf).await?;
        file.flush().await?;

        debug!("Appended {} rows to {}", rows.len(), path.display());
        Ok(())
    }
}

/// In-memory sink, for dry runs and tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    rows: Mutex<Vec<(String, Media)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every inserted row with its `dataset.table` destination.
    pub async fn rows(&self) -> Vec<(String, Media)> {
        self.rows.lock().await.clone()
    }
}

#[async_trait]
impl MediaSink for MemorySink {
    async fn insert(&self, dataset: &str, table: &str, rows: &[Media]) -> WorkerResult<()> {
        let destination = format!("{}.{}", dataset, table);
        self.rows
            .lock()
            .await
            .extend(rows.iter().cloned().map(|row| (destination.clone(), row)));
        Ok(())
    }
}
