//! Storage object references carried by trigger events.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Object-storage change notification as delivered on a trigger topic.
///
/// Only `bucket`, `name` and `content_type` are used by the pipeline; the
/// remaining fields are kept so the payload round-trips for diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ObjectNotification {
    pub kind: String,
    pub id: String,
    pub self_link: String,
    pub name: String,
    pub bucket: String,
    pub generation: String,
    #[serde(rename = "metageneration")]
    pub meta_generation: String,
    pub content_type: String,
    pub time_created: String,
    pub updated: String,
    pub storage_class: String,
    pub time_storage_class_updated: String,
    pub size: String,
    pub md5_hash: String,
    pub media_link: String,
    #[serde(rename = "metadata")]
    pub meta_data: Option<HashMap<String, serde_json::Value>>,
    pub crc32c: String,
    pub etag: String,
}

/// The subset of a notification the pipeline works with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaObject {
    pub bucket: String,
    pub name: String,
    pub mime_type: String,
}

impl MediaObject {
    pub fn new(bucket: impl Into<String>, name: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            name: name.into(),
            mime_type: mime_type.into(),
        }
    }

    /// `gs://` URI handed to the generation model.
    pub fn gs_uri(&self) -> String {
        format!("gs://{}/{}", self.bucket, self.name)
    }

    /// Browser URL stored on the persisted record.
    pub fn public_url(&self) -> String {
        format!(
            "https://storage.mtls.cloud.google.com/{}/{}",
            self.bucket, self.name
        )
    }

    /// Path of the object below a FUSE mount of the buckets.
    pub fn mounted_path(&self, mount_point: impl AsRef<Path>) -> PathBuf {
        mount_point.as_ref().join(&self.bucket).join(&self.name)
    }
}

impl From<ObjectNotification> for MediaObject {
    fn from(n: ObjectNotification) -> Self {
        Self {
            bucket: n.bucket,
            name: n.name,
            mime_type: n.content_type,
        }
    }
}

impl fmt::Display for MediaObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bucket, self.name)
    }
}
