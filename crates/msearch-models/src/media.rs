//! Media, summary and scene models.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Deterministic identifier of a persisted media record.
///
/// Derived from the source object name (UUIDv5, URL namespace) so that
/// re-processing the same file yields the same identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct MediaId(pub String);

impl MediaId {
    /// Derive the identifier for a source file name.
    pub fn for_source(file_name: &str) -> Self {
        Self(Uuid::new_v5(&Uuid::NAMESPACE_URL, file_name.as_bytes()).to_string())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MediaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for MediaId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A start/end pair in `HH:MM:SS`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TimeSpan {
    pub start: String,
    pub end: String,
}

impl TimeSpan {
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
        }
    }
}

/// Mapping from a character to the performer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CastMember {
    pub character_name: String,
    pub actor_name: String,
}

/// A time-bounded narrative segment of a media file.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub struct Scene {
    #[serde(rename = "sequence", default)]
    pub sequence_number: u32,
    #[serde(default)]
    pub tokens_to_generate: u32,
    #[serde(default)]
    pub tokens_generated: u32,
    pub start: String,
    pub end: String,
    #[serde(default)]
    pub script: String,
}

impl Scene {
    pub fn new(
        sequence_number: u32,
        start: impl Into<String>,
        end: impl Into<String>,
        script: impl Into<String>,
    ) -> Self {
        Self {
            sequence_number,
            start: start.into(),
            end: end.into(),
            script: script.into(),
            ..Default::default()
        }
    }
}

/// Model-produced description of a whole media file.
///
/// Transient: parsed from the summary step, then folded into [`Media`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct MediaSummary {
    pub title: String,
    pub category: String,
    pub summary: String,
    #[serde(default)]
    pub length_in_seconds: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub director: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_year: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty", skip_serializing_if = "Vec::is_empty")]
    #[schemars(with = "Vec<CastMember>")]
    pub cast: Vec<CastMember>,
    #[serde(default, deserialize_with = "null_as_empty", skip_serializing_if = "Vec::is_empty")]
    #[schemars(with = "Vec<TimeSpan>")]
    pub scene_time_stamps: Vec<TimeSpan>,
}

impl MediaSummary {
    /// Human readable document handed to the per-scene prompts.
    pub fn as_document(&self) -> String {
        let cast: String = self
            .cast
            .iter()
            .map(|c| format!("{} - {}\n", c.character_name, c.actor_name))
            .collect();
        format!(
            "Title:{}\nSummary:\n\n{}\nCast:\n\n{}\n",
            self.title, self.summary, cast
        )
    }
}

/// The persisted record for one media file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Media {
    pub id: MediaId,
    pub create_date: DateTime<Utc>,
    pub title: String,
    pub category: String,
    pub summary: String,
    pub length_in_seconds: u32,
    pub media_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub director: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_year: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<String>,
    #[serde(default)]
    pub cast: Vec<CastMember>,
    #[serde(default)]
    pub scenes: Vec<Scene>,
}

impl Media {
    /// Create an empty record keyed by the source file name.
    pub fn new(source_name: &str) -> Self {
        Self {
            id: MediaId::for_source(source_name),
            create_date: Utc::now(),
            title: String::new(),
            category: String::new(),
            summary: String::new(),
            length_in_seconds: 0,
            media_url: None,
            director: None,
            release_year: None,
            genre: None,
            rating: None,
            cast: Vec::new(),
            scenes: Vec::new(),
        }
    }

    /// Build a record from a summary and already reconciled scenes.
    pub fn assemble(
        source_name: &str,
        summary: &MediaSummary,
        length_in_seconds: u32,
        scenes: Vec<Scene>,
    ) -> Self {
        Self {
            title: summary.title.clone(),
            category: summary.category.clone(),
            summary: summary.summary.clone(),
            length_in_seconds,
            media_url: summary.media_url.clone(),
            director: summary.director.clone(),
            release_year: summary.release_year,
            genre: summary.genre.clone(),
            rating: summary.rating.clone(),
            cast: summary.cast.clone(),
            scenes,
            ..Self::new(source_name)
        }
    }
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_id_is_deterministic() {
        let a = MediaId::for_source("trailer.mp4");
        let b = MediaId::for_source("trailer.mp4");
        let c = MediaId::for_source("other.mp4");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(Uuid::parse_str(a.as_str()).unwrap().get_version_num(), 5);
    }

    #[test]
    fn test_summary_accepts_null_lists() {
        let json = r#"{"title":"T","category":"trailer","summary":"S","length_in_seconds":10,"cast":null,"scene_time_stamps":null}"#;
        let summary: MediaSummary = serde_json::from_str(json).unwrap();
        assert!(summary.cast.is_empty());
        assert!(summary.scene_time_stamps.is_empty());
    }

    #[test]
    fn test_summary_document_lists_cast() {
        let summary = MediaSummary {
            title: "Serenity".into(),
            summary: "Crew on the run.".into(),
            cast: vec![CastMember {
                character_name: "River Tam".into(),
                actor_name: "Summer Glau".into(),
            }],
            ..Default::default()
        };
        assert_eq!(
            summary.as_document(),
            "Title:Serenity\nSummary:\n\nCrew on the run.\nCast:\n\nRiver Tam - Summer Glau\n\n"
        );
    }

    #[test]
    fn test_scene_uses_sequence_key() {
        let scene: Scene =
            serde_json::from_str(r#"{"sequence":4,"start":"00:00:01","end":"00:00:02","script":"x"}"#)
                .unwrap();
        assert_eq!(scene.sequence_number, 4);
        let json = serde_json::to_value(&scene).unwrap();
        assert_eq!(json["sequence"], 4);
    }

    #[test]
    fn test_assemble_copies_summary_fields() {
        let summary = MediaSummary {
            title: "Serenity".into(),
            category: "trailer".into(),
            summary: "S".into(),
            director: Some("Joss Whedon".into()),
            release_year: Some(2005),
            ..Default::default()
        };
        let media = Media::assemble("serenity.mp4", &summary, 120, vec![Scene::new(0, "00:00:00", "00:02:00", "s")]);
        assert_eq!(media.id, MediaId::for_source("serenity.mp4"));
        assert_eq!(media.title, "Serenity");
        assert_eq!(media.release_year, Some(2005));
        assert_eq!(media.length_in_seconds, 120);
        assert_eq!(media.scenes.len(), 1);
    }
}
