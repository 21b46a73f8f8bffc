//! Structured-output schemas sent with generation requests.
//!
//! These use the OpenAPI subset accepted by the `responseSchema` field of a
//! generation config, not JSON Schema, so they are written out by hand.

use serde_json::{json, Value};

/// Schema for the whole-media summary response.
pub fn media_summary_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "title": { "type": "STRING" },
            "category": { "type": "STRING" },
            "summary": { "type": "STRING" },
            "length_in_seconds": { "type": "INTEGER" },
            "media_url": { "type": "STRING", "nullable": true },
            "director": { "type": "STRING", "nullable": true },
            "release_year": { "type": "INTEGER", "nullable": true },
            "genre": { "type": "STRING", "nullable": true },
            "rating": { "type": "STRING", "nullable": true },
            "cast": {
                "type": "ARRAY",
                "nullable": true,
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "character_name": { "type": "STRING" },
                        "actor_name": { "type": "STRING" }
                    },
                    "required": ["character_name", "actor_name"]
                }
            },
            "scene_time_stamps": {
                "type": "ARRAY",
                "nullable": true,
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "start": { "type": "STRING" },
                        "end": { "type": "STRING" }
                    },
                    "required": ["start", "end"]
                }
            }
        },
        "required": ["title", "category", "summary", "length_in_seconds"]
    })
}

/// Schema for a single extracted scene.
pub fn scene_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "sequence": { "type": "INTEGER" },
            "start": { "type": "STRING" },
            "end": { "type": "STRING" },
            "script": { "type": "STRING" }
        },
        "required": ["sequence", "start", "end", "script"]
    })
}
