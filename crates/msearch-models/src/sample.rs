//! Worked examples embedded in prompts as `EXAMPLE_JSON`.

use crate::media::{CastMember, MediaSummary, Scene, TimeSpan};

const EXAMPLE_SCRIPT: &str = "
INT. BATTLEFIELD - DAY

A fierce battle is raging. Soldiers are fighting and dying all around.

VOICEOVER (V.O.) - (Nathan Fillion)
I aim to misbehave.

We see a young woman, RIVER TAM (16), running through the battlefield. She is terrified and covered in blood.

RIVER (V.O.) - (Summer Glau)
They were right. They were always right.

River stumbles and falls. She looks up to see a man standing over her. He is SIMON TAM (26), her older brother.

SIMON - (Sean Maher)
It's all right, River. I'm here.

Simon helps River to her feet. They run away together.";

/// Example scene shown to the scene extraction prompt.
pub fn example_scene() -> Scene {
    Scene::new(1, "00:00:00", "00:01:00", EXAMPLE_SCRIPT)
}

/// Example summary shown to the summary prompt.
pub fn example_summary() -> MediaSummary {
    let cast = [
        ("Malcolm Reynolds", "Nathan Fillion"),
        ("River Tam", "Summer Glau"),
        ("Simon Tam", "Sean Maher"),
    ]
    .into_iter()
    .map(|(character, actor)| CastMember {
        character_name: character.to_string(),
        actor_name: actor.to_string(),
    })
    .collect();

    MediaSummary {
        title: "Serenity".to_string(),
        category: "trailer".to_string(),
        summary: "The crew of the ship Serenity try to evade an assassin sent to recapture telepath River."
            .to_string(),
        length_in_seconds: 120,
        media_url: Some("https://storage.mtls.cloud.google.com/bucket_name/Serenity.mp4".to_string()),
        director: Some("Joss Whedon".to_string()),
        release_year: Some(2005),
        genre: Some("Science Fiction".to_string()),
        rating: Some("PG-13".to_string()),
        cast,
        scene_time_stamps: vec![
            TimeSpan::new("00:00:00", "00:00:05"),
            TimeSpan::new("00:00:06", "00:00:10"),
        ],
    }
}

/// Serialized forms, as inserted into templates.
pub fn example_scene_json() -> String {
    serde_json::to_string(&example_scene()).unwrap_or_default()
}

pub fn example_summary_json() -> String {
    serde_json::to_string(&example_summary()).unwrap_or_default()
}
