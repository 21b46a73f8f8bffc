//! Wire types for the `generateContent` REST call.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One turn of conversation content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    /// User turn built from the given parts.
    pub fn user(parts: Vec<Part>) -> Self {
        Self {
            role: Some("user".to_string()),
            parts,
        }
    }

    /// Single text part without a role, as used for system instructions.
    pub fn instruction(text: impl Into<String>) -> Self {
        Self {
            role: None,
            parts: vec![Part::text(text)],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_data: Option<FileData>,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            file_data: None,
        }
    }

    /// Reference to a stored object, e.g. `gs://bucket/name`.
    pub fn file(file_uri: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            text: None,
            file_data: Some(FileData {
                mime_type: mime_type.into(),
                file_uri: file_uri.into(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileData {
    pub mime_type: String,
    pub file_uri: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HarmCategory {
    #[serde(rename = "HARM_CATEGORY_DANGEROUS_CONTENT")]
    DangerousContent,
    #[serde(rename = "HARM_CATEGORY_HARASSMENT")]
    Harassment,
    #[serde(rename = "HARM_CATEGORY_HATE_SPEECH")]
    HateSpeech,
    #[serde(rename = "HARM_CATEGORY_SEXUALLY_EXPLICIT")]
    SexuallyExplicit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HarmBlockThreshold {
    BlockNone,
    BlockOnlyHigh,
    BlockMediumAndAbove,
    BlockLowAndAbove,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetySetting {
    pub category: HarmCategory,
    pub threshold: HarmBlockThreshold,
}

/// Media descriptions routinely mention violence and adult themes, so
/// every category is left unblocked.
pub fn default_safety_settings() -> Vec<SafetySetting> {
    [
        HarmCategory::DangerousContent,
        HarmCategory::Harassment,
        HarmCategory::HateSpeech,
        HarmCategory::SexuallyExplicit,
    ]
    .into_iter()
    .map(|category| SafetySetting {
        category,
        threshold: HarmBlockThreshold::BlockNone,
    })
    .collect()
}

/// Per-model generation settings.
///
/// `system_instruction` and `safety_settings` travel as top-level request
/// fields, everything else as `generationConfig`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_schema: Option<Value>,
    #[serde(skip)]
    pub system_instruction: Option<String>,
    #[serde(skip)]
    pub safety_settings: Vec<SafetySetting>,
}

impl GenerationConfig {
    /// Copy with per-call overrides applied. The receiver is left untouched.
    pub fn with_overrides(&self, system_instruction: Option<&str>, schema: Option<Value>) -> Self {
        let mut config = self.clone();
        if let Some(schema) = schema {
            config.response_schema = Some(schema);
        }
        if let Some(instruction) = system_instruction.filter(|s| !s.is_empty()) {
            config.system_instruction = Some(instruction.to_string());
        }
        config
    }
}

/// Full request body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest<'a> {
    pub contents: &'a [Content],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    pub generation_config: &'a GenerationConfig,
    #[serde(skip_serializing_if = "<[SafetySetting]>::is_empty")]
    pub safety_settings: &'a [SafetySetting],
}

impl<'a> GenerateContentRequest<'a> {
    pub fn new(contents: &'a [Content], config: &'a GenerationConfig) -> Self {
        Self {
            contents,
            system_instruction: config.system_instruction.as_deref().map(Content::instruction),
            generation_config: config,
            safety_settings: &config.safety_settings,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(default)]
    pub usage_metadata: UsageMetadata,
}

impl GenerateResponse {
    /// Every text part of every candidate, concatenated in response order.
    pub fn text(&self) -> String {
        self.candidates
            .iter()
            .filter_map(|c| c.content.as_ref())
            .flat_map(|c| c.parts.iter())
            .filter_map(|p| p.text.as_deref())
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    #[serde(default)]
    pub prompt_token_count: u64,
    #[serde(default)]
    pub candidates_token_count: u64,
}

impl UsageMetadata {
    pub fn add(&mut self, other: UsageMetadata) {
        self.prompt_token_count += other.prompt_token_count;
        self.candidates_token_count += other.candidates_token_count;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_response_text_concatenates_candidates() {
        let response: GenerateResponse = serde_json::from_value(json!({
            "candidates": [
                { "content": { "role": "model", "parts": [{ "text": "{\"a\":" }, { "text": "1" }] } },
                { "content": { "parts": [{ "text": "}" }] }, "finishReason": "STOP" },
                { "finishReason": "SAFETY" }
            ],
            "usageMetadata": { "promptTokenCount": 10, "candidatesTokenCount": 4, "totalTokenCount": 14 }
        }))
        .unwrap();

        assert_eq!(response.text(), "{\"a\":1}");
        assert_eq!(response.usage_metadata.prompt_token_count, 10);
        assert_eq!(response.usage_metadata.candidates_token_count, 4);
    }

    #[test]
    fn test_request_shape() {
        let base = GenerationConfig {
            temperature: Some(0.2),
            top_k: Some(40),
            response_mime_type: Some("application/json".to_string()),
            safety_settings: default_safety_settings(),
            ..Default::default()
        };
        let config = base.with_overrides(Some("Be terse."), Some(json!({"type": "OBJECT"})));
        let contents = vec![Content::user(vec![
            Part::text("describe"),
            Part::file("gs://b/a.mp4", "video/mp4"),
        ])];

        let body = serde_json::to_value(GenerateContentRequest::new(&contents, &config)).unwrap();

        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "Be terse.");
        assert_eq!(body["generationConfig"]["topK"], 40);
        assert_eq!(body["generationConfig"]["responseSchema"]["type"], "OBJECT");
        assert!(body["generationConfig"].get("safetySettings").is_none());
        assert_eq!(body["safetySettings"].as_array().unwrap().len(), 4);
        assert_eq!(body["safetySettings"][0]["threshold"], "BLOCK_NONE");
        assert_eq!(body["contents"][0]["parts"][1]["fileData"]["fileUri"], "gs://b/a.mp4");

        // The base stays as it was.
        assert!(base.system_instruction.is_none());
        assert!(base.response_schema.is_none());
    }
}
