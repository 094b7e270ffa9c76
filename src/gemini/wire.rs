//! Gemini API のリクエスト/レスポンス型

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use upcycle_ai_common::{build_data_url, Source};

/// Gemini APIリクエスト
#[derive(Serialize)]
pub struct GeminiRequest {
    pub contents: Vec<Content>,
    #[serde(rename = "systemInstruction", skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    #[serde(rename = "generationConfig", skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

#[derive(Serialize)]
pub struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub parts: Vec<Part>,
}

impl Content {
    pub fn text(role: Option<&str>, text: impl Into<String>) -> Self {
        Self {
            role: role.map(str::to_string),
            parts: vec![Part::Text { text: text.into() }],
        }
    }
}

#[derive(Serialize)]
#[serde(untagged)]
pub enum Part {
    Text { text: String },
    InlineData { inline_data: InlineData },
}

#[derive(Serialize)]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

#[derive(Serialize, Default)]
pub struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(rename = "responseMimeType", skip_serializing_if = "Option::is_none")]
    pub response_mime_type: Option<String>,
    #[serde(rename = "responseSchema", skip_serializing_if = "Option::is_none")]
    pub response_schema: Option<Value>,
    #[serde(rename = "responseModalities", skip_serializing_if = "Option::is_none")]
    pub response_modalities: Option<Vec<String>>,
}

/// Gemini APIレスポンス
#[derive(Deserialize, Default, Debug)]
pub struct GeminiResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(rename = "promptFeedback")]
    pub prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize, Debug)]
pub struct PromptFeedback {
    #[serde(rename = "blockReason")]
    pub block_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct Candidate {
    pub content: Option<ResponseContent>,
    #[serde(rename = "finishReason")]
    pub finish_reason: Option<String>,
    #[serde(rename = "groundingMetadata")]
    pub grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Deserialize, Debug)]
pub struct ResponseContent {
    #[serde(default)]
    pub parts: Vec<ResponsePart>,
}

#[derive(Deserialize, Debug)]
pub struct ResponsePart {
    pub text: Option<String>,
    #[serde(rename = "inlineData", alias = "inline_data")]
    pub inline_data: Option<ResponseInlineData>,
}

#[derive(Deserialize, Debug)]
pub struct ResponseInlineData {
    #[serde(rename = "mimeType", alias = "mime_type", default = "default_image_mime")]
    pub mime_type: String,
    pub data: String,
}

fn default_image_mime() -> String {
    "image/png".to_string()
}

#[derive(Deserialize, Debug)]
pub struct GroundingMetadata {
    #[serde(rename = "groundingChunks", default)]
    pub grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Deserialize, Debug)]
pub struct GroundingChunk {
    pub web: Option<WebSource>,
}

#[derive(Deserialize, Debug)]
pub struct WebSource {
    pub uri: String,
    #[serde(default)]
    pub title: String,
}

impl GeminiResponse {
    /// 安全設定でブロックされたか
    pub fn blocked_reason(&self) -> Option<String> {
        if let Some(reason) = self.prompt_feedback.as_ref().and_then(|f| f.block_reason.clone()) {
            return Some(reason);
        }
        self.candidates
            .first()
            .and_then(|c| c.finish_reason.as_deref())
            .filter(|r| matches!(*r, "SAFETY" | "PROHIBITED_CONTENT" | "IMAGE_SAFETY"))
            .map(|r| format!("SAFETY ({})", r))
    }

    /// 1件目の候補のテキストを連結
    pub fn text(&self) -> Option<String> {
        let parts = &self.candidates.first()?.content.as_ref()?.parts;
        let text: String = parts.iter().filter_map(|p| p.text.as_deref()).collect();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }

    /// 1件目の画像パートを data URL で返す
    pub fn first_image_data_url(&self) -> Option<String> {
        self.candidates
            .iter()
            .filter_map(|c| c.content.as_ref())
            .flat_map(|c| c.parts.iter())
            .find_map(|p| p.inline_data.as_ref())
            .map(|d| build_data_url(&d.mime_type, &d.data))
    }

    /// 引用元（グラウンディング）
    pub fn sources(&self) -> Vec<Source> {
        self.candidates
            .iter()
            .filter_map(|c| c.grounding_metadata.as_ref())
            .flat_map(|m| m.grounding_chunks.iter())
            .filter_map(|chunk| chunk.web.as_ref())
            .map(|w| Source {
                uri: w.uri.clone(),
                title: w.title.clone(),
            })
            .collect()
    }
}

/// SSEの1行からテキスト差分を取り出す
pub fn parse_sse_line(line: &str) -> Option<String> {
    let json_str = line.trim().strip_prefix("data:")?.trim();
    let chunk: GeminiResponse = serde_json::from_str(json_str).ok()?;
    chunk.text()
}

/// 企画レスポンスのスキーマ
pub fn idea_response_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "identified_items": { "type": "ARRAY", "items": { "type": "STRING" } },
            "project_ideas": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "project_name": { "type": "STRING" },
                        "description": { "type": "STRING" },
                        "materials_used": { "type": "ARRAY", "items": { "type": "STRING" } },
                        "difficulty": { "type": "STRING", "enum": ["beginner", "intermediate", "advanced"] },
                        "time_required": { "type": "STRING" },
                        "step_by_step_guide": { "type": "ARRAY", "items": { "type": "STRING" } },
                        "variations_and_alternatives": { "type": "ARRAY", "items": { "type": "STRING" } },
                        "ai_image_prompt": { "type": "STRING" },
                        "youtube_search_query": { "type": "STRING" }
                    },
                    "required": [
                        "project_name", "description", "materials_used", "difficulty",
                        "time_required", "step_by_step_guide", "ai_image_prompt", "youtube_search_query"
                    ]
                }
            }
        },
        "required": ["identified_items", "project_ideas"]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    // =============================================
    // リクエスト シリアライズテスト
    // =============================================

    #[test]
    fn test_gemini_request_serialize() {
        let request = GeminiRequest {
            contents: vec![Content::text(Some("user"), "テストプロンプト")],
            system_instruction: None,
            generation_config: Some(GenerationConfig {
                temperature: Some(0.5),
                response_mime_type: Some("application/json".to_string()),
                ..Default::default()
            }),
        };

        let json = serde_json::to_string(&request).expect("シリアライズ失敗");
        assert!(json.contains("\"role\":\"user\""));
        assert!(json.contains("\"generationConfig\""));
        assert!(json.contains("\"responseMimeType\":\"application/json\""));
        assert!(!json.contains("systemInstruction"));
        assert!(!json.contains("responseModalities"));
    }

    #[test]
    fn test_part_inline_data_serialize() {
        let part = Part::InlineData {
            inline_data: InlineData {
                mime_type: "image/jpeg".to_string(),
                data: "base64data".to_string(),
            },
        };
        let json = serde_json::to_string(&part).expect("シリアライズ失敗");
        assert_eq!(json, r#"{"inline_data":{"mime_type":"image/jpeg","data":"base64data"}}"#);
    }

    // =============================================
    // レスポンス デシリアライズテスト
    // =============================================

    #[test]
    fn test_response_text() {
        let json = r#"{"candidates": [{"content": {"parts": [{"text": "{\"a\":"}, {"text": "1}"}]}}]}"#;
        let response: GeminiResponse = serde_json::from_str(json).expect("デシリアライズ失敗");
        assert_eq!(response.text().as_deref(), Some("{\"a\":1}"));
        assert!(response.blocked_reason().is_none());
    }

    #[test]
    fn test_response_image_part() {
        let json = r#"{"candidates": [{"content": {"parts": [
            {"text": "Here is your image"},
            {"inlineData": {"mimeType": "image/png", "data": "iVBORw0KGgo="}}
        ]}}]}"#;
        let response: GeminiResponse = serde_json::from_str(json).expect("デシリアライズ失敗");
        assert_eq!(
            response.first_image_data_url().as_deref(),
            Some("data:image/png;base64,iVBORw0KGgo=")
        );
    }

    #[test]
    fn test_response_no_image_part() {
        let json = r#"{"candidates": [{"content": {"parts": [{"text": "no image"}]}}]}"#;
        let response: GeminiResponse = serde_json::from_str(json).unwrap();
        assert!(response.first_image_data_url().is_none());
    }

    #[test]
    fn test_response_blocked() {
        let json = r#"{"promptFeedback": {"blockReason": "SAFETY"}}"#;
        let response: GeminiResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.blocked_reason().as_deref(), Some("SAFETY"));
        assert!(response.text().is_none());

        let json = r#"{"candidates": [{"finishReason": "SAFETY"}]}"#;
        let response: GeminiResponse = serde_json::from_str(json).unwrap();
        assert!(response.blocked_reason().unwrap().contains("SAFETY"));
    }

    #[test]
    fn test_response_sources() {
        let json = r#"{"candidates": [{
            "content": {"parts": [{"text": "{}"}]},
            "groundingMetadata": {"groundingChunks": [
                {"web": {"uri": "https://example.com/a", "title": "A"}},
                {"retrievedContext": {}}
            ]}
        }]}"#;
        let response: GeminiResponse = serde_json::from_str(json).unwrap();
        let sources = response.sources();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].uri, "https://example.com/a");
        assert_eq!(sources[0].title, "A");
    }

    #[test]
    fn test_parse_sse_line() {
        let line = r#"data: {"candidates": [{"content": {"parts": [{"text": "Hello"}]}}]}"#;
        assert_eq!(parse_sse_line(line).as_deref(), Some("Hello"));
        assert!(parse_sse_line("").is_none());
        assert!(parse_sse_line(": keep-alive").is_none());
        assert!(parse_sse_line("data: not json").is_none());
    }

    #[test]
    fn test_idea_response_schema_required() {
        let schema = idea_response_schema();
        let required = schema["properties"]["project_ideas"]["items"]["required"]
            .as_array()
            .unwrap();
        assert!(required.iter().any(|v| v == "ai_image_prompt"));
        assert!(!required.iter().any(|v| v == "variations_and_alternatives"));
    }
}
