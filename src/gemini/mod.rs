//! Gemini API連携
//!
//! - 企画生成（画像 + 否定例 → 構造化JSON）
//! - 画像生成（プロンプト → data URL）
//! - ストリーミングチャット（SSE）

pub mod wire;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use std::time::Duration;
use tokio::sync::mpsc;
use upcycle_ai_common::{
    build_analysis_prompt, parse_idea_response, ChatMessage, IdeaRequest, IdeaResponse,
};

use crate::config::Config;
use crate::error::{Result, Stage, UpcycleError};
use crate::provider::{ChatBackend, IdeaGenerator, ImageRenderer};
use wire::{
    idea_response_schema, parse_sse_line, Content, GeminiRequest, GeminiResponse,
    GenerationConfig, InlineData, Part,
};

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Gemini APIクライアント
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: Client,
    base_url: String,
    analysis_model: String,
    image_model: String,
    chat_model: String,
}

impl GeminiClient {
    pub fn new(config: &Config) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            http,
            base_url: GEMINI_API_BASE.to_string(),
            analysis_model: config.analysis_model.clone(),
            image_model: config.image_model.clone(),
            chat_model: config.chat_model.clone(),
        })
    }

    /// 接続先を差し替える（プロキシ等）
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// generateContent 呼び出し（共通処理）
    async fn generate_content(
        &self,
        stage: Stage,
        model: &str,
        credential: &str,
        request: &GeminiRequest,
    ) -> Result<GeminiResponse> {
        let url = format!("{}/{}:generateContent", self.base_url, model);

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", credential)
            .json(request)
            .send()
            .await
            .map_err(|e| UpcycleError::categorize(stage, &e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(UpcycleError::from_status(stage, status, &body));
        }

        let parsed: GeminiResponse = response
            .json()
            .await
            .map_err(|e| UpcycleError::categorize(stage, &format!("レスポンス解析失敗: {}", e)))?;

        if let Some(reason) = parsed.blocked_reason() {
            return Err(UpcycleError::categorize(stage, &reason));
        }

        Ok(parsed)
    }
}

#[async_trait]
impl IdeaGenerator for GeminiClient {
    async fn generate_ideas(&self, credential: &str, request: &IdeaRequest) -> Result<IdeaResponse> {
        let prompt = build_analysis_prompt(&request.negative_examples);

        let mut parts = vec![Part::Text { text: prompt }];
        for image in &request.images {
            parts.push(Part::InlineData {
                inline_data: InlineData {
                    mime_type: image.mime_type.clone(),
                    data: image.data.clone(),
                },
            });
        }

        let api_request = GeminiRequest {
            contents: vec![Content { role: Some("user".into()), parts }],
            system_instruction: None,
            generation_config: Some(GenerationConfig {
                response_mime_type: Some("application/json".to_string()),
                response_schema: Some(idea_response_schema()),
                ..Default::default()
            }),
        };

        tracing::debug!(model = %self.analysis_model, images = request.images.len(), "企画生成リクエスト");
        let response = self
            .generate_content(Stage::Analysis, &self.analysis_model, credential, &api_request)
            .await?;

        let text = response
            .text()
            .ok_or_else(|| UpcycleError::GeneratorFailure("空のレスポンス".to_string()))?;

        let mut parsed = parse_idea_response(&text)
            .map_err(|e| UpcycleError::GeneratorFailure(e.to_string()))?;
        if parsed.sources.is_empty() {
            parsed.sources = response.sources();
        }
        Ok(parsed)
    }
}

#[async_trait]
impl ImageRenderer for GeminiClient {
    async fn render_image(&self, credential: Option<&str>, prompt: &str) -> Result<String> {
        let credential = credential.ok_or(UpcycleError::MissingApiKey)?;

        let api_request = GeminiRequest {
            contents: vec![Content::text(Some("user"), prompt)],
            system_instruction: None,
            generation_config: Some(GenerationConfig {
                response_modalities: Some(vec!["IMAGE".to_string()]),
                ..Default::default()
            }),
        };

        let response = self
            .generate_content(Stage::Image, &self.image_model, credential, &api_request)
            .await?;

        response
            .first_image_data_url()
            .ok_or_else(|| UpcycleError::RendererFailure("レスポンスに画像データがありません".to_string()))
    }
}

#[async_trait]
impl ChatBackend for GeminiClient {
    async fn stream_reply(
        &self,
        credential: &str,
        system_instruction: &str,
        history: &[ChatMessage],
        message: &str,
        tx: mpsc::Sender<String>,
    ) -> Result<String> {
        let mut contents: Vec<Content> = history
            .iter()
            .map(|m| Content::text(Some(m.role.as_str()), m.text.clone()))
            .collect();
        contents.push(Content::text(Some("user"), message));

        let api_request = GeminiRequest {
            contents,
            system_instruction: Some(Content::text(None, system_instruction)),
            generation_config: None,
        };

        let url = format!("{}/{}:streamGenerateContent?alt=sse", self.base_url, self.chat_model);
        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", credential)
            .json(&api_request)
            .send()
            .await
            .map_err(|e| UpcycleError::categorize(Stage::Chat, &e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(UpcycleError::from_status(Stage::Chat, status, &body));
        }

        let mut full_text = String::new();
        let mut stream = response.bytes_stream();
        // チャンク境界はマルチバイト文字の途中にもなるので、行が揃うまでバイトのまま持つ
        let mut buffer: Vec<u8> = Vec::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| UpcycleError::categorize(Stage::Chat, &e.to_string()))?;
            buffer.extend_from_slice(&chunk);

            while let Some(line_end) = buffer.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=line_end).collect();
                if let Some(delta) = parse_sse_line(&String::from_utf8_lossy(&line)) {
                    full_text.push_str(&delta);
                    // 受信側が閉じていても全文は返す
                    let _ = tx.send(delta).await;
                }
            }
        }

        if let Some(delta) = parse_sse_line(&String::from_utf8_lossy(&buffer)) {
            full_text.push_str(&delta);
            let _ = tx.send(delta).await;
        }

        Ok(full_text)
    }
}
