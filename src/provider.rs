//! 外部AIサービスのインターフェース
//!
//! ProjectStore とチャットはこのトレイト越しに外部サービスを呼ぶ。
//! 本番は GeminiClient、テストは手書きのフェイクを使う。

use async_trait::async_trait;
use tokio::sync::mpsc;
use upcycle_ai_common::{ChatMessage, IdeaRequest, IdeaResponse};

use crate::error::Result;

/// Idea Generator: 画像から企画案を生成
#[async_trait]
pub trait IdeaGenerator: Send + Sync {
    /// スキーマ検証済みのレスポンスを返す。エラーは分類済み
    async fn generate_ideas(&self, credential: &str, request: &IdeaRequest) -> Result<IdeaResponse>;
}

/// Image Renderer: プロンプトから画像を生成
#[async_trait]
pub trait ImageRenderer: Send + Sync {
    /// 画像参照（data URL または取得可能なURL）を返す
    async fn render_image(&self, credential: Option<&str>, prompt: &str) -> Result<String>;
}

/// ストリーミングチャット
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// 返答の差分を tx に流し、最後に全文を返す
    async fn stream_reply(
        &self,
        credential: &str,
        system_instruction: &str,
        history: &[ChatMessage],
        message: &str,
        tx: mpsc::Sender<String>,
    ) -> Result<String>;
}
