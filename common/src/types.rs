//! プロジェクトの型定義
//!
//! CLIとライブラリで共有される型:
//! - ProjectRecord: アップサイクル企画1件（保存・表示・再生成の単位）
//! - JournalEntry: 保存済み企画に付けるメモ
//! - AnalysisResult: 1回の解析結果（永続化しない）
//! - IdeaResponse / GeneratedIdea: Idea Generatorのレスポンス形式

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// 難易度
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Beginner => "beginner",
            Difficulty::Intermediate => "intermediate",
            Difficulty::Advanced => "advanced",
        }
    }

    /// 表示用ラベル
    pub fn label(&self) -> &'static str {
        match self {
            Difficulty::Beginner => "初級",
            Difficulty::Intermediate => "中級",
            Difficulty::Advanced => "上級",
        }
    }
}

impl FromStr for Difficulty {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "beginner" => Ok(Difficulty::Beginner),
            "intermediate" => Ok(Difficulty::Intermediate),
            "advanced" => Ok(Difficulty::Advanced),
            _ => Err(Error::Validation(format!("不明な難易度: {}", s))),
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 画像生成の状態
///
/// idle → in-progress → {idle(画像あり), failed} の順にしか遷移しない。
/// 再生成リクエストだけが終端状態から in-progress に戻す。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum ImageGenerationState {
    #[default]
    Idle,
    InProgress,
    Failed { message: String },
}

impl ImageGenerationState {
    pub fn is_in_progress(&self) -> bool {
        matches!(self, ImageGenerationState::InProgress)
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            ImageGenerationState::Failed { message } => Some(message),
            _ => None,
        }
    }
}

/// 評価（👍/👎）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Feedback {
    #[default]
    #[serde(rename = "none")]
    Neutral,
    Up,
    Down,
}

/// ユーザーが押した評価ボタン
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vote {
    Up,
    Down,
}

impl Vote {
    pub fn as_feedback(self) -> Feedback {
        match self {
            Vote::Up => Feedback::Up,
            Vote::Down => Feedback::Down,
        }
    }
}

/// 保存済み企画に付けるメモ（追記のみ、変更しない）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalEntry {
    pub id: String,

    #[serde(default)]
    pub note: String,

    /// 写真（data URL）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_ref: Option<String>,

    pub timestamp: DateTime<Utc>,
}

/// アップサイクル企画
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRecord {
    /// クライアント側で採番。空文字は未採番
    #[serde(default)]
    pub id: String,

    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub materials_used: Vec<String>,

    #[serde(default)]
    pub difficulty: Difficulty,

    #[serde(default)]
    pub time_required: String,

    /// 手順（順序に意味がある）
    #[serde(default)]
    pub steps: Vec<String>,

    #[serde(default)]
    pub variations: Vec<String>,

    #[serde(default)]
    pub image_prompt: String,

    #[serde(default)]
    pub video_search_query: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_ref: Option<String>,

    #[serde(default)]
    pub image_generation: ImageGenerationState,

    #[serde(default)]
    pub feedback: Feedback,

    /// 古い順
    #[serde(default)]
    pub journal: Vec<JournalEntry>,
}

impl ProjectRecord {
    /// 画像生成開始（前回のエラーはクリア）
    pub fn begin_image_generation(&mut self) {
        self.image_generation = ImageGenerationState::InProgress;
    }

    /// 画像生成成功
    pub fn complete_image_generation(&mut self, image_ref: String) {
        self.image_ref = Some(image_ref);
        self.image_generation = ImageGenerationState::Idle;
    }

    /// 画像生成失敗
    pub fn fail_image_generation(&mut self, message: impl Into<String>) {
        self.image_generation = ImageGenerationState::Failed {
            message: message.into(),
        };
    }

    /// 否定例としてIdea Generatorに渡す要約
    pub fn negative_example(&self) -> NegativeExample {
        NegativeExample {
            name: self.name.clone(),
            description: self.description.clone(),
        }
    }
}

/// 引用元
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub uri: String,
    #[serde(default)]
    pub title: String,
}

/// 解析結果（永続化しない）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub identified_items: Vec<String>,
    pub project_ideas: Vec<ProjectRecord>,
    #[serde(default)]
    pub sources: Vec<Source>,
}

impl AnalysisResult {
    pub fn find(&self, id: &str) -> Option<&ProjectRecord> {
        self.project_ideas.iter().find(|p| p.id == id)
    }
}

/// 否定例（過去に👎した企画の名前と説明）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NegativeExample {
    pub name: String,
    pub description: String,
}

/// Idea Generatorに送る画像
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageInput {
    pub file_name: String,
    pub mime_type: String,
    /// Base64エンコード済みデータ
    pub data: String,
}

/// Idea Generatorへのリクエスト
#[derive(Debug, Clone, Default)]
pub struct IdeaRequest {
    pub images: Vec<ImageInput>,
    pub negative_examples: Vec<NegativeExample>,
}

/// Idea Generatorが返す企画1件（ワイヤ形式）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedIdea {
    pub project_name: String,
    pub description: String,
    pub materials_used: Vec<String>,
    pub difficulty: String,
    pub time_required: String,
    pub step_by_step_guide: Vec<String>,
    #[serde(default)]
    pub variations_and_alternatives: Vec<String>,
    pub ai_image_prompt: String,
    pub youtube_search_query: String,
}

impl GeneratedIdea {
    /// 採番済みIDを付けてProjectRecordに変換
    pub fn into_record(self, id: String) -> Result<ProjectRecord, Error> {
        let difficulty = self.difficulty.parse()?;
        Ok(ProjectRecord {
            id,
            name: self.project_name,
            description: self.description,
            materials_used: self.materials_used,
            difficulty,
            time_required: self.time_required,
            steps: self.step_by_step_guide,
            variations: self.variations_and_alternatives,
            image_prompt: self.ai_image_prompt,
            video_search_query: self.youtube_search_query,
            ..Default::default()
        })
    }
}

/// Idea Generatorのレスポンス（ワイヤ形式）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdeaResponse {
    pub identified_items: Vec<String>,
    pub project_ideas: Vec<GeneratedIdea>,
    #[serde(default)]
    pub sources: Vec<Source>,
}

/// チャットの発言者
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Model,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Model => "model",
        }
    }
}

/// チャットの1発言
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_idea() -> GeneratedIdea {
        GeneratedIdea {
            project_name: "Bottle Lamp".to_string(),
            description: "ペットボトルのランプ".to_string(),
            materials_used: vec!["plastic bottle".to_string(), "LED string".to_string()],
            difficulty: "Intermediate".to_string(),
            time_required: "1-2 hours".to_string(),
            step_by_step_guide: vec!["Clean".to_string(), "Cut".to_string(), "Assemble".to_string()],
            variations_and_alternatives: vec![],
            ai_image_prompt: "a lamp".to_string(),
            youtube_search_query: "bottle lamp diy".to_string(),
        }
    }

    #[test]
    fn test_difficulty_from_str_case_insensitive() {
        assert_eq!("beginner".parse::<Difficulty>().unwrap(), Difficulty::Beginner);
        assert_eq!(" Advanced ".parse::<Difficulty>().unwrap(), Difficulty::Advanced);
        assert!("expert".parse::<Difficulty>().is_err());
    }

    #[test]
    fn test_into_record_keeps_step_order() {
        let record = sample_idea().into_record("p1".to_string()).unwrap();
        assert_eq!(record.id, "p1");
        assert_eq!(record.name, "Bottle Lamp");
        assert_eq!(record.difficulty, Difficulty::Intermediate);
        assert_eq!(record.steps, vec!["Clean", "Cut", "Assemble"]);
        assert_eq!(record.image_generation, ImageGenerationState::Idle);
        assert_eq!(record.feedback, Feedback::Neutral);
        assert!(record.journal.is_empty());
        assert!(record.image_ref.is_none());
    }

    #[test]
    fn test_into_record_invalid_difficulty() {
        let mut idea = sample_idea();
        idea.difficulty = "impossible".to_string();
        let result = idea.into_record("p1".to_string());
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn test_image_generation_transitions() {
        let mut record = ProjectRecord::default();
        record.fail_image_generation("quota");
        assert_eq!(record.image_generation.error_message(), Some("quota"));

        // 再生成でエラーはクリアされる
        record.begin_image_generation();
        assert!(record.image_generation.is_in_progress());
        assert_eq!(record.image_generation.error_message(), None);

        record.complete_image_generation("data:image/png;base64,AAAA".to_string());
        assert_eq!(record.image_generation, ImageGenerationState::Idle);
        assert_eq!(record.image_ref.as_deref(), Some("data:image/png;base64,AAAA"));
    }

    #[test]
    fn test_project_record_serialize() {
        let record = ProjectRecord {
            id: "p1".to_string(),
            name: "Can Planter".to_string(),
            feedback: Feedback::Down,
            image_generation: ImageGenerationState::Failed {
                message: "blocked".to_string(),
            },
            ..Default::default()
        };

        let json = serde_json::to_string(&record).expect("シリアライズ失敗");
        assert!(json.contains("\"name\":\"Can Planter\""));
        assert!(json.contains("\"feedback\":\"down\""));
        assert!(json.contains("\"imageGeneration\":{\"status\":\"failed\",\"message\":\"blocked\"}"));
        assert!(!json.contains("imageRef"));
    }

    #[test]
    fn test_project_record_deserialize_missing_fields() {
        // 古い保存データ（idや状態が無い）でも読み込める
        let json = r#"{"name": "Old Project"}"#;
        let record: ProjectRecord = serde_json::from_str(json).expect("デシリアライズ失敗");
        assert_eq!(record.id, "");
        assert_eq!(record.feedback, Feedback::Neutral);
        assert_eq!(record.image_generation, ImageGenerationState::Idle);
        assert!(record.journal.is_empty());
    }

    #[test]
    fn test_feedback_neutral_serializes_as_none() {
        let json = serde_json::to_string(&Feedback::Neutral).unwrap();
        assert_eq!(json, "\"none\"");
        let parsed: Feedback = serde_json::from_str("\"none\"").unwrap();
        assert_eq!(parsed, Feedback::Neutral);
    }

    #[test]
    fn test_idea_response_variations_optional() {
        let json = r#"{
            "identified_items": ["can"],
            "project_ideas": [{
                "project_name": "Can Planter",
                "description": "d",
                "materials_used": ["can"],
                "difficulty": "beginner",
                "time_required": "30 min",
                "step_by_step_guide": ["wash"],
                "ai_image_prompt": "planter",
                "youtube_search_query": "can planter"
            }]
        }"#;
        let response: IdeaResponse = serde_json::from_str(json).expect("デシリアライズ失敗");
        assert_eq!(response.project_ideas.len(), 1);
        assert!(response.project_ideas[0].variations_and_alternatives.is_empty());
        assert!(response.sources.is_empty());
    }
}
