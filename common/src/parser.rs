//! APIレスポンスパーサー
//!
//! Idea GeneratorのレスポンスからJSONを抽出し、
//! スキーマに沿っているか検証してからIdeaResponseにする

use crate::error::{Error, Result};
use crate::types::{Difficulty, IdeaResponse};

/// APIレスポンスからJSONオブジェクト部分を抽出
///
/// 抽出優先順位:
/// 1. ```json ... ``` ブロック
/// 2. 生の {...} オブジェクト
/// 3. エラー
///
/// # Examples
/// ```
/// use upcycle_ai_common::extract_json;
///
/// let response = "Result: {\"identified_items\": []}";
/// let json = extract_json(response).unwrap();
/// assert!(json.starts_with('{'));
/// ```
pub fn extract_json(response: &str) -> Result<&str> {
    if let Some(start_marker) = response.find("```json") {
        let start = start_marker + 7; // "```json" の長さ
        if let Some(end_offset) = response[start..].find("```") {
            let end = start + end_offset;
            return Ok(response[start..end].trim());
        }
    }

    if let Some(start) = response.find('{') {
        if let Some(end) = response.rfind('}') {
            if end >= start {
                return Ok(&response[start..=end]);
            }
        }
    }

    Err(Error::Parse("JSONが見つかりません".into()))
}

/// Idea Generatorのレスポンスをパース
///
/// 必須フィールドの欠落や難易度の不正値はエラーにする。
/// identified_items が空かどうかは呼び出し側が判定する。
pub fn parse_idea_response(response: &str) -> Result<IdeaResponse> {
    let json_str = extract_json(response)?;
    let parsed: IdeaResponse = serde_json::from_str(json_str.trim())
        .map_err(|e| Error::Parse(format!("企画JSONパースエラー: {}", e)))?;

    for (i, idea) in parsed.project_ideas.iter().enumerate() {
        if idea.project_name.trim().is_empty() {
            return Err(Error::Validation(format!("企画{}: project_name が空です", i + 1)));
        }
        idea.difficulty.parse::<Difficulty>()?;
    }

    Ok(parsed)
}
