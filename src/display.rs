//! 端末表示用の整形

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::Url;
use std::fmt::Write as _;
use std::path::Path;
use upcycle_ai_common::data_url::is_data_url;
use upcycle_ai_common::{
    extract_base64_from_data_url, extract_mime_type_from_data_url, AnalysisResult, Feedback,
    ImageGenerationState, ProjectRecord,
};

use crate::error::{Result, UpcycleError};

const VIDEO_SEARCH_BASE: &str = "https://www.youtube.com/results";

/// 参考動画の検索URL
pub fn video_search_url(query: &str) -> Result<String> {
    let url = Url::parse_with_params(VIDEO_SEARCH_BASE, [("search_query", query)])
        .map_err(|e| UpcycleError::Unknown(e.to_string()))?;
    Ok(url.to_string())
}

fn feedback_mark(feedback: Feedback) -> &'static str {
    match feedback {
        Feedback::Up => " 👍",
        Feedback::Down => " 👎",
        Feedback::Neutral => "",
    }
}

/// 画像の状態を1行で
pub fn image_status(project: &ProjectRecord) -> String {
    match &project.image_generation {
        ImageGenerationState::InProgress => "生成中...".to_string(),
        ImageGenerationState::Failed { message } => format!("生成失敗: {}", message),
        ImageGenerationState::Idle => match &project.image_ref {
            Some(image_ref) if is_data_url(image_ref) => {
                let size = extract_base64_from_data_url(image_ref)
                    .map(|b| b.len() * 3 / 4 / 1024)
                    .unwrap_or(0);
                format!("生成済み ({}, 約{}KB)", extract_mime_type_from_data_url(image_ref), size)
            }
            Some(image_ref) => format!("生成済み ({})", image_ref),
            None => "未生成".to_string(),
        },
    }
}

/// 一覧用の1行表示
pub fn format_project_summary(project: &ProjectRecord) -> String {
    let short_id: String = project.id.chars().take(8).collect();
    format!(
        "[{}] {} ({} / {}){}",
        short_id,
        project.name,
        project.difficulty.label(),
        project.time_required,
        feedback_mark(project.feedback)
    )
}

/// 解析結果の表示
pub fn format_analysis(result: &AnalysisResult) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "認識した廃材: {}", result.identified_items.join(", "));
    let _ = writeln!(out, "\n企画案: {}件", result.project_ideas.len());
    for (i, project) in result.project_ideas.iter().enumerate() {
        let _ = writeln!(out, "  {}. {}", i + 1, format_project_summary(project));
        let _ = writeln!(out, "     画像: {}", image_status(project));
    }
    if !result.sources.is_empty() {
        let _ = writeln!(out, "\n参考:");
        for source in &result.sources {
            let _ = writeln!(out, "  - {} {}", source.title, source.uri);
        }
    }
    out
}

/// 詳細表示（ジャーナルは新しい順）
pub fn format_project_detail(project: &ProjectRecord) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "■ {}{}", project.name, feedback_mark(project.feedback));
    let _ = writeln!(out, "ID: {}", project.id);
    let _ = writeln!(out, "難易度: {}  所要時間: {}", project.difficulty.label(), project.time_required);
    let _ = writeln!(out, "\n{}", project.description);

    let _ = writeln!(out, "\n材料:");
    for material in &project.materials_used {
        let _ = writeln!(out, "  - {}", material);
    }

    let _ = writeln!(out, "\n手順:");
    for (i, step) in project.steps.iter().enumerate() {
        let _ = writeln!(out, "  {}. {}", i + 1, step);
    }

    if !project.variations.is_empty() {
        let _ = writeln!(out, "\nアレンジ:");
        for variation in &project.variations {
            let _ = writeln!(out, "  - {}", variation);
        }
    }

    let _ = writeln!(out, "\n画像: {}", image_status(project));
    if let Ok(url) = video_search_url(&project.video_search_query) {
        let _ = writeln!(out, "参考動画: {}", url);
    }

    if !project.journal.is_empty() {
        let _ = writeln!(out, "\nジャーナル ({}件):", project.journal.len());
        for entry in project.journal.iter().rev() {
            let photo = if entry.photo_ref.is_some() { " 📷" } else { "" };
            let _ = writeln!(
                out,
                "  {} {}{}",
                entry.timestamp.format("%Y-%m-%d %H:%M"),
                entry.note,
                photo
            );
        }
    }
    out
}

/// data URL の画像をファイルに書き出す
pub fn write_image(image_ref: &str, path: &Path) -> Result<()> {
    let data = extract_base64_from_data_url(image_ref)
        .ok_or_else(|| UpcycleError::Unknown("data URL ではない画像は保存できません".to_string()))?;
    let bytes = STANDARD
        .decode(data)
        .map_err(|e| UpcycleError::Unknown(format!("画像データの復号に失敗: {}", e)))?;
    std::fs::write(path, bytes)?;
    Ok(())
}
