//! プロンプト生成モジュール
//!
//! - ANALYSIS_PROMPT: 廃材画像の解析用プロンプト
//! - build_analysis_prompt: 否定例を付けた解析用プロンプト
//! - build_project_chat_instruction: 企画ごとのチャット用システム指示

use crate::types::{NegativeExample, ProjectRecord};

/// 解析用の基本プロンプト
pub const ANALYSIS_PROMPT: &str = r#"You are an eco-friendly upcycling expert. Analyze every attached photo of waste items and propose DIY upcycling projects.

Rules:
1. Identify every waste item that could be reused (bottles, cans, cardboard, fabric scraps, jars...).
2. Propose 2-3 distinct, practical project ideas.
3. When several items were identified, prefer ideas that combine them; otherwise give ideas for single items.
4. Every idea needs a complete step-by-step guide a beginner can follow.
5. Give 1-2 alternative materials or design variations per idea in "variations_and_alternatives".
6. Return ONLY one JSON object, with no text or markdown around it.

JSON schema:
{
  "identified_items": ["item", ...],
  "project_ideas": [
    {
      "project_name": "Name of the project",
      "description": "Short description of the finished piece",
      "materials_used": ["waste item from the photo", "household item such as glue"],
      "difficulty": "beginner | intermediate | advanced",
      "time_required": "e.g. 1-2 hours",
      "step_by_step_guide": ["Step 1: ...", "Step 2: ..."],
      "variations_and_alternatives": ["..."],
      "ai_image_prompt": "Detailed prompt for an image generator showing the finished project, with professional product photography keywords",
      "youtube_search_query": "Concrete YouTube search query that names the recycled item, e.g. 'how to make a bird feeder out of a plastic bottle'"
    }
  ]
}

If the photos are unclear or contain nothing recognizable, return {"identified_items": [], "project_ideas": []}."#;

/// 全体チャットのシステム指示
pub const GENERAL_CHAT_INSTRUCTION: &str = "You are Upcycle AI, a friendly and creative assistant who helps people with upcycling, recycling and DIY projects. Keep answers concise and helpful. Use markdown when it helps.";

/// 全体チャットの最初の挨拶（表示用のみ）
pub const GENERAL_CHAT_GREETING: &str = "こんにちは！アップサイクルについて何でも聞いてください。";

/// 解析用プロンプト生成
///
/// # Arguments
/// * `negatives` - 過去に👎された企画。同じ企画を再提案させないために使う
pub fn build_analysis_prompt(negatives: &[NegativeExample]) -> String {
    if negatives.is_empty() {
        return ANALYSIS_PROMPT.to_string();
    }

    let list = negatives
        .iter()
        .map(|n| format!("- {}: {}", n.name, n.description))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "{ANALYSIS_PROMPT}\n\nThe user disliked the following ideas before. Do NOT suggest them or close variants again:\n{list}"
    )
}

/// 企画チャットのシステム指示生成
pub fn build_project_chat_instruction(project: &ProjectRecord) -> String {
    let steps = project
        .steps
        .iter()
        .enumerate()
        .map(|(i, s)| format!("Step {}: {}", i + 1, s))
        .collect::<Vec<_>>()
        .join(" ");

    format!(
        r#"You are a helpful DIY assistant advising on the project "{name}".
Project description: "{description}".
Materials needed: {materials}.
Step-by-step guide: {steps}
Answer the user's questions about this project. Be encouraging and give clear, actionable advice. Use markdown when it helps."#,
        name = project.name,
        description = project.description,
        materials = project.materials_used.join(", "),
    )
}

/// 企画チャットの最初の挨拶（表示用のみ）
pub fn build_project_chat_greeting(project: &ProjectRecord) -> String {
    format!("「{}」について何でも質問してください。", project.name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_analysis_prompt_without_negatives() {
        let prompt = build_analysis_prompt(&[]);
        assert_eq!(prompt, ANALYSIS_PROMPT);
        assert!(!prompt.contains("disliked"));
    }

    #[test]
    fn test_build_analysis_prompt_with_negatives() {
        let negatives = vec![
            NegativeExample {
                name: "Bottle Lamp".to_string(),
                description: "A lamp".to_string(),
            },
            NegativeExample {
                name: "Can Planter".to_string(),
                description: "A planter".to_string(),
            },
        ];
        let prompt = build_analysis_prompt(&negatives);
        assert!(prompt.starts_with(ANALYSIS_PROMPT));
        assert!(prompt.contains("- Bottle Lamp: A lamp"));
        assert!(prompt.contains("- Can Planter: A planter"));
    }

    #[test]
    fn test_build_project_chat_instruction() {
        let project = ProjectRecord {
            name: "Bottle Lamp".to_string(),
            description: "A lamp".to_string(),
            materials_used: vec!["bottle".to_string(), "LED".to_string()],
            steps: vec!["Clean".to_string(), "Assemble".to_string()],
            ..Default::default()
        };
        let instruction = build_project_chat_instruction(&project);
        assert!(instruction.contains("\"Bottle Lamp\""));
        assert!(instruction.contains("Materials needed: bottle, LED."));
        assert!(instruction.contains("Step 1: Clean Step 2: Assemble"));
    }
}
