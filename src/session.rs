//! 対話モード
//!
//! 解析結果の企画を選んで保存・評価・画像生成・チャットを行う。

use dialoguer::{Input, Password, Select};
use std::future::Future;
use std::io::Write;
use upcycle_ai_common::{Feedback, ProjectRecord, Vote};

use crate::chat::Conversation;
use crate::display::{format_project_detail, format_project_summary, image_status};
use crate::error::{Result, UpcycleError};
use crate::provider::ChatBackend;
use crate::store::ProjectStore;

/// 企画ごとの操作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectAction {
    Detail,
    Save,
    Like,
    Dislike,
    GenerateImage,
    Chat,
    Back,
}

impl ProjectAction {
    pub const ALL: [ProjectAction; 7] = [
        ProjectAction::Detail,
        ProjectAction::Save,
        ProjectAction::Like,
        ProjectAction::Dislike,
        ProjectAction::GenerateImage,
        ProjectAction::Chat,
        ProjectAction::Back,
    ];

    pub fn label(&self, saved: bool) -> &'static str {
        match self {
            ProjectAction::Detail => "詳細を表示",
            ProjectAction::Save if saved => "保存済み",
            ProjectAction::Save => "保存する",
            ProjectAction::Like => "👍 いいね",
            ProjectAction::Dislike => "👎 よくない",
            ProjectAction::GenerateImage => "画像を生成",
            ProjectAction::Chat => "この企画について相談",
            ProjectAction::Back => "戻る",
        }
    }
}

/// チャット入力の終了判定
pub fn is_exit_command(input: &str) -> bool {
    matches!(input.trim(), "" | "/q" | "/quit" | "/exit")
}

/// APIキーを尋ねて保存する
pub fn prompt_credential(store: &ProjectStore) -> Result<()> {
    let key: String = Password::new()
        .with_prompt("Gemini APIキー")
        .interact()?;
    store.set_credential(&key)?;
    println!("✔ APIキーを保存しました");
    Ok(())
}

/// キーが無い・無効な場合は入力し直して1回だけ再試行
pub async fn with_credential_retry<T, F, Fut>(store: &ProjectStore, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    match op().await {
        Err(e @ (UpcycleError::InvalidApiKey | UpcycleError::MissingApiKey)) => {
            println!("⚠ {}", e);
            prompt_credential(store)?;
            op().await
        }
        other => other,
    }
}

/// 解析結果の対話メニュー
pub async fn run_analysis_session(store: &ProjectStore, chat: &dyn ChatBackend) -> Result<()> {
    loop {
        let Some(analysis) = store.analysis_result() else {
            return Ok(());
        };

        let mut items: Vec<String> = analysis
            .project_ideas
            .iter()
            .map(|p| format!("{}  [画像: {}]", format_project_summary(p), image_status(p)))
            .collect();
        items.push("終了".to_string());

        let selection = Select::new()
            .with_prompt("企画を選択")
            .items(&items)
            .default(0)
            .interact()?;

        let Some(project) = analysis.project_ideas.get(selection) else {
            return Ok(());
        };
        run_project_menu(store, chat, &project.id).await?;
    }
}

async fn run_project_menu(store: &ProjectStore, chat: &dyn ChatBackend, id: &str) -> Result<()> {
    loop {
        let Some(project) = store.analysis_result().and_then(|a| a.find(id).cloned()) else {
            return Ok(());
        };
        let saved = store.is_saved(&project.name);

        println!("\n{}", format_project_summary(&project));
        let labels: Vec<&str> = ProjectAction::ALL.iter().map(|a| a.label(saved)).collect();
        let selection = Select::new()
            .with_prompt("操作")
            .items(&labels)
            .default(0)
            .interact()?;

        match ProjectAction::ALL[selection] {
            ProjectAction::Detail => println!("\n{}", format_project_detail(&project)),
            ProjectAction::Save => {
                if store.save_project(project.clone())? {
                    println!("✔ 保存しました: {}", project.name);
                } else {
                    println!("既に保存済みです: {}", project.name);
                }
            }
            ProjectAction::Like => report_feedback(store, id, Vote::Up)?,
            ProjectAction::Dislike => report_feedback(store, id, Vote::Down)?,
            ProjectAction::GenerateImage => {
                println!("画像を生成中...");
                let result = with_credential_retry(store, move || store.regenerate_image(id)).await;
                match result {
                    Ok(()) => println!("✔ 画像を生成しました"),
                    Err(e) => println!("⚠ {}", e),
                }
            }
            ProjectAction::Chat => {
                let mut conversation = Conversation::for_project(&project);
                run_chat(store, chat, &mut conversation).await?;
            }
            ProjectAction::Back => return Ok(()),
        }
    }
}

fn report_feedback(store: &ProjectStore, id: &str, vote: Vote) -> Result<()> {
    let message = match store.set_feedback(id, vote)? {
        Feedback::Up => "👍 を付けました",
        Feedback::Down => "👎 を付けました（次回の提案から除外されます）",
        Feedback::Neutral => "評価を解除しました",
    };
    println!("{}", message);
    Ok(())
}

/// チャットのループ（空行か /q で終了）
pub async fn run_chat(
    store: &ProjectStore,
    backend: &dyn ChatBackend,
    conversation: &mut Conversation,
) -> Result<()> {
    println!("\n🤖 {}", conversation.greeting());
    println!("（空行または /q で終了）");

    loop {
        let message: String = Input::new()
            .with_prompt("あなた")
            .allow_empty(true)
            .interact_text()?;
        if is_exit_command(&message) {
            return Ok(());
        }

        let mut result = send_streaming(store, backend, conversation, &message).await;
        if let Err(e @ (UpcycleError::InvalidApiKey | UpcycleError::MissingApiKey)) = &result {
            println!("⚠ {}", e);
            prompt_credential(store)?;
            result = send_streaming(store, backend, conversation, &message).await;
        }
        println!();

        if let Err(e) = result {
            println!("⚠ {}", e);
        }
    }
}

async fn send_streaming(
    store: &ProjectStore,
    backend: &dyn ChatBackend,
    conversation: &mut Conversation,
    message: &str,
) -> Result<String> {
    print!("🤖 ");
    let _ = std::io::stdout().flush();
    let credential = store.credential();
    conversation
        .send(backend, credential.as_deref(), message, |delta| {
            print!("{}", delta);
            let _ = std::io::stdout().flush();
        })
        .await
}

/// 保存済み企画を読み込んで企画チャットを始める
pub async fn run_project_chat(
    store: &ProjectStore,
    backend: &dyn ChatBackend,
    project: &ProjectRecord,
) -> Result<()> {
    let mut conversation = Conversation::for_project(project);
    run_chat(store, backend, &mut conversation).await
}
