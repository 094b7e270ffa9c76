use anyhow::{Context, Result};
use clap::Parser;
use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use upcycle_ai::chat::Conversation;
use upcycle_ai::cli::{Cli, Commands};
use upcycle_ai::config::{Config, API_KEY_ENV};
use upcycle_ai::gemini::GeminiClient;
use upcycle_ai::storage::FileStorage;
use upcycle_ai::{display, scanner, session, ProjectStore};

fn init_tracing(verbose: bool) {
    let default = if verbose { "upcycle_ai=debug,info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .init();
}

fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = Config::load().context("設定の読み込みに失敗しました")?;
    let storage_dir = config.storage_dir()?;
    tracing::debug!(dir = %storage_dir.display(), "保存先");

    let client = Arc::new(GeminiClient::new(&config)?);
    let store = ProjectStore::open(
        Arc::new(FileStorage::new(&storage_dir)),
        client.clone(),
        client.clone(),
    )
    .context("保存データの読み込みに失敗しました")?;

    if let Some(key) = Config::env_api_key() {
        store.override_credential(key);
    }
    store.set_auto_generate_first_image(config.auto_generate_first_image);

    match cli.command {
        Commands::Analyze { paths, no_image, no_interactive } => {
            println!("♻ upcycle-ai - 写真解析\n");

            println!("[1/2] 画像を読み込み中...");
            let images = scanner::load_images(&paths)?;
            println!("✔ {}枚の画像を読み込みました\n", images.len());

            if no_image {
                store.set_auto_generate_first_image(false);
            }

            println!("[2/2] AI解析中...");
            let pb = spinner("企画を考えています...");
            let result = if no_interactive {
                store.start_analysis(images).await
            } else {
                let store_ref = &store;
                session::with_credential_retry(store_ref, move || {
                    store_ref.start_analysis(images.clone())
                })
                .await
            };
            pb.finish_and_clear();
            let result = result?;
            println!("✔ 解析完了\n");
            println!("{}", display::format_analysis(&result));

            if !no_interactive {
                session::run_analysis_session(&store, client.as_ref()).await?;
            }

            if store.pending_background() > 0 {
                let pb = spinner("画像生成の完了を待っています...");
                store.wait_for_background().await;
                pb.finish_and_clear();
            }

            if no_interactive {
                if let Some(first) = store.analysis_result().and_then(|a| a.project_ideas.first().cloned()) {
                    println!("1件目の画像: {}", display::image_status(&first));
                }
            }
        }

        Commands::List => {
            let saved = store.saved_projects();
            if saved.is_empty() {
                println!("保存済みの企画はありません");
            } else {
                println!("保存済みの企画: {}件", saved.len());
                for project in &saved {
                    println!("  {}", display::format_project_summary(project));
                }
            }
        }

        Commands::Show { id } => {
            let id = store.resolve_saved_id(&id)?;
            let project = store.select_project(&id)?;
            println!("{}", display::format_project_detail(&project));
        }

        Commands::Delete { id, yes } => {
            let id = store.resolve_saved_id(&id)?;
            let project = store.select_project(&id)?;
            let confirmed = yes
                || Confirm::new()
                    .with_prompt(format!("「{}」を削除しますか？", project.name))
                    .default(false)
                    .interact()?;
            if !confirmed {
                store.clear_selection();
                println!("キャンセルしました");
            } else if store.delete_project(&id)? {
                println!("✔ 削除しました: {}", project.name);
            }
        }

        Commands::Image { id, output } => {
            let id = store.resolve_saved_id(&id)?;
            let store_ref = &store;
            let id_ref = id.as_str();
            let pb = spinner("画像を生成しています...");
            let result = session::with_credential_retry(store_ref, move || {
                store_ref.regenerate_image(id_ref)
            })
            .await;
            pb.finish_and_clear();
            result?;

            let project = store.select_project(&id)?;
            println!("✔ 画像: {}", display::image_status(&project));
            if let (Some(path), Some(image_ref)) = (output, project.image_ref.as_deref()) {
                display::write_image(image_ref, &path)?;
                println!("✔ 画像を保存: {}", path.display());
            }
        }

        Commands::Journal { id, note, photo } => {
            let id = store.resolve_saved_id(&id)?;
            let photo_ref = photo.as_deref().map(scanner::photo_data_url).transpose()?;
            let entry = store.add_journal_entry(&id, note.as_deref().unwrap_or(""), photo_ref)?;
            println!(
                "✔ ジャーナルに追記しました ({})",
                entry.timestamp.format("%Y-%m-%d %H:%M")
            );
        }

        Commands::Chat { id } => match id {
            Some(id) => {
                let id = store.resolve_saved_id(&id)?;
                let project = store.select_project(&id)?;
                session::run_project_chat(&store, client.as_ref(), &project).await?;
            }
            None => {
                let mut conversation = Conversation::general();
                session::run_chat(&store, client.as_ref(), &mut conversation).await?;
            }
        },

        Commands::Disliked { clear } => {
            if clear {
                let count = store.clear_disliked()?;
                println!("✔ 👎一覧を空にしました ({}件)", count);
            } else {
                let disliked = store.disliked_projects();
                if disliked.is_empty() {
                    println!("👎した企画はありません");
                } else {
                    println!("👎した企画（次回の提案から除外）: {}件", disliked.len());
                    for project in &disliked {
                        println!("  - {}", project.name);
                    }
                }
            }
        }

        Commands::Config { set_api_key, clear_api_key, show } => {
            if let Some(key) = set_api_key {
                store.set_credential(&key)?;
                println!("✔ APIキーを設定しました");
            }

            if clear_api_key {
                store.clear_credential()?;
                println!("✔ APIキーを削除しました");
            }

            if show {
                let key_status = if Config::env_api_key().is_some() {
                    format!("環境変数 {} を使用", API_KEY_ENV)
                } else if store.credential().is_some() {
                    "設定済み".to_string()
                } else {
                    "未設定".to_string()
                };
                println!("設定:");
                println!("  設定ファイル: {}", Config::config_path()?.display());
                println!("  保存先: {}", storage_dir.display());
                println!("  解析モデル: {}", config.analysis_model);
                println!("  画像モデル: {}", config.image_model);
                println!("  チャットモデル: {}", config.chat_model);
                println!("  タイムアウト: {}秒", config.timeout_seconds);
                println!("  1件目の画像を自動生成: {}", if config.auto_generate_first_image { "する" } else { "しない" });
                println!("  APIキー: {}", key_status);
            }
        }
    }

    Ok(())
}
