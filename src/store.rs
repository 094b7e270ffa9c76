//! プロジェクトストア
//!
//! 解析結果・保存済み一覧・表示中の3つのビューと👎一覧を所有し、
//! 非同期の画像生成や評価・ジャーナル追記の結果を、IDを持つ全コピーへ反映する。
//!
//! ロックは状態更新の間だけ取り、外部呼び出しの await をまたいで保持しない。
//! 同じIDへの画像生成を同時に複数走らせた場合は、後に完了した方の結果が残る。

use chrono::Utc;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use upcycle_ai_common::sync::{self, ProjectCollections};
use upcycle_ai_common::{
    AnalysisResult, Feedback, IdeaRequest, ImageInput, JournalEntry, NegativeExample, ProjectRecord,
    Vote,
};

use crate::error::{Result, UpcycleError};
use crate::provider::{IdeaGenerator, ImageRenderer};
use crate::storage::{
    load_json, save_json, Persistence, API_KEY_KEY, DISLIKED_PROJECTS_KEY, SAVED_PROJECTS_KEY,
};

/// 生成中のまま保存されていた企画に付けるメッセージ
pub const INTERRUPTED_MESSAGE: &str = "画像生成が中断されました。再生成してください";

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[derive(Default)]
struct StoreState {
    collections: ProjectCollections,
    disliked: Vec<ProjectRecord>,
    credential: Option<String>,
}

struct Inner {
    state: Mutex<StoreState>,
    persistence: Arc<dyn Persistence>,
    generator: Arc<dyn IdeaGenerator>,
    renderer: Arc<dyn ImageRenderer>,
    background: Mutex<Vec<JoinHandle<()>>>,
    auto_generate_first_image: AtomicBool,
}

/// プロジェクトストア（clone は同じ状態を共有する）
#[derive(Clone)]
pub struct ProjectStore {
    inner: Arc<Inner>,
}

impl ProjectStore {
    /// 保存データを読み込んでストアを作る
    ///
    /// キーが無い・壊れている場合は空のコレクション / キー無しとして扱う。
    pub fn open(
        persistence: Arc<dyn Persistence>,
        generator: Arc<dyn IdeaGenerator>,
        renderer: Arc<dyn ImageRenderer>,
    ) -> Result<Self> {
        let mut saved: Vec<ProjectRecord> =
            load_json(persistence.as_ref(), SAVED_PROJECTS_KEY)?.unwrap_or_default();

        let mut repaired = false;
        for project in &mut saved {
            if project.id.is_empty() {
                project.id = new_id();
                repaired = true;
            }
            // 前回の実行中に終わらなかった生成は再開できない
            if project.image_generation.is_in_progress() {
                project.fail_image_generation(INTERRUPTED_MESSAGE);
                repaired = true;
            }
        }
        if repaired {
            save_json(persistence.as_ref(), SAVED_PROJECTS_KEY, &saved)?;
        }

        let disliked: Vec<ProjectRecord> =
            load_json(persistence.as_ref(), DISLIKED_PROJECTS_KEY)?.unwrap_or_default();
        let credential: Option<String> = load_json::<String>(persistence.as_ref(), API_KEY_KEY)?
            .filter(|key| !key.trim().is_empty());

        tracing::debug!(saved = saved.len(), disliked = disliked.len(), "保存データを読み込みました");

        let state = StoreState {
            collections: ProjectCollections {
                saved,
                ..Default::default()
            },
            disliked,
            credential,
        };

        Ok(Self {
            inner: Arc::new(Inner {
                state: Mutex::new(state),
                persistence,
                generator,
                renderer,
                background: Mutex::new(Vec::new()),
                auto_generate_first_image: AtomicBool::new(true),
            }),
        })
    }

    /// 解析直後の1件目の自動画像生成を切り替える
    pub fn set_auto_generate_first_image(&self, enabled: bool) {
        self.inner
            .auto_generate_first_image
            .store(enabled, Ordering::Relaxed);
    }

    // =============================================
    // 参照
    // =============================================

    pub fn analysis_result(&self) -> Option<AnalysisResult> {
        self.inner.state.lock().collections.analysis.clone()
    }

    pub fn saved_projects(&self) -> Vec<ProjectRecord> {
        self.inner.state.lock().collections.saved.clone()
    }

    pub fn disliked_projects(&self) -> Vec<ProjectRecord> {
        self.inner.state.lock().disliked.clone()
    }

    pub fn selected_project(&self) -> Option<ProjectRecord> {
        self.inner.state.lock().collections.selected.clone()
    }

    /// 次の解析に渡す否定例
    pub fn negative_examples(&self) -> Vec<NegativeExample> {
        sync::negative_examples(&self.inner.state.lock().disliked)
    }

    /// 3つのビューのスナップショット
    pub fn collections(&self) -> ProjectCollections {
        self.inner.state.lock().collections.clone()
    }

    /// 同名の企画が保存済みか
    pub fn is_saved(&self, name: &str) -> bool {
        self.inner
            .state
            .lock()
            .collections
            .saved
            .iter()
            .any(|p| p.name == name)
    }

    /// 保存済み企画のIDを前方一致で解決
    pub fn resolve_saved_id(&self, prefix: &str) -> Result<String> {
        let state = self.inner.state.lock();
        if let Some(p) = state.collections.saved.iter().find(|p| p.id == prefix) {
            return Ok(p.id.clone());
        }
        let matches: Vec<&ProjectRecord> = state
            .collections
            .saved
            .iter()
            .filter(|p| !prefix.is_empty() && p.id.starts_with(prefix))
            .collect();
        match matches.as_slice() {
            [only] => Ok(only.id.clone()),
            [] => Err(UpcycleError::ProjectNotFound(prefix.to_string())),
            _ => Err(UpcycleError::ProjectNotFound(format!(
                "{} (複数の企画に一致します)",
                prefix
            ))),
        }
    }

    // =============================================
    // APIキー
    // =============================================

    pub fn credential(&self) -> Option<String> {
        self.inner.state.lock().credential.clone()
    }

    /// APIキーを設定して保存
    pub fn set_credential(&self, key: &str) -> Result<()> {
        let key = key.trim().to_string();
        if key.is_empty() {
            return Err(UpcycleError::MissingApiKey);
        }
        save_json(self.inner.persistence.as_ref(), API_KEY_KEY, &key)?;
        self.inner.state.lock().credential = Some(key);
        Ok(())
    }

    /// このプロセスだけAPIキーを差し替える（保存しない）
    pub fn override_credential(&self, key: String) {
        self.inner.state.lock().credential = Some(key);
    }

    pub fn clear_credential(&self) -> Result<()> {
        self.inner.persistence.remove(API_KEY_KEY)?;
        self.inner.state.lock().credential = None;
        Ok(())
    }

    // =============================================
    // 解析
    // =============================================

    /// 画像を解析して企画案を得る
    ///
    /// 成功時は全企画に新しいIDを採番して解析結果を丸ごと置き換え、
    /// 1件目の画像生成をバックグラウンドで開始する（失敗しても解析は成功のまま）。
    /// 失敗時は解析結果は空（None）のままになる。
    pub async fn start_analysis(&self, images: Vec<ImageInput>) -> Result<AnalysisResult> {
        if images.is_empty() {
            return Err(UpcycleError::NoInputSelected);
        }

        let (credential, negative_examples) = {
            let mut state = self.inner.state.lock();
            let credential = state.credential.clone().ok_or(UpcycleError::MissingApiKey)?;
            state.collections.analysis = None;
            (credential, sync::negative_examples(&state.disliked))
        };

        let request = IdeaRequest {
            images,
            negative_examples,
        };
        tracing::info!(
            images = request.images.len(),
            negatives = request.negative_examples.len(),
            "解析開始"
        );

        let response = self
            .inner
            .generator
            .generate_ideas(&credential, &request)
            .await?;

        if response.identified_items.is_empty() {
            return Err(UpcycleError::NoItemsIdentified);
        }

        let result = sync::materialize_ideas(response, new_id)?;
        let first = result
            .project_ideas
            .first()
            .map(|p| (p.id.clone(), p.image_prompt.clone()));
        tracing::info!(
            items = result.identified_items.len(),
            ideas = result.project_ideas.len(),
            "解析完了"
        );

        self.inner.state.lock().collections.analysis = Some(result);

        if self.inner.auto_generate_first_image.load(Ordering::Relaxed) {
            if let Some((id, prompt)) = first {
                self.spawn_image_generation(id, prompt);
            }
        }

        self.analysis_result()
            .ok_or_else(|| UpcycleError::Unknown("解析結果が見つかりません".to_string()))
    }

    // =============================================
    // 画像生成
    // =============================================

    /// 画像を生成し、IDを持つ全コピーに結果を反映する
    ///
    /// 生成中への切り替えは呼び出し前に同期的に反映される。
    /// 生成に失敗した場合はその企画だけ failed にして、分類済みのエラーを返す。
    pub async fn generate_image(&self, id: &str, prompt: &str) -> Result<()> {
        self.begin_image_generation(id)?;
        self.finish_image_generation(id, prompt).await
    }

    /// 企画自身の画像プロンプトで再生成
    pub async fn regenerate_image(&self, id: &str) -> Result<()> {
        let prompt = {
            let state = self.inner.state.lock();
            state
                .collections
                .find(id)
                .map(|p| p.image_prompt.clone())
                .ok_or_else(|| UpcycleError::ProjectNotFound(id.to_string()))?
        };
        self.generate_image(id, &prompt).await
    }

    /// バックグラウンドで生成を開始（生成中の反映は即時）
    fn spawn_image_generation(&self, id: String, prompt: String) {
        if let Err(e) = self.begin_image_generation(&id) {
            tracing::warn!(id = %id, error = %e, "画像生成を開始できません");
            return;
        }

        let store = self.clone();
        let handle = tokio::spawn(async move {
            if let Err(e) = store.finish_image_generation(&id, &prompt).await {
                tracing::warn!(id = %id, error = %e, "自動画像生成に失敗しました");
            }
        });
        let mut background = self.inner.background.lock();
        background.retain(|h| !h.is_finished());
        background.push(handle);
    }

    /// 実行中のバックグラウンド画像生成の数（終わったものはここで捨てる）
    pub fn pending_background(&self) -> usize {
        let mut background = self.inner.background.lock();
        background.retain(|h| !h.is_finished());
        background.len()
    }

    fn begin_image_generation(&self, id: &str) -> Result<()> {
        let mut state = self.inner.state.lock();
        if !state.collections.contains(id) {
            return Err(UpcycleError::ProjectNotFound(id.to_string()));
        }

        let touched = state
            .collections
            .apply_update_everywhere(id, ProjectRecord::begin_image_generation);
        tracing::debug!(id, ?touched, "画像生成開始");

        // 完了・失敗時にもう一度保存するので、ここでの失敗で生成を止めない
        if touched.saved {
            if let Err(e) = self.persist_saved(&state) {
                tracing::warn!(id, error = %e, "生成中の状態を保存できませんでした");
            }
        }
        Ok(())
    }

    async fn finish_image_generation(&self, id: &str, prompt: &str) -> Result<()> {
        let credential = self.inner.state.lock().credential.clone();

        let outcome = self
            .inner
            .renderer
            .render_image(credential.as_deref(), prompt)
            .await;

        let mut guard = self.inner.state.lock();
        let state = &mut *guard;
        let (touched, result) = match outcome {
            Ok(image_ref) => {
                let touched = state
                    .collections
                    .apply_update_everywhere(id, |p| p.complete_image_generation(image_ref.clone()));
                tracing::info!(id, "画像生成完了");
                (touched, Ok(()))
            }
            Err(e) => {
                let message = e.to_string();
                let touched = state
                    .collections
                    .apply_update_everywhere(id, |p| p.fail_image_generation(message.clone()));
                tracing::warn!(id, error = %message, "画像生成失敗");
                (touched, Err(e))
            }
        };

        let persisted = if touched.saved {
            self.persist_saved(state)
        } else {
            Ok(())
        };
        result.and(persisted)
    }

    /// バックグラウンドの画像生成がすべて終わるまで待つ
    pub async fn wait_for_background(&self) {
        loop {
            let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.inner.background.lock());
            if handles.is_empty() {
                break;
            }
            for handle in handles {
                if let Err(e) = handle.await {
                    tracing::warn!(error = %e, "バックグラウンド処理が異常終了しました");
                }
            }
        }
    }

    // =============================================
    // 保存・削除・表示
    // =============================================

    /// 企画を保存（同名が既にあれば何もせず false）
    pub fn save_project(&self, record: ProjectRecord) -> Result<bool> {
        let mut state = self.inner.state.lock();
        let previous = state.collections.clone();
        let name = record.name.clone();
        let added = sync::save_by_name(&mut state.collections.saved, record, new_id);
        if added {
            self.commit_saved(&mut state, previous)?;
            tracing::info!(name = %name, "企画を保存しました");
        }
        Ok(added)
    }

    /// 保存済み企画を削除（表示中なら表示も閉じる）
    pub fn delete_project(&self, id: &str) -> Result<bool> {
        let mut state = self.inner.state.lock();
        let previous = state.collections.clone();
        let removed = state.collections.delete_saved(id);
        if removed {
            self.commit_saved(&mut state, previous)?;
            tracing::info!(id, "企画を削除しました");
        }
        Ok(removed)
    }

    /// 企画を詳細表示に開く（保存済みのコピーを優先）
    pub fn select_project(&self, id: &str) -> Result<ProjectRecord> {
        let mut state = self.inner.state.lock();
        let record = state
            .collections
            .find(id)
            .cloned()
            .ok_or_else(|| UpcycleError::ProjectNotFound(id.to_string()))?;
        state.collections.selected = Some(record.clone());
        Ok(record)
    }

    pub fn clear_selection(&self) {
        self.inner.state.lock().collections.selected = None;
    }

    // =============================================
    // 評価
    // =============================================

    /// 解析結果の企画に評価を付ける（同じ評価2回で解除）
    ///
    /// 結果が Down なら👎一覧に追加、それ以外なら👎一覧から外す。
    pub fn set_feedback(&self, id: &str, vote: Vote) -> Result<Feedback> {
        let mut guard = self.inner.state.lock();
        let state = &mut *guard;

        let previous_disliked = state.disliked.clone();
        let previous_feedback;
        let snapshot = {
            let record = state
                .collections
                .analysis
                .as_mut()
                .and_then(|a| a.project_ideas.iter_mut().find(|p| p.id == id))
                .ok_or_else(|| UpcycleError::ProjectNotFound(id.to_string()))?;
            previous_feedback = record.feedback;
            record.feedback = sync::toggle_feedback(record.feedback, vote);
            record.clone()
        };

        if sync::sync_disliked(&mut state.disliked, &snapshot) {
            if let Err(e) = save_json(
                self.inner.persistence.as_ref(),
                DISLIKED_PROJECTS_KEY,
                &state.disliked,
            ) {
                tracing::warn!(id, error = %e, "👎一覧を保存できないため評価を戻します");
                state.disliked = previous_disliked;
                if let Some(record) = state
                    .collections
                    .analysis
                    .as_mut()
                    .and_then(|a| a.project_ideas.iter_mut().find(|p| p.id == id))
                {
                    record.feedback = previous_feedback;
                }
                return Err(e);
            }
        }

        tracing::debug!(id, feedback = ?snapshot.feedback, "評価を更新しました");
        Ok(snapshot.feedback)
    }

    /// 👎一覧を空にする（解析結果の👎も解除）
    pub fn clear_disliked(&self) -> Result<usize> {
        let mut guard = self.inner.state.lock();
        let state = &mut *guard;
        let count = state.disliked.len();
        save_json(
            self.inner.persistence.as_ref(),
            DISLIKED_PROJECTS_KEY,
            &Vec::<ProjectRecord>::new(),
        )?;
        state.disliked.clear();
        if let Some(analysis) = state.collections.analysis.as_mut() {
            for p in analysis
                .project_ideas
                .iter_mut()
                .filter(|p| p.feedback == Feedback::Down)
            {
                p.feedback = Feedback::Neutral;
            }
        }
        Ok(count)
    }

    // =============================================
    // ジャーナル
    // =============================================

    /// 保存済み企画にメモを追記（表示中ならそちらにも反映）
    pub fn add_journal_entry(
        &self,
        id: &str,
        note: &str,
        photo_ref: Option<String>,
    ) -> Result<JournalEntry> {
        let note = note.trim();
        if note.is_empty() && photo_ref.is_none() {
            return Err(UpcycleError::EmptyJournalEntry);
        }

        let mut state = self.inner.state.lock();
        let project = state
            .collections
            .saved
            .iter()
            .find(|p| p.id == id)
            .ok_or_else(|| UpcycleError::ProjectNotFound(id.to_string()))?;

        let entry = JournalEntry {
            id: new_id(),
            note: note.to_string(),
            photo_ref,
            timestamp: sync::next_journal_timestamp(&project.journal, Utc::now()),
        };

        let previous = state.collections.clone();
        state.collections.append_journal_entry(id, &entry);
        self.commit_saved(&mut state, previous)?;
        Ok(entry)
    }

    /// 保存済み一覧を書き出し、失敗したらメモリ上の変更を戻す
    fn commit_saved(&self, state: &mut StoreState, previous: ProjectCollections) -> Result<()> {
        if let Err(e) = self.persist_saved(state) {
            tracing::warn!(error = %e, "保存に失敗したため変更を取り消します");
            state.collections = previous;
            return Err(e);
        }
        Ok(())
    }

    fn persist_saved(&self, state: &StoreState) -> Result<()> {
        save_json(
            self.inner.persistence.as_ref(),
            SAVED_PROJECTS_KEY,
            &state.collections.saved,
        )
    }
}
