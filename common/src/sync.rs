//! プロジェクト状態の同期ロジック
//!
//! 同じIDの企画は「解析結果」「保存済み一覧」「表示中」の3か所に
//! それぞれ独立したコピーとして存在しうる。ここの関数は、1つの更新を
//! そのIDを持つ全コピーに同じように適用する（fan-out）。
//! I/Oは一切行わないので、非同期処理や永続化は呼び出し側が担当する。

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::{
    AnalysisResult, Feedback, IdeaResponse, JournalEntry, NegativeExample, ProjectRecord, Vote,
};

/// 更新が適用されたコレクション
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Touched {
    pub analysis: bool,
    pub saved: bool,
    pub selected: bool,
}

impl Touched {
    pub fn any(&self) -> bool {
        self.analysis || self.saved || self.selected
    }
}

/// 企画データの3つのビュー
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectCollections {
    /// 直近の解析結果（次の解析で丸ごと置き換え）
    pub analysis: Option<AnalysisResult>,
    /// 保存済み（保存順）
    pub saved: Vec<ProjectRecord>,
    /// 詳細表示中の企画
    pub selected: Option<ProjectRecord>,
}

/// リスト内のIDが一致する要素だけに更新を適用
pub fn update_by_id<F>(list: &mut [ProjectRecord], id: &str, update: F) -> bool
where
    F: Fn(&mut ProjectRecord),
{
    let mut hit = false;
    for record in list.iter_mut().filter(|p| p.id == id) {
        update(record);
        hit = true;
    }
    hit
}

impl ProjectCollections {
    /// いずれかのコレクションがIDを持っているか
    pub fn contains(&self, id: &str) -> bool {
        self.analysis
            .as_ref()
            .is_some_and(|a| a.project_ideas.iter().any(|p| p.id == id))
            || self.saved.iter().any(|p| p.id == id)
            || self.selected.as_ref().is_some_and(|p| p.id == id)
    }

    /// IDのコピーを1つ探す（保存済み → 解析結果 → 表示中の順）
    pub fn find(&self, id: &str) -> Option<&ProjectRecord> {
        self.saved
            .iter()
            .find(|p| p.id == id)
            .or_else(|| self.analysis.as_ref().and_then(|a| a.find(id)))
            .or_else(|| self.selected.as_ref().filter(|p| p.id == id))
    }

    /// IDを持つ全コレクションに同じ更新を適用
    ///
    /// 各コレクションのコピーに個別に適用する（共有参照は持たない）。
    pub fn apply_update_everywhere<F>(&mut self, id: &str, update: F) -> Touched
    where
        F: Fn(&mut ProjectRecord),
    {
        let analysis = match self.analysis.as_mut() {
            Some(a) => update_by_id(&mut a.project_ideas, id, &update),
            None => false,
        };
        let saved = update_by_id(&mut self.saved, id, &update);
        let selected = match self.selected.as_mut() {
            Some(p) if p.id == id => {
                update(p);
                true
            }
            _ => false,
        };

        Touched {
            analysis,
            saved,
            selected,
        }
    }

    /// 保存済みから削除。表示中なら表示も閉じる
    pub fn delete_saved(&mut self, id: &str) -> bool {
        let before = self.saved.len();
        self.saved.retain(|p| p.id != id);
        if self.selected.as_ref().is_some_and(|p| p.id == id) {
            self.selected = None;
        }
        self.saved.len() != before
    }

    /// ジャーナル追記（保存済みと表示中のみ。解析結果のコピーには付けない）
    pub fn append_journal_entry(&mut self, id: &str, entry: &JournalEntry) -> Touched {
        let saved = update_by_id(&mut self.saved, id, |p| p.journal.push(entry.clone()));
        let selected = match self.selected.as_mut() {
            Some(p) if p.id == id => {
                p.journal.push(entry.clone());
                true
            }
            _ => false,
        };

        Touched {
            analysis: false,
            saved,
            selected,
        }
    }
}

/// 評価ボタンのトグル（同じボタン2回で解除）
pub fn toggle_feedback(current: Feedback, vote: Vote) -> Feedback {
    let pressed = vote.as_feedback();
    if current == pressed {
        Feedback::Neutral
    } else {
        pressed
    }
}

/// 👎一覧を企画の評価に合わせる
///
/// 評価が Down なら（未登録の場合のみ）スナップショットを追加、
/// それ以外なら該当IDを除去する。変更があれば true。
pub fn sync_disliked(disliked: &mut Vec<ProjectRecord>, record: &ProjectRecord) -> bool {
    if record.feedback == Feedback::Down {
        if disliked.iter().any(|p| p.id == record.id) {
            return false;
        }
        disliked.push(record.clone());
        true
    } else {
        let before = disliked.len();
        disliked.retain(|p| p.id != record.id);
        disliked.len() != before
    }
}

/// 名前で重複判定して保存（末尾に追加）
///
/// 同名が既にあれば何もしない。IDが無ければ new_id で採番する。
pub fn save_by_name<F>(saved: &mut Vec<ProjectRecord>, mut record: ProjectRecord, new_id: F) -> bool
where
    F: FnOnce() -> String,
{
    if saved.iter().any(|p| p.name == record.name) {
        return false;
    }
    if record.id.is_empty() {
        record.id = new_id();
    }
    saved.push(record);
    true
}

/// 次のジャーナルのタイムスタンプ（直前のエントリより前にならない）
pub fn next_journal_timestamp(journal: &[JournalEntry], now: DateTime<Utc>) -> DateTime<Utc> {
    match journal.last() {
        Some(last) if last.timestamp > now => last.timestamp,
        _ => now,
    }
}

/// Idea Generatorのレスポンスに採番して解析結果にする
pub fn materialize_ideas<F>(response: IdeaResponse, mut new_id: F) -> Result<AnalysisResult>
where
    F: FnMut() -> String,
{
    let project_ideas = response
        .project_ideas
        .into_iter()
        .map(|idea| idea.into_record(new_id()))
        .collect::<Result<Vec<_>>>()?;

    Ok(AnalysisResult {
        identified_items: response.identified_items,
        project_ideas,
        sources: response.sources,
    })
}

/// 👎一覧から否定例を作る
pub fn negative_examples(disliked: &[ProjectRecord]) -> Vec<NegativeExample> {
    disliked.iter().map(ProjectRecord::negative_example).collect()
}
