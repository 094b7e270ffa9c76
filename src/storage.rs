//! 永続化ポート
//!
//! ブラウザのlocalStorage相当のキー・バリュー保存。
//! ProjectStoreはこのトレイト越しにしか保存先に触らない。

use crate::error::Result;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

/// 保存済み企画
pub const SAVED_PROJECTS_KEY: &str = "savedProjects";
/// 👎した企画
pub const DISLIKED_PROJECTS_KEY: &str = "dislikedProjects";
/// APIキー
pub const API_KEY_KEY: &str = "gemini-api-key";

/// キー・バリュー永続化
pub trait Persistence: Send + Sync {
    /// 値を読み込む。キーが無ければ None
    fn load(&self, key: &str) -> Result<Option<Value>>;

    /// 値を保存する
    fn save(&self, key: &str, value: &Value) -> Result<()>;

    /// キーを削除する
    fn remove(&self, key: &str) -> Result<()>;
}

/// 型付きで読み込む（形が合わなければ None として扱う）
pub fn load_json<T: DeserializeOwned>(store: &dyn Persistence, key: &str) -> Result<Option<T>> {
    let Some(value) = store.load(key)? else {
        return Ok(None);
    };
    match serde_json::from_value(value) {
        Ok(v) => Ok(Some(v)),
        Err(e) => {
            tracing::warn!(key, error = %e, "保存データの形式が不正なため無視します");
            Ok(None)
        }
    }
}

/// 型付きで保存する
pub fn save_json<T: Serialize + ?Sized>(store: &dyn Persistence, key: &str, value: &T) -> Result<()> {
    let value = serde_json::to_value(value)?;
    store.save(key, &value)
}

/// ディレクトリにキーごとのJSONファイルとして保存
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl Persistence for FileStorage {
    fn load(&self, key: &str) -> Result<Option<Value>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }

        let file = match File::open(&path) {
            Ok(f) => f,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "読み込みに失敗したため空として扱います");
                return Ok(None);
            }
        };

        let reader = BufReader::new(file);
        match serde_json::from_reader(reader) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                // 破損したファイルは空として扱う
                tracing::warn!(path = %path.display(), error = %e, "破損したデータを無視します");
                Ok(None)
            }
        }
    }

    fn save(&self, key: &str, value: &Value) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);
        // 途中で落ちても元のファイルが残るよう、一時ファイルに書いてから置き換える
        let tmp_path = self.dir.join(format!("{}.json.tmp", key));
        let mut writer = BufWriter::new(File::create(&tmp_path)?);
        serde_json::to_writer_pretty(&mut writer, value)?;
        let file = writer.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
        std::fs::rename(&tmp_path, &path)?;
        tracing::debug!(path = %path.display(), "保存しました");
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}

/// メモリ上の保存（テスト用）
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, Value>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl Persistence for MemoryStorage {
    fn load(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn save(&self, key: &str, value: &Value) -> Result<()> {
        self.entries.lock().insert(key.to_string(), value.clone());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.lock().remove(key);
        Ok(())
    }
}
