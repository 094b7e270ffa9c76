use crate::error::{Result, UpcycleError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// APIキーを上書きする環境変数
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub analysis_model: String,
    pub image_model: String,
    pub chat_model: String,
    pub timeout_seconds: u64,
    /// 保存データの置き場所（省略時は OS のデータディレクトリ）
    pub data_dir: Option<PathBuf>,
    /// 解析直後に1件目の画像を自動生成する
    pub auto_generate_first_image: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            analysis_model: "gemini-2.5-pro".into(),
            image_model: "gemini-2.5-flash-image".into(),
            chat_model: "gemini-2.5-pro".into(),
            timeout_seconds: 120,
            data_dir: None,
            auto_generate_first_image: true,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| UpcycleError::Config("ホームディレクトリが見つかりません".into()))?;
        Ok(home.join(".config").join("upcycle-ai").join("config.json"))
    }

    /// 保存済み企画・APIキーの保存先
    pub fn storage_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.data_dir {
            return Ok(dir.clone());
        }
        let base = dirs::data_dir()
            .ok_or_else(|| UpcycleError::Config("データディレクトリが見つかりません".into()))?;
        Ok(base.join("upcycle-ai"))
    }

    /// 環境変数のAPIキー（保存はしない）
    pub fn env_api_key() -> Option<String> {
        std::env::var(API_KEY_ENV)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }
}
