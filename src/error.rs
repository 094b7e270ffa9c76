use thiserror::Error;

/// エラー分類（ユーザーへの表示・再入力判定に使う）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    MissingCredential,
    InvalidCredential,
    NoInputSelected,
    NoItemsIdentified,
    ContentSafetyBlocked,
    QuotaExceeded,
    GeneratorFailure,
    RendererFailure,
    Unknown,
}

/// 外部サービス呼び出しの種類（エラー分類に使う）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Analysis,
    Image,
    Chat,
}

#[derive(Error, Debug)]
pub enum UpcycleError {
    #[error("APIキーが設定されていません。`upcycle-ai config --set-api-key YOUR_KEY` で設定してください")]
    MissingApiKey,

    #[error("APIキーが無効です。キーを確認して再入力してください")]
    InvalidApiKey,

    #[error("画像が選択されていません。少なくとも1枚指定してください")]
    NoInputSelected,

    #[error("画像から廃材を認識できませんでした。無地の背景で撮り直してください")]
    NoItemsIdentified,

    #[error("安全設定によりブロックされました。別の画像・内容で試してください")]
    SafetyBlocked,

    #[error("利用上限に達しました。しばらく待つか上限の引き上げを申請してください")]
    QuotaExceeded,

    #[error("解析中にエラーが発生しました: {0}")]
    GeneratorFailure(String),

    #[error("画像生成中にエラーが発生しました: {0}")]
    RendererFailure(String),

    #[error("不明なエラー: {0}")]
    Unknown(String),

    #[error("設定エラー: {0}")]
    Config(String),

    #[error("企画が見つかりません: {0}")]
    ProjectNotFound(String),

    #[error("メモか写真のどちらかが必要です")]
    EmptyJournalEntry,

    #[error("ファイルが見つかりません: {0}")]
    FileNotFound(String),

    #[error("画像が見つかりません: {0}")]
    NoImagesFound(String),

    #[error("HTTPエラー: {0}")]
    Http(#[from] reqwest::Error),

    #[error("入力エラー: {0}")]
    Prompt(#[from] dialoguer::Error),

    #[error("JSON解析エラー: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IOエラー: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Common(#[from] upcycle_ai_common::Error),
}

impl UpcycleError {
    /// エラー分類
    pub fn kind(&self) -> ErrorKind {
        match self {
            UpcycleError::MissingApiKey => ErrorKind::MissingCredential,
            UpcycleError::InvalidApiKey => ErrorKind::InvalidCredential,
            UpcycleError::NoInputSelected | UpcycleError::NoImagesFound(_) => {
                ErrorKind::NoInputSelected
            }
            UpcycleError::NoItemsIdentified => ErrorKind::NoItemsIdentified,
            UpcycleError::SafetyBlocked => ErrorKind::ContentSafetyBlocked,
            UpcycleError::QuotaExceeded => ErrorKind::QuotaExceeded,
            UpcycleError::GeneratorFailure(_) | UpcycleError::Common(_) => {
                ErrorKind::GeneratorFailure
            }
            UpcycleError::RendererFailure(_) => ErrorKind::RendererFailure,
            _ => ErrorKind::Unknown,
        }
    }

    /// 外部サービスのエラーメッセージを分類
    pub fn categorize(stage: Stage, message: &str) -> Self {
        let lower = message.to_lowercase();
        if message.contains("API key not valid") || message.contains("API_KEY_INVALID") {
            return UpcycleError::InvalidApiKey;
        }
        if lower.contains("safety") {
            return UpcycleError::SafetyBlocked;
        }
        if lower.contains("quota") || lower.contains("resource_exhausted") {
            return UpcycleError::QuotaExceeded;
        }
        match stage {
            Stage::Analysis | Stage::Chat => UpcycleError::GeneratorFailure(message.to_string()),
            Stage::Image => UpcycleError::RendererFailure(message.to_string()),
        }
    }

    /// HTTPステータス付きのエラーを分類
    pub fn from_status(stage: Stage, status: u16, body: &str) -> Self {
        if status == 429 {
            return UpcycleError::QuotaExceeded;
        }
        Self::categorize(stage, &format!("API error {}: {}", status, body))
    }
}

pub type Result<T> = std::result::Result<T, UpcycleError>;
