//! Data URL ユーティリティ
//!
//! 生成画像・ジャーナル写真は "data:<mime>;base64,<data>" 形式で保持する

/// Data URLを組み立てる
pub fn build_data_url(mime_type: &str, base64_data: &str) -> String {
    format!("data:{};base64,{}", mime_type, base64_data)
}

/// Data URLからBase64データ部分を抽出
///
/// # Arguments
/// * `data_url` - "data:image/jpeg;base64,/9j/4AAQ..." 形式のData URL
pub fn extract_base64_from_data_url(data_url: &str) -> Option<&str> {
    if !data_url.starts_with("data:") {
        return None;
    }
    data_url.split(',').nth(1)
}

/// Data URLからMIMEタイプを抽出（失敗時は"image/jpeg"）
pub fn extract_mime_type_from_data_url(data_url: &str) -> &str {
    data_url
        .strip_prefix("data:")
        .and_then(|s| s.split(';').next())
        .filter(|s| !s.is_empty())
        .unwrap_or("image/jpeg")
}

/// 埋め込み画像か（data URL）、取得が必要なURLか
pub fn is_data_url(image_ref: &str) -> bool {
    image_ref.starts_with("data:")
}
