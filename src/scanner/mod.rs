use crate::error::{Result, UpcycleError};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::path::{Path, PathBuf};
use upcycle_ai_common::{build_data_url, ImageInput};
use walkdir::WalkDir;

#[derive(Debug, Clone)]
pub struct ImageInfo {
    pub path: PathBuf,
    pub file_name: String,
    pub mime_type: &'static str,
}

/// 拡張子 → MIMEタイプ（小文字で比較）
const IMAGE_TYPES: &[(&str, &str)] = &[
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("png", "image/png"),
    ("webp", "image/webp"),
    ("gif", "image/gif"),
    ("heic", "image/heic"),
    ("heif", "image/heif"),
];

/// 拡張子からMIMEタイプを判定
pub fn mime_type_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_string_lossy().to_lowercase();
    IMAGE_TYPES
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, mime)| *mime)
}

fn image_info(path: &Path) -> Option<ImageInfo> {
    let mime_type = mime_type_for(path)?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    Some(ImageInfo {
        path: path.to_path_buf(),
        file_name,
        mime_type,
    })
}

/// ファイル・フォルダの指定から画像を集める
///
/// フォルダは直下のみ（再帰しない）をファイル名順で、ファイルは指定順で追加する。
pub fn scan_paths(paths: &[PathBuf]) -> Result<Vec<ImageInfo>> {
    let mut images = Vec::new();

    for path in paths {
        if !path.exists() {
            return Err(UpcycleError::FileNotFound(path.display().to_string()));
        }

        if path.is_file() {
            match image_info(path) {
                Some(info) => images.push(info),
                None => tracing::warn!(path = %path.display(), "画像ではないためスキップします"),
            }
            continue;
        }

        let mut found: Vec<ImageInfo> = WalkDir::new(path)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_file())
            .filter_map(|e| image_info(e.path()))
            .collect();

        found.sort_by(|a, b| a.file_name.cmp(&b.file_name));
        images.extend(found);
    }

    Ok(images)
}

/// 画像を読み込んでBase64化
pub fn load_image(info: &ImageInfo) -> Result<ImageInput> {
    let bytes = std::fs::read(&info.path)?;
    Ok(ImageInput {
        file_name: info.file_name.clone(),
        mime_type: info.mime_type.to_string(),
        data: STANDARD.encode(bytes),
    })
}

/// 指定パスの画像をまとめて読み込む（画像が無ければエラー）
pub fn load_images(paths: &[PathBuf]) -> Result<Vec<ImageInput>> {
    let infos = scan_paths(paths)?;
    if infos.is_empty() {
        let joined = paths
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        return Err(UpcycleError::NoImagesFound(joined));
    }
    infos.iter().map(load_image).collect()
}

/// ジャーナル用に写真を data URL にする
pub fn photo_data_url(path: &Path) -> Result<String> {
    if !path.is_file() {
        return Err(UpcycleError::FileNotFound(path.display().to_string()));
    }
    let info = image_info(path).ok_or_else(|| UpcycleError::NoImagesFound(path.display().to_string()))?;
    let image = load_image(&info)?;
    Ok(build_data_url(&image.mime_type, &image.data))
}
