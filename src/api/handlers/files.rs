use std::path::Path;

use axum::{
    extract::{Multipart, State},
    Json,
};
use serde::Serialize;

use crate::{
    error::{AppError, AppResult},
    AppState,
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub file_url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiUploadResponse {
    pub file_urls: Vec<String>,
}

pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<Json<UploadResponse>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Failed to read multipart field: {e}")))?
    {
        let Some(filename) = field.file_name().map(|f| f.to_string()) else {
            continue;
        };

        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(format!("Failed to read file: {e}")))?;

        let stored = store_file(&state.config.upload.dir, &filename, &data).await?;
        return Ok(Json(UploadResponse {
            file_url: format!("{}/{}", state.config.upload.public_url, stored),
        }));
    }

    Err(AppError::BadRequest("No file uploaded".to_string()))
}

pub async fn upload_multiple(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<Json<MultiUploadResponse>> {
    let mut file_urls = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Failed to read multipart field: {e}")))?
    {
        let Some(filename) = field.file_name().map(|f| f.to_string()) else {
            continue;
        };

        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(format!("Failed to read file: {e}")))?;

        let stored = store_file(&state.config.upload.dir, &filename, &data).await?;
        file_urls.push(format!("{}/{}", state.config.upload.public_url, stored));
    }

    if file_urls.is_empty() {
        return Err(AppError::BadRequest("No files provided".to_string()));
    }

    Ok(Json(MultiUploadResponse { file_urls }))
}

/// Writes the upload under `dir`, keeping the client's filename but adding
/// a numeric suffix when the name is already taken. Returns the stored name.
async fn store_file(dir: &str, filename: &str, data: &[u8]) -> AppResult<String> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to create upload dir: {e}")))?;

    let safe_name = sanitize_filename(filename);
    let mut candidate = safe_name.clone();
    let mut counter = 1;

    loop {
        let path = Path::new(dir).join(&candidate);
        if !tokio::fs::try_exists(&path)
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to stat upload: {e}")))?
        {
            tokio::fs::write(&path, data)
                .await
                .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to write upload: {e}")))?;
            return Ok(candidate);
        }

        candidate = next_candidate(&safe_name, counter);
        counter += 1;
    }
}

/// Keeps only the final path component so an upload can never escape the
/// uploads directory.
fn sanitize_filename(filename: &str) -> String {
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename)
        .trim();

    if base.is_empty() || base == "." || base == ".." {
        "file".to_string()
    } else {
        base.to_string()
    }
}

fn next_candidate(name: &str, counter: u32) -> String {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{stem}{counter}.{ext}"),
        _ => format!("{name}{counter}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_strips_directories() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\temp\\a.png"), "a.png");
        assert_eq!(sanitize_filename("photo.jpg"), "photo.jpg");
    }

    #[test]
    fn test_sanitize_rejects_empty_names() {
        assert_eq!(sanitize_filename(""), "file");
        assert_eq!(sanitize_filename(".."), "file");
    }

    #[test]
    fn test_next_candidate_keeps_extension() {
        assert_eq!(next_candidate("photo.jpg", 1), "photo1.jpg");
        assert_eq!(next_candidate("photo.jpg", 2), "photo2.jpg");
        assert_eq!(next_candidate("README", 1), "README1");
        assert_eq!(next_candidate(".env", 1), ".env1");
    }

    #[tokio::test]
    async fn test_store_file_adds_suffix_on_collision() {
        let dir = std::env::temp_dir().join(format!("uploads-test-{}", uuid::Uuid::new_v4()));
        let dir = dir.to_str().unwrap().to_string();

        let first = store_file(&dir, "a.txt", b"one").await.unwrap();
        let second = store_file(&dir, "a.txt", b"two").await.unwrap();

        assert_eq!(first, "a.txt");
        assert_eq!(second, "a1.txt");

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }
}
