use std::path::{Path, PathBuf};

use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::Json;
use heroforge_shared::constants::{
    ALLOWED_IMAGE_TYPES, MAX_IMAGE_SIZE, NO_IMAGE_ERROR, UPLOAD_FAILED_ERROR, UPLOAD_FIELD, UPLOAD_PREFIX,
};
use heroforge_shared::generation::UploadResponse;
use heroforge_shared::validation::{format_bytes, mime_extension, validate_image_size, validate_image_type};
use thiserror::Error;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{error, info};
use uuid::Uuid;

use crate::error::ApiError;
use crate::AppState;

/// Cache header for stored uploads. Names are random, so content never changes.
pub const UPLOAD_CACHE_CONTROL: &str = "public, max-age=31536000, immutable";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to write upload: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredUpload {
    /// Path relative to the public root, e.g. `uploads/<uuid>.png`.
    pub pathname: String,
    pub url: String,
}

/// Local directory served back under `/uploads`.
pub struct UploadStorage {
    root: PathBuf,
    public_base_url: String,
}

impl UploadStorage {
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn save(&self, bytes: &[u8], content_type: &str) -> Result<StoredUpload, StorageError> {
        let filename = format!("{}.{}", Uuid::new_v4(), mime_extension(content_type));

        fs::create_dir_all(&self.root).await?;
        let mut file = File::create(self.root.join(&filename)).await?;
        file.write_all(bytes).await?;
        file.flush().await?;

        Ok(StoredUpload {
            pathname: format!("{}/{}", UPLOAD_PREFIX, filename),
            url: format!("{}/{}/{}", self.public_base_url, UPLOAD_PREFIX, filename),
        })
    }
}

pub async fn upload_image(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut multipart = multipart.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;

    let mut image = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.body_text()))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let content_type = field.content_type().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;
        image = Some((content_type, bytes));
        break;
    }

    let (content_type, bytes) = image.ok_or_else(|| ApiError::BadRequest(NO_IMAGE_ERROR.to_string()))?;

    if validate_image_type(&content_type).is_err() {
        return Err(ApiError::BadRequest(format!(
            "Invalid file type. Allowed types: {}",
            ALLOWED_IMAGE_TYPES.join(", ")
        )));
    }

    let size = bytes.len() as u64;
    if validate_image_size(size).is_err() {
        return Err(ApiError::BadRequest(format!(
            "File too large. Maximum size is {}MB",
            MAX_IMAGE_SIZE / 1024 / 1024
        )));
    }

    let stored = state.storage.save(&bytes, &content_type).await.map_err(|e| {
        error!("Failed to store upload: {}", e);
        ApiError::Internal(UPLOAD_FAILED_ERROR)
    })?;

    info!("📁 Stored upload {} ({})", stored.pathname, format_bytes(size));

    Ok(Json(UploadResponse {
        image_url: stored.url,
        filename: stored.pathname,
        size,
        content_type,
    }))
}
