pub mod generate_image;
pub mod local;
pub mod pollinations;

use std::sync::Arc;

use async_trait::async_trait;
use heroforge_shared::constants::MIN_GENERATED_IMAGE_BYTES;
use reqwest::Client;
use thiserror::Error;

use crate::config::BackendKind;
use local::LocalBackend;
use pollinations::PollinationsBackend;

/// Characters of a non-image upstream body echoed back to the caller.
pub const ERROR_BODY_PREVIEW_CHARS: usize = 300;

/// Everything an image backend needs for one portrait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationJob {
    pub prompt: String,
    pub image_url: String,
    pub seed: Option<u64>,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("could not reach the image backend: {0}")]
    Unreachable(#[source] reqwest::Error),
    #[error("image backend answered with {content_type:?} instead of an image")]
    NotAnImage { content_type: String, body: String },
    #[error("image backend returned status {status} {reason}")]
    Status { status: u16, reason: String },
    #[error("generated image is only {0} bytes")]
    TooSmall(usize),
    #[error("malformed response from image backend: {0}")]
    Malformed(String),
}

#[async_trait]
pub trait ImageBackend: Send + Sync {
    fn name(&self) -> &'static str;

    async fn generate(&self, job: &GenerationJob) -> Result<GeneratedImage, GenerationError>;
}

pub fn backend_from_config(kind: &BackendKind, client: Client) -> Arc<dyn ImageBackend> {
    match kind {
        BackendKind::Pollinations { base_url, model } => {
            Arc::new(PollinationsBackend::new(client, base_url.clone(), model.clone()))
        }
        BackendKind::Local { base_url, model } => {
            Arc::new(LocalBackend::new(client, base_url.clone(), model.clone()))
        }
    }
}

/// Rejects payloads too small to be a real portrait. Backends sometimes
/// answer with a placeholder pixel instead of an error.
pub fn ensure_min_size(image: GeneratedImage) -> Result<GeneratedImage, GenerationError> {
    if image.bytes.len() < MIN_GENERATED_IMAGE_BYTES {
        return Err(GenerationError::TooSmall(image.bytes.len()));
    }
    Ok(image)
}

/// Content type from the leading magic bytes.
pub fn sniff_image_type(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        Some("image/png")
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        Some("image/gif")
    } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        Some("image/webp")
    } else {
        None
    }
}

pub(crate) fn preview(body: &str) -> String {
    body.chars().take(ERROR_BODY_PREVIEW_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sniff_image_type() {
        assert_eq!(
            sniff_image_type(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0]),
            Some("image/png")
        );
        assert_eq!(sniff_image_type(&[0xFF, 0xD8, 0xFF, 0xE0]), Some("image/jpeg"));
        assert_eq!(sniff_image_type(b"GIF89a......"), Some("image/gif"));
        assert_eq!(sniff_image_type(b"RIFF\x10\0\0\0WEBPVP8 "), Some("image/webp"));
        assert_eq!(sniff_image_type(b"RIFF\x10\0\0\0WAVE"), None);
        assert_eq!(sniff_image_type(b"<html>"), None);
        assert_eq!(sniff_image_type(&[]), None);
    }

    #[test]
    fn test_ensure_min_size() {
        let tiny = GeneratedImage {
            bytes: vec![0; MIN_GENERATED_IMAGE_BYTES - 1],
            content_type: "image/png".into(),
        };
        assert!(matches!(ensure_min_size(tiny), Err(GenerationError::TooSmall(999))));

        let ok = GeneratedImage {
            bytes: vec![0; MIN_GENERATED_IMAGE_BYTES],
            content_type: "image/png".into(),
        };
        assert!(ensure_min_size(ok).is_ok());
    }

    #[test]
    fn test_preview_counts_characters() {
        let body = "é".repeat(ERROR_BODY_PREVIEW_CHARS + 50);
        assert_eq!(preview(&body).chars().count(), ERROR_BODY_PREVIEW_CHARS);
        assert_eq!(preview("short"), "short");
    }

    #[test]
    fn test_backend_from_config_picks_kind() {
        let pollinations = backend_from_config(
            &BackendKind::Pollinations {
                base_url: "https://image.pollinations.ai/prompt".into(),
                model: "kontext".into(),
            },
            Client::new(),
        );
        assert_eq!(pollinations.name(), "pollinations");

        let local = backend_from_config(
            &BackendKind::Local {
                base_url: "http://127.0.0.1:8000".into(),
                model: "flux-kontext".into(),
            },
            Client::new(),
        );
        assert_eq!(local.name(), "local");
    }
}
