use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Url};
use tracing::debug;

use super::{preview, GeneratedImage, GenerationError, GenerationJob, ImageBackend};

/// Hosted image-to-image service. The prompt travels as the last path
/// segment and the source photo as a query parameter.
pub struct PollinationsBackend {
    client: Client,
    base_url: String,
    model: String,
}

impl PollinationsBackend {
    pub fn new(client: Client, base_url: String, model: String) -> Self {
        Self {
            client,
            base_url,
            model,
        }
    }

    pub fn request_url(&self, job: &GenerationJob) -> Result<Url, GenerationError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| GenerationError::Malformed(format!("invalid base URL {}: {}", self.base_url, e)))?;

        url.path_segments_mut()
            .map_err(|_| GenerationError::Malformed(format!("base URL {} cannot take a path", self.base_url)))?
            .pop_if_empty()
            .push(&job.prompt);

        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("model", &self.model)
                .append_pair("width", &job.width.to_string())
                .append_pair("height", &job.height.to_string())
                .append_pair("safe", "true")
                .append_pair("image", &job.image_url);
            // Zero means "let the service pick"
            if let Some(seed) = job.seed.filter(|seed| *seed != 0) {
                query.append_pair("seed", &seed.to_string());
            }
        }

        Ok(url)
    }
}

#[async_trait]
impl ImageBackend for PollinationsBackend {
    fn name(&self) -> &'static str {
        "pollinations"
    }

    async fn generate(&self, job: &GenerationJob) -> Result<GeneratedImage, GenerationError> {
        let url = self.request_url(job)?;
        debug!("Requesting portrait from {}", url);

        let response = self
            .client
            .get(url)
            .header(ACCEPT, "image/*")
            .send()
            .await
            .map_err(GenerationError::Unreachable)?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();

        if !content_type.starts_with("image/") {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::NotAnImage {
                content_type,
                body: preview(&body),
            });
        }

        if !status.is_success() {
            return Err(GenerationError::Status {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or_default().to_string(),
            });
        }

        let bytes = response.bytes().await.map_err(GenerationError::Unreachable)?;

        Ok(GeneratedImage {
            bytes: bytes.to_vec(),
            content_type,
        })
    }
}
