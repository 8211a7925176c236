use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{preview, sniff_image_type, GeneratedImage, GenerationError, GenerationJob, ImageBackend};

const GENERATIONS_PATH: &str = "/v1/images/generations";

/// Self-hosted server speaking the OpenAI images API.
pub struct LocalBackend {
    client: Client,
    base_url: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct GenerationPayload<'a> {
    model: &'a str,
    prompt: &'a str,
    n: u32,
    size: String,
    response_format: &'static str,
    image: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct GenerationReply {
    #[serde(default)]
    data: Vec<ImageEntry>,
}

#[derive(Debug, Deserialize)]
struct ImageEntry {
    #[serde(default)]
    b64_json: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, PartialEq, Eq)]
enum ImagePayload {
    Inline(Vec<u8>),
    Remote(String),
}

impl LocalBackend {
    pub fn new(client: Client, base_url: String, model: String) -> Self {
        Self {
            client,
            base_url,
            model,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), GENERATIONS_PATH)
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>, GenerationError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(GenerationError::Unreachable)?;

        let status = response.status();
        if !status.is_success() {
            return Err(GenerationError::Status {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or_default().to_string(),
            });
        }

        let bytes = response.bytes().await.map_err(GenerationError::Unreachable)?;
        Ok(bytes.to_vec())
    }
}

fn decode_base64(encoded: &str) -> Result<Vec<u8>, GenerationError> {
    // Some servers hand back a data URL rather than bare base64
    let data = match encoded.split_once(";base64,") {
        Some((prefix, data)) if prefix.starts_with("data:") => data,
        _ => encoded,
    };
    STANDARD
        .decode(data.trim())
        .map_err(|e| GenerationError::Malformed(format!("invalid base64 image: {}", e)))
}

fn parse_reply(body: &str) -> Result<ImagePayload, GenerationError> {
    let reply: GenerationReply = serde_json::from_str(body)
        .map_err(|e| GenerationError::Malformed(format!("unreadable JSON: {}", e)))?;

    let entry = reply
        .data
        .into_iter()
        .next()
        .ok_or_else(|| GenerationError::Malformed("response carried no images".to_string()))?;

    match (entry.b64_json, entry.url) {
        (Some(encoded), _) => Ok(ImagePayload::Inline(decode_base64(&encoded)?)),
        (None, Some(url)) => Ok(ImagePayload::Remote(url)),
        (None, None) => Err(GenerationError::Malformed(
            "image entry has neither b64_json nor url".to_string(),
        )),
    }
}

#[async_trait]
impl ImageBackend for LocalBackend {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn generate(&self, job: &GenerationJob) -> Result<GeneratedImage, GenerationError> {
        let payload = GenerationPayload {
            model: &self.model,
            prompt: &job.prompt,
            n: 1,
            size: format!("{}x{}", job.width, job.height),
            response_format: "b64_json",
            image: &job.image_url,
            seed: job.seed,
        };

        let endpoint = self.endpoint();
        debug!("Requesting portrait from {}", endpoint);

        let response = self
            .client
            .post(&endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(GenerationError::Unreachable)?;

        let status = response.status();
        let body = response.text().await.map_err(GenerationError::Unreachable)?;

        if !status.is_success() {
            debug!("Local backend error body: {}", preview(&body));
            return Err(GenerationError::Status {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or_default().to_string(),
            });
        }

        let bytes = match parse_reply(&body)? {
            ImagePayload::Inline(bytes) => bytes,
            ImagePayload::Remote(url) => self.fetch(&url).await?,
        };

        let content_type = sniff_image_type(&bytes).ok_or_else(|| {
            GenerationError::Malformed("payload is not a recognizable image".to_string())
        })?;

        Ok(GeneratedImage {
            bytes,
            content_type: content_type.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_HEADER: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    #[test]
    fn test_endpoint_joins_cleanly() {
        let backend = LocalBackend::new(Client::new(), "http://gpu:8000/".into(), "flux".into());
        assert_eq!(backend.endpoint(), "http://gpu:8000/v1/images/generations");
    }

    #[test]
    fn test_payload_shape() {
        let payload = GenerationPayload {
            model: "flux",
            prompt: "Thor",
            n: 1,
            size: "1024x1024".into(),
            response_format: "b64_json",
            image: "https://cdn.example/me.png",
            seed: None,
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["size"], "1024x1024");
        assert_eq!(value["response_format"], "b64_json");
        assert!(value.get("seed").is_none());
    }

    #[test]
    fn test_inline_payload_is_decoded() {
        let body = format!(r#"{{"data":[{{"b64_json":"{}"}}]}}"#, STANDARD.encode(PNG_HEADER));
        assert_eq!(parse_reply(&body).unwrap(), ImagePayload::Inline(PNG_HEADER.to_vec()));
    }

    #[test]
    fn test_data_url_prefix_is_stripped() {
        let encoded = format!("data:image/png;base64,{}", STANDARD.encode(PNG_HEADER));
        assert_eq!(decode_base64(&encoded).unwrap(), PNG_HEADER.to_vec());
    }

    #[test]
    fn test_url_payload_is_returned_for_fetching() {
        let body = r#"{"data":[{"url":"http://gpu:8000/out/1.png"}]}"#;
        assert_eq!(
            parse_reply(body).unwrap(),
            ImagePayload::Remote("http://gpu:8000/out/1.png".into())
        );
    }

    #[test]
    fn test_malformed_replies() {
        for body in [
            "not json",
            r#"{"data":[]}"#,
            r#"{"data":[{}]}"#,
            r#"{"data":[{"b64_json":"%%%"}]}"#,
        ] {
            assert!(matches!(parse_reply(body), Err(GenerationError::Malformed(_))), "{}", body);
        }
    }
}
