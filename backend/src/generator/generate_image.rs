use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::Response;
use axum::Json;
use heroforge_shared::constants::{GENERATED_IMAGE_SIZE, GENERATE_FAILED_ERROR, HERO_HEADER, STYLE_HEADER};
use heroforge_shared::generation::GenerateRequest;
use tracing::{error, info};

use super::{ensure_min_size, GenerationJob};
use crate::error::ApiError;
use crate::AppState;

pub async fn generate_image(
    State(state): State<AppState>,
    payload: Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
    let order = request.validate(state.config.allow_insecure_image_urls)?;

    info!(
        hero = %order.hero,
        style = %order.style,
        backend = state.generator.name(),
        "🎨 Generating hero portrait"
    );

    let job = GenerationJob {
        prompt: order.prompt(),
        image_url: order.image_url.clone(),
        seed: order.seed,
        width: GENERATED_IMAGE_SIZE,
        height: GENERATED_IMAGE_SIZE,
    };

    let image = state
        .generator
        .generate(&job)
        .await
        .and_then(ensure_min_size)
        .map_err(|e| {
            error!("Image generation failed for {}: {}", order.hero, e);
            ApiError::from(e)
        })?;

    info!("✅ Portrait ready: {} bytes of {}", image.bytes.len(), image.content_type);

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, image.content_type)
        .header(header::CACHE_CONTROL, "no-store")
        .header(HERO_HEADER, order.hero.as_str())
        .header(STYLE_HEADER, order.style.as_ref())
        .body(Body::from(image.bytes))
        .map_err(|e| {
            error!("Failed to build portrait response: {}", e);
            ApiError::Internal(GENERATE_FAILED_ERROR)
        })
}
