use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderName, HeaderValue, Method, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use heroforge_shared::constants::{HERO_HEADER, STYLE_HEADER};
use heroforge_shared::rate_limit::{RateLimiter, RATE_LIMIT_REMAINING_HEADER};
use heroforge_shared::wheel::OutcomeSet;
use tokio::net::TcpListener;
use tower::Layer;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

mod config;
mod error;
mod generator;
mod logging;
mod middleware;
mod upload;
mod wheel;

use config::Config;
use generator::ImageBackend;
use upload::{UploadStorage, UPLOAD_CACHE_CONTROL};

/// Largest request body accepted on any route.
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;
const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    limiter: Arc<RateLimiter>,
    generator: Arc<dyn ImageBackend>,
    storage: Arc<UploadStorage>,
    outcomes: Arc<OutcomeSet>,
}

impl AppState {
    pub fn new(config: Config, generator: Arc<dyn ImageBackend>) -> Self {
        let storage = UploadStorage::new(config.upload_dir.clone(), config.public_base_url.clone());
        Self {
            limiter: Arc::new(RateLimiter::in_memory(config.rate_limit)),
            generator,
            storage: Arc::new(storage),
            outcomes: Arc::new(OutcomeSet::heroes()),
            config: Arc::new(config),
        }
    }
}

pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods(vec![Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(vec![header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers(vec![
            HeaderName::from_static(RATE_LIMIT_REMAINING_HEADER),
            HeaderName::from_static(HERO_HEADER),
            HeaderName::from_static(STYLE_HEADER),
        ])
}

pub fn create_app(state: AppState) -> Router {
    let limited_routes = Router::new()
        .route("/api/upload", post(upload::upload_image))
        .route("/api/generate", post(generator::generate_image::generate_image))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::rate_limit_middleware,
        ));

    let uploads = SetResponseHeaderLayer::overriding(
        header::CACHE_CONTROL,
        HeaderValue::from_static(UPLOAD_CACHE_CONTROL),
    )
    .layer(ServeDir::new(state.storage.root()));

    Router::new()
        .route("/api/health", get(health_check))
        .merge(wheel::create_router())
        .merge(limited_routes)
        .nest_service("/uploads", uploads)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    logging::setup()?;

    let config = Config::from_env()?;
    let client = reqwest::Client::builder().timeout(UPSTREAM_TIMEOUT).build()?;
    let generator = generator::backend_from_config(&config.backend, client);

    tokio::fs::create_dir_all(&config.upload_dir).await?;

    let addr = config.bind_addr;
    info!(
        "Image backend: {}, uploads in {}, {} requests per {:?} per client",
        generator.name(),
        config.upload_dir.display(),
        config.rate_limit.max_requests,
        config.rate_limit.window,
    );

    let app = create_app(AppState::new(config, generator));

    let listener = TcpListener::bind(addr).await?;
    info!("🚀 HeroForge listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
