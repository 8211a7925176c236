use axum::body::Bytes;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use heroforge_shared::wheel::{
    drive_spin, normalize_angle, FixedStepTicker, SpinPlan, SpinRequest, SpinResponse, WheelInfoResponse,
    WheelSpinner, FRAME_INTERVAL_MS, MAX_SPIN_DURATION_MS,
};
use rand::rngs::OsRng;
use tracing::{error, info};

use crate::error::ApiError;
use crate::AppState;

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/api/wheel", get(wheel_info))
        .route("/api/spin", post(spin_wheel))
}

async fn wheel_info(State(state): State<AppState>) -> Json<WheelInfoResponse> {
    Json(WheelInfoResponse::from_outcomes(&state.outcomes))
}

/// Commits a spin server-side and returns the plan so the client can
/// animate the same motion. The result is decoded from the final angle
/// after a simulated 60 Hz frame loop, never picked directly.
async fn spin_wheel(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<SpinResponse>, ApiError> {
    // An empty body spins from rest; anything else must be a valid request
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        SpinRequest::default()
    } else {
        let Json(request) =
            Json::<SpinRequest>::from_bytes(&body).map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
        request
    };
    let start_angle = request
        .current_angle
        .filter(|angle| angle.is_finite())
        .map(normalize_angle)
        .unwrap_or(0.0);

    let plan = SpinPlan::random(&mut OsRng);
    let mut spinner = WheelSpinner::with_angle(state.outcomes.as_ref().clone(), start_angle);
    let spin = spinner.start_spin_with(0.0, plan)?;

    let frame_budget = (MAX_SPIN_DURATION_MS / FRAME_INTERVAL_MS).ceil() as usize + 1;
    let mut ticker = FixedStepTicker::new(0.0, FRAME_INTERVAL_MS).with_frame_limit(frame_budget);
    let outcome = drive_spin(&mut spinner, &mut ticker).ok_or_else(|| {
        error!("Wheel spin did not settle");
        ApiError::Internal("Spin failed. Please try again.")
    })?;

    info!("🎡 Wheel landed on {} (segment {})", outcome.label, outcome.index);

    Ok(Json(SpinResponse {
        hero: outcome.label,
        index: outcome.index,
        start_angle: spin.start_angle,
        target_angle: spin.target_angle,
        duration_ms: spin.duration_ms,
        full_rotations: plan.full_rotations(),
        random_offset: plan.random_offset(),
    }))
}
