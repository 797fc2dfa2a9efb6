//! Manual refresh endpoint

use axum::{Json, extract::State, http::StatusCode};
use tracing::debug;

use crate::actors::RefreshOutcome;
use crate::api::{
    error::{ApiError, ApiResult},
    state::ApiState,
    types::RefreshResponse,
};

/// POST /api/v1/refresh
///
/// 202 when a cycle was started, 409 when one is already running
pub async fn trigger_refresh(
    State(state): State<ApiState>,
) -> ApiResult<(StatusCode, Json<RefreshResponse>)> {
    match state.scheduler.refresh_now().await? {
        RefreshOutcome::Started => {
            debug!("manual refresh started via API");
            Ok((
                StatusCode::ACCEPTED,
                Json(RefreshResponse { status: "started" }),
            ))
        }
        RefreshOutcome::AlreadyRunning => Err(ApiError::Conflict(
            "a refresh cycle is already running".into(),
        )),
    }
}
