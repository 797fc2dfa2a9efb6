//! Alert status endpoint

use axum::{Json, extract::State};

use crate::api::{error::ApiResult, state::ApiState, types::AlertsResponse};

/// GET /api/v1/alerts
///
/// Components alerted as of the latest successful cycle
pub async fn get_alerts(State(state): State<ApiState>) -> ApiResult<Json<AlertsResponse>> {
    let view = state.latest_view()?;
    Ok(Json(AlertsResponse::from_view(&view)))
}
