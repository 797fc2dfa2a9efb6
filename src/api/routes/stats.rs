//! Scheduler statistics endpoint

use axum::{Json, extract::State};

use crate::api::{
    error::ApiResult,
    state::ApiState,
    types::{StatsResponse, ViewSummary},
};

/// GET /api/v1/stats
///
/// Scheduler counters, notification counters and a summary of the latest view
pub async fn get_stats(State(state): State<ApiState>) -> ApiResult<Json<StatsResponse>> {
    let scheduler = state.scheduler.stats().await?;

    Ok(Json(StatsResponse {
        timestamp: chrono::Utc::now().to_rfc3339(),
        scheduler,
        notifications: state.dispatcher.stats(),
        notifications_in_flight: state.dispatcher.in_flight(),
        view: state.view.latest().map(|view| ViewSummary::from_view(&view)),
    }))
}
