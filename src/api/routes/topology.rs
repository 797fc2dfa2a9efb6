//! Topology document endpoints

use axum::{Json, extract::State};

use crate::api::{
    error::ApiResult,
    state::ApiState,
    types::{LastSyncResponse, TopologyDataResponse},
};

/// GET /api/topology_data
///
/// The latest published view; 503 before the first successful cycle
pub async fn get_topology_data(
    State(state): State<ApiState>,
) -> ApiResult<Json<TopologyDataResponse>> {
    let view = state.latest_view()?;
    Ok(Json(TopologyDataResponse::from_view(&view)))
}

/// GET /api/last_sync_timestamp
///
/// Time of the most recent completed refresh. Lets the web page poll
/// cheaply before reloading the whole document.
pub async fn get_last_sync(State(state): State<ApiState>) -> ApiResult<Json<LastSyncResponse>> {
    let view = state.latest_view()?;
    Ok(Json(LastSyncResponse::from_view(&view)))
}
