//! HTTP front door for the topology hub
//!
//! Serves the latest published topology view and the scheduler's
//! statistics, and accepts manual refresh requests. Handlers never touch
//! the refresh cycle directly: reads go through the view channel, refresh
//! requests through the scheduler handle.
//!
//! ## Endpoints
//!
//! - `GET /api/topology_data` - Latest topology document
//! - `GET /api/last_sync_timestamp` - Time of the most recent completed refresh
//! - `GET /api/v1/health` - Health check
//! - `GET /api/v1/stats` - Scheduler and notification statistics
//! - `GET /api/v1/alerts` - Currently alerted components
//! - `POST /api/v1/refresh` - Request a refresh cycle

pub mod error;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod types;

pub use crate::config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use state::ApiState;
pub use types::{
    AlertsResponse, HealthResponse, LastSyncResponse, StatsResponse, TopologyDataResponse,
};

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Build the router with every route and the configured layers
pub fn build_router(config: &ApiConfig, state: ApiState) -> Router {
    let mut app = Router::new()
        .route("/api/topology_data", get(routes::topology::get_topology_data))
        .route(
            "/api/last_sync_timestamp",
            get(routes::topology::get_last_sync),
        )
        .route("/api/v1/health", get(routes::health::health_check))
        .route("/api/v1/stats", get(routes::stats::get_stats))
        .route("/api/v1/alerts", get(routes::alerts::get_alerts))
        .route("/api/v1/refresh", post(routes::refresh::trigger_refresh))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if config.enable_cors {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        app = app.layer(cors);
    }

    if let Some(token) = &config.auth_token {
        let token: Arc<str> = Arc::from(token.as_str());
        app = app.layer(axum::middleware::from_fn_with_state(
            token,
            middleware::auth::auth_middleware,
        ));
    }

    app
}

/// Spawn the API server
///
/// Binds the listener, then serves on a background task.
/// Returns the server's local address.
pub async fn spawn_api_server(config: ApiConfig, state: ApiState) -> anyhow::Result<SocketAddr> {
    info!("starting API server on {}", config.bind_addr);

    let app = build_router(&config, state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    let addr = listener.local_addr()?;

    info!("API server listening on {}", addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("API server error: {}", e);
        }
    });

    Ok(addr)
}
