//! Refresh run endpoints

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info};

use crate::{ApiResult, AppState};

#[derive(Debug, Default, Deserialize)]
pub struct RefreshQuery {
    #[serde(default)]
    pub force: bool,
}

pub fn refresh_routes() -> Router<AppState> {
    Router::new()
        .route("/refresh", post(start_refresh))
        .route("/refresh/status", get(refresh_status))
}

/// Start a run in the background; progress is published on the event bus
///
/// The run is claimed before responding, so a second request while one is
/// active gets 409 rather than a 202 for a run that never happens.
async fn start_refresh(
    State(state): State<AppState>,
    Query(query): Query<RefreshQuery>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let guard = state.scheduler.try_begin()?;

    let scheduler = state.scheduler.clone();
    let force = query.force;
    tokio::spawn(async move {
        match scheduler.run_guarded(guard, force, |_| {}).await {
            Ok(summary) => info!(total = summary.total, failed = summary.failed, "Background refresh done"),
            Err(e) => error!("Background refresh failed: {}", e),
        }
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "started": true, "forced": force })),
    ))
}

async fn refresh_status(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "state": state.scheduler.state().await }))
}
