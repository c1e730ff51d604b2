use axum::{extract::State, routing::get, Json, Router};
use serde_json::{json, Value};

use crate::AppState;

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    let uptime = chrono::Utc::now() - state.startup_time;
    let refresh_state = state.scheduler.state().await;
    Json(json!({
        "status": "ok",
        "module": "vpw-tracker",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_seconds": uptime.num_seconds(),
        "refresh_state": refresh_state,
    }))
}
