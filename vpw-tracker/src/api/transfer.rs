//! Export / import of the whole collection

use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};

use crate::{ApiResult, AppState};

pub fn transfer_routes() -> Router<AppState> {
    Router::new()
        .route("/export", get(export))
        .route("/import", post(import))
}

async fn export(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let body = state.store.export().await?;
    Ok(([(header::CONTENT_TYPE, "application/json")], body))
}

async fn import(State(state): State<AppState>, body: String) -> ApiResult<Json<Value>> {
    let imported = state.store.import(&body).await?;
    Ok(Json(json!({ "imported": imported })))
}
