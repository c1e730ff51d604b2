//! Plate registry endpoints

use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use vpw_common::model::{Facets, Jurisdiction, PlateRecord};
use vpw_common::{time, PlateKey};

use crate::{ApiResult, AppState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddPlateRequest {
    pub plate_text: String,
    #[serde(default)]
    pub jurisdiction: Option<Jurisdiction>,
    #[serde(flatten)]
    pub facets: Facets,
}

pub fn plate_routes() -> Router<AppState> {
    Router::new()
        .route("/plates", get(list_plates).post(add_plate).delete(delete_plate))
        .route("/plates/due", get(due_plates))
}

async fn list_plates(State(state): State<AppState>) -> ApiResult<Json<Vec<PlateRecord>>> {
    Ok(Json(state.store.load().await?))
}

async fn due_plates(State(state): State<AppState>) -> ApiResult<Json<Vec<PlateRecord>>> {
    Ok(Json(state.scheduler.due_records(time::now()).await?))
}

async fn add_plate(
    State(state): State<AppState>,
    Json(request): Json<AddPlateRequest>,
) -> ApiResult<(StatusCode, Json<PlateRecord>)> {
    let record = state
        .store
        .add_plate(
            &request.plate_text,
            request.jurisdiction.unwrap_or_default(),
            request.facets,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

async fn delete_plate(
    State(state): State<AppState>,
    Json(key): Json<PlateKey>,
) -> ApiResult<Json<Value>> {
    let deleted = state.store.delete_by_key(&key).await?;
    Ok(Json(json!({ "deleted": deleted })))
}
