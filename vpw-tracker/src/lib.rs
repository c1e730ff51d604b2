//! vpw-tracker library interface
//!
//! Plate registry, availability routing and the refresh scheduler, plus the
//! HTTP surface a UI drives them through. Exposed as a library for the
//! binary and for integration tests.

pub mod api;
pub mod error;
pub mod services;
pub mod store;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use vpw_common::events::EventBus;

use crate::services::RefreshScheduler;
use crate::store::PlateStore;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<PlateStore>,
    pub scheduler: Arc<RefreshScheduler>,
    pub event_bus: EventBus,
    /// Service startup timestamp for uptime reporting
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(store: Arc<PlateStore>, scheduler: Arc<RefreshScheduler>, event_bus: EventBus) -> Self {
        Self {
            store,
            scheduler,
            event_bus,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::plate_routes())
        .merge(api::refresh_routes())
        .merge(api::transfer_routes())
        .merge(api::event_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
