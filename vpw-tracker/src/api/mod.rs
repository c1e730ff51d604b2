//! HTTP API
//!
//! JSON endpoints for a UI caller: list/add/delete plates, trigger refresh
//! runs, export/import the collection, health. `/events` streams progress.

mod events;
mod health;
mod plates;
mod refresh;
mod transfer;

pub use events::event_routes;
pub use health::health_routes;
pub use plates::plate_routes;
pub use refresh::refresh_routes;
pub use transfer::transfer_routes;
