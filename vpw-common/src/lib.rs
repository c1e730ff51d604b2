//! # VPW Common Library
//!
//! Shared code for the vanity plate watch services including:
//! - Plate record model (jurisdiction, facets, status, history)
//! - Plate text normalization and structural identity keys
//! - Event types (PlateEvent enum) and EventBus
//! - Configuration loading
//! - Timestamp utilities

pub mod config;
pub mod error;
pub mod events;
pub mod key;
pub mod model;
pub mod normalize;
pub mod time;

pub use error::{Error, Result};
pub use key::{derive_key, PlateKey};
pub use model::{CheckStatus, Facets, HistoryEntry, Jurisdiction, PlateRecord};
pub use normalize::{normalize, validate_plate_text};
