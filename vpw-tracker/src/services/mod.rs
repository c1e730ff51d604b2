//! Services: remote availability checks and the refresh scheduler

pub mod availability;
pub mod refresh_scheduler;

pub use availability::{AvailabilityCheck, AvailabilityRouter, RemoteCheckError};
pub use refresh_scheduler::{
    is_due, RefreshProgress, RefreshScheduler, RefreshSummary, RunGuard, RunState,
};
