//! Shared fixtures for vpw-tracker integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use vpw_common::model::{CheckStatus, Facets, Jurisdiction, PlateRecord};
use vpw_common::normalize;
use vpw_tracker::services::{AvailabilityCheck, RemoteCheckError};
use vpw_tracker::store::{MemoryStorage, PlateStore};

/// Checker answering from a fixed table keyed by plate text
///
/// Plates missing from the table answer `Unavailable`.
#[derive(Default)]
pub struct ScriptedChecker {
    answers: HashMap<String, Result<CheckStatus, RemoteCheckError>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedChecker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answer(mut self, plate: &str, answer: Result<CheckStatus, RemoteCheckError>) -> Self {
        self.answers.insert(plate.to_string(), answer);
        self
    }

    /// Plate texts in the order they were checked
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl AvailabilityCheck for ScriptedChecker {
    async fn check(&self, record: &PlateRecord) -> Result<CheckStatus, RemoteCheckError> {
        self.calls.lock().unwrap().push(record.plate_text.clone());
        self.answers
            .get(&record.plate_text)
            .cloned()
            .unwrap_or(Ok(CheckStatus::Unavailable))
    }
}

/// Checker that parks every call until released, answering `Available`
#[derive(Default)]
pub struct GatedChecker {
    pub entered: Notify,
    pub release: Notify,
}

impl GatedChecker {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AvailabilityCheck for GatedChecker {
    async fn check(&self, _record: &PlateRecord) -> Result<CheckStatus, RemoteCheckError> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(CheckStatus::Available)
    }
}

/// Idaho record with canonical plate text
pub fn plate(text: &str) -> PlateRecord {
    PlateRecord::new(normalize(text), Jurisdiction::Idaho, Facets::default())
}

/// Memory-backed store pre-filled with the given plates
pub async fn seeded_store(plates: &[&str]) -> (Arc<MemoryStorage>, Arc<PlateStore>) {
    let storage = Arc::new(MemoryStorage::new());
    let store = Arc::new(PlateStore::new(storage.clone()));
    store
        .save(plates.iter().map(|p| plate(p)).collect())
        .await
        .unwrap();
    (storage, store)
}
