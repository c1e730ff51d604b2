//! Plate registry
//!
//! [`PlateStore`] owns the persisted plate collection. Every operation reads
//! the whole collection through a [`PlateStorage`] backend, mutates it in
//! memory and writes it back wholesale, sorted by plate text. Backends only
//! move an opaque JSON payload stored under one logical key; nothing else
//! touches the underlying medium.

pub mod json_file;
pub mod memory;
pub mod sqlite;

pub use json_file::JsonFileStorage;
pub use memory::MemoryStorage;
pub use sqlite::SqliteStorage;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::cmp::Ordering;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};
use vpw_common::events::{EventBus, PlateEvent};
use vpw_common::model::{CheckStatus, Facets, Jurisdiction, PlateRecord};
use vpw_common::{derive_key, normalize, validate_plate_text, Error, PlateKey, Result};

/// Persistence primitive for the plate collection
#[async_trait]
pub trait PlateStorage: Send + Sync {
    /// Read the persisted payload; `None` if nothing has been written yet
    async fn read_raw(&self) -> Result<Option<String>>;

    /// Replace the persisted payload
    async fn write_raw(&self, payload: &str) -> Result<()>;

    /// Human-readable location, for logs
    fn describe(&self) -> String;
}

/// Why a persisted payload could not be decoded
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("payload is not valid JSON: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("payload is not a record array (found {0})")]
    NotAnArray(&'static str),

    #[error("record {index} is invalid: {source}")]
    InvalidRecord {
        index: usize,
        #[source]
        source: serde_json::Error,
    },
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A decoded record array
#[derive(Debug, Default)]
pub struct DecodedRecords {
    pub records: Vec<PlateRecord>,
    /// `InvalidRecord` for each entry that could not be read
    pub rejected: Vec<DecodeError>,
}

/// Decode a record array, distinguishing each way it can be broken
///
/// A broken payload is an error; a readable array with some unreadable
/// entries decodes the rest and reports the bad ones in `rejected`.
pub fn decode_records(payload: &str) -> std::result::Result<DecodedRecords, DecodeError> {
    let value: Value = serde_json::from_str(payload).map_err(DecodeError::Malformed)?;
    let items = match value {
        Value::Array(items) => items,
        other => return Err(DecodeError::NotAnArray(json_kind(&other))),
    };

    let mut decoded = DecodedRecords::default();
    for (index, item) in items.into_iter().enumerate() {
        match serde_json::from_value(item) {
            Ok(record) => decoded.records.push(record),
            Err(source) => decoded.rejected.push(DecodeError::InvalidRecord { index, source }),
        }
    }
    Ok(decoded)
}

/// Order used for the persisted collection: case-insensitive plate text,
/// exact text as tie-break
pub fn compare_plate_text(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

/// Sort records into persisted order (stable)
pub fn sort_records(records: &mut [PlateRecord]) {
    records.sort_by(|a, b| compare_plate_text(&a.plate_text, &b.plate_text));
}

/// Bring legacy records up to date and collapse duplicate identities
///
/// Entries whose plate text normalizes to nothing are dropped. When two
/// entries end up with the same key the later one is merged onto the earlier.
/// Returns the migrated records and whether anything changed.
pub fn migrate_records(records: Vec<PlateRecord>) -> (Vec<PlateRecord>, bool) {
    let mut changed = false;
    let mut migrated: Vec<PlateRecord> = Vec::with_capacity(records.len());

    for mut record in records {
        if normalize(&record.plate_text).is_empty() {
            warn!(plate_text = %record.plate_text, "Dropping record with unusable plate text");
            changed = true;
            continue;
        }
        changed |= record.fill_defaults();

        let key = derive_key(&record);
        match migrated.iter_mut().find(|r| derive_key(r) == key) {
            Some(existing) => {
                debug!(plate = %key, "Merging duplicate record");
                existing.merge_from(record);
                changed = true;
            }
            None => migrated.push(record),
        }
    }

    (migrated, changed)
}

/// Result of one availability check, as the store records it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    /// The remote service answered
    Status(CheckStatus),
    /// The check failed; message becomes the history note
    Failed(String),
}

impl CheckOutcome {
    pub fn status(&self) -> CheckStatus {
        match self {
            CheckOutcome::Status(status) => *status,
            CheckOutcome::Failed(_) => CheckStatus::Error,
        }
    }
}

/// Persisted plate collection
pub struct PlateStore {
    storage: Arc<dyn PlateStorage>,
    events: Option<EventBus>,
}

impl PlateStore {
    pub fn new(storage: Arc<dyn PlateStorage>) -> Self {
        Self {
            storage,
            events: None,
        }
    }

    /// Emit PlateSaved / PlateDeleted on the given bus
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    fn emit(&self, event: PlateEvent) {
        if let Some(bus) = &self.events {
            bus.emit_lossy(event);
        }
    }

    /// Read all records
    ///
    /// A missing, corrupt or non-array payload yields an empty collection.
    /// Individual unreadable entries are skipped with a warning. Only
    /// failures of the storage medium itself are returned as errors.
    pub async fn load(&self) -> Result<Vec<PlateRecord>> {
        let Some(payload) = self.storage.read_raw().await? else {
            return Ok(Vec::new());
        };
        match decode_records(&payload) {
            Ok(decoded) => {
                for e in &decoded.rejected {
                    warn!(
                        storage = %self.storage.describe(),
                        error = %e,
                        "Skipping unreadable plate record"
                    );
                }
                Ok(decoded.records)
            }
            Err(e) => {
                warn!(
                    storage = %self.storage.describe(),
                    error = %e,
                    "Persisted plate collection is unreadable, treating as empty"
                );
                Ok(Vec::new())
            }
        }
    }

    /// Sort and write the full collection, replacing prior content
    pub async fn save(&self, mut records: Vec<PlateRecord>) -> Result<Vec<PlateRecord>> {
        sort_records(&mut records);
        let payload = serde_json::to_string_pretty(&records)?;
        self.storage.write_raw(&payload).await?;
        debug!(count = records.len(), "Saved plate collection");
        Ok(records)
    }

    /// Insert `entry`, or merge it onto the record with the same key
    pub async fn upsert(&self, entry: PlateRecord) -> Result<PlateRecord> {
        let key = derive_key(&entry);
        let mut records = self.load().await?;

        match records.iter_mut().find(|r| derive_key(r) == key) {
            Some(existing) => existing.merge_from(entry),
            None => records.push(entry),
        }

        let records = self.save(records).await?;
        let stored = records
            .into_iter()
            .find(|r| derive_key(r) == key)
            .ok_or_else(|| Error::Internal(format!("record {} missing after save", key)))?;

        self.emit(PlateEvent::PlateSaved {
            key,
            timestamp: Utc::now(),
        });
        Ok(stored)
    }

    /// Validate raw plate text and add it with defaulted facets
    pub async fn add_plate(
        &self,
        raw_text: &str,
        jurisdiction: Jurisdiction,
        facets: Facets,
    ) -> Result<PlateRecord> {
        let plate_text = validate_plate_text(raw_text)?;
        let record = PlateRecord::new(plate_text, jurisdiction, facets);
        info!(plate = %derive_key(&record), "Adding plate");
        self.upsert(record).await
    }

    /// Remove the record with this key; false (and no write) if none matches
    pub async fn delete_by_key(&self, key: &PlateKey) -> Result<bool> {
        let mut records = self.load().await?;
        let Some(index) = records.iter().position(|r| &derive_key(r) == key) else {
            debug!(plate = %key, "Delete requested for unknown plate");
            return Ok(false);
        };

        records.remove(index);
        self.save(records).await?;
        info!(plate = %key, "Deleted plate");

        self.emit(PlateEvent::PlateDeleted {
            key: key.clone(),
            timestamp: Utc::now(),
        });
        Ok(true)
    }

    pub async fn find(&self, key: &PlateKey) -> Result<Option<PlateRecord>> {
        Ok(self
            .load()
            .await?
            .into_iter()
            .find(|r| &derive_key(r) == key))
    }

    /// Apply one check result to the record with this key and persist
    ///
    /// Returns `None` without writing if the record no longer exists.
    pub async fn record_check(
        &self,
        key: &PlateKey,
        outcome: &CheckOutcome,
        checked_at: DateTime<Utc>,
    ) -> Result<Option<PlateRecord>> {
        let mut records = self.load().await?;
        let Some(record) = records.iter_mut().find(|r| &derive_key(r) == key) else {
            return Ok(None);
        };

        match outcome {
            CheckOutcome::Status(status) => record.record_success(*status, checked_at),
            CheckOutcome::Failed(message) => record.record_failure(message.clone(), checked_at),
        }
        let updated = record.clone();

        self.save(records).await?;
        Ok(Some(updated))
    }

    /// Migrate the persisted collection; writes only if something changed
    pub async fn migrate_on_startup(&self) -> Result<bool> {
        let (records, changed) = migrate_records(self.load().await?);
        if changed {
            info!(count = records.len(), "Migrated legacy plate records");
            self.save(records).await?;
        }
        Ok(changed)
    }

    /// Dump the persisted collection as a JSON record array
    pub async fn export(&self) -> Result<String> {
        let records = self.load().await?;
        Ok(serde_json::to_string_pretty(&records)?)
    }

    /// Replace the collection with an imported record array
    ///
    /// Unlike [`load`](Self::load), malformed input is rejected rather than
    /// treated as empty, so a bad file cannot wipe the watchlist.
    pub async fn import(&self, payload: &str) -> Result<usize> {
        let decoded = decode_records(payload)
            .map_err(|e| Error::Validation(format!("import rejected: {}", e)))?;
        if let Some(e) = decoded.rejected.first() {
            return Err(Error::Validation(format!("import rejected: {}", e)));
        }
        let (records, _) = migrate_records(decoded.records);
        let records = self.save(records).await?;
        info!(count = records.len(), "Imported plate collection");
        Ok(records.len())
    }
}
