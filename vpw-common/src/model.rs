//! Plate record model
//!
//! Persisted as a JSON array of camelCase objects. Facet fields and the
//! jurisdiction tag are optional on the wire so that legacy entries written
//! before they existed still decode; [`PlateRecord::fill_defaults`] brings
//! such entries up to date.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::normalize::{is_canonical, normalize};

/// Default vehicle type facet
pub const DEFAULT_VEHICLE_TYPE: &str = "PassengerVehicle";
/// Default plate kind facet
pub const DEFAULT_PLATE_TYPE: &str = "Personalized";
/// Default program facet
pub const DEFAULT_PROGRAM: &str = "Standard";
/// Default program id facet
pub const DEFAULT_PROGRAM_ID: &str = "0";
/// Default program sub-category facet
pub const DEFAULT_PROGRAM_SUB_CATEGORY: &str = "None";

/// Issuing authority for a plate
///
/// Tags other than the supported ones are kept verbatim so that imported
/// data survives a round trip, but they have no availability strategy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Jurisdiction {
    /// Idaho (`ID`)
    Idaho,
    /// California (`CA`)
    California,
    /// Any other tag, uppercased
    Other(String),
}

impl Jurisdiction {
    pub fn as_str(&self) -> &str {
        match self {
            Jurisdiction::Idaho => "ID",
            Jurisdiction::California => "CA",
            Jurisdiction::Other(tag) => tag,
        }
    }

    /// Parse a tag; blank input means "absent" and maps to Idaho
    pub fn from_tag(tag: &str) -> Self {
        let tag = tag.trim().to_uppercase();
        match tag.as_str() {
            "" | "ID" => Jurisdiction::Idaho,
            "CA" => Jurisdiction::California,
            _ => Jurisdiction::Other(tag),
        }
    }
}

impl Default for Jurisdiction {
    fn default() -> Self {
        Jurisdiction::Idaho
    }
}

impl From<String> for Jurisdiction {
    fn from(tag: String) -> Self {
        Jurisdiction::from_tag(&tag)
    }
}

impl From<Jurisdiction> for String {
    fn from(j: Jurisdiction) -> Self {
        j.as_str().to_string()
    }
}

impl FromStr for Jurisdiction {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Jurisdiction::from_tag(s))
    }
}

impl fmt::Display for Jurisdiction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of the most recent availability check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "Option<String>")]
pub enum CheckStatus {
    /// Never checked (or unrecognized persisted value)
    #[default]
    Unknown,
    Available,
    Unavailable,
    /// Last check failed; see the history note
    Error,
}

impl From<String> for CheckStatus {
    fn from(text: String) -> Self {
        match text.as_str() {
            "Available" => CheckStatus::Available,
            "Unavailable" => CheckStatus::Unavailable,
            "Error" => CheckStatus::Error,
            _ => CheckStatus::Unknown,
        }
    }
}

impl From<Option<String>> for CheckStatus {
    fn from(text: Option<String>) -> Self {
        text.map(CheckStatus::from).unwrap_or_default()
    }
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CheckStatus::Unknown => "Unknown",
            CheckStatus::Available => "Available",
            CheckStatus::Unavailable => "Unavailable",
            CheckStatus::Error => "Error",
        };
        f.write_str(s)
    }
}

/// Classification fields that take part in a plate's identity
///
/// `None` (or blank) means "unset"; accessors return the documented default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Facets {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicle_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plate_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub program: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub program_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub program_sub_category: Option<String>,
}

fn facet_or<'a>(value: &'a Option<String>, default: &'a str) -> &'a str {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => v,
        _ => default,
    }
}

fn fill_facet(value: &mut Option<String>, default: &str) -> bool {
    let resolved = facet_or(value, default).to_string();
    if value.as_deref() == Some(resolved.as_str()) {
        return false;
    }
    *value = Some(resolved);
    true
}

impl Facets {
    /// All facets explicitly set to their defaults
    pub fn defaults() -> Self {
        let mut facets = Facets::default();
        facets.fill_defaults();
        facets
    }

    pub fn vehicle_type(&self) -> &str {
        facet_or(&self.vehicle_type, DEFAULT_VEHICLE_TYPE)
    }

    pub fn plate_type(&self) -> &str {
        facet_or(&self.plate_type, DEFAULT_PLATE_TYPE)
    }

    pub fn program(&self) -> &str {
        facet_or(&self.program, DEFAULT_PROGRAM)
    }

    pub fn program_id(&self) -> &str {
        facet_or(&self.program_id, DEFAULT_PROGRAM_ID)
    }

    pub fn program_sub_category(&self) -> &str {
        facet_or(&self.program_sub_category, DEFAULT_PROGRAM_SUB_CATEGORY)
    }

    /// Write defaults (and trimmed values) into every field; true if anything changed
    pub fn fill_defaults(&mut self) -> bool {
        let mut changed = fill_facet(&mut self.vehicle_type, DEFAULT_VEHICLE_TYPE);
        changed |= fill_facet(&mut self.plate_type, DEFAULT_PLATE_TYPE);
        changed |= fill_facet(&mut self.program, DEFAULT_PROGRAM);
        changed |= fill_facet(&mut self.program_id, DEFAULT_PROGRAM_ID);
        changed |= fill_facet(&mut self.program_sub_category, DEFAULT_PROGRAM_SUB_CATEGORY);
        changed
    }

    /// Overlay the fields `other` sets explicitly
    fn overlay(&mut self, other: &Facets) {
        let pairs = [
            (&mut self.vehicle_type, &other.vehicle_type),
            (&mut self.plate_type, &other.plate_type),
            (&mut self.program, &other.program),
            (&mut self.program_id, &other.program_id),
            (&mut self.program_sub_category, &other.program_sub_category),
        ];
        for (mine, theirs) in pairs {
            if theirs.is_some() {
                *mine = theirs.clone();
            }
        }
    }
}

/// Treat an explicit `null` the same as an absent field
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// One completed availability check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    #[serde(default)]
    pub status: CheckStatus,
    #[serde(default, deserialize_with = "null_as_default")]
    pub checked_utc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl HistoryEntry {
    pub fn new(status: CheckStatus, checked_at: DateTime<Utc>, note: Option<String>) -> Self {
        Self {
            status,
            checked_utc: format_timestamp(checked_at),
            note,
        }
    }
}

/// One watched vanity plate candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlateRecord {
    pub plate_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jurisdiction: Option<Jurisdiction>,
    #[serde(flatten)]
    pub facets: Facets,
    #[serde(default)]
    pub last_status: CheckStatus,
    /// RFC 3339 text as persisted; may be unparsable in legacy data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_checked_utc: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub history: Vec<HistoryEntry>,
}

impl PlateRecord {
    /// Fresh, never-checked record; `plate_text` must already be normalized
    pub fn new(plate_text: impl Into<String>, jurisdiction: Jurisdiction, mut facets: Facets) -> Self {
        facets.fill_defaults();
        Self {
            plate_text: plate_text.into(),
            jurisdiction: Some(jurisdiction),
            facets,
            last_status: CheckStatus::Unknown,
            last_checked_utc: None,
            history: Vec::new(),
        }
    }

    /// Jurisdiction, defaulting to Idaho when absent
    pub fn jurisdiction(&self) -> Jurisdiction {
        self.jurisdiction.clone().unwrap_or_default()
    }

    /// Parsed last check time; `None` if never checked or unparsable
    pub fn last_checked(&self) -> Option<DateTime<Utc>> {
        self.last_checked_utc.as_deref().and_then(parse_timestamp)
    }

    /// Apply a successful check
    pub fn record_success(&mut self, status: CheckStatus, checked_at: DateTime<Utc>) {
        self.history.push(HistoryEntry::new(status, checked_at, None));
        self.last_status = status;
        self.last_checked_utc = Some(format_timestamp(checked_at));
    }

    /// Apply a failed check
    ///
    /// `last_checked_utc` is left alone so the plate stays due and is retried
    /// by the next unforced refresh.
    pub fn record_failure(&mut self, message: impl Into<String>, checked_at: DateTime<Utc>) {
        self.history
            .push(HistoryEntry::new(CheckStatus::Error, checked_at, Some(message.into())));
        self.last_status = CheckStatus::Error;
    }

    /// Bring a legacy entry up to date: canonical plate text, explicit
    /// jurisdiction, explicit facets. Returns true if anything changed.
    pub fn fill_defaults(&mut self) -> bool {
        let mut changed = false;
        if !is_canonical(&self.plate_text) {
            let text = normalize(&self.plate_text);
            changed |= text != self.plate_text;
            self.plate_text = text;
        }
        let jurisdiction = self.jurisdiction();
        if self.jurisdiction.as_ref() != Some(&jurisdiction) {
            self.jurisdiction = Some(jurisdiction);
            changed = true;
        }
        changed |= self.facets.fill_defaults();
        changed
    }

    /// Merge `entry` onto this record, `entry` winning where it carries a value
    ///
    /// History never shrinks: the longer of the two histories is kept.
    pub fn merge_from(&mut self, entry: PlateRecord) {
        self.plate_text = entry.plate_text;
        if entry.jurisdiction.is_some() {
            self.jurisdiction = entry.jurisdiction;
        }
        self.facets.overlay(&entry.facets);
        if entry.last_status != CheckStatus::Unknown {
            self.last_status = entry.last_status;
        }
        if entry.last_checked_utc.is_some() {
            self.last_checked_utc = entry.last_checked_utc;
        }
        if entry.history.len() >= self.history.len() {
            self.history = entry.history;
        }
    }
}

/// Format a timestamp the way records persist it
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a persisted timestamp, tolerating any RFC 3339 offset
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
