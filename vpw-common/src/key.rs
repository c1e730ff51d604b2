//! Structural plate identity
//!
//! Two records are the same plate iff their [`PlateKey`]s are equal. The key
//! is compared field by field, so a facet value containing any particular
//! separator character cannot collide with a neighbouring field.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::{Facets, Jurisdiction, PlateRecord};

/// Identity tuple: plate text, jurisdiction and the five facets, each resolved
/// to its default when unset
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlateKey {
    pub plate_text: String,
    pub jurisdiction: Jurisdiction,
    pub vehicle_type: String,
    pub plate_type: String,
    pub program: String,
    pub program_id: String,
    pub program_sub_category: String,
}

impl PlateKey {
    pub fn new(plate_text: &str, jurisdiction: Jurisdiction, facets: &Facets) -> Self {
        Self {
            plate_text: plate_text.to_uppercase(),
            jurisdiction,
            vehicle_type: facets.vehicle_type().to_string(),
            plate_type: facets.plate_type().to_string(),
            program: facets.program().to_string(),
            program_id: facets.program_id().to_string(),
            program_sub_category: facets.program_sub_category().to_string(),
        }
    }
}

/// Derive the identity of a record
///
/// Depends only on plate text, jurisdiction and facets; status, timestamps
/// and history never affect it.
pub fn derive_key(record: &PlateRecord) -> PlateKey {
    PlateKey::new(&record.plate_text, record.jurisdiction(), &record.facets)
}

impl fmt::Display for PlateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} [{}, {}, {}, {}, {}]",
            self.jurisdiction,
            self.plate_text,
            self.vehicle_type,
            self.plate_type,
            self.program,
            self.program_id,
            self.program_sub_category
        )
    }
}
