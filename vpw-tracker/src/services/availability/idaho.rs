//! Idaho personalized plate lookup

use serde_json::{json, Value};
use vpw_common::model::PlateRecord;

use super::{AvailabilityStrategy, RemoteCheckError};

/// Idaho takes every facet: vehicle type, plate kind and the program triple
pub struct IdahoStrategy {
    endpoint: String,
}

impl IdahoStrategy {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }
}

impl AvailabilityStrategy for IdahoStrategy {
    fn name(&self) -> &'static str {
        "idaho"
    }

    fn endpoint(&self) -> Result<&str, RemoteCheckError> {
        if self.endpoint.trim().is_empty() {
            return Err(RemoteCheckError::NotConfigured {
                jurisdiction: "ID".to_string(),
                reason: "no endpoint address".to_string(),
            });
        }
        Ok(&self.endpoint)
    }

    fn payload(&self, record: &PlateRecord) -> Value {
        let facets = &record.facets;
        json!({
            "plateText": record.plate_text,
            "vehicleType": facets.vehicle_type(),
            "plateType": facets.plate_type(),
            "program": facets.program(),
            "programId": facets.program_id(),
            "programSubCategory": facets.program_sub_category(),
        })
    }
}
