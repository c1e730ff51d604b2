//! California personalized plate lookup
//!
//! The California service is only reachable through a proxy; without a
//! configured proxy address every check fails as `NotConfigured`.

use serde_json::{json, Value};
use vpw_common::model::PlateRecord;

use super::{AvailabilityStrategy, RemoteCheckError};

pub struct CaliforniaStrategy {
    proxy: Option<String>,
}

impl CaliforniaStrategy {
    pub fn new(proxy: Option<String>) -> Self {
        Self {
            proxy: proxy.filter(|p| !p.trim().is_empty()),
        }
    }
}

impl AvailabilityStrategy for CaliforniaStrategy {
    fn name(&self) -> &'static str {
        "california"
    }

    fn endpoint(&self) -> Result<&str, RemoteCheckError> {
        self.proxy
            .as_deref()
            .ok_or_else(|| RemoteCheckError::NotConfigured {
                jurisdiction: "CA".to_string(),
                reason: "no proxy address set (VPW_CALIFORNIA_PROXY or [availability] california_proxy)"
                    .to_string(),
            })
    }

    // Program facets have no California equivalent and are left out.
    fn payload(&self, record: &PlateRecord) -> Value {
        json!({
            "plateText": record.plate_text,
            "vehicleType": record.facets.vehicle_type(),
            "plateType": record.facets.plate_type(),
        })
    }
}
