//! Plate availability lookups
//!
//! [`AvailabilityRouter`] picks the strategy registered for a record's
//! jurisdiction, lets it build the request payload, issues one POST and maps
//! the boolean `Available` field of the response to a [`CheckStatus`].
//! Every failure surfaces as a [`RemoteCheckError`]; nothing is silently
//! coerced into a status.

pub mod california;
pub mod idaho;

pub use california::CaliforniaStrategy;
pub use idaho::IdahoStrategy;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use vpw_common::config::AvailabilityConfig;
use vpw_common::model::{CheckStatus, Jurisdiction, PlateRecord};
use vpw_common::{derive_key, Error, Result};

const USER_AGENT: &str = concat!("vpw-tracker/", env!("CARGO_PKG_VERSION"));

/// Longest error body kept; it ends up in the plate's history note
const MAX_ERROR_BODY_CHARS: usize = 300;

/// Availability check failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteCheckError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Undecodable response: {0}")]
    Decode(String),

    #[error("No availability service for jurisdiction {0}")]
    UnsupportedJurisdiction(String),

    #[error("{jurisdiction} availability check is not configured: {reason}")]
    NotConfigured {
        jurisdiction: String,
        reason: String,
    },
}

/// Anything that can answer "is this plate obtainable right now?"
#[async_trait]
pub trait AvailabilityCheck: Send + Sync {
    async fn check(&self, record: &PlateRecord) -> std::result::Result<CheckStatus, RemoteCheckError>;
}

/// Per-jurisdiction request shape
pub trait AvailabilityStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Where to POST; `NotConfigured` if the strategy lacks an address
    fn endpoint(&self) -> std::result::Result<&str, RemoteCheckError>;

    /// JSON body for this record
    fn payload(&self, record: &PlateRecord) -> Value;
}

/// Decoded response body
#[derive(Debug, Deserialize)]
struct AvailabilityResponse {
    #[serde(rename = "Available", alias = "available", deserialize_with = "deserialize_boolish")]
    available: bool,
}

/// Accept `true`/`false`, `"true"`/`"false"`/`"yes"`/`"no"` and `1`/`0`
fn deserialize_boolish<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error as _;

    match Value::deserialize(deserializer)? {
        Value::Bool(b) => Ok(b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Ok(true),
            "false" | "no" | "0" => Ok(false),
            other => Err(D::Error::custom(format!("not a boolean: {:?}", other))),
        },
        Value::Number(n) => match n.as_i64() {
            Some(1) => Ok(true),
            Some(0) => Ok(false),
            _ => Err(D::Error::custom(format!("not a boolean: {}", n))),
        },
        other => Err(D::Error::custom(format!("not a boolean: {}", other))),
    }
}

/// Decode a response body into a status
pub fn parse_availability(body: &str) -> std::result::Result<CheckStatus, RemoteCheckError> {
    let response: AvailabilityResponse =
        serde_json::from_str(body).map_err(|e| RemoteCheckError::Decode(e.to_string()))?;
    Ok(if response.available {
        CheckStatus::Available
    } else {
        CheckStatus::Unavailable
    })
}

/// Routes each record to the strategy for its jurisdiction
pub struct AvailabilityRouter {
    http_client: reqwest::Client,
    strategies: HashMap<Jurisdiction, Box<dyn AvailabilityStrategy>>,
}

impl AvailabilityRouter {
    /// Router with no strategies; every check fails as unsupported
    pub fn new(timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("HTTP client setup failed: {}", e)))?;

        Ok(Self {
            http_client,
            strategies: HashMap::new(),
        })
    }

    /// Router with the Idaho and California strategies from configuration
    pub fn from_config(config: &AvailabilityConfig) -> Result<Self> {
        let router = Self::new(Duration::from_secs(config.request_timeout_secs))?
            .with_strategy(
                Jurisdiction::Idaho,
                Box::new(IdahoStrategy::new(config.idaho_endpoint.clone())),
            )
            .with_strategy(
                Jurisdiction::California,
                Box::new(CaliforniaStrategy::new(config.california_proxy.clone())),
            );
        Ok(router)
    }

    pub fn with_strategy(
        mut self,
        jurisdiction: Jurisdiction,
        strategy: Box<dyn AvailabilityStrategy>,
    ) -> Self {
        self.strategies.insert(jurisdiction, strategy);
        self
    }

    pub fn supports(&self, jurisdiction: &Jurisdiction) -> bool {
        self.strategies.contains_key(jurisdiction)
    }

    async fn post(&self, url: &str, payload: &Value) -> std::result::Result<String, RemoteCheckError> {
        let response = self
            .http_client
            .post(url)
            .json(payload)
            .send()
            .await
            .map_err(|e| RemoteCheckError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteCheckError::Http {
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        response
            .text()
            .await
            .map_err(|e| RemoteCheckError::Network(e.to_string()))
    }
}

/// Trimmed error body, cut to `MAX_ERROR_BODY_CHARS` on a char boundary
fn truncate_body(body: &str) -> String {
    let body = body.trim();
    match body.char_indices().nth(MAX_ERROR_BODY_CHARS) {
        Some((cut, _)) => format!("{}...", &body[..cut]),
        None => body.to_string(),
    }
}

#[async_trait]
impl AvailabilityCheck for AvailabilityRouter {
    async fn check(&self, record: &PlateRecord) -> std::result::Result<CheckStatus, RemoteCheckError> {
        let jurisdiction = record.jurisdiction();
        let strategy = self
            .strategies
            .get(&jurisdiction)
            .ok_or_else(|| RemoteCheckError::UnsupportedJurisdiction(jurisdiction.to_string()))?;

        let url = strategy.endpoint()?;
        let payload = strategy.payload(record);
        debug!(
            plate = %derive_key(record),
            strategy = strategy.name(),
            url = %url,
            "Querying availability service"
        );

        let body = self.post(url, &payload).await?;
        parse_availability(&body)
    }
}
