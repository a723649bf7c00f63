//! Typed parameter and result shapes for the RPC methods.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::sensor::clamp_decimal_places;

/// Parameters of `configure`.
///
/// The host memoizes the last-seen parameters per plugin and replays them
/// after a restart, so unknown fields are preserved through `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigureParams {
    #[serde(default)]
    pub collector_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, deserialize_with = "de_clamped_decimal_opt")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decimal_places: Option<u8>,
    /// Fields this protocol version does not know about, carried verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn de_clamped_decimal_opt<'de, D>(deserializer: D) -> Result<Option<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let n = Option::<i64>::deserialize(deserializer)?;
    Ok(n.map(clamp_decimal_places))
}

/// Parameters of `fetchSelectedSensors`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedSensorsParams {
    #[serde(default)]
    pub sensor_ids: Vec<String>,
}

/// Result of `healthCheck`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub healthy: bool,
    /// Seconds since the dispatcher started.
    #[serde(default)]
    pub uptime: u64,
}
