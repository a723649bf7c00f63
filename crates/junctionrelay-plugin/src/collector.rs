//! The [`Collector`] capability set.
//!
//! One method per RPC operation, each with the protocol's default
//! behavior, so a minimal plugin implements only `metadata()` and
//! `fetch_sensors()`. The dispatcher passes the current configuration to
//! every call; collectors should not keep configuration in their own
//! state, because the host re-sends `configure` after every restart.

use async_trait::async_trait;
use serde_json::{Value, json};

use junctionrelay_protocol::{CollectorMetadata, ConfigureParams, SensorReading};

use crate::error::CollectorError;

fn success() -> Value {
    json!({"success": true})
}

/// A data collector driven by the stdio dispatcher.
///
/// All methods except [`metadata`](Collector::metadata) have defaults:
///
/// - `configure`, `test_connection`, `start_session`, `stop_session`
///   answer `{"success": true}`;
/// - `fetch_sensors` answers an empty batch;
/// - `fetch_selected_sensors` fetches the full batch and filters it by
///   `uniqueSensorKey`, preserving order -- plugins only need to override
///   it when a partial fetch is genuinely cheaper.
#[async_trait]
pub trait Collector: Send + Sync {
    /// Identity, UI hints, and polling defaults for this collector.
    fn metadata(&self) -> CollectorMetadata;

    /// Apply new configuration. The dispatcher has already stored `params`
    /// as the current configuration before this is called.
    async fn configure(&self, params: &ConfigureParams) -> Result<Value, CollectorError> {
        let _ = params;
        Ok(success())
    }

    /// Verify that the configured source is reachable.
    async fn test_connection(&self, config: &ConfigureParams) -> Result<Value, CollectorError> {
        let _ = config;
        Ok(success())
    }

    /// Collect the full sensor batch.
    async fn fetch_sensors(
        &self,
        config: &ConfigureParams,
    ) -> Result<Vec<SensorReading>, CollectorError> {
        let _ = config;
        Ok(Vec::new())
    }

    /// Collect only the sensors named by `sensor_ids`.
    async fn fetch_selected_sensors(
        &self,
        config: &ConfigureParams,
        sensor_ids: &[String],
    ) -> Result<Vec<SensorReading>, CollectorError> {
        let all = self.fetch_sensors(config).await?;
        Ok(all
            .into_iter()
            .filter(|s| sensor_ids.contains(&s.unique_sensor_key))
            .collect())
    }

    /// Open a persistent session, for collectors that keep one between
    /// polls.
    async fn start_session(&self, config: &ConfigureParams) -> Result<Value, CollectorError> {
        let _ = config;
        Ok(success())
    }

    /// Close the persistent session.
    async fn stop_session(&self, config: &ConfigureParams) -> Result<Value, CollectorError> {
        let _ = config;
        Ok(success())
    }
}
