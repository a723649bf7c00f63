//! The dispatcher loop: read framed requests, route to the collector,
//! write framed responses.
//!
//! [`Dispatcher::run`] is generic over `AsyncBufRead + AsyncWrite` so it
//! can be driven by stdio or by in-memory buffers in tests.
//! [`Dispatcher::serve`] wires it to stdin/stdout, emits the readiness
//! line on stderr, and exits on SIGINT/SIGTERM or stdin EOF.
//!
//! Standard output carries only framed JSON; anything else a plugin wants
//! to say goes to standard error (see [`crate::logging`]).

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use serde_json::{Value, json};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, warn};

use junctionrelay_protocol::{
    ConfigureParams, INTERNAL_ERROR, MAX_DECIMAL_PLACES, RpcError, RpcRequest, RpcResponse,
    SelectedSensorsParams, SensorReading, method,
};

use crate::collector::Collector;
use crate::error::CollectorError;

/// Drives one collector over the framed stdio protocol.
pub struct Dispatcher {
    collector: Arc<dyn Collector>,
    config: ConfigureParams,
    started: Instant,
}

impl Dispatcher {
    pub fn new(collector: Arc<dyn Collector>) -> Self {
        Self {
            collector,
            config: ConfigureParams::default(),
            started: Instant::now(),
        }
    }

    /// Run against stdin/stdout until EOF or a termination signal.
    ///
    /// Emits the single readiness line (`"[plugin] <displayName> ready"`)
    /// on stderr before reading anything. The supervisor treats the first
    /// stderr line as the readiness token, so plugins must not write to
    /// stderr before calling this.
    pub async fn serve(mut self) -> std::io::Result<()> {
        eprintln!("[plugin] {} ready", self.collector.metadata().display_name);

        let stdin = BufReader::new(tokio::io::stdin());
        let stdout = tokio::io::stdout();

        tokio::select! {
            result = self.run(stdin, stdout) => result,
            result = shutdown_signal() => result,
        }
    }

    /// Run the request loop over the given streams until EOF.
    ///
    /// Exactly one response line is written per non-empty request line.
    pub async fn run<R, W>(&mut self, reader: R, mut writer: W) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();

        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let response = self.dispatch_line(line).await;
            write_response(&mut writer, &response).await?;
        }

        Ok(())
    }

    async fn dispatch_line(&mut self, line: &str) -> RpcResponse {
        let request = match RpcRequest::decode(line) {
            Ok(request) => request,
            Err(failure) => {
                debug!(code = failure.error.code, "rejecting undecodable request line");
                return RpcResponse::error(failure.id, failure.error);
            }
        };

        let id = request.id.clone();
        debug!(method = %request.method, id = %id, "dispatching request");
        match self.dispatch(request).await {
            Ok(result) => RpcResponse::success(id, result),
            Err(error) => RpcResponse::error(id, error),
        }
    }

    async fn dispatch(&mut self, request: RpcRequest) -> Result<Value, RpcError> {
        match request.method.as_str() {
            method::GET_METADATA => serde_json::to_value(self.collector.metadata())
                .map_err(|err| RpcError::new(INTERNAL_ERROR, err.to_string())),

            method::CONFIGURE => {
                let params: ConfigureParams = decode_params(request.params)?;
                // Stored before the handler runs: a failing handler must
                // not leave fetch_sensors on stale configuration.
                self.config = params.clone();
                self.collector
                    .configure(&params)
                    .await
                    .map_err(CollectorError::into_rpc_error)
            }

            method::TEST_CONNECTION => self
                .collector
                .test_connection(&self.config)
                .await
                .map_err(CollectorError::into_rpc_error),

            method::FETCH_SENSORS => {
                let sensors = self
                    .collector
                    .fetch_sensors(&self.config)
                    .await
                    .map_err(CollectorError::into_rpc_error)?;
                Ok(json!({"sensors": sanitize_batch(sensors)}))
            }

            method::FETCH_SELECTED_SENSORS => {
                let params: SelectedSensorsParams = decode_params(request.params)?;
                let sensors = self
                    .collector
                    .fetch_selected_sensors(&self.config, &params.sensor_ids)
                    .await
                    .map_err(CollectorError::into_rpc_error)?;
                Ok(json!({"sensors": sanitize_batch(sensors)}))
            }

            method::START_SESSION => self
                .collector
                .start_session(&self.config)
                .await
                .map_err(CollectorError::into_rpc_error),

            method::STOP_SESSION => self
                .collector
                .stop_session(&self.config)
                .await
                .map_err(CollectorError::into_rpc_error),

            method::HEALTH_CHECK => Ok(json!({
                "healthy": true,
                "uptime": self.started.elapsed().as_secs(),
            })),

            other => Err(RpcError::method_not_found(other)),
        }
    }
}

fn decode_params<T: serde::de::DeserializeOwned>(params: Value) -> Result<T, RpcError> {
    serde_json::from_value(params).map_err(|err| RpcError::invalid_params(err.to_string()))
}

/// Clamp decimal precision and flag duplicate sensor keys.
fn sanitize_batch(sensors: Vec<SensorReading>) -> Vec<SensorReading> {
    let mut seen = HashSet::new();
    for sensor in &sensors {
        if !seen.insert(sensor.unique_sensor_key.clone()) {
            warn!(key = %sensor.unique_sensor_key, "duplicate uniqueSensorKey in sensor batch");
        }
    }
    sensors
        .into_iter()
        .map(SensorReading::sanitized)
        .collect()
}

async fn write_response<W: AsyncWrite + Unpin>(
    writer: &mut W,
    response: &RpcResponse,
) -> std::io::Result<()> {
    let mut line = serde_json::to_string(response).map_err(std::io::Error::other)?;
    line.push('\n');
    writer.write_all(line.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(unix)]
async fn shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};
    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        _ = interrupt.recv() => {}
        _ = terminate.recv() => {}
    }
    Ok(())
}

#[cfg(not(unix))]
async fn shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
