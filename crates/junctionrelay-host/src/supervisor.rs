//! The plugin supervisor: owns one collector child process and provides a
//! typed request/response API above the framed stdio transport.
//!
//! One supervisor per plugin. Requests are multiplexed by integer id over
//! the child's stdin/stdout; the child's stderr carries the readiness
//! token and free-form log lines. Unexpected exits trigger a bounded
//! restart policy that replays the last `configure` parameters to the
//! fresh child.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::{Mutex, oneshot};
use tracing::{debug, info, warn};

use junctionrelay_protocol::{
    CollectorMetadata, ConfigureParams, HealthStatus, RpcRequest, RpcResponse, SensorReading,
    is_plugin_collector, is_valid_plugin_name, method,
};

use crate::discovery::{self, DiscoveredPlugin};
use crate::error::{HostError, Result};
use crate::launch::{LaunchCommand, resolve_launch};
use crate::options::{SupervisorCallbacks, SupervisorOptions};

/// Lines retained in the in-memory log ring buffer.
const LOG_BUFFER_LINES: usize = 256;

/// How often the exit monitor polls the child.
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// One captured log line from the plugin's stderr.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub at: chrono::DateTime<chrono::Utc>,
    /// The stderr line, prefixed with the `[<plugin>]` tag.
    pub line: String,
}

struct PendingRequest {
    method: String,
    tx: oneshot::Sender<Result<Value>>,
}

/// Supervises one collector plugin child process.
///
/// All methods take `&self`; the handle is cheap to clone via the inner
/// `Arc` and may be shared across tasks, though hosts normally drive one
/// request at a time per plugin.
pub struct PluginSupervisor {
    inner: Arc<SupervisorInner>,
}

struct SupervisorInner {
    name: String,
    launch: LaunchCommand,
    options: SupervisorOptions,
    callbacks: SupervisorCallbacks,
    next_id: AtomicU64,
    pending: Mutex<HashMap<u64, PendingRequest>>,
    stdin: Mutex<Option<ChildStdin>>,
    child: Mutex<Option<Child>>,
    stopped: AtomicBool,
    restart_count: AtomicU32,
    last_config: Mutex<Option<Value>>,
    logs: Mutex<VecDeque<LogEntry>>,
}

impl PluginSupervisor {
    /// Supervisor for a discovered plugin. Does not spawn anything until
    /// [`start`](Self::start).
    pub fn new(
        plugin: &DiscoveredPlugin,
        options: SupervisorOptions,
        callbacks: SupervisorCallbacks,
    ) -> Result<Self> {
        let launch = resolve_launch(plugin)?;
        Ok(Self::with_launch(
            plugin.name.clone(),
            launch,
            options,
            callbacks,
        ))
    }

    /// Supervisor for a plugin root directory, reading its manifest.
    pub fn for_plugin_dir(
        dir: &std::path::Path,
        options: SupervisorOptions,
        callbacks: SupervisorCallbacks,
    ) -> Result<Self> {
        let plugin = discovery::load_plugin(dir).ok_or_else(|| HostError::Manifest {
            path: dir.to_path_buf(),
        })?;
        Self::new(&plugin, options, callbacks)
    }

    /// Supervisor from an explicit launch command.
    pub fn with_launch(
        name: String,
        launch: LaunchCommand,
        options: SupervisorOptions,
        callbacks: SupervisorCallbacks,
    ) -> Self {
        Self {
            inner: Arc::new(SupervisorInner {
                name,
                launch,
                options,
                callbacks,
                next_id: AtomicU64::new(1),
                pending: Mutex::new(HashMap::new()),
                stdin: Mutex::new(None),
                child: Mutex::new(None),
                stopped: AtomicBool::new(false),
                restart_count: AtomicU32::new(0),
                last_config: Mutex::new(None),
                logs: Mutex::new(VecDeque::new()),
            }),
        }
    }

    /// Plugin name this supervisor owns.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Spawn the child and wait for its readiness token.
    ///
    /// Idempotent while a child is already running.
    pub async fn start(&self) -> Result<()> {
        if self.is_running().await {
            return Ok(());
        }
        self.inner.stopped.store(false, Ordering::SeqCst);
        self.inner.restart_count.store(0, Ordering::SeqCst);
        SupervisorInner::spawn_child(&self.inner).await
    }

    /// Stop the child and inhibit restarts. Pending requests are rejected
    /// with [`HostError::NotRunning`].
    pub async fn stop(&self) {
        let inner = &self.inner;
        inner.stopped.store(true, Ordering::SeqCst);
        inner.reject_pending(|| HostError::NotRunning).await;
        *inner.stdin.lock().await = None;

        if let Some(child) = inner.child.lock().await.as_mut() {
            let _ = child.start_kill();
        }

        // Give the monitor a moment to reap and run its exit hooks.
        for _ in 0..50 {
            if !self.is_running().await {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    /// Whether a child process is currently alive.
    pub async fn is_running(&self) -> bool {
        self.inner.child.lock().await.is_some()
    }

    /// Restarts performed since the last [`start`](Self::start).
    pub fn restart_count(&self) -> u32 {
        self.inner.restart_count.load(Ordering::SeqCst)
    }

    /// The retained tail of the plugin's tagged stderr lines.
    pub async fn get_logs(&self) -> Vec<LogEntry> {
        self.inner.logs.lock().await.iter().cloned().collect()
    }

    // ── Typed method surface ────────────────────────────────────────────

    pub async fn get_metadata(&self) -> Result<CollectorMetadata> {
        let value = self.inner.send(method::GET_METADATA, json!({})).await?;
        let metadata: CollectorMetadata = serde_json::from_value(value)?;
        if is_plugin_collector(&metadata.collector_name)
            && !is_valid_plugin_name(&metadata.collector_name)
        {
            warn!(
                plugin = %self.inner.name,
                collector = %metadata.collector_name,
                "collectorName violates the plugin naming rule"
            );
        }
        Ok(metadata)
    }

    /// Send configuration, memoizing it for replay after a restart.
    pub async fn configure(&self, params: &ConfigureParams) -> Result<Value> {
        let value = serde_json::to_value(params)?;
        *self.inner.last_config.lock().await = Some(value.clone());
        self.inner.send(method::CONFIGURE, value).await
    }

    pub async fn test_connection(&self) -> Result<Value> {
        self.inner.send(method::TEST_CONNECTION, json!({})).await
    }

    pub async fn fetch_sensors(&self) -> Result<Vec<SensorReading>> {
        let value = self.inner.send(method::FETCH_SENSORS, json!({})).await?;
        parse_sensor_batch(value)
    }

    pub async fn fetch_selected_sensors(&self, sensor_ids: &[String]) -> Result<Vec<SensorReading>> {
        let value = self
            .inner
            .send(method::FETCH_SELECTED_SENSORS, json!({"sensorIds": sensor_ids}))
            .await?;
        parse_sensor_batch(value)
    }

    pub async fn start_session(&self) -> Result<Value> {
        self.inner.send(method::START_SESSION, json!({})).await
    }

    pub async fn stop_session(&self) -> Result<Value> {
        self.inner.send(method::STOP_SESSION, json!({})).await
    }

    pub async fn health_check(&self) -> Result<HealthStatus> {
        let value = self.inner.send(method::HEALTH_CHECK, json!({})).await?;
        Ok(serde_json::from_value(value)?)
    }
}

impl SupervisorInner {
    /// The spawn algorithm: launch the child with all three pipes, attach
    /// the line readers, and wait for the readiness token on stderr.
    ///
    /// Returns a manually boxed future (rather than `async fn`) because
    /// `spawn_child` and `monitor_child`/`handle_exit` call each other
    /// indirectly via `tokio::spawn`; without the explicit `dyn Future`
    /// boundary the compiler cannot resolve the resulting recursive
    /// `Send` auto-trait check.
    fn spawn_child(self: &Arc<Self>) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            let mut command = Command::new(&self.launch.program);
            command
                .args(&self.launch.args)
                .current_dir(&self.launch.cwd)
                .stdin(Stdio::piped())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true);

            debug!(plugin = %self.name, program = %self.launch.program, "spawning plugin process");

            let mut child = command.spawn().map_err(|err| HostError::Spawn {
                name: self.name.clone(),
                message: err.to_string(),
            })?;

            let stdin = take_pipe(child.stdin.take(), &self.name, "stdin")?;
            let stdout = take_pipe(child.stdout.take(), &self.name, "stdout")?;
            let stderr = take_pipe(child.stderr.take(), &self.name, "stderr")?;

            *self.stdin.lock().await = Some(stdin);
            *self.child.lock().await = Some(child);

            let reader = Arc::clone(self);
            tokio::spawn(async move { reader.read_stdout(stdout).await });

            let (ready_tx, ready_rx) = oneshot::channel();
            let reader = Arc::clone(self);
            tokio::spawn(async move { reader.read_stderr(stderr, ready_tx).await });

            match tokio::time::timeout(self.options.ready_timeout(), ready_rx).await {
                Ok(Ok(())) => {}
                Ok(Err(_)) => {
                    // Stderr closed before the first line: the child is gone.
                    self.discard_child().await;
                    return Err(HostError::Spawn {
                        name: self.name.clone(),
                        message: "plugin exited before signalling ready".into(),
                    });
                }
                Err(_) => {
                    self.discard_child().await;
                    return Err(HostError::ReadyTimeout);
                }
            }

            info!(plugin = %self.name, "plugin ready");

            // Only a child that reached readiness is monitored for crashes.
            let monitor = Arc::clone(self);
            tokio::spawn(async move { monitor.monitor_child().await });

            Ok(())
        })
    }

    /// Kill and reap a child that never reached readiness.
    async fn discard_child(&self) {
        *self.stdin.lock().await = None;
        let child = self.child.lock().await.take();
        if let Some(mut child) = child {
            let _ = child.start_kill();
            let _ = child.wait().await;
        }
    }

    /// Send one request and wait for its response or timeout.
    async fn send(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = RpcRequest::new(id, method, params);
        let mut line = serde_json::to_string(&request)?;
        line.push('\n');

        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(
            id,
            PendingRequest {
                method: method.to_owned(),
                tx,
            },
        );

        let written = {
            let mut stdin = self.stdin.lock().await;
            match stdin.as_mut() {
                None => false,
                Some(stdin) => write_line(stdin, &line).await.is_ok(),
            }
        };
        if !written {
            self.pending.lock().await.remove(&id);
            return Err(HostError::NotRunning);
        }

        let timeout_ms = self.options.request_timeout_ms;
        match tokio::time::timeout(self.options.request_timeout(), rx).await {
            Ok(Ok(outcome)) => outcome,
            // The pending entry was dropped without an answer; only
            // possible once the process is gone.
            Ok(Err(_)) => Err(HostError::NotRunning),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                Err(HostError::RequestTimeout {
                    timeout_ms,
                    method: method.to_owned(),
                })
            }
        }
    }

    /// Route response lines from the child's stdout to their pending
    /// requests. Unparseable lines are logged and discarded.
    async fn read_stdout(self: Arc<Self>, stdout: ChildStdout) {
        let mut lines = BufReader::new(stdout).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    let response: RpcResponse = match serde_json::from_str(trimmed) {
                        Ok(response) => response,
                        Err(err) => {
                            warn!(plugin = %self.name, error = %err, "discarding unparseable stdout line");
                            continue;
                        }
                    };
                    let Some(id) = response.id.as_u64() else {
                        warn!(plugin = %self.name, id = %response.id, "response with non-numeric id");
                        continue;
                    };
                    let entry = self.pending.lock().await.remove(&id);
                    match entry {
                        Some(pending) => {
                            let outcome = match response.error {
                                Some(err) => Err(HostError::Rpc {
                                    code: err.code,
                                    message: err.message,
                                }),
                                None => Ok(response.result.unwrap_or(Value::Null)),
                            };
                            let _ = pending.tx.send(outcome);
                        }
                        None => debug!(plugin = %self.name, id, "response with no pending request"),
                    }
                }
                Ok(None) => {
                    debug!(plugin = %self.name, "stdout closed");
                    break;
                }
                Err(err) => {
                    warn!(plugin = %self.name, error = %err, "stdout read error");
                    break;
                }
            }
        }
    }

    /// Forward stderr lines to the log channel. The first line is the
    /// readiness token; it flows into the log channel like any other.
    async fn read_stderr(self: Arc<Self>, stderr: ChildStderr, ready_tx: oneshot::Sender<()>) {
        let mut ready = Some(ready_tx);
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if let Some(tx) = ready.take() {
                let _ = tx.send(());
            }
            self.push_log(format!("[{}] {}", self.name, line)).await;
        }
    }

    async fn push_log(&self, line: String) {
        debug!(target: "junctionrelay_host::plugin", "{line}");
        if let Some(on_log) = &self.callbacks.on_log {
            on_log(&line);
        }
        let mut logs = self.logs.lock().await;
        if logs.len() == LOG_BUFFER_LINES {
            logs.pop_front();
        }
        logs.push_back(LogEntry {
            at: chrono::Utc::now(),
            line,
        });
    }

    /// Wait for the child to exit, then apply the restart policy.
    async fn monitor_child(self: Arc<Self>) {
        let status = loop {
            {
                let mut guard = self.child.lock().await;
                match guard.as_mut() {
                    // stop() already reaped the child.
                    None => return,
                    Some(child) => match child.try_wait() {
                        Ok(Some(status)) => {
                            *guard = None;
                            break status;
                        }
                        Ok(None) => {}
                        Err(err) => {
                            warn!(plugin = %self.name, error = %err, "failed to poll child");
                            *guard = None;
                            return;
                        }
                    },
                }
            }
            tokio::time::sleep(EXIT_POLL_INTERVAL).await;
        };

        let code = status.code().unwrap_or(-1);
        self.handle_exit(code).await;
    }

    async fn handle_exit(self: &Arc<Self>, code: i32) {
        info!(plugin = %self.name, code, "plugin process exited");
        *self.stdin.lock().await = None;
        self.reject_pending(|| HostError::Exited { code }).await;

        if let Some(on_exit) = &self.callbacks.on_exit {
            on_exit(code);
        }

        if self.stopped.load(Ordering::SeqCst) {
            return;
        }

        if self.restart_count.load(Ordering::SeqCst) >= self.options.max_restarts {
            warn!(plugin = %self.name, "restart budget exhausted; staying down");
            if let Some(on_max) = &self.callbacks.on_max_restarts_exceeded {
                on_max();
            }
            return;
        }

        let attempt = self.restart_count.fetch_add(1, Ordering::SeqCst) + 1;
        info!(plugin = %self.name, attempt, "restarting plugin");
        if let Some(on_restart) = &self.callbacks.on_restart {
            on_restart(attempt);
        }

        tokio::time::sleep(self.options.restart_delay()).await;
        if self.stopped.load(Ordering::SeqCst) {
            return;
        }

        if let Err(err) = Self::spawn_child(self).await {
            warn!(plugin = %self.name, error = %err, "respawn failed");
            return;
        }

        // Replay the last configuration so the fresh child picks up where
        // the crashed one left off.
        let config = self.last_config.lock().await.clone();
        if let Some(params) = config {
            if let Err(err) = self.send(method::CONFIGURE, params).await {
                warn!(plugin = %self.name, error = %err, "configure replay failed");
            }
        }
    }

    async fn reject_pending(&self, make_error: impl Fn() -> HostError) {
        let rejected: Vec<PendingRequest> = {
            let mut pending = self.pending.lock().await;
            pending.drain().map(|(_, entry)| entry).collect()
        };
        for entry in rejected {
            debug!(plugin = %self.name, method = %entry.method, "rejecting pending request");
            let _ = entry.tx.send(Err(make_error()));
        }
    }
}

fn take_pipe<T>(pipe: Option<T>, name: &str, which: &str) -> Result<T> {
    pipe.ok_or_else(|| HostError::Spawn {
        name: name.to_owned(),
        message: format!("failed to capture {which}"),
    })
}

async fn write_line(stdin: &mut ChildStdin, line: &str) -> std::io::Result<()> {
    stdin.write_all(line.as_bytes()).await?;
    stdin.flush().await
}

fn parse_sensor_batch(value: Value) -> Result<Vec<SensorReading>> {
    #[derive(serde::Deserialize)]
    struct Batch {
        #[serde(default)]
        sensors: Vec<SensorReading>,
    }
    let batch: Batch = serde_json::from_value(value)?;
    Ok(batch.sensors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sensor_batch_parses_wire_shape() {
        let sensors = parse_sensor_batch(json!({
            "sensors": [{
                "uniqueSensorKey": "k",
                "name": "n",
                "value": "1.5",
                "unit": "V",
                "category": "power",
                "decimalPlaces": 1,
                "sensorType": "Numeric",
                "componentName": "c",
                "sensorTag": "t",
            }]
        }))
        .unwrap();
        assert_eq!(sensors.len(), 1);
        assert_eq!(sensors[0].unique_sensor_key, "k");
    }

    #[test]
    fn sensor_batch_tolerates_missing_list() {
        assert!(parse_sensor_batch(json!({})).unwrap().is_empty());
    }

    #[test]
    fn sensor_batch_rejects_malformed_entries() {
        assert!(parse_sensor_batch(json!({"sensors": [{"name": "incomplete"}]})).is_err());
    }
}
