//! Supervisor tunables and host callbacks.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tunables for one plugin supervisor.
///
/// Deserializable so hosts can embed it in their own configuration files;
/// every field has a default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorOptions {
    /// Per-request timeout in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// How long to wait for the readiness line. Defaults to the request
    /// timeout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ready_timeout_ms: Option<u64>,
    /// Automatic restarts allowed after unexpected exits.
    #[serde(default = "default_max_restarts")]
    pub max_restarts: u32,
    /// Delay before a restart attempt, in milliseconds.
    #[serde(default = "default_restart_delay_ms")]
    pub restart_delay_ms: u64,
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

fn default_max_restarts() -> u32 {
    3
}

fn default_restart_delay_ms() -> u64 {
    1_000
}

impl Default for SupervisorOptions {
    fn default() -> Self {
        Self {
            request_timeout_ms: default_request_timeout_ms(),
            ready_timeout_ms: None,
            max_restarts: default_max_restarts(),
            restart_delay_ms: default_restart_delay_ms(),
        }
    }
}

impl SupervisorOptions {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms.unwrap_or(self.request_timeout_ms))
    }

    pub fn restart_delay(&self) -> Duration {
        Duration::from_millis(self.restart_delay_ms)
    }
}

/// Invoked with each tagged log line from the plugin's stderr.
pub type LogCallback = Arc<dyn Fn(&str) + Send + Sync>;
/// Invoked when the child exits, with its exit code.
pub type ExitCallback = Arc<dyn Fn(i32) + Send + Sync>;
/// Invoked before a restart attempt, with the attempt number (1-based).
pub type RestartCallback = Arc<dyn Fn(u32) + Send + Sync>;
/// Invoked once the restart budget is exhausted.
pub type MaxRestartsCallback = Arc<dyn Fn() + Send + Sync>;

/// Host hooks into the supervisor lifecycle. All optional.
#[derive(Clone, Default)]
pub struct SupervisorCallbacks {
    pub on_log: Option<LogCallback>,
    pub on_exit: Option<ExitCallback>,
    pub on_restart: Option<RestartCallback>,
    pub on_max_restarts_exceeded: Option<MaxRestartsCallback>,
}

impl std::fmt::Debug for SupervisorCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupervisorCallbacks")
            .field("on_log", &self.on_log.is_some())
            .field("on_exit", &self.on_exit.is_some())
            .field("on_restart", &self.on_restart.is_some())
            .field(
                "on_max_restarts_exceeded",
                &self.on_max_restarts_exceeded.is_some(),
            )
            .finish()
    }
}
