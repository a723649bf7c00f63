//! Host-side error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors produced by the plugin host.
#[derive(Debug, Error)]
pub enum HostError {
    /// The child process could not be spawned.
    #[error("failed to spawn plugin '{name}': {message}")]
    Spawn { name: String, message: String },

    /// The readiness line did not arrive within the configured window.
    #[error("Timeout waiting for plugin ready")]
    ReadyTimeout,

    /// No live child process: never started, stopped, or exited and not
    /// (yet) restarted.
    #[error("Plugin process not running")]
    NotRunning,

    /// A request did not receive a response in time. The child is left
    /// alive; only the caller is rejected.
    #[error("Request timed out after {timeout_ms}ms: {method}")]
    RequestTimeout { timeout_ms: u64, method: String },

    /// The child exited while this request was in flight.
    #[error("Plugin process exited with code {code}")]
    Exited { code: i32 },

    /// The plugin answered with a JSON-RPC error envelope.
    #[error("{message}")]
    Rpc { code: i32, message: String },

    /// The plugin manifest was missing or not a collector manifest.
    #[error("no collector manifest at {}", path.display())]
    Manifest { path: PathBuf },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience alias for results in this crate.
pub type Result<T> = std::result::Result<T, HostError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_facing_messages_are_exact() {
        assert_eq!(
            HostError::ReadyTimeout.to_string(),
            "Timeout waiting for plugin ready"
        );
        assert_eq!(HostError::NotRunning.to_string(), "Plugin process not running");
        assert_eq!(
            HostError::RequestTimeout {
                timeout_ms: 30_000,
                method: "fetchSensors".into()
            }
            .to_string(),
            "Request timed out after 30000ms: fetchSensors"
        );
        assert_eq!(
            HostError::Exited { code: 7 }.to_string(),
            "Plugin process exited with code 7"
        );
    }

    #[test]
    fn rpc_error_preserves_plugin_message() {
        let err = HostError::Rpc {
            code: -32000,
            message: "upstream unreachable".into(),
        };
        assert_eq!(err.to_string(), "upstream unreachable");
    }
}
