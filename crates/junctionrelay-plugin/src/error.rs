//! Collector handler error type.

use junctionrelay_protocol::{RpcError, SERVER_ERROR};
use thiserror::Error;

/// Error returned by collector handlers.
///
/// Handlers may attach a JSON-RPC error code; errors without one are
/// reported on the wire as server-error (-32000). The message is always
/// preserved verbatim.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct CollectorError {
    message: String,
    code: Option<i32>,
}

impl CollectorError {
    /// Error without a code; maps to server-error on the wire.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    /// Error with an explicit JSON-RPC code, used as-is on the wire.
    pub fn with_code(code: i32, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: Some(code),
        }
    }

    pub fn code(&self) -> Option<i32> {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// The wire form of this error.
    pub fn into_rpc_error(self) -> RpcError {
        RpcError::new(self.code.unwrap_or(SERVER_ERROR), self.message)
    }
}

impl From<std::io::Error> for CollectorError {
    fn from(err: std::io::Error) -> Self {
        Self::new(err.to_string())
    }
}

impl From<serde_json::Error> for CollectorError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codeless_error_maps_to_server_error() {
        let err = CollectorError::new("upstream unreachable").into_rpc_error();
        assert_eq!(err.code, SERVER_ERROR);
        assert_eq!(err.message, "upstream unreachable");
    }

    #[test]
    fn attached_code_is_preserved() {
        let err = CollectorError::with_code(-32099, "rate limited").into_rpc_error();
        assert_eq!(err.code, -32099);
        assert_eq!(err.message, "rate limited");
    }

    #[test]
    fn io_error_converts_without_code() {
        let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "socket timeout");
        let err = CollectorError::from(io);
        assert!(err.code().is_none());
        assert!(err.message().contains("socket timeout"));
    }
}
