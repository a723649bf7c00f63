//! JSON-RPC 2.0 envelope types.
//!
//! The wire is newline-delimited JSON: each direction writes one complete
//! envelope per line. Requests flow host → plugin on stdin; responses flow
//! plugin → host on stdout. A response carries exactly one of `result` or
//! `error`; a request that could not be parsed at all is answered with
//! `id: 0` and a parse-error envelope.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Protocol tag carried by every envelope.
pub const JSONRPC_VERSION: &str = "2.0";

// ── Error codes ─────────────────────────────────────────────────────────

/// The request line was not valid JSON.
pub const PARSE_ERROR: i32 = -32700;
/// The envelope was JSON but not a valid request.
pub const INVALID_REQUEST: i32 = -32600;
/// The method is not in the known set.
pub const METHOD_NOT_FOUND: i32 = -32601;
/// The params could not be decoded for the method.
pub const INVALID_PARAMS: i32 = -32602;
/// The dispatcher itself failed.
pub const INTERNAL_ERROR: i32 = -32603;
/// A handler failed without attaching a numeric code.
pub const SERVER_ERROR: i32 = -32000;

// ── Methods ─────────────────────────────────────────────────────────────

/// The closed set of RPC method names.
pub mod method {
    pub const GET_METADATA: &str = "getMetadata";
    pub const CONFIGURE: &str = "configure";
    pub const TEST_CONNECTION: &str = "testConnection";
    pub const FETCH_SENSORS: &str = "fetchSensors";
    pub const FETCH_SELECTED_SENSORS: &str = "fetchSelectedSensors";
    pub const START_SESSION: &str = "startSession";
    pub const STOP_SESSION: &str = "stopSession";
    pub const HEALTH_CHECK: &str = "healthCheck";

    /// All known method names. Anything else answers method-not-found.
    pub const ALL: [&str; 8] = [
        GET_METADATA,
        CONFIGURE,
        TEST_CONNECTION,
        FETCH_SENSORS,
        FETCH_SELECTED_SENSORS,
        START_SESSION,
        STOP_SESSION,
        HEALTH_CHECK,
    ];
}

/// Whether `name` is in the closed method set.
pub fn is_known_method(name: &str) -> bool {
    method::ALL.contains(&name)
}

// ── Request id ──────────────────────────────────────────────────────────

/// A request identifier: an integer or a string, unique per in-flight
/// request on a given channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Num(u64),
    Str(String),
}

impl RequestId {
    /// The id carried by replies to unparseable requests.
    pub const ZERO: RequestId = RequestId::Num(0);

    /// Numeric value, if this is an integer id.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::Num(n) => Some(*n),
            Self::Str(_) => None,
        }
    }

    /// Extract an id from a raw JSON value. Only unsigned integers and
    /// strings are valid ids.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_u64().map(Self::Num),
            Value::String(s) => Some(Self::Str(s.clone())),
            _ => None,
        }
    }
}

impl From<u64> for RequestId {
    fn from(n: u64) -> Self {
        Self::Num(n)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        Self::Str(s.to_owned())
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Num(n) => write!(f, "{n}"),
            Self::Str(s) => f.write_str(s),
        }
    }
}

// ── Request ─────────────────────────────────────────────────────────────

/// JSON-RPC 2.0 request envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    /// Protocol tag, always `"2.0"`.
    pub jsonrpc: String,
    /// Method name from the closed set.
    pub method: String,
    /// Free-form parameters object.
    #[serde(default = "default_params")]
    pub params: Value,
    /// Request identifier echoed by the response.
    pub id: RequestId,
}

fn default_params() -> Value {
    Value::Object(serde_json::Map::new())
}

impl RpcRequest {
    /// Create a request envelope.
    pub fn new(id: impl Into<RequestId>, method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
            id: id.into(),
        }
    }

    /// Decode one framed request line.
    ///
    /// Lines that are not JSON fail with parse-error and id 0. Lines that
    /// are JSON but lack `jsonrpc == "2.0"`, a non-empty `method`, or a
    /// valid `id` fail with invalid-request, echoing the id when one is
    /// present.
    pub fn decode(line: &str) -> Result<Self, RpcFailure> {
        let value: Value = serde_json::from_str(line).map_err(|_| RpcFailure {
            id: RequestId::ZERO,
            error: RpcError::parse_error(),
        })?;

        let id = value
            .get("id")
            .and_then(RequestId::from_value)
            .unwrap_or(RequestId::ZERO);

        let jsonrpc_ok = value.get("jsonrpc").and_then(Value::as_str) == Some(JSONRPC_VERSION);
        let method_ok = value
            .get("method")
            .and_then(Value::as_str)
            .is_some_and(|m| !m.is_empty());
        let id_ok = value
            .get("id")
            .is_some_and(|v| RequestId::from_value(v).is_some());

        if !(jsonrpc_ok && method_ok && id_ok) {
            return Err(RpcFailure {
                id,
                error: RpcError::invalid_request(),
            });
        }

        serde_json::from_value(value).map_err(|_| RpcFailure {
            id,
            error: RpcError::invalid_request(),
        })
    }
}

/// A request line that could not be decoded, with the id to echo (0 when
/// none could be recovered) and the error envelope to reply with.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcFailure {
    pub id: RequestId,
    pub error: RpcError,
}

// ── Response ────────────────────────────────────────────────────────────

/// JSON-RPC 2.0 response envelope. Exactly one of `result` and `error`
/// is present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    /// Protocol tag, always `"2.0"`.
    pub jsonrpc: String,
    /// Identifier of the request this answers.
    pub id: RequestId,
    /// Successful result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Failure detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl RpcResponse {
    /// Successful response.
    pub fn success(id: impl Into<RequestId>, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: id.into(),
            result: Some(result),
            error: None,
        }
    }

    /// Error response.
    pub fn error(id: impl Into<RequestId>, error: RpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: id.into(),
            result: None,
            error: Some(error),
        }
    }
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
#[error("{message}")]
pub struct RpcError {
    /// Error code from the closed set of §error codes.
    pub code: i32,
    /// Human-readable message.
    pub message: String,
    /// Optional structured detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    /// Error with the given code and message.
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn parse_error() -> Self {
        Self::new(PARSE_ERROR, "Parse error")
    }

    pub fn invalid_request() -> Self {
        Self::new(INVALID_REQUEST, "Invalid request")
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(METHOD_NOT_FOUND, format!("Method not found: {method}"))
    }

    pub fn invalid_params(detail: impl Into<String>) -> Self {
        Self::new(INVALID_PARAMS, detail)
    }
}
