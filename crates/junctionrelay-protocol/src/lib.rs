//! Wire contract shared by JunctionRelay collector plugins and their host.
//!
//! The protocol is newline-delimited JSON-RPC 2.0 over a child process's
//! stdin/stdout. This crate defines the envelope shapes, the closed method
//! and error-code sets, collector metadata, sensor records, and the typed
//! parameter shapes -- no IO. The plugin-side dispatcher lives in
//! `junctionrelay-plugin`; the host-side supervisor and discovery live in
//! `junctionrelay-host`.

pub mod envelope;
pub mod metadata;
pub mod params;
pub mod sensor;

pub use envelope::{
    INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST, JSONRPC_VERSION, METHOD_NOT_FOUND,
    PARSE_ERROR, RequestId, RpcError, RpcFailure, RpcRequest, RpcResponse, SERVER_ERROR,
    is_known_method, method,
};
pub use metadata::{
    CollectorDefaults, CollectorMetadata, FieldRequirements, SetupStep, is_plugin_collector,
    is_valid_plugin_name,
};
pub use params::{ConfigureParams, HealthStatus, SelectedSensorsParams};
pub use sensor::{MAX_DECIMAL_PLACES, SensorReading, clamp_decimal_places, decimal_places_of};
