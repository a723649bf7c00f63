//! Plugin-side SDK for JunctionRelay collector plugins.
//!
//! A collector plugin is a standalone process that reads newline-framed
//! JSON-RPC 2.0 requests on stdin and writes framed responses on stdout.
//! This crate turns an implementation of the [`Collector`] trait into
//! such a process:
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use junctionrelay_plugin::{Collector, Dispatcher};
//! use junctionrelay_protocol::CollectorMetadata;
//!
//! struct Clock;
//!
//! impl Collector for Clock {
//!     fn metadata(&self) -> CollectorMetadata {
//!         serde_json::from_value(serde_json::json!({
//!             "collectorName": "demo.clock",
//!             "displayName": "Clock",
//!         }))
//!         .expect("static metadata")
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> std::io::Result<()> {
//!     junctionrelay_plugin::init_logging();
//!     Dispatcher::new(Arc::new(Clock)).serve().await
//! }
//! ```
//!
//! The dispatcher answers `getMetadata`, `healthCheck`, and the
//! `fetchSelectedSensors` fallback by itself; everything else routes to
//! the trait, whose default implementations make a do-nothing collector
//! fully protocol-conformant.

pub mod collector;
pub mod dispatcher;
pub mod error;
pub mod logging;

pub use collector::Collector;
pub use dispatcher::Dispatcher;
pub use error::CollectorError;
pub use logging::init_logging;

// Plugin authors only need one crate in their dependency table.
pub use junctionrelay_protocol as protocol;
