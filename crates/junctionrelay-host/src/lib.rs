//! Host-side runtime for JunctionRelay collector plugins.
//!
//! A host embeds this crate as a library: [`discovery`] enumerates plugin
//! folders under a root directory, [`launch`] turns each descriptor into
//! a command line, and one [`PluginSupervisor`] per plugin owns the child
//! process -- readiness handshake, request multiplexing with per-call
//! timeouts, stderr log capture, and a bounded crash-restart policy that
//! replays the last configuration.
//!
//! ```rust,no_run
//! use junctionrelay_host::{PluginSupervisor, SupervisorCallbacks, SupervisorOptions};
//! use junctionrelay_host::discovery::discover_plugins;
//!
//! # async fn run() -> junctionrelay_host::Result<()> {
//! for plugin in discover_plugins(std::path::Path::new("./plugins")) {
//!     let supervisor = PluginSupervisor::new(
//!         &plugin,
//!         SupervisorOptions::default(),
//!         SupervisorCallbacks::default(),
//!     )?;
//!     supervisor.start().await?;
//!     let metadata = supervisor.get_metadata().await?;
//!     println!("{}: polls every {}ms", metadata.display_name, metadata.defaults.poll_rate_ms);
//! }
//! # Ok(())
//! # }
//! ```

pub mod discovery;
pub mod error;
pub mod launch;
pub mod options;
pub mod supervisor;

pub use discovery::{DiscoveredPlugin, discover_plugins};
pub use error::{HostError, Result};
pub use launch::{LaunchCommand, resolve_auxiliary, resolve_launch};
pub use options::{SupervisorCallbacks, SupervisorOptions};
pub use supervisor::{LogEntry, PluginSupervisor};
