//! Logging bootstrap for plugin processes.
//!
//! Standard output belongs to the framed protocol, so the subscriber is
//! pinned to standard error. Call this once at startup, after
//! constructing the dispatcher but before doing real work; stderr output
//! before [`Dispatcher::serve`](crate::Dispatcher::serve) would be
//! mistaken for the readiness token.

/// Install a `tracing` subscriber writing to stderr, filtered by
/// `RUST_LOG` (default `info`).
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();
}
