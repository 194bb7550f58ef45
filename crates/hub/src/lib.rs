//! SmartPot hub: the serial bridge daemon and the HTTP API.
//!
//! The two binaries share no memory. The daemon is the only writer of the
//! snapshot file and the only consumer of the command queue; the API reads
//! the former and appends to the latter.

pub mod api;
pub mod config;
pub mod daemon;
pub mod health;
pub mod protocol;
pub mod queue;
pub mod snapshot;
pub mod status;
pub mod web;

/// Install the stderr `tracing` subscriber, honoring `RUST_LOG`.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}
