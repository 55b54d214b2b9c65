//! Logging key constants and subscriber bootstrap, mirroring the teacher's
//! `logging.rs` (component-tagged structured logging) adapted from `slog`
//! to `tracing`, matching the stack the API binaries actually use.

pub const COMPONENT_KEY: &str = "component";

pub const UPSTREAM_LISTENER: &str = "upstream-listener";
pub const ELECTION_MERGER: &str = "election-merger";
pub const REPRESENTATIVE_REGISTRY: &str = "representative-registry";
pub const OVERVIEW_AGGREGATOR: &str = "overview-aggregator";
pub const BROADCAST_FANOUT: &str = "broadcast-fanout";
pub const HTTP_SERVER: &str = "http-server";

/// Installs the global `tracing` subscriber, honouring `RUST_LOG` the same
/// way the teacher's binaries do via `EnvFilter`.
pub fn init() {
	tracing_subscriber::fmt()
		.with_env_filter(
			tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
		)
		.init();
}
