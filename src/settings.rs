//! Process configuration, sourced from environment variables or CLI flags.
//!
//! Mirrors the teacher's `clap`-derive-with-`env` pattern (see
//! `chainflip-lp-api`): every field doubles as an env var, so the process can
//! be driven purely by environment the way the original Python service was.
//! `ws_url` and `rpc_url` are mandatory - clap aborts startup if either is
//! missing, which is the only form of fatal error this service permits
//! (spec.md section 7, error kind 6).

use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Live telemetry aggregator for block elections")]
pub struct Settings {
	/// Upstream node websocket event stream URL.
	#[arg(long, env = "WS_URL")]
	pub ws_url: String,

	/// Node RPC endpoint URL (representatives_online, telemetry, confirmation_quorum, blocks_info).
	#[arg(long, env = "RPC_URL")]
	pub rpc_url: String,

	/// Optional basic auth username for the RPC endpoint.
	#[arg(long, env = "RPC_USERNAME")]
	pub rpc_username: Option<String>,

	/// Optional basic auth password for the RPC endpoint.
	#[arg(long, env = "RPC_PASSWORD")]
	pub rpc_password: Option<String>,

	/// Memcache host. When unset, the election/overview stores use an
	/// in-process cache instead.
	#[arg(long, env = "MEMCACHE_HOST")]
	pub memcache_host: Option<String>,

	/// Memcache port.
	#[arg(long, env = "MEMCACHE_PORT", default_value_t = 11211)]
	pub memcache_port: u16,

	/// Block explorer base URL, forwarded to the detail template.
	#[arg(long, env = "BLOCK_EXPLORER")]
	pub block_explorer: Option<String>,

	/// Address the HTTP/WS server binds to.
	#[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:8080")]
	pub bind_addr: std::net::SocketAddr,
}

impl Settings {
	/// Parses settings from `env`/CLI args, aborting the process with a
	/// usage message on missing required values - this is intentional:
	/// config errors are the one class of error allowed to prevent startup.
	pub fn load() -> Self {
		Settings::parse()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_required_fields_from_args() {
		let settings = Settings::parse_from([
			"nano-election-tracker",
			"--ws-url",
			"wss://example.invalid/ws",
			"--rpc-url",
			"https://example.invalid/rpc",
		]);
		assert_eq!(settings.ws_url, "wss://example.invalid/ws");
		assert_eq!(settings.rpc_url, "https://example.invalid/rpc");
		assert_eq!(settings.memcache_port, 11211);
		assert_eq!(settings.bind_addr.port(), 8080);
	}

	#[test]
	fn missing_required_field_is_rejected() {
		let result = Settings::try_parse_from(["nano-election-tracker", "--rpc-url", "https://x"]);
		assert!(result.is_err());
	}
}
