//! Representative Registry (C3): polls representative weights, telemetry,
//! and quorum parameters every 60s and publishes a read-only snapshot via
//! atomic pointer swap (spec.md section 4.3).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use num_bigint::BigUint;
use num_traits::ToPrimitive;
use tracing::{info, warn};

use crate::known::KnownAliases;
use crate::model::{NodeTelemetry, QuorumSnapshot, RepresentativeEntry, RepresentativeSnapshot};
use crate::rpc::NodeRpc;

const REFRESH_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub struct Snapshot {
	pub representatives: Arc<RepresentativeSnapshot>,
	pub quorum: Arc<QuorumSnapshot>,
}

impl Snapshot {
	fn empty() -> Self {
		Self { representatives: Arc::new(RepresentativeSnapshot::empty()), quorum: Arc::new(QuorumSnapshot::default_unit()) }
	}
}

/// Holds the currently-published snapshot behind a mutex-guarded `Arc` swap -
/// readers clone the `Arc` under a brief lock and then read lock-free.
pub struct RegistryHandle {
	current: Mutex<Snapshot>,
}

impl RegistryHandle {
	pub fn new() -> Arc<Self> {
		Arc::new(Self { current: Mutex::new(Snapshot::empty()) })
	}

	pub fn current(&self) -> Snapshot {
		self.current.lock().unwrap().clone()
	}

	fn publish(&self, snapshot: Snapshot) {
		*self.current.lock().unwrap() = snapshot;
	}
}

#[derive(serde::Deserialize)]
struct TelemetryPeer {
	address: Option<String>,
	port: Option<u16>,
	maker: Option<String>,
	node_id: Option<String>,
	major_version: Option<serde_json::Value>,
	minor_version: Option<serde_json::Value>,
	pre_release_version: Option<serde_json::Value>,
}

#[derive(serde::Deserialize)]
struct QuorumPeer {
	ip: String,
	account: String,
}

/// Joins telemetry by `[address]:port` against quorum peers' `ip` field, per
/// spec.md section 4.3 step 3.
fn join_telemetry(telemetry_peers: &[TelemetryPeer], quorum_peers: &[QuorumPeer]) -> HashMap<String, NodeTelemetry> {
	let telemetry_by_key: HashMap<String, &TelemetryPeer> = telemetry_peers
		.iter()
		.filter_map(|peer| peer.address.as_ref().map(|addr| (format!("[{addr}]:{}", peer.port.unwrap_or(0)), peer)))
		.collect();

	let mut joined = HashMap::new();
	for peer in quorum_peers {
		if let Some(telemetry) = telemetry_by_key.get(&peer.ip) {
			joined.insert(
				peer.account.clone(),
				NodeTelemetry {
					node_maker: telemetry.maker.clone(),
					node_id: telemetry.node_id.clone(),
					version: format_version(&telemetry.major_version, &telemetry.minor_version, &telemetry.pre_release_version),
				},
			);
		}
	}
	joined
}

/// Assembles `major.minor.pre_release`, skipping absent/null fields; empty -> "0.0.0".
fn format_version(major: &Option<serde_json::Value>, minor: &Option<serde_json::Value>, pre_release: &Option<serde_json::Value>) -> String {
	let parts: Vec<String> = [major, minor, pre_release]
		.into_iter()
		.filter_map(|v| v.as_ref())
		.filter(|v| !v.is_null())
		.map(|v| match v {
			serde_json::Value::String(s) => s.clone(),
			other => other.to_string(),
		})
		.collect();
	if parts.is_empty() {
		"0.0.0".to_string()
	} else {
		parts.join(".")
	}
}

fn build_snapshot(
	representatives_raw: serde_json::Value,
	telemetry_raw: serde_json::Value,
	quorum_raw: serde_json::Value,
) -> (RepresentativeSnapshot, QuorumSnapshot) {
	let raw_reps = crate::rpc::parse_representatives(&representatives_raw);

	let telemetry_peers: Vec<TelemetryPeer> = telemetry_raw
		.get("metrics")
		.and_then(|v| serde_json::from_value(v.clone()).ok())
		.unwrap_or_default();

	let quorum_peers: Vec<QuorumPeer> =
		quorum_raw.get("peers").and_then(|v| serde_json::from_value(v.clone()).ok()).unwrap_or_default();

	let quorum_delta = quorum_raw
		.get("quorum_delta")
		.and_then(|v| v.as_str().map(|s| s.to_string()).or_else(|| v.as_u64().map(|n| n.to_string())))
		.and_then(|s| s.parse::<BigUint>().ok())
		.unwrap_or_else(|| BigUint::from(1u32));

	let telemetry_by_account = join_telemetry(&telemetry_peers, &quorum_peers);

	let total_weight: BigUint = raw_reps
		.values()
		.filter_map(|r| r.weight.parse::<BigUint>().ok())
		.fold(BigUint::from(0u32), |acc, w| acc + w);

	let mut reps = HashMap::with_capacity(raw_reps.len());
	for (account, raw) in raw_reps {
		let weight = raw.weight.parse::<BigUint>().unwrap_or_else(|_| BigUint::from(0u32));
		let weight_percent = if total_weight > BigUint::from(0u32) {
			(&weight * 100u32).to_f64().unwrap_or(0.0) / total_weight.to_f64().unwrap_or(1.0)
		} else {
			0.0
		};
		reps.insert(
			account.clone(),
			RepresentativeEntry {
				account: account.clone(),
				voting_weight: weight,
				weight_percent,
				telemetry: telemetry_by_account.get(&account).cloned(),
			},
		);
	}

	(RepresentativeSnapshot { reps, total_weight }, QuorumSnapshot { quorum_delta })
}

/// Runs the 60s refresh loop. All three RPC calls must succeed for the
/// snapshot to be swapped; any failure retains the previous snapshot and
/// retries after the same interval (spec.md section 4.3).
pub async fn run(handle: Arc<RegistryHandle>, rpc: Arc<dyn NodeRpc>, mut shutdown: tokio::sync::watch::Receiver<bool>) {
	let mut interval = tokio::time::interval(REFRESH_INTERVAL);
	interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
	loop {
		tokio::select! {
			_ = interval.tick() => {},
			_ = shutdown.changed() => {
				if *shutdown.borrow() {
					return;
				}
				continue;
			}
		}

		let result = tokio::try_join!(rpc.representatives_online(), rpc.telemetry(), rpc.confirmation_quorum());
		match result {
			Ok((reps, telemetry, quorum)) => {
				let (representatives, quorum) = build_snapshot(reps, telemetry, quorum);
				let count = representatives.reps.len();
				handle.publish(Snapshot { representatives: Arc::new(representatives), quorum: Arc::new(quorum) });
				info!(component = crate::logging::REPRESENTATIVE_REGISTRY, representatives = count, "snapshot refreshed");
			},
			Err(error) => {
				warn!(component = crate::logging::REPRESENTATIVE_REGISTRY, %error, "refresh failed, retaining previous snapshot");
			},
		}
	}
}

pub fn known_aliases() -> KnownAliases {
	KnownAliases::new()
}
