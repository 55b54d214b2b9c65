//! Overview ranking and fingerprinting (spec.md sections 4.4 and 7).
//!
//! Confirmed elections are ordered by `first_seen` descending and capped at
//! [`CONFIRMED_CAP`]; unconfirmed elections are ordered by `(normal_weight,
//! final_weight)` descending and capped at [`UNCONFIRMED_CAP`]. The published
//! overview is fingerprinted with SHA-256 over a canonical form that excludes
//! time-dependent fields, so C5 can skip a broadcast when nothing material
//! changed between ticks.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use sha2::{Digest, Sha256};

use crate::model::{BlockHash, OverviewEntry};

pub const CONFIRMED_CAP: usize = 100;
pub const UNCONFIRMED_CAP: usize = 5000;
pub const FIRST_FINAL_VOTERS_LIMIT: usize = 5;

#[derive(Debug, Clone)]
pub struct PublishedOverview {
	pub entries: HashMap<BlockHash, OverviewEntry>,
	pub order: Vec<BlockHash>,
	pub fingerprint: String,
}

impl PublishedOverview {
	pub fn empty() -> Self {
		Self { entries: HashMap::new(), order: Vec::new(), fingerprint: fingerprint_canonical(&HashMap::new(), &[]) }
	}
}

/// Splits `entries` into the confirmed and unconfirmed rank-ordered,
/// capped hash lists described in spec.md section 4.4 step 4.
pub fn rank_and_cap(entries: &HashMap<BlockHash, OverviewEntry>) -> Vec<BlockHash> {
	let mut confirmed: Vec<&BlockHash> = entries.iter().filter(|(_, e)| e.is_confirmed).map(|(h, _)| h).collect();
	confirmed.sort_by(|a, b| entries[*b].first_seen.cmp(&entries[*a].first_seen));
	confirmed.truncate(CONFIRMED_CAP);

	let mut unconfirmed: Vec<&BlockHash> = entries.iter().filter(|(_, e)| !e.is_confirmed).map(|(h, _)| h).collect();
	unconfirmed.sort_by(|a, b| {
		let ea = &entries[*a];
		let eb = &entries[*b];
		(&eb.normal_weight, &eb.final_weight).cmp(&(&ea.normal_weight, &ea.final_weight))
	});
	unconfirmed.truncate(UNCONFIRMED_CAP);

	confirmed.into_iter().chain(unconfirmed).cloned().collect()
}

/// Builds the canonical JSON used for fingerprinting: entries sorted by
/// hash, keys sorted, and `active_since_seconds`/`confirmation_duration_ms`
/// excluded since they change every tick independent of substantive state
/// (spec.md section 7).
pub fn canonical_json(entries: &HashMap<BlockHash, OverviewEntry>, order: &[BlockHash]) -> serde_json::Value {
	let mut hashes: Vec<&BlockHash> = order.iter().collect();
	hashes.sort();

	let mut object = serde_json::Map::new();
	for hash in hashes {
		if let Some(entry) = entries.get(hash) {
			let mut value = serde_json::to_value(entry).expect("OverviewEntry serializes");
			if let serde_json::Value::Object(map) = &mut value {
				map.remove("active_since_seconds");
				map.remove("confirmation_duration_ms");
			}
			object.insert(hash.clone(), value);
		}
	}
	serde_json::Value::Object(object)
}

/// Builds the full payload shipped to clients, in ranked order, including
/// the time-dependent fields `canonical_json` strips for fingerprinting.
pub fn ranked_json(entries: &HashMap<BlockHash, OverviewEntry>, order: &[BlockHash]) -> serde_json::Value {
	let mut object = serde_json::Map::new();
	for hash in order {
		if let Some(entry) = entries.get(hash) {
			object.insert(hash.clone(), serde_json::to_value(entry).expect("OverviewEntry serializes"));
		}
	}
	serde_json::Value::Object(object)
}

pub fn fingerprint_canonical(entries: &HashMap<BlockHash, OverviewEntry>, order: &[BlockHash]) -> String {
	let canonical = canonical_json(entries, order);
	let bytes = serde_json::to_vec(&canonical).expect("canonical json serializes");
	let mut hasher = Sha256::new();
	hasher.update(&bytes);
	format!("{:x}", hasher.finalize())
}

/// Builds the fully published overview: ranks and caps, then fingerprints
/// the result.
pub fn publish(entries: HashMap<BlockHash, OverviewEntry>) -> PublishedOverview {
	let order = rank_and_cap(&entries);
	let fingerprint = fingerprint_canonical(&entries, &order);
	PublishedOverview { entries, order, fingerprint }
}

/// Holds the currently-published overview behind a mutex-guarded `Arc` swap,
/// read by C5/A3 on every tick and by the fanout to diff against each
/// client's last-sent fingerprint.
pub struct OverviewHandle {
	current: Mutex<Arc<PublishedOverview>>,
}

impl OverviewHandle {
	pub fn new() -> Arc<Self> {
		Arc::new(Self { current: Mutex::new(Arc::new(PublishedOverview::empty())) })
	}

	pub fn current(&self) -> Arc<PublishedOverview> {
		self.current.lock().unwrap().clone()
	}

	pub fn publish(&self, overview: PublishedOverview) {
		*self.current.lock().unwrap() = Arc::new(overview);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use num_bigint::BigUint;

	fn entry(first_seen: i64, normal_weight: u32, is_confirmed: bool) -> OverviewEntry {
		OverviewEntry {
			normal_weight: BigUint::from(normal_weight),
			final_weight: BigUint::from(0u32),
			normal_weight_percent: 0.0,
			final_weight_percent: 0.0,
			normal_votes: 0,
			final_votes: 0,
			is_active: !is_confirmed,
			is_stopped: false,
			is_confirmed,
			first_seen,
			first_confirmed: if is_confirmed { Some(first_seen) } else { None },
			first_final_voters: Vec::new(),
			active_since_seconds: 0,
			confirmation_duration_ms: None,
		}
	}

	#[test]
	fn confirmed_ranked_by_first_seen_desc() {
		let mut entries = HashMap::new();
		entries.insert("A".to_string(), entry(100, 0, true));
		entries.insert("B".to_string(), entry(200, 0, true));
		let order = rank_and_cap(&entries);
		assert_eq!(order, vec!["B".to_string(), "A".to_string()]);
	}

	#[test]
	fn unconfirmed_ranked_by_weight_desc() {
		let mut entries = HashMap::new();
		entries.insert("A".to_string(), entry(100, 10, false));
		entries.insert("B".to_string(), entry(100, 50, false));
		let order = rank_and_cap(&entries);
		assert_eq!(order, vec!["B".to_string(), "A".to_string()]);
	}

	#[test]
	fn fingerprint_ignores_time_dependent_fields() {
		let mut entries = HashMap::new();
		let mut a = entry(100, 10, true);
		a.active_since_seconds = 5;
		a.confirmation_duration_ms = Some(42);
		entries.insert("A".to_string(), a);
		let order = vec!["A".to_string()];
		let fp1 = fingerprint_canonical(&entries, &order);

		let mut entries2 = entries.clone();
		let entry_mut = entries2.get_mut("A").unwrap();
		entry_mut.active_since_seconds = 999;
		entry_mut.confirmation_duration_ms = Some(1);
		let fp2 = fingerprint_canonical(&entries2, &order);

		assert_eq!(fp1, fp2);
	}

	#[test]
	fn fingerprint_changes_on_substantive_field() {
		let mut entries = HashMap::new();
		entries.insert("A".to_string(), entry(100, 10, false));
		let order = vec!["A".to_string()];
		let fp1 = fingerprint_canonical(&entries, &order);

		entries.get_mut("A").unwrap().normal_votes += 1;
		let fp2 = fingerprint_canonical(&entries, &order);

		assert_ne!(fp1, fp2);
	}
}
