//! Overview Aggregator (C4): the tick loop that folds C2's working delta
//! into the election store, derives per-election weight totals against the
//! current representative snapshot, ranks and caps the result, and publishes
//! it for C5/A3 (spec.md section 4.4).

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::Mutex;
use tracing::debug;

use crate::cache::NamespacedCache;
use crate::known::KnownAliases;
use crate::merger::ElectionMerger;
use crate::model::{ElectionRecord, OverviewEntry, VoteKind};
use crate::overview::{self, OverviewHandle};
use crate::registry::RegistryHandle;

const TICK_INTERVAL: Duration = Duration::from_millis(450);

/// In-process authoritative election store. Individually touched records are
/// mirrored into the namespaced election cache so out-of-process readers
/// (the detail endpoint, another instance behind the same cache) can look a
/// hash up without going through the aggregator's lock.
pub struct ElectionStore {
	records: Mutex<HashMap<String, ElectionRecord>>,
	cache: NamespacedCache,
}

impl ElectionStore {
	pub fn new(cache: NamespacedCache) -> Self {
		Self { records: Mutex::new(HashMap::new()), cache }
	}

	async fn apply_delta(&self, delta: HashMap<String, ElectionRecord>) -> Vec<String> {
		let mut records = self.records.lock().await;
		let mut touched = Vec::with_capacity(delta.len());
		for (hash, delta_record) in delta {
			records.entry(hash.clone()).or_insert_with(|| ElectionRecord::new(delta_record.first_seen)).merge_from(&delta_record);
			touched.push(hash);
		}
		touched
	}

	async fn mirror_to_cache(&self, touched: &[String]) {
		let records = self.records.lock().await;
		let mut entries = HashMap::with_capacity(touched.len());
		for hash in touched {
			if let Some(record) = records.get(hash) {
				entries.insert(hash.clone(), record.clone());
			}
		}
		drop(records);
		if let Err(error) = self.cache.set_multi_json(&entries).await {
			debug!(component = crate::logging::OVERVIEW_AGGREGATOR, %error, "election cache write failed");
		}
	}

	pub async fn get(&self, hash: &str) -> Option<ElectionRecord> {
		if let Some(record) = self.records.lock().await.get(hash).cloned() {
			return Some(record);
		}
		self.cache.get_json(hash).await.ok().flatten()
	}

	async fn evict(&self, keep: &HashSet<String>) {
		let mut records = self.records.lock().await;
		let dropped: Vec<String> = records.keys().filter(|h| !keep.contains(*h)).cloned().collect();
		for hash in &dropped {
			records.remove(hash);
		}
		drop(records);
		if !dropped.is_empty() {
			let _ = self.cache.drop_multi(&dropped).await;
		}
	}

	async fn snapshot(&self) -> HashMap<String, ElectionRecord> {
		self.records.lock().await.clone()
	}
}

fn now_millis() -> i64 {
	SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as i64).unwrap_or(0)
}

/// Transforms one election record into its derived overview entry, per
/// spec.md section 4.4 step 5: per-account dedup for weight accumulation,
/// final-voters list capped and aliased.
fn derive_overview_entry(
	record: &ElectionRecord,
	registry: &crate::registry::Snapshot,
	known: &KnownAliases,
	now: i64,
) -> OverviewEntry {
	let mut detail = record.votes.detail.clone();
	detail.sort_by_key(|v| v.time);

	let mut seen_normal = HashSet::new();
	let mut seen_final = HashSet::new();
	let mut normal_weight = num_bigint::BigUint::from(0u32);
	let mut final_weight = num_bigint::BigUint::from(0u32);
	let mut final_voters: Vec<(i64, String)> = Vec::new();

	for vote in &detail {
		match vote.kind {
			VoteKind::Normal => {
				if seen_normal.insert(vote.account.clone()) {
					normal_weight += registry.representatives.weight_of(&vote.account);
				}
			},
			VoteKind::Final => {
				if seen_final.insert(vote.account.clone()) {
					final_weight += registry.representatives.weight_of(&vote.account);
				}
				final_voters.push((vote.time, vote.account.clone()));
			},
		}
	}

	final_voters.sort_by_key(|(time, _)| *time);
	let first_final_voters: Vec<String> = final_voters
		.into_iter()
		.take(overview::FIRST_FINAL_VOTERS_LIMIT)
		.map(|(_, account)| known.alias_or_account(&account))
		.collect();

	let quorum_delta = &registry.quorum.quorum_delta;
	let normal_weight_percent = percent(&normal_weight, quorum_delta);
	let final_weight_percent = percent(&final_weight, quorum_delta);

	let active_since_seconds = (now - record.first_seen) / 1000;
	let confirmation_duration_ms = record.first_confirmed.map(|t| t - record.first_seen);

	OverviewEntry {
		normal_weight,
		final_weight,
		normal_weight_percent,
		final_weight_percent,
		normal_votes: record.votes.normal_count,
		final_votes: record.votes.final_count,
		is_active: record.is_active,
		is_stopped: record.is_stopped,
		is_confirmed: record.is_confirmed,
		first_seen: record.first_seen,
		first_confirmed: record.first_confirmed,
		first_final_voters,
		active_since_seconds,
		confirmation_duration_ms,
	}
}

fn percent(numerator: &num_bigint::BigUint, denominator: &num_bigint::BigUint) -> f64 {
	use num_traits::ToPrimitive;
	if denominator == &num_bigint::BigUint::from(0u32) {
		return 0.0;
	}
	(numerator.to_f64().unwrap_or(0.0) * 100.0) / denominator.to_f64().unwrap_or(1.0)
}

pub struct Aggregator {
	store: ElectionStore,
	overview: Arc<OverviewHandle>,
	registry: Arc<RegistryHandle>,
	known: KnownAliases,
}

impl Aggregator {
	pub fn new(election_cache: NamespacedCache, overview: Arc<OverviewHandle>, registry: Arc<RegistryHandle>) -> Self {
		Self { store: ElectionStore::new(election_cache), overview, registry, known: KnownAliases::new() }
	}

	pub async fn election(&self, hash: &str) -> Option<ElectionRecord> {
		self.store.get(hash).await
	}

	/// Runs one aggregation tick: drain, merge, derive, rank, publish, evict.
	async fn tick(&self, merger: &ElectionMerger) {
		let delta = merger.steal_delta();
		if delta.is_empty() {
			return;
		}
		let touched = self.store.apply_delta(delta).await;
		self.store.mirror_to_cache(&touched).await;

		let registry_snapshot = self.registry.current();
		let now = now_millis();
		let all_records = self.store.snapshot().await;

		let entries: HashMap<String, OverviewEntry> = all_records
			.iter()
			.map(|(hash, record)| (hash.clone(), derive_overview_entry(record, &registry_snapshot, &self.known, now)))
			.collect();

		let published = overview::publish(entries);
		let keep: HashSet<String> = published.order.iter().cloned().collect();
		self.overview.publish(published);
		self.store.evict(&keep).await;
	}
}

/// Runs the aggregator tick loop until `shutdown` fires (spec.md section 4.4).
pub async fn run(aggregator: Arc<Aggregator>, merger: Arc<ElectionMerger>, mut shutdown: tokio::sync::watch::Receiver<bool>) {
	let mut interval = tokio::time::interval(TICK_INTERVAL);
	interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
	loop {
		tokio::select! {
			_ = interval.tick() => {
				aggregator.tick(&merger).await;
			},
			_ = shutdown.changed() => {
				if *shutdown.borrow() {
					return;
				}
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::cache::{InMemoryCache, NamespacedCache};
	use crate::events::Event;
	use crate::model::{QuorumSnapshot, RepresentativeEntry, RepresentativeSnapshot};
	use num_bigint::BigUint;

	fn registry_snapshot_with(account: &str, weight: u32) -> crate::registry::Snapshot {
		let mut reps = HashMap::new();
		reps.insert(
			account.to_string(),
			RepresentativeEntry { account: account.to_string(), voting_weight: BigUint::from(weight), weight_percent: 0.0, telemetry: None },
		);
		crate::registry::Snapshot {
			representatives: Arc::new(RepresentativeSnapshot { reps, total_weight: BigUint::from(weight) }),
			quorum: Arc::new(QuorumSnapshot { quorum_delta: BigUint::from(200u32) }),
		}
	}

	#[tokio::test]
	async fn weight_percent_scenario_s4() {
		let registry = registry_snapshot_with("A", 50);
		let mut record = ElectionRecord::new(1000);
		record.votes.detail.push(crate::model::VoteDetail { kind: VoteKind::Normal, time: 1000, account: "A".to_string() });
		record.votes.normal_count = 1;

		let entry = derive_overview_entry(&record, &registry, &KnownAliases::new(), 1000);
		assert_eq!(entry.normal_weight, BigUint::from(50u32));
		assert!((entry.normal_weight_percent - 25.0).abs() < 1e-9);
	}

	#[tokio::test]
	async fn final_sentinel_scenario_s2() {
		let registry = registry_snapshot_with("B", 30);
		let mut record = ElectionRecord::new(1000);
		record.votes.detail.push(crate::model::VoteDetail { kind: VoteKind::Final, time: 1500, account: "B".to_string() });
		record.votes.final_count = 1;

		let entry = derive_overview_entry(&record, &registry, &KnownAliases::new(), 2000);
		assert_eq!(entry.final_votes, 1);
		assert_eq!(entry.final_weight, BigUint::from(30u32));
		assert!(entry.first_final_voters.contains(&"B".to_string()));
	}

	#[tokio::test]
	async fn repeat_votes_from_same_account_do_not_double_count_weight() {
		let registry = registry_snapshot_with("A", 50);
		let mut record = ElectionRecord::new(1000);
		record.votes.detail.push(crate::model::VoteDetail { kind: VoteKind::Normal, time: 1000, account: "A".to_string() });
		record.votes.detail.push(crate::model::VoteDetail { kind: VoteKind::Normal, time: 1100, account: "A".to_string() });
		record.votes.normal_count = 2;

		let entry = derive_overview_entry(&record, &registry, &KnownAliases::new(), 1000);
		assert_eq!(entry.normal_weight, BigUint::from(50u32));
	}

	#[tokio::test]
	async fn tick_merges_delta_ranks_and_evicts() {
		let cache: std::sync::Arc<dyn crate::cache::Cache> = std::sync::Arc::new(InMemoryCache::new());
		let election_cache = NamespacedCache::new(cache, "el_");
		let overview_handle = OverviewHandle::new();
		let registry_handle = RegistryHandle::new();
		let aggregator = Arc::new(Aggregator::new(election_cache, overview_handle.clone(), registry_handle));

		let merger = Arc::new(ElectionMerger::new());
		merger.apply_event(Event::StartedElection { time_ms: 1000, hash: "H1".to_string() });
		aggregator.tick(&merger).await;

		let published = overview_handle.current();
		assert!(published.order.contains(&"H1".to_string()));
		assert!(aggregator.election("H1").await.is_some());
	}
}
