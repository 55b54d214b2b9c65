//! Election detail formatter (A4). Builds the richer, per-block payload
//! served by the detail endpoints - everything the ranked overview omits:
//! per-representative vote timing, raw block contents, and a human-readable
//! "last activity" readout. Grounded on `election_formatter` in
//! `original_source/app/backend/data_processor.py`.

use std::collections::HashMap;

use num_bigint::BigUint;
use serde::Serialize;
use serde_json::Value;

use crate::known::KnownAliases;
use crate::model::{Account, BlockInfoEntry, ElectionRecord, VoteKind};
use crate::registry::Snapshot as RegistrySnapshot;

#[derive(Debug, Clone, Serialize)]
pub struct RepresentativeVoteSummary {
	pub account_formatted: String,
	pub normal_votes: u64,
	pub final_votes: u64,
	/// Delay, in milliseconds, from the first normal vote seen on this
	/// election to this account's earliest normal vote; `-1` if it cast
	/// none (mirrors the original's sentinel).
	pub normal_delay: i64,
	pub final_delay: i64,
	#[serde(with = "crate::model::biguint_decimal")]
	pub weight: BigUint,
	pub weight_percent: f64,
	pub node_version_telemetry: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum LastActivity {
	SecondsAgo(i64),
	None(&'static str),
}

#[derive(Debug, Clone, Serialize)]
pub struct ElectionDetail {
	pub blocks: Vec<BlockInfoEntry>,
	pub first_seen: i64,
	pub confirmation_seen: Option<i64>,
	pub confirmation_duration: Option<i64>,
	pub first_normal_vote_time: Option<i64>,
	pub first_final_vote_time: Option<i64>,
	pub last_normal_vote_time: Option<i64>,
	pub last_final_vote_time: Option<i64>,
	pub last_activity: LastActivity,
	pub summary: HashMap<Account, RepresentativeVoteSummary>,
}

/// Parses a `blocks_info` RPC response's `blocks` object into the detail
/// shape; unparseable or absent entries are skipped rather than failing
/// the whole request.
pub fn parse_blocks_info(raw: &Value) -> Vec<BlockInfoEntry> {
	raw.get("blocks")
		.and_then(|v| v.as_object())
		.map(|map| {
			map.values()
				.map(|info| BlockInfoEntry {
					confirmed: info.get("confirmed").and_then(|v| v.as_str()).map(|s| s == "true").unwrap_or(false),
					amount: info.get("amount").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
					account: info
						.get("contents")
						.and_then(|c| c.get("account"))
						.and_then(|v| v.as_str())
						.unwrap_or_default()
						.to_string(),
					balance: info.get("balance").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
					height: info.get("height").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
					block_type: info.get("subtype").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
					receive_hash: info.get("receive_hash").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
					source_account: info.get("source_account").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
				})
				.collect::<Vec<_>>()
		})
		.unwrap_or_default()
}

fn vote_times(record: &ElectionRecord, kind: VoteKind) -> Vec<i64> {
	record.votes.detail.iter().filter(|v| v.kind == kind).map(|v| v.time).collect()
}

pub fn format_election_detail(
	record: &ElectionRecord,
	registry: &RegistrySnapshot,
	known: &KnownAliases,
	blocks: Vec<BlockInfoEntry>,
	now: i64,
) -> ElectionDetail {
	let normal_times = vote_times(record, VoteKind::Normal);
	let final_times = vote_times(record, VoteKind::Final);

	let first_normal_vote_time = normal_times.iter().copied().min();
	let first_final_vote_time = final_times.iter().copied().min();
	let last_normal_vote_time = normal_times.iter().copied().max();
	let last_final_vote_time = final_times.iter().copied().max();

	let confirmation_duration = if record.is_confirmed { record.first_confirmed.map(|c| c - record.first_seen) } else { None };

	let mut summary: HashMap<Account, RepresentativeVoteSummary> = HashMap::new();
	for vote in &record.votes.detail {
		let entry = summary.entry(vote.account.clone()).or_insert_with(|| RepresentativeVoteSummary {
			account_formatted: known.alias_or_account(&vote.account),
			normal_votes: 0,
			final_votes: 0,
			normal_delay: -1,
			final_delay: -1,
			weight: BigUint::from(0u32),
			weight_percent: 0.0,
			node_version_telemetry: "N/A".to_string(),
		});

		match vote.kind {
			VoteKind::Normal if first_normal_vote_time.is_some() => {
				entry.normal_votes += 1;
				let delay = vote.time - first_normal_vote_time.unwrap();
				if entry.normal_delay < 0 || delay < entry.normal_delay {
					entry.normal_delay = delay;
				}
			},
			VoteKind::Final if first_final_vote_time.is_some() => {
				entry.final_votes += 1;
				let delay = vote.time - first_final_vote_time.unwrap();
				if entry.final_delay < 0 || delay < entry.final_delay {
					entry.final_delay = delay;
				}
			},
			_ => {},
		}
	}

	for (account, rep) in registry.representatives.reps.iter() {
		let entry = summary.entry(account.clone()).or_insert_with(|| RepresentativeVoteSummary {
			account_formatted: known.alias_or_account(account),
			normal_votes: 0,
			final_votes: 0,
			normal_delay: -1,
			final_delay: -1,
			weight: BigUint::from(0u32),
			weight_percent: 0.0,
			node_version_telemetry: "N/A".to_string(),
		});
		entry.weight = rep.voting_weight.clone();
		entry.weight_percent = rep.weight_percent;
		entry.node_version_telemetry =
			rep.telemetry.as_ref().map(|t| t.version.clone()).unwrap_or_else(|| "N/A".to_string());
	}

	let last_activity_source = last_final_vote_time.or(last_normal_vote_time);
	let last_activity = match last_activity_source {
		Some(t) => LastActivity::SecondsAgo((now - t) / 1000),
		None => LastActivity::None("No recent activity"),
	};

	ElectionDetail {
		blocks,
		first_seen: record.first_seen,
		confirmation_seen: record.first_confirmed,
		confirmation_duration,
		first_normal_vote_time,
		first_final_vote_time,
		last_normal_vote_time,
		last_final_vote_time,
		last_activity,
		summary,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::model::{QuorumSnapshot, RepresentativeEntry, RepresentativeSnapshot, VoteDetail};
	use std::sync::Arc;

	fn empty_registry() -> RegistrySnapshot {
		RegistrySnapshot {
			representatives: Arc::new(RepresentativeSnapshot::empty()),
			quorum: Arc::new(QuorumSnapshot::default_unit()),
		}
	}

	#[test]
	fn computes_min_delay_per_account() {
		let mut record = ElectionRecord::new(1000);
		record.votes.detail.push(VoteDetail { kind: VoteKind::Normal, time: 1000, account: "A".to_string() });
		record.votes.detail.push(VoteDetail { kind: VoteKind::Normal, time: 1200, account: "B".to_string() });

		let detail = format_election_detail(&record, &empty_registry(), &KnownAliases::new(), Vec::new(), 2000);
		assert_eq!(detail.summary["A"].normal_delay, 0);
		assert_eq!(detail.summary["B"].normal_delay, 200);
	}

	#[test]
	fn no_recent_activity_when_no_votes() {
		let record = ElectionRecord::new(1000);
		let detail = format_election_detail(&record, &empty_registry(), &KnownAliases::new(), Vec::new(), 2000);
		assert!(matches!(detail.last_activity, LastActivity::None(_)));
	}

	#[test]
	fn last_activity_prefers_final_over_normal() {
		let mut record = ElectionRecord::new(1000);
		record.votes.detail.push(VoteDetail { kind: VoteKind::Normal, time: 1000, account: "A".to_string() });
		record.votes.detail.push(VoteDetail { kind: VoteKind::Final, time: 1500, account: "B".to_string() });
		let detail = format_election_detail(&record, &empty_registry(), &KnownAliases::new(), Vec::new(), 3000);
		match detail.last_activity {
			LastActivity::SecondsAgo(seconds) => assert_eq!(seconds, 1),
			LastActivity::None(_) => panic!("expected activity"),
		}
	}

	#[test]
	fn representatives_with_no_votes_still_appear_in_summary() {
		let record = ElectionRecord::new(1000);
		let mut reps = HashMap::new();
		reps.insert(
			"A".to_string(),
			RepresentativeEntry { account: "A".to_string(), voting_weight: BigUint::from(10u32), weight_percent: 5.0, telemetry: None },
		);
		let registry = RegistrySnapshot {
			representatives: Arc::new(RepresentativeSnapshot { reps, total_weight: BigUint::from(10u32) }),
			quorum: Arc::new(QuorumSnapshot::default_unit()),
		};
		let detail = format_election_detail(&record, &registry, &KnownAliases::new(), Vec::new(), 2000);
		assert_eq!(detail.summary["A"].weight, BigUint::from(10u32));
		assert_eq!(detail.summary["A"].normal_votes, 0);
	}
}
