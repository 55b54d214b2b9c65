//! Election Merger (C2): applies decoded events to a small scratch "working
//! delta" map, and exposes the merge discipline used both to build that
//! delta and (by C4, via [`crate::model::ElectionRecord::merge_from`]) to
//! fold it into the full election store (spec.md section 4.2).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use tracing::{debug, info};

use crate::events::Event;
use crate::model::{ElectionRecord, VoteDetail, VoteKind};
use crate::queue::EventQueue;

pub struct ElectionMerger {
	delta: Mutex<HashMap<String, ElectionRecord>>,
	malformed_dropped: AtomicU64,
}

impl Default for ElectionMerger {
	fn default() -> Self {
		Self { delta: Mutex::new(HashMap::new()), malformed_dropped: AtomicU64::new(0) }
	}
}

impl ElectionMerger {
	pub fn new() -> Self {
		Self::default()
	}

	/// Applies a single decoded event to the working delta, creating the
	/// record on first mention of a hash.
	pub fn apply_event(&self, event: Event) {
		let mut delta = self.delta.lock().unwrap();
		match event {
			Event::Vote { time_ms, account, kind, blocks } => {
				for hash in blocks {
					let record = delta.entry(hash).or_insert_with(|| ElectionRecord::new(time_ms));
					match kind {
						VoteKind::Normal => record.votes.normal_count += 1,
						VoteKind::Final => record.votes.final_count += 1,
					}
					record.votes.detail.push(VoteDetail { kind, time: time_ms, account: account.clone() });
					record.votes.detail.sort_by_key(|v| v.time);
				}
			},
			Event::StartedElection { time_ms, hash } => {
				let record = delta.entry(hash).or_insert_with(|| ElectionRecord::new(time_ms));
				record.started.push(time_ms);
				record.is_active = true;
				record.is_started = true;
			},
			Event::StoppedElection { time_ms, hash } => {
				let record = delta.entry(hash).or_insert_with(|| ElectionRecord::new(time_ms));
				record.stopped.push(time_ms);
				record.is_active = false;
				record.is_stopped = true;
			},
			Event::Confirmation { time_ms, hash, amount } => {
				let record = delta.entry(hash).or_insert_with(|| ElectionRecord::new(time_ms));
				record.confirmed.push(time_ms);
				record.is_active = false;
				record.is_confirmed = true;
				record.amount = amount;
				if record.first_confirmed.is_none() {
					record.first_confirmed = Some(time_ms);
				}
			},
		}
	}

	/// Steals the current working delta, leaving C2 with a fresh empty map.
	/// The lock is held only for the swap itself (spec.md section 4.4 step 1).
	pub fn steal_delta(&self) -> HashMap<String, ElectionRecord> {
		std::mem::take(&mut *self.delta.lock().unwrap())
	}

	pub fn note_malformed_event(&self) {
		self.malformed_dropped.fetch_add(1, Ordering::Relaxed);
	}

	pub fn malformed_dropped(&self) -> u64 {
		self.malformed_dropped.load(Ordering::Relaxed)
	}
}

/// Drains the bounded event queue, applying decoded events to `merger` and
/// exiting once `shutdown` fires. This is C2's consumer side of the C1->C2
/// handoff described in spec.md section 4.1/4.2.
pub async fn run_merge_consumer(queue: std::sync::Arc<EventQueue>, merger: std::sync::Arc<ElectionMerger>, mut shutdown: tokio::sync::watch::Receiver<bool>) {
	loop {
		tokio::select! {
			event = queue.pop() => merger.apply_event(event),
			_ = shutdown.changed() => {
				if *shutdown.borrow() {
					debug!(component = crate::logging::ELECTION_MERGER, "shutting down");
					return;
				}
			}
		}
	}
}

pub fn log_dropped_events(merger: &ElectionMerger, dropped_in_queue: u64) {
	if merger.malformed_dropped() > 0 || dropped_in_queue > 0 {
		info!(
			component = crate::logging::ELECTION_MERGER,
			malformed = merger.malformed_dropped(),
			queue_dropped = dropped_in_queue,
			"events dropped"
		);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn vote_dedup_scenario_s1() {
		// S1: started at t=1000, two normal votes from the same account.
		let merger = ElectionMerger::new();
		merger.apply_event(Event::StartedElection { time_ms: 1000, hash: "H".into() });
		merger.apply_event(Event::Vote {
			time_ms: 1100,
			account: "A".into(),
			kind: VoteKind::Normal,
			blocks: vec!["H".into()],
		});
		merger.apply_event(Event::Vote {
			time_ms: 1200,
			account: "A".into(),
			kind: VoteKind::Normal,
			blocks: vec!["H".into()],
		});

		let delta = merger.steal_delta();
		let record = &delta["H"];
		assert_eq!(record.votes.normal_count, 2);
		assert_eq!(record.votes.detail.len(), 2);
		// P1: sorted by time non-decreasing.
		assert!(record.votes.detail.windows(2).all(|w| w[0].time <= w[1].time));
	}

	#[test]
	fn final_sentinel_scenario_s2() {
		let merger = ElectionMerger::new();
		merger.apply_event(Event::Vote {
			time_ms: 2000,
			account: "B".into(),
			kind: VoteKind::Final,
			blocks: vec!["H".into()],
		});
		let delta = merger.steal_delta();
		let record = &delta["H"];
		assert_eq!(record.votes.final_count, 1);
		assert_eq!(record.votes.detail[0].kind, VoteKind::Final);
	}

	#[test]
	fn confirmation_stickiness_scenario_s3() {
		// started, confirmation, started (same hash) merged into the main store.
		let mut main_record = ElectionRecord::new(1000);
		let mut delta1 = ElectionRecord::new(1000);
		delta1.started.push(1000);
		delta1.is_active = true;
		delta1.is_started = true;
		main_record.merge_from(&delta1);

		let mut delta2 = ElectionRecord::new(1100);
		delta2.confirmed.push(1100);
		delta2.is_active = false;
		delta2.is_confirmed = true;
		delta2.first_confirmed = Some(1100);
		main_record.merge_from(&delta2);

		let mut delta3 = ElectionRecord::new(1200);
		delta3.started.push(1200);
		delta3.is_active = true;
		delta3.is_started = true;
		main_record.merge_from(&delta3);

		// P4: a later "active" event must not clear is_confirmed nor flip is_active back to true.
		assert!(main_record.is_confirmed);
		assert!(!main_record.is_active);
	}

	#[test]
	fn steal_delta_leaves_merger_empty() {
		let merger = ElectionMerger::new();
		merger.apply_event(Event::StartedElection { time_ms: 1, hash: "H".into() });
		let first = merger.steal_delta();
		assert_eq!(first.len(), 1);
		let second = merger.steal_delta();
		assert!(second.is_empty());
	}

	#[test]
	fn vote_counts_match_detail_length_p2() {
		let merger = ElectionMerger::new();
		merger.apply_event(Event::Vote { time_ms: 1, account: "A".into(), kind: VoteKind::Normal, blocks: vec!["H".into()] });
		merger.apply_event(Event::Vote { time_ms: 2, account: "B".into(), kind: VoteKind::Final, blocks: vec!["H".into()] });
		merger.apply_event(Event::Vote { time_ms: 3, account: "C".into(), kind: VoteKind::Normal, blocks: vec!["H".into()] });
		let delta = merger.steal_delta();
		let record = &delta["H"];
		let normal_in_detail = record.votes.detail.iter().filter(|v| v.kind == VoteKind::Normal).count() as u64;
		let final_in_detail = record.votes.detail.iter().filter(|v| v.kind == VoteKind::Final).count() as u64;
		assert_eq!(record.votes.normal_count, normal_in_detail);
		assert_eq!(record.votes.final_count, final_in_detail);
	}
}
