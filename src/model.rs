//! Shared data model: election records, votes, representative and quorum
//! snapshots, and the derived overview entry shipped to clients.

use std::collections::HashMap;

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

pub type BlockHash = String;
pub type Account = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteKind {
	Normal,
	Final,
}

/// Sentinel used by the upstream node to mark a final (confirming) vote.
pub const FINAL_VOTE_SENTINEL: &str = "18446744073709551615";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteDetail {
	#[serde(rename = "type")]
	pub kind: VoteKind,
	pub time: i64,
	pub account: Account,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VoteCounters {
	#[serde(rename = "normal")]
	pub normal_count: u64,
	#[serde(rename = "final")]
	pub final_count: u64,
	pub detail: Vec<VoteDetail>,
}

/// The per-block-hash election record. Used both as the authoritative
/// full record in the election store and as the shape of a "delta" -
/// a partial record describing only what a single event contributed,
/// merged into the full record by [`ElectionRecord::merge_from`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElectionRecord {
	pub first_seen: i64,
	pub first_confirmed: Option<i64>,
	pub started: Vec<i64>,
	pub confirmed: Vec<i64>,
	pub stopped: Vec<i64>,
	pub is_active: bool,
	pub is_started: bool,
	pub is_confirmed: bool,
	pub is_stopped: bool,
	pub amount: Option<String>,
	pub votes: VoteCounters,
}

impl ElectionRecord {
	pub fn new(first_seen: i64) -> Self {
		Self {
			first_seen,
			first_confirmed: None,
			started: Vec::new(),
			confirmed: Vec::new(),
			stopped: Vec::new(),
			is_active: false,
			is_started: false,
			is_confirmed: false,
			is_stopped: false,
			amount: None,
			votes: VoteCounters::default(),
		}
	}

	/// Appends `delta`'s additive fields (sequences, vote counts, detail)
	/// onto `self` and applies the sticky flag-transition priority
	/// `stopped > confirmed > active` from the merged-in delta.
	///
	/// `self` is assumed to already be field-initialised (via [`Self::new`]
	/// or a previous merge); this never replaces `self` wholesale.
	pub fn merge_from(&mut self, delta: &ElectionRecord) {
		if self.first_confirmed.is_none() {
			self.first_confirmed = delta.first_confirmed;
		}

		self.started.extend(delta.started.iter().copied());
		self.confirmed.extend(delta.confirmed.iter().copied());
		self.stopped.extend(delta.stopped.iter().copied());

		self.votes.normal_count += delta.votes.normal_count;
		self.votes.final_count += delta.votes.final_count;
		self.votes.detail.extend(delta.votes.detail.iter().cloned());
		self.votes.detail.sort_by_key(|v| v.time);

		if delta.amount.is_some() {
			self.amount = delta.amount.clone();
		}

		if delta.is_stopped {
			self.is_active = false;
			self.is_stopped = true;
		} else if delta.is_confirmed {
			self.is_active = false;
			self.is_stopped = false;
			self.is_confirmed = true;
		} else if delta.is_active && !self.is_confirmed {
			self.is_stopped = false;
			self.is_active = true;
		}

		if delta.is_started {
			self.is_started = true;
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeTelemetry {
	pub node_maker: Option<String>,
	pub node_id: Option<String>,
	pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepresentativeEntry {
	pub account: Account,
	#[serde(with = "biguint_decimal")]
	pub voting_weight: BigUint,
	pub weight_percent: f64,
	pub telemetry: Option<NodeTelemetry>,
}

#[derive(Debug, Clone)]
pub struct RepresentativeSnapshot {
	pub reps: HashMap<Account, RepresentativeEntry>,
	pub total_weight: BigUint,
}

impl RepresentativeSnapshot {
	pub fn empty() -> Self {
		Self { reps: HashMap::new(), total_weight: BigUint::from(0u32) }
	}

	pub fn weight_of(&self, account: &str) -> BigUint {
		self.reps.get(account).map(|r| r.voting_weight.clone()).unwrap_or_else(|| BigUint::from(0u32))
	}
}

#[derive(Debug, Clone)]
pub struct QuorumSnapshot {
	pub quorum_delta: BigUint,
}

impl QuorumSnapshot {
	pub fn default_unit() -> Self {
		Self { quorum_delta: BigUint::from(1u32) }
	}
}

/// Derived, per-block overview entry shipped to clients. `active_since_seconds`
/// and `confirmation_duration_ms` are intentionally excluded from the
/// fingerprint (see [`crate::overview::fingerprint_canonical`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverviewEntry {
	#[serde(with = "biguint_decimal")]
	pub normal_weight: BigUint,
	#[serde(with = "biguint_decimal")]
	pub final_weight: BigUint,
	pub normal_weight_percent: f64,
	pub final_weight_percent: f64,
	pub normal_votes: u64,
	pub final_votes: u64,
	pub is_active: bool,
	pub is_stopped: bool,
	pub is_confirmed: bool,
	pub first_seen: i64,
	pub first_confirmed: Option<i64>,
	pub first_final_voters: Vec<String>,
	pub active_since_seconds: i64,
	pub confirmation_duration_ms: Option<i64>,
}

/// A single block's on-chain info, fetched lazily via `blocks_info` for the
/// detail endpoint only (never on the hot aggregation path).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BlockInfoEntry {
	pub confirmed: bool,
	pub amount: String,
	pub account: String,
	pub balance: String,
	pub height: String,
	pub block_type: String,
	pub receive_hash: String,
	pub source_account: String,
}

/// Serializes a [`BigUint`] as a JSON number when it fits in an `f64` without
/// losing precision for the typical weight ranges involved, falling back to
/// a decimal string for anything that wouldn't round-trip exactly. This
/// matches the contract in spec.md section 6: "arbitrary-precision integers
/// that exceed 64 bits are encoded as JSON numbers without precision loss
/// (fallback to string-encoded numbers if necessary)".
pub mod biguint_decimal {
	use num_bigint::BigUint;
	use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};

	pub fn serialize<S: Serializer>(value: &BigUint, serializer: S) -> Result<S::Ok, S::Error> {
		if let Some(as_u64) = value.to_u64_digits_checked() {
			as_u64.serialize(serializer)
		} else {
			value.to_str_radix(10).serialize(serializer)
		}
	}

	pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BigUint, D::Error> {
		let value = serde_json::Value::deserialize(deserializer)?;
		match value {
			serde_json::Value::Number(n) => n
				.as_u64()
				.map(BigUint::from)
				.ok_or_else(|| D::Error::custom("weight number out of range")),
			serde_json::Value::String(s) => {
				s.parse::<BigUint>().map_err(|e| D::Error::custom(format!("invalid weight string: {e}")))
			},
			other => Err(D::Error::custom(format!("unexpected weight representation: {other}"))),
		}
	}

	trait ToU64Checked {
		fn to_u64_digits_checked(&self) -> Option<u64>;
	}

	impl ToU64Checked for BigUint {
		fn to_u64_digits_checked(&self) -> Option<u64> {
			use num_traits::ToPrimitive;
			self.to_u64()
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn confirmed_record_rejects_a_later_active_delta_p4() {
		let mut record = ElectionRecord::new(1000);
		let mut confirm_delta = ElectionRecord::new(1000);
		confirm_delta.is_confirmed = true;
		confirm_delta.first_confirmed = Some(1000);
		record.merge_from(&confirm_delta);
		assert!(record.is_confirmed);
		assert!(!record.is_active);

		// A late/duplicate started_election re-arriving after confirmation must not
		// resurrect is_active while is_confirmed stays sticky.
		let mut active_delta = ElectionRecord::new(1200);
		active_delta.is_active = true;
		active_delta.is_started = true;
		record.merge_from(&active_delta);

		assert!(record.is_confirmed);
		assert!(!record.is_active);
	}
}
