//! Upstream event decoding (spec.md section 6). Each websocket frame is a
//! JSON object `{topic, time, message}`; this module turns that into a typed
//! [`Event`], or reports it as malformed so the listener can count and skip
//! it without ever bubbling an error out of the aggregation pipeline.

use serde::Deserialize;
use thiserror::Error;

use crate::model::{VoteKind, FINAL_VOTE_SENTINEL};

#[derive(Debug, Clone)]
pub enum Event {
	Vote { time_ms: i64, account: String, kind: VoteKind, blocks: Vec<String> },
	StartedElection { time_ms: i64, hash: String },
	StoppedElection { time_ms: i64, hash: String },
	Confirmation { time_ms: i64, hash: String, amount: Option<String> },
}

#[derive(Debug, Error)]
pub enum DecodeError {
	#[error("malformed frame: {0}")]
	Malformed(String),
	#[error("unknown topic: {0}")]
	UnknownTopic(String),
}

#[derive(Debug, Deserialize)]
struct RawFrame {
	topic: String,
	time: TimeValue,
	message: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TimeValue {
	Number(i64),
	Text(String),
}

impl TimeValue {
	fn as_millis(&self) -> Result<i64, DecodeError> {
		match self {
			TimeValue::Number(n) => Ok(*n),
			TimeValue::Text(s) => s.parse().map_err(|_| DecodeError::Malformed(format!("bad time value: {s}"))),
		}
	}
}

#[derive(Debug, Deserialize)]
struct VoteMessage {
	account: String,
	timestamp: String,
	#[serde(default)]
	blocks: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct HashMessage {
	hash: String,
	#[serde(default)]
	amount: Option<String>,
}

pub fn decode_frame(raw: &str) -> Result<Event, DecodeError> {
	let frame: RawFrame = serde_json::from_str(raw).map_err(|e| DecodeError::Malformed(e.to_string()))?;
	let time_ms = frame.time.as_millis()?;

	match frame.topic.as_str() {
		"vote" => {
			let msg: VoteMessage =
				serde_json::from_value(frame.message).map_err(|e| DecodeError::Malformed(e.to_string()))?;
			let kind = if msg.timestamp == FINAL_VOTE_SENTINEL { VoteKind::Final } else { VoteKind::Normal };
			Ok(Event::Vote { time_ms, account: msg.account, kind, blocks: msg.blocks })
		},
		"started_election" => {
			let msg: HashMessage =
				serde_json::from_value(frame.message).map_err(|e| DecodeError::Malformed(e.to_string()))?;
			Ok(Event::StartedElection { time_ms, hash: msg.hash })
		},
		"stopped_election" => {
			let msg: HashMessage =
				serde_json::from_value(frame.message).map_err(|e| DecodeError::Malformed(e.to_string()))?;
			Ok(Event::StoppedElection { time_ms, hash: msg.hash })
		},
		"confirmation" => {
			let msg: HashMessage =
				serde_json::from_value(frame.message).map_err(|e| DecodeError::Malformed(e.to_string()))?;
			Ok(Event::Confirmation { time_ms, hash: msg.hash, amount: msg.amount })
		},
		other => Err(DecodeError::UnknownTopic(other.to_string())),
	}
}

/// Builds the four subscription-request frames sent right after connecting,
/// in the order spec.md section 4.1 lists the topics.
pub fn subscription_requests() -> Vec<serde_json::Value> {
	vec![
		serde_json::json!({"action": "subscribe", "topic": "vote"}),
		serde_json::json!({"action": "subscribe", "topic": "started_election"}),
		serde_json::json!({"action": "subscribe", "topic": "stopped_election"}),
		serde_json::json!({"action": "subscribe", "topic": "confirmation", "options": {"include_block": false}}),
	]
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn decodes_normal_vote() {
		let frame = r#"{"topic":"vote","time":"1000","message":{"account":"nano_1abc","timestamp":"123","blocks":["H1","H2"]}}"#;
		let event = decode_frame(frame).unwrap();
		match event {
			Event::Vote { time_ms, account, kind, blocks } => {
				assert_eq!(time_ms, 1000);
				assert_eq!(account, "nano_1abc");
				assert_eq!(kind, VoteKind::Normal);
				assert_eq!(blocks, vec!["H1".to_string(), "H2".to_string()]);
			},
			_ => panic!("expected vote"),
		}
	}

	#[test]
	fn decodes_final_vote_sentinel() {
		let frame = format!(
			r#"{{"topic":"vote","time":1000,"message":{{"account":"nano_1abc","timestamp":"{}","blocks":["H1"]}}}}"#,
			FINAL_VOTE_SENTINEL
		);
		let event = decode_frame(&frame).unwrap();
		match event {
			Event::Vote { kind, .. } => assert_eq!(kind, VoteKind::Final),
			_ => panic!("expected vote"),
		}
	}

	#[test]
	fn decodes_confirmation_with_amount() {
		let frame = r#"{"topic":"confirmation","time":1500,"message":{"hash":"H1","amount":"1000000"}}"#;
		let event = decode_frame(frame).unwrap();
		match event {
			Event::Confirmation { hash, amount, .. } => {
				assert_eq!(hash, "H1");
				assert_eq!(amount.as_deref(), Some("1000000"));
			},
			_ => panic!("expected confirmation"),
		}
	}

	#[test]
	fn rejects_unknown_topic() {
		let frame = r#"{"topic":"mystery","time":1,"message":{}}"#;
		assert!(matches!(decode_frame(frame), Err(DecodeError::UnknownTopic(_))));
	}

	#[test]
	fn rejects_malformed_json() {
		assert!(matches!(decode_frame("not json"), Err(DecodeError::Malformed(_))));
	}
}
