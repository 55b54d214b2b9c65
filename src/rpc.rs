//! RPC client (A5): a typed `reqwest`-based JSON-RPC-over-HTTP client for
//! the four node RPC methods spec.md section 6 names. Grounded on the
//! teacher's `chainflip-btc-deposit-tracker::BtcRpc` - a trait plus a
//! `reqwest::Client` POST-body caller with optional basic auth - adapted
//! from Bitcoin Core's positional-params RPC to the node's action-keyed
//! JSON-RPC convention (`{"action": "...", ...params}`).

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

const RPC_TIMEOUT: Duration = Duration::from_secs(10);

#[async_trait]
pub trait NodeRpc: Send + Sync {
	async fn representatives_online(&self) -> anyhow::Result<Value>;
	async fn telemetry(&self) -> anyhow::Result<Value>;
	async fn confirmation_quorum(&self) -> anyhow::Result<Value>;
	async fn blocks_info(&self, hashes: &[String]) -> anyhow::Result<Value>;
}

pub struct NodeRpcClient {
	http: reqwest::Client,
	url: String,
	username: Option<String>,
	password: Option<String>,
}

impl NodeRpcClient {
	pub fn new(url: String, username: Option<String>, password: Option<String>) -> Self {
		let http = reqwest::Client::builder().timeout(RPC_TIMEOUT).build().expect("reqwest client builds");
		Self { http, url, username, password }
	}

	async fn call<T: DeserializeOwned>(&self, body: Value) -> anyhow::Result<T> {
		let mut request = self.http.post(&self.url).json(&body);
		if let Some(username) = &self.username {
			request = request.basic_auth(username, self.password.as_ref());
		}
		let response = request.send().await?;
		Ok(response.json::<T>().await?)
	}
}

#[async_trait]
impl NodeRpc for NodeRpcClient {
	async fn representatives_online(&self) -> anyhow::Result<Value> {
		self.call(json!({"action": "representatives_online", "weight": "true"})).await
	}

	async fn telemetry(&self) -> anyhow::Result<Value> {
		self.call(json!({"action": "telemetry", "raw": "true"})).await
	}

	async fn confirmation_quorum(&self) -> anyhow::Result<Value> {
		self.call(json!({"action": "confirmation_quorum", "peer_details": "true"})).await
	}

	async fn blocks_info(&self, hashes: &[String]) -> anyhow::Result<Value> {
		self.call(json!({
			"action": "blocks_info",
			"hashes": hashes,
			"json_block": "true",
			"source": "true",
			"receive_hash": "true",
		}))
		.await
	}
}

/// Parsed shape of a `representatives_online(weight=true)` response:
/// `{"representatives": {account: {"weight": "..."}}}`.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct RawRepresentative {
	pub weight: String,
}

pub fn parse_representatives(value: &Value) -> HashMap<String, RawRepresentative> {
	value
		.get("representatives")
		.and_then(|v| v.as_object())
		.map(|map| {
			map.iter()
				.filter_map(|(account, info)| {
					serde_json::from_value::<RawRepresentative>(info.clone()).ok().map(|rep| (account.clone(), rep))
				})
				.collect()
		})
		.unwrap_or_default()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_representatives_map() {
		let value = json!({
			"representatives": {
				"nano_1a": {"weight": "500"},
				"nano_1b": {"weight": "bad"},
			}
		});
		let parsed = parse_representatives(&value);
		assert_eq!(parsed.len(), 1);
		assert_eq!(parsed["nano_1a"].weight, "500");
	}
}
