//! Broadcast Fanout (C5): pushes the published overview to every connected
//! websocket client whenever its fingerprint changes (spec.md section 4.5).
//!
//! Each client is served by its own task so a slow client cannot block the
//! others; a send deadline evicts clients that do not drain fast enough.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::Mutex;
use tracing::{info, warn};
use warp::ws::{Message, WebSocket};

use crate::overview::{self, OverviewHandle};

const SEND_DEADLINE: Duration = Duration::from_secs(2);
const TICK_POLL_INTERVAL: Duration = Duration::from_millis(450);

struct ClientState {
	last_sent_fingerprint: Option<String>,
}

/// The set of connected clients, keyed by a monotonically increasing id.
/// The fanout is the only writer; registration and eviction both go through
/// this guarded map (spec.md section 4.5).
pub struct ClientRegistry {
	clients: Mutex<HashMap<u64, ClientState>>,
	next_id: AtomicU64,
}

impl ClientRegistry {
	pub fn new() -> Arc<Self> {
		Arc::new(Self { clients: Mutex::new(HashMap::new()), next_id: AtomicU64::new(0) })
	}

	fn allocate_id(&self) -> u64 {
		self.next_id.fetch_add(1, Ordering::Relaxed)
	}
}

/// Handles one accepted websocket connection end to end: registers the
/// client with a null last-sent fingerprint, sends the current overview
/// immediately, then polls for fingerprint changes until the socket closes
/// or a send misses its deadline.
pub async fn serve_client(socket: WebSocket, registry: Arc<ClientRegistry>, overview: Arc<OverviewHandle>) {
	let id = registry.allocate_id();
	registry.clients.lock().await.insert(id, ClientState { last_sent_fingerprint: None });
	info!(component = crate::logging::BROADCAST_FANOUT, client = id, "client connected");

	let (mut tx, mut rx) = socket.split();
	let mut interval = tokio::time::interval(TICK_POLL_INTERVAL);
	interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

	loop {
		tokio::select! {
			_ = interval.tick() => {
				let current = overview.current();
				let should_send = registry
					.clients
					.lock()
					.await
					.get(&id)
					.map(|state| state.last_sent_fingerprint.as_deref() != Some(current.fingerprint.as_str()))
					.unwrap_or(false);

				if should_send {
					let payload = serde_json::to_string(&overview::ranked_json(&current.entries, &current.order))
						.unwrap_or_else(|_| "{}".to_string());
					let sent = tokio::time::timeout(SEND_DEADLINE, tx.send(Message::text(payload))).await;
					match sent {
						Ok(Ok(())) => {
							if let Some(state) = registry.clients.lock().await.get_mut(&id) {
								state.last_sent_fingerprint = Some(current.fingerprint.clone());
							}
						},
						_ => {
							warn!(component = crate::logging::BROADCAST_FANOUT, client = id, "send deadline exceeded, evicting");
							break;
						},
					}
				}
			},
			incoming = rx.next() => {
				match incoming {
					Some(Ok(message)) if message.is_close() => break,
					Some(Ok(_)) => {},
					Some(Err(_)) | None => break,
				}
			}
		}
	}

	registry.clients.lock().await.remove(&id);
	info!(component = crate::logging::BROADCAST_FANOUT, client = id, "client disconnected");
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn registry_allocates_unique_ids() {
		let registry = ClientRegistry::new();
		let a = registry.allocate_id();
		let b = registry.allocate_id();
		assert_ne!(a, b);
	}
}
