//! Upstream Listener (C1): maintains a websocket connection to the node's
//! event stream, subscribes to the four event topics, decodes frames, and
//! pushes them onto the bounded queue C2 drains (spec.md section 4.1).
//!
//! Reconnects on any disconnect with a fixed 1s backoff and no retry cap -
//! the node is assumed to eventually come back, and there is nothing useful
//! to do but keep trying.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::events::{decode_frame, subscription_requests};
use crate::merger::ElectionMerger;
use crate::queue::EventQueue;

const RECONNECT_DELAY: Duration = Duration::from_secs(1);
const SAMPLE_LOG_EVERY: u64 = 1000;

/// Runs the reconnect loop until `shutdown` fires.
pub async fn run(ws_url: String, queue: Arc<EventQueue>, merger: Arc<ElectionMerger>, mut shutdown: watch::Receiver<bool>) {
	let received = AtomicU64::new(0);
	loop {
		if *shutdown.borrow() {
			return;
		}

		tokio::select! {
			result = connect_and_drain(&ws_url, &queue, &merger, &received) => {
				if let Err(error) = result {
					warn!(component = crate::logging::UPSTREAM_LISTENER, %error, "connection lost, reconnecting");
				}
			},
			_ = shutdown.changed() => {
				if *shutdown.borrow() {
					return;
				}
			}
		}

		tokio::select! {
			_ = tokio::time::sleep(RECONNECT_DELAY) => {},
			_ = shutdown.changed() => {
				if *shutdown.borrow() {
					return;
				}
			}
		}
	}
}

async fn connect_and_drain(
	ws_url: &str,
	queue: &Arc<EventQueue>,
	merger: &Arc<ElectionMerger>,
	received: &AtomicU64,
) -> anyhow::Result<()> {
	let (stream, _response) = tokio_tungstenite::connect_async(ws_url).await?;
	info!(component = crate::logging::UPSTREAM_LISTENER, "connected");
	let (mut write, mut read) = stream.split();

	for request in subscription_requests() {
		write.send(Message::Text(request.to_string())).await?;
	}

	while let Some(message) = read.next().await {
		let message = message?;
		let text = match message {
			Message::Text(text) => text,
			Message::Close(_) => break,
			_ => continue,
		};

		match decode_frame(&text) {
			Ok(event) => {
				queue.push(event);
				let count = received.fetch_add(1, Ordering::Relaxed) + 1;
				if count % SAMPLE_LOG_EVERY == 0 {
					debug!(component = crate::logging::UPSTREAM_LISTENER, count, "frames received");
				}
			},
			Err(error) => {
				merger.note_malformed_event();
				debug!(component = crate::logging::UPSTREAM_LISTENER, %error, "malformed frame dropped");
			},
		}
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn sample_log_interval_is_positive() {
		assert!(SAMPLE_LOG_EVERY > 0);
	}
}
