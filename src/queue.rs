//! Bounded, lossy event queue between the upstream listener (C1) and the
//! election merger (C2). Spec.md section 4.1: "If C2 cannot keep up, the
//! oldest enqueued events are dropped in favor of the newest" - freshness
//! over completeness.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use tokio::sync::Notify;

use crate::events::Event;

pub struct EventQueue {
	capacity: usize,
	items: Mutex<VecDeque<Event>>,
	notify: Notify,
	dropped: AtomicU64,
}

impl EventQueue {
	pub fn new(capacity: usize) -> Self {
		Self { capacity, items: Mutex::new(VecDeque::with_capacity(capacity)), notify: Notify::new(), dropped: AtomicU64::new(0) }
	}

	/// Pushes an event, dropping the oldest queued event if at capacity.
	pub fn push(&self, event: Event) {
		let mut items = self.items.lock().unwrap();
		if items.len() >= self.capacity {
			items.pop_front();
			self.dropped.fetch_add(1, Ordering::Relaxed);
		}
		items.push_back(event);
		drop(items);
		self.notify.notify_one();
	}

	/// Pops the next event, waiting if the queue is currently empty.
	pub async fn pop(&self) -> Event {
		loop {
			if let Some(event) = self.items.lock().unwrap().pop_front() {
				return event;
			}
			self.notify.notified().await;
		}
	}

	pub fn dropped_count(&self) -> u64 {
		self.dropped.load(Ordering::Relaxed)
	}

	pub fn len(&self) -> usize {
		self.items.lock().unwrap().len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::events::Event;

	fn started(hash: &str) -> Event {
		Event::StartedElection { time_ms: 1, hash: hash.to_string() }
	}

	#[test]
	fn drops_oldest_when_full() {
		let queue = EventQueue::new(2);
		queue.push(started("a"));
		queue.push(started("b"));
		queue.push(started("c"));
		assert_eq!(queue.dropped_count(), 1);
		assert_eq!(queue.len(), 2);
	}

	#[tokio::test]
	async fn pop_returns_in_fifo_order() {
		let queue = EventQueue::new(10);
		queue.push(started("a"));
		queue.push(started("b"));
		let Event::StartedElection { hash, .. } = queue.pop().await else { panic!("wrong variant") };
		assert_eq!(hash, "a");
	}
}
