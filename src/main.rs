// Copyright 2026 Nano Election Tracker contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use election_tracker::{aggregator, cache, fanout, known, logging, merger, overview, queue, registry, rpc, server, settings, upstream};

/// Capacity of the bounded C1->C2 event queue (spec.md section 4.1).
const EVENT_QUEUE_CAPACITY: usize = 10_000;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	logging::init();
	let settings = settings::Settings::load();

	let backend: Arc<dyn cache::Cache> = match &settings.memcache_host {
		Some(host) => Arc::new(cache::MemcacheCache::new(host.clone(), settings.memcache_port)),
		None => Arc::new(cache::InMemoryCache::new()),
	};
	let election_cache = cache::NamespacedCache::new(backend.clone(), "el_");

	let rpc_client: Arc<dyn rpc::NodeRpc> =
		Arc::new(rpc::NodeRpcClient::new(settings.rpc_url.clone(), settings.rpc_username.clone(), settings.rpc_password.clone()));

	let event_queue = Arc::new(queue::EventQueue::new(EVENT_QUEUE_CAPACITY));
	let election_merger = Arc::new(merger::ElectionMerger::new());
	let registry_handle = registry::RegistryHandle::new();
	let overview_handle = overview::OverviewHandle::new();
	let client_registry = fanout::ClientRegistry::new();
	let known_aliases = Arc::new(known::KnownAliases::new());
	let aggregator = Arc::new(aggregator::Aggregator::new(election_cache, overview_handle.clone(), registry_handle.clone()));

	let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

	let upstream_task = tokio::spawn(upstream::run(
		settings.ws_url.clone(),
		event_queue.clone(),
		election_merger.clone(),
		shutdown_rx.clone(),
	));
	let merge_task = tokio::spawn(merger::run_merge_consumer(event_queue.clone(), election_merger.clone(), shutdown_rx.clone()));
	let registry_task = tokio::spawn(registry::run(registry_handle.clone(), rpc_client.clone(), shutdown_rx.clone()));
	let aggregate_task = tokio::spawn(aggregator::run(aggregator.clone(), election_merger.clone(), shutdown_rx.clone()));

	let state = server::AppState {
		aggregator,
		overview: overview_handle,
		registry: registry_handle,
		clients: client_registry,
		rpc: rpc_client,
		known: known_aliases,
		block_explorer: settings.block_explorer.clone(),
	};
	let bind_addr = settings.bind_addr;
	let server_task = tokio::spawn(async move {
		server::serve(state, bind_addr).await;
	});

	tokio::signal::ctrl_c().await.ok();
	tracing::info!("shutdown signal received");
	let _ = shutdown_tx.send(true);

	let _ = tokio::join!(upstream_task, merge_task, registry_task, aggregate_task);
	server_task.abort();

	Ok(())
}
