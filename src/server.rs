//! HTTP/WS server (A3): hosts the raw/detail lookup routes, the overview
//! websocket, and a liveness probe, all behind a single `warp` server - the
//! same framework the teacher's `chainflip-elections-tracker` binary uses.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use warp::{Filter, Rejection, Reply};

use crate::aggregator::Aggregator;
use crate::detail;
use crate::errors::DetailError;
use crate::known::KnownAliases;
use crate::registry::RegistryHandle;
use crate::rpc::NodeRpc;

#[derive(Clone)]
pub struct AppState {
	pub aggregator: Arc<Aggregator>,
	pub overview: Arc<crate::overview::OverviewHandle>,
	pub registry: Arc<RegistryHandle>,
	pub clients: Arc<crate::fanout::ClientRegistry>,
	pub rpc: Arc<dyn NodeRpc>,
	pub known: Arc<KnownAliases>,
	pub block_explorer: Option<String>,
}

#[derive(Serialize)]
struct HealthResponse {
	status: &'static str,
}

#[derive(Serialize)]
struct ErrorBody {
	error: String,
}

fn not_found_body(error: DetailError) -> warp::reply::WithStatus<warp::reply::Json> {
	warp::reply::with_status(warp::reply::json(&ErrorBody { error: error.to_string() }), warp::http::StatusCode::NOT_FOUND)
}

fn with_state(state: AppState) -> impl Filter<Extract = (AppState,), Error = std::convert::Infallible> + Clone {
	warp::any().map(move || state.clone())
}

/// Minimal embedded template for the live overview page: connects to `/ws`
/// and renders each pushed frame into a table. Styling/layout beyond this is
/// external templating and out of scope (spec.md section 1).
fn render_index_html() -> String {
	r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Election Overview</title>
</head>
<body>
<h1>Election Overview</h1>
<table id="elections"><thead>
<tr><th>Hash</th><th>Normal %</th><th>Final %</th><th>Status</th></tr>
</thead><tbody></tbody></table>
<script>
const ws = new WebSocket(`ws://${location.host}/ws`);
ws.onmessage = (event) => {
	const { elections } = JSON.parse(event.data);
	const body = document.querySelector("#elections tbody");
	body.innerHTML = "";
	for (const [hash, entry] of Object.entries(elections)) {
		const row = body.insertRow();
		row.insertCell().textContent = hash;
		row.insertCell().textContent = entry.normal_weight_percent.toFixed(2);
		row.insertCell().textContent = entry.final_weight_percent.toFixed(2);
		row.insertCell().textContent = entry.is_confirmed ? "confirmed" : entry.is_stopped ? "stopped" : "active";
	}
};
</script>
</body>
</html>"#
		.to_string()
}

/// Minimal embedded template for a single election's detail page, grounded
/// on the original's `election_detail.html` (summary table keyed by
/// representative, plus a block-explorer link when configured).
fn render_election_detail_html(hash: &str, detail: &detail::ElectionDetail, block_explorer: Option<&str>) -> String {
	let explorer_link = block_explorer
		.map(|base| format!(r#"<p><a href="{base}/block/{hash}">View on block explorer</a></p>"#))
		.unwrap_or_default();

	let mut rows = String::new();
	for (account, summary) in &detail.summary {
		rows.push_str(&format!(
			"<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
			summary.account_formatted, account, summary.normal_votes, summary.final_votes
		));
	}

	let first_seen = detail.first_seen;
	format!(
		r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Election {hash}</title>
</head>
<body>
<h1>Election {hash}</h1>
{explorer_link}
<p>First seen: {first_seen}</p>
<table><thead><tr><th>Representative</th><th>Account</th><th>Normal votes</th><th>Final votes</th></tr></thead>
<tbody>{rows}</tbody></table>
</body>
</html>"#
	)
}

async fn handle_index(_state: AppState) -> Result<impl Reply, Rejection> {
	Ok(warp::reply::html(render_index_html()))
}

async fn handle_raw(hash: String, state: AppState) -> Result<impl Reply, Rejection> {
	match state.aggregator.election(&hash).await {
		Some(record) => Ok(warp::reply::json(&record)),
		None => Ok(warp::reply::json(&ErrorBody { error: DetailError::NotFound.to_string() })),
	}
}

async fn load_election_detail(hash: &str, state: &AppState) -> Option<detail::ElectionDetail> {
	let record = state.aggregator.election(hash).await?;

	let blocks_raw = state.rpc.blocks_info(&[hash.to_string()]).await.ok();
	let blocks = blocks_raw.as_ref().map(detail::parse_blocks_info).unwrap_or_default();

	let registry_snapshot = state.registry.current();
	let now = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as i64).unwrap_or(0);
	Some(detail::format_election_detail(&record, &registry_snapshot, &state.known, blocks, now))
}

async fn handle_election_details_html(hash: String, state: AppState) -> Result<Box<dyn Reply>, Rejection> {
	match load_election_detail(&hash, &state).await {
		Some(detail) => Ok(Box::new(warp::reply::html(render_election_detail_html(&hash, &detail, state.block_explorer.as_deref())))),
		None => Ok(Box::new(not_found_body(DetailError::NotFound))),
	}
}

async fn handle_election_details_json(hash: String, state: AppState) -> Result<Box<dyn Reply>, Rejection> {
	match load_election_detail(&hash, &state).await {
		Some(detail) => Ok(Box::new(warp::reply::json(&detail))),
		None => Ok(Box::new(not_found_body(DetailError::NotFound))),
	}
}

async fn handle_health() -> Result<impl Reply, Rejection> {
	Ok(warp::reply::json(&HealthResponse { status: "ok" }))
}

fn handle_ws(state: AppState) -> impl Filter<Extract = (Box<dyn Reply>,), Error = Rejection> + Clone {
	warp::path("ws")
		.and(warp::ws())
		.and(with_state(state))
		.map(|ws: warp::ws::Ws, state: AppState| {
			let reply: Box<dyn Reply> = Box::new(ws.on_upgrade(move |socket| async move {
				crate::fanout::serve_client(socket, state.clients, state.overview).await;
			}));
			reply
		})
}

/// Builds the full route tree served by the process (spec.md section 5, A3).
pub fn routes(state: AppState) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
	let index = warp::path::end()
		.and(warp::get())
		.and(with_state(state.clone()))
		.and_then(handle_index);

	let raw = warp::path!("raw" / String)
		.and(warp::get())
		.and(with_state(state.clone()))
		.and_then(handle_raw);

	let api_election_details = warp::path!("api" / "election_details" / String)
		.and(warp::get())
		.and(with_state(state.clone()))
		.and_then(handle_election_details_json);

	let election_details = warp::path!("election_details" / String)
		.and(warp::get())
		.and(with_state(state.clone()))
		.and_then(handle_election_details_html);

	let health = warp::path("health").and(warp::get()).and_then(handle_health);

	let ws = handle_ws(state);

	index
		.or(raw)
		.or(api_election_details)
		.or(election_details)
		.or(health)
		.or(ws)
}

pub async fn serve(state: AppState, bind_addr: std::net::SocketAddr) {
	warp::serve(routes(state)).run(bind_addr).await;
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::known::KnownAliases;
	use crate::model::{QuorumSnapshot, RepresentativeSnapshot};
	use crate::registry::Snapshot as RegistrySnapshot;
	use std::sync::Arc as StdArc;

	#[test]
	fn index_page_is_html_and_wires_the_ws_endpoint() {
		let page = render_index_html();
		assert!(page.starts_with("<!DOCTYPE html>"));
		assert!(page.contains("/ws"));
	}

	#[test]
	fn detail_page_omits_explorer_link_when_unconfigured() {
		let registry =
			RegistrySnapshot { representatives: StdArc::new(RepresentativeSnapshot::empty()), quorum: StdArc::new(QuorumSnapshot::default_unit()) };
		let record = crate::model::ElectionRecord::new(1000);
		let detail = detail::format_election_detail(&record, &registry, &KnownAliases::new(), Vec::new(), 2000);

		let without_explorer = render_election_detail_html("H1", &detail, None);
		assert!(!without_explorer.contains("block explorer"));

		let with_explorer = render_election_detail_html("H1", &detail, Some("https://explorer.example"));
		assert!(with_explorer.contains("https://explorer.example/block/H1"));
	}
}
