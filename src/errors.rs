//! Error types for the boundaries that are permitted to produce a typed
//! failure (spec.md section 7). Everything inside the aggregation pipeline
//! itself is loss-tolerant by design and never surfaces an error - those
//! paths log and continue rather than returning `Result`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DetailError {
	#[error("No election data found")]
	NotFound,
	#[error("rpc error: {0}")]
	Rpc(#[from] anyhow::Error),
}
