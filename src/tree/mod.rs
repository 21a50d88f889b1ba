mod builder;
mod model;
mod normalize;
mod sanitize;

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, warn};

pub use builder::{build_forest, Forest};
pub use model::{File, Folder, Node};
pub use normalize::normalize_keys;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TreeError {
    /// The service answered, but not with `status: success`
    #[error("Error of API response: {status} ({detail})")]
    ApiStatus { status: String, detail: String },
    #[error("Malformed API response: {0}")]
    MalformedResponse(String),
}

/// Normalizes a raw listing response and builds its forest
///
/// A response that can't be used is logged and results in an empty forest,
/// so the rest of the run can still finish.
pub fn forest_from_response(response: Value) -> Forest {
    let normalized = normalize_keys(response);
    match build_forest(&normalized) {
        Ok(forest) => {
            for skipped in &forest.skipped {
                warn!("{} in \"{}\", skipping node", skipped.reason, skipped.parent);
            }
            debug!(
                "Gathered {} top level nodes, response code {:?}",
                forest.nodes.len(),
                forest.code
            );
            forest
        }
        Err(e) => {
            error!("{}", e);
            Forest::default()
        }
    }
}
