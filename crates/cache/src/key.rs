//! Content-addressed keys for cached analysis results.

use serde::Serialize;
use sha2::{Digest, Sha256};

use mta_core::error::AttributionResult;
use mta_core::table::EventTable;

const KEY_PREFIX: &str = "mta:result:";

/// SHA-256 over the serialized table followed by the serialized settings
/// that shape the result (model tag, its parameters, scoring config).
///
/// Identical input always maps to the same key, so replaying an analysis
/// overwrites the entry with an identical value.
pub fn result_key<S: Serialize>(table: &EventTable, settings: &S) -> AttributionResult<String> {
    let mut hasher = Sha256::new();
    hasher.update(serde_json::to_vec(table)?);
    hasher.update(b"\n");
    hasher.update(serde_json::to_vec(settings)?);
    Ok(format!("{KEY_PREFIX}{}", hex::encode(hasher.finalize())))
}
