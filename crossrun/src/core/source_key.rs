//! Short keys for clustering failures by original source file.

use std::collections::BTreeMap;

use sha2::{Digest, Sha256};

/// Hex digits kept from the source hash. Kept small so one seed file cannot
/// explode into many distinct reports.
pub const SOURCE_KEY_LENGTH: usize = 3;

/// Key used when no original source could be determined.
pub const SOURCE_KEY_NONE: &str = "none";

/// Fixed key for failures found while running the smoke test.
pub const SMOKE_TEST_SOURCE_KEY: &str = "smoke test failed";

/// Derive the deduplication key for a failure.
///
/// Known sources map to their fixed key; other sources are hashed.
pub fn source_key(source: Option<&str>, known_failures: &BTreeMap<String, String>) -> String {
    let Some(source) = source.filter(|source| !source.is_empty()) else {
        return SOURCE_KEY_NONE.to_string();
    };
    if let Some(key) = known_failures.get(source) {
        return key.clone();
    }
    let digest = Sha256::digest(source.as_bytes());
    let mut key = hex::encode(digest);
    key.truncate(SOURCE_KEY_LENGTH);
    key
}
