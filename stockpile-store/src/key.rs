//! Cache key derivation
//!
//! Keys are lowercase hex SHA-256 digests over a canonical rendering of
//! the request, so the same logical request always lands on the same
//! cache entry and any change to endpoint, symbol or parameters produces
//! a different one.

use serde_json::Value;
use sha2::{Digest, Sha256};
use stockpile_core::FetchRequest;
use std::fmt;

/// Opaque cache key: 64 lowercase hex characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Key for one provider request.
    ///
    /// The canonical material is `"{endpoint}/{SYMBOL}|{sorted params}"`;
    /// parameters are re-sorted here so hand-built requests hash the same
    /// as normalized ones.
    pub fn for_request(request: &FetchRequest) -> Self {
        let mut params = request.params.clone();
        params.sort();
        let rendered: Vec<String> = params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        Self::from_material(&format!("{}|{}", request.path(), rendered.join("&")))
    }

    /// Key for an arbitrary JSON value, used by the insight cache to hash
    /// a chat message list. `serde_json` keeps object keys sorted, so the
    /// rendering is canonical.
    pub fn for_messages(messages: &Value) -> Self {
        Self::from_material(&messages.to_string())
    }

    fn from_material(material: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(material.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// TESTS
// ============================================================================
