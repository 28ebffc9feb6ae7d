//! Content-derived cache keys.
//!
//! A compile result is identified purely by what was submitted: the request
//! body plus the logical route it was posted to. Equal submissions always
//! produce equal keys; collisions between different submissions are treated
//! as impossible and never handled.

use std::fmt;

use sha2::{Digest, Sha256};

/// SHA-256 digest over a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey([u8; 32]);

impl CacheKey {
    /// Hash the body followed by each route segment, in order.
    ///
    /// For a raw-body submission to `/0.16/stable` this is
    /// `SHA256(source ++ "0.16" ++ "stable")`.
    pub fn compute<'a, I>(body: &[u8], segments: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut hasher = Sha256::new();
        hasher.update(body);
        for segment in segments {
            hasher.update(segment.as_bytes());
        }
        let mut digest = [0u8; 32];
        digest.copy_from_slice(&hasher.finalize());
        Self(digest)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex digest.
    pub fn hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hex())
    }
}

/// Split a request path into its non-empty segments.
pub fn route_segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Cache lookup identity: the route together with the content key, so the
/// same bytes posted to two endpoints never share an entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StoreKey {
    route: Vec<String>,
    key: CacheKey,
}

/// Namespace prefix for compile entries in a shared store.
pub const STORE_NAMESPACE: &str = "compiles";

impl StoreKey {
    /// Derive the lookup identity for a body posted to `path`.
    pub fn for_request(path: &str, body: &[u8]) -> Self {
        let segments = route_segments(path);
        let key = CacheKey::compute(body, segments.iter().copied());
        Self {
            route: segments.into_iter().map(str::to_string).collect(),
            key,
        }
    }

    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    pub fn route(&self) -> &[String] {
        &self.route
    }
}

impl fmt::Display for StoreKey {
    /// `compiles/<segment>/…/<hex key>`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(STORE_NAMESPACE)?;
        for segment in &self.route {
            write!(f, "/{segment}")?;
        }
        write!(f, "/{}", self.key)
    }
}
