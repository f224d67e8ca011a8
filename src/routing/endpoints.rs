//! Upstream endpoint naming rules.
//!
//! # Responsibilities
//! - Append the trailing slash the upstream requires on bare collection paths
//! - Leave resource paths (`product/abc123`) without an added slash
//! - Name the collection a path belongs to, for per-route timeouts
//!
//! # Design Decisions
//! - Driven by a fixed set of collection names, not by heuristics
//! - Matching is exact and case-sensitive, like the upstream's router
//! - Paths outside the API prefix are never rewritten

use std::collections::HashSet;

/// A forwarded path after normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Path to request upstream.
    pub path: String,
    /// Known collection the path addresses, if any.
    pub collection: Option<String>,
}

/// The set of known collection endpoints under an API prefix.
#[derive(Debug, Clone)]
pub struct EndpointRules {
    prefix: String,
    collections: HashSet<String>,
}

impl EndpointRules {
    pub fn new<I, S>(prefix: impl Into<String>, collections: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let prefix = prefix.into().trim_end_matches('/').to_string();
        Self {
            prefix,
            collections: collections.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_collection(&self, name: &str) -> bool {
        self.collections.contains(name)
    }

    /// Normalize a forwarded path.
    ///
    /// `/api/product` becomes `/api/product/`; `/api/product/abc123` is kept.
    pub fn normalize(&self, path: &str) -> Endpoint {
        let rest = match path.strip_prefix(&self.prefix) {
            Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
            _ => {
                return Endpoint {
                    path: path.to_string(),
                    collection: None,
                }
            }
        };

        let segments: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();
        let collection = segments
            .first()
            .filter(|name| self.is_collection(name))
            .map(|name| name.to_string());

        let path = match (&collection, segments.len()) {
            (Some(name), 1) => format!("{}/{}/", self.prefix, name),
            _ => path.to_string(),
        };

        Endpoint { path, collection }
    }
}
