//! Upstream path routing.
//!
//! # Data Flow
//! ```text
//! Inbound path (/api/product)
//!     → endpoints.rs (collection lookup, trailing-slash rule)
//!     → Endpoint { path: /api/product/, collection: product }
//!     → URL + per-collection timeout for the dispatcher
//! ```

pub mod endpoints;

pub use endpoints::{Endpoint, EndpointRules};
