//! Veez.ai forwarding proxy library.
//!
//! Accepts browser-originated calls under `/api/*`, normalizes CORS,
//! re-encodes the body for the upstream and relays the upstream response.

// Core subsystems
pub mod config;
pub mod error;
pub mod forward;
pub mod http;
pub mod routing;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::schema::ProxyConfig;
pub use error::ProxyError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
