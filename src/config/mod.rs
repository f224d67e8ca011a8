//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! built-in defaults
//!     → config file (TOML, optional) via loader.rs
//!     → environment overrides (PORT, VEEZ_TOKEN, VEEZ_BASE_URL)
//!     → CLI flags (main.rs)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; no reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::ConfigError;
pub use schema::{
    LimitsConfig, ListenerConfig, LogFormat, ObservabilityConfig, ProxyConfig, RelayConfig,
    RoutingConfig, TimeoutConfig, UpstreamConfig, UpstreamEncoding,
};
pub use validation::ValidationError;
