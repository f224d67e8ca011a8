//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, layers)
//!     → middleware/cors.rs (preflight short-circuit, CORS headers)
//!     → request.rs (request ID, bounded body read)
//!     → [forward pipeline] for /api/*, status.rs otherwise
//!     → Send to client
//! ```

pub mod middleware;
pub mod request;
pub mod server;
pub mod status;

pub use request::X_REQUEST_ID;
pub use server::{AppState, HttpServer};
