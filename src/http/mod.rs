//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! Accepted connection (net::listener)
//!     → hyper HTTP/1 connection
//!     → routes.rs (request ID, trace, timeout layers)
//!     → handler (ping, version, status page, embedder routes)
//!     → templates.rs (status page rendering)
//! ```

pub mod routes;
pub mod templates;

pub use routes::{apply_layers, build_routes, AppState};
pub use templates::TemplateSet;
