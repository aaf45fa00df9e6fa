//! Rendezvous server library.
//!
//! Lets two clients find each other through short-lived pairing codes and
//! shared mailboxes. The crate's core is the lifecycle: persist the auth
//! token, serve, react to termination signals, and drain within a bound.

pub mod config;
pub mod credentials;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod registry;

pub use config::schema::ServerConfig;
pub use lifecycle::{Coordinator, LifecycleState, ServerError, Shutdown};
