//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (coordinator.rs):
//!     Build collaborators → Persist auth token → Bind listener → Serving
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → shutdown.rs token (fires once)
//!
//! Shutdown (coordinator.rs):
//!     Token fired → Stop accepting → Drain within grace → Stopped
//!
//! State (state.rs):
//!     Initialized → Serving → ShuttingDown → Stopped | Aborted
//! ```
//!
//! # Design Decisions
//! - Ordered startup: credentials first, listener last (traffic only when ready)
//! - Ordered shutdown: stop accept, drain, close
//! - Shutdown has timeout: connections past the deadline are abandoned

pub mod coordinator;
pub mod shutdown;
pub mod signals;
pub mod state;

pub use coordinator::{Coordinator, ServerError};
pub use shutdown::{Shutdown, ShutdownListener};
pub use state::{LifecycleState, StateCell};
