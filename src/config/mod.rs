//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → CLI overrides (main.rs)
//!     → validation.rs (semantic checks)
//!     → ServerConfig (validated, immutable)
//!     → owned by the lifecycle coordinator
//! ```
//!
//! # Design Decisions
//! - Config is immutable once constructed; there is no reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod version;

pub use loader::{load_config, ConfigError};
pub use schema::{
    CredentialsConfig, ListenerConfig, ObservabilityConfig, ServerConfig, ShutdownConfig,
};
pub use validation::{validate_config, ValidationError};
pub use version::Version;
