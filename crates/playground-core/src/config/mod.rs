//! Playground configuration layer.
//!
//! All environment reads go through this module; the rest of the workspace
//! works with structured configs instead of calling `std::env::var` directly.
//!
//! - `loader`: env_or, env_optional, env_bool helpers and `.env` loading
//! - `schema`: ObservabilityConfig, RuntimeConfig, ExecutionLimits
//! - `env_keys`: key constants and their aliases

pub mod env_keys;
pub mod loader;
pub mod schema;

pub use loader::{env_bool, env_optional, env_or, load_dotenv};
pub use schema::{
    ExecutionLimits, FailurePolicy, ObservabilityConfig, RuntimeConfig, DEFAULT_MAX_MEMORY_MB,
    DEFAULT_TIMEOUT_SECS,
};
