//! Environment variable keys and their aliases.
//!
//! The primary name is always `PLAYGROUND_*`.

/// Logging and audit
pub mod observability {
    pub const PLAYGROUND_QUIET: &str = "PLAYGROUND_QUIET";
    pub const QUIET_ALIASES: &[&str] = &[];

    pub const PLAYGROUND_LOG_LEVEL: &str = "PLAYGROUND_LOG_LEVEL";
    pub const LOG_LEVEL_ALIASES: &[&str] = &[];

    pub const PLAYGROUND_LOG_JSON: &str = "PLAYGROUND_LOG_JSON";
    pub const LOG_JSON_ALIASES: &[&str] = &[];

    pub const PLAYGROUND_AUDIT_LOG: &str = "PLAYGROUND_AUDIT_LOG";
}

/// External runtime bootstrap
pub mod runtime {
    /// Explicit interpreter path for the delegated Python runtime.
    pub const PLAYGROUND_PYTHON: &str = "PLAYGROUND_PYTHON";
    pub const PYTHON_ALIASES: &[&str] = &["PYTHON3"];

    /// Directory the runtime driver is injected into.
    pub const PLAYGROUND_RUNTIME_DIR: &str = "PLAYGROUND_RUNTIME_DIR";

    /// "1" (default): a failed runtime load is retried on the next run.
    /// "0": the failure is kept for the rest of the process lifetime.
    pub const PLAYGROUND_RETRY_RUNTIME_LOAD: &str = "PLAYGROUND_RETRY_RUNTIME_LOAD";
}

/// Per-run resource limits
pub mod limits {
    pub const PLAYGROUND_TIMEOUT_SECS: &str = "PLAYGROUND_TIMEOUT_SECS";
    pub const PLAYGROUND_MAX_MEMORY_MB: &str = "PLAYGROUND_MAX_MEMORY_MB";
}
