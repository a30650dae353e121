//! Structured configs grouped by concern, loaded from the environment.

use super::env_keys::{limits, observability as obv_keys, runtime};
use super::loader::{env_bool, env_optional, env_or};
use std::path::PathBuf;

/// Default execution timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default memory limit for the embedded runtime in MB
pub const DEFAULT_MAX_MEMORY_MB: u64 = 256;

/// Logging configuration: quiet, log_level, log_json, audit_log
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    pub quiet: bool,
    pub log_level: String,
    pub log_json: bool,
    pub audit_log: Option<String>,
}

impl ObservabilityConfig {
    pub fn from_env() -> &'static Self {
        use std::sync::OnceLock;
        static CACHE: OnceLock<ObservabilityConfig> = OnceLock::new();
        CACHE.get_or_init(|| {
            super::loader::load_dotenv();
            Self {
                quiet: env_bool(obv_keys::PLAYGROUND_QUIET, obv_keys::QUIET_ALIASES, false),
                log_level: env_or(
                    obv_keys::PLAYGROUND_LOG_LEVEL,
                    obv_keys::LOG_LEVEL_ALIASES,
                    || "playground=info".to_string(),
                ),
                log_json: env_bool(
                    obv_keys::PLAYGROUND_LOG_JSON,
                    obv_keys::LOG_JSON_ALIASES,
                    false,
                ),
                audit_log: env_optional(obv_keys::PLAYGROUND_AUDIT_LOG, &[]),
            }
        })
    }
}

/// What the runtime loader does after a failed load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// The failure is reported once; the next acquire starts a fresh attempt.
    #[default]
    RetryOnNextCall,
    /// The failure is kept and returned to every later caller.
    CacheFailure,
}

/// Delegated runtime bootstrap configuration
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Explicit interpreter; `None` means search `PATH`.
    pub python: Option<PathBuf>,
    /// Directory the driver script is injected into.
    pub runtime_dir: PathBuf,
    pub failure_policy: FailurePolicy,
}

impl RuntimeConfig {
    pub fn from_env() -> Self {
        super::loader::load_dotenv();
        let python = env_optional(runtime::PLAYGROUND_PYTHON, runtime::PYTHON_ALIASES)
            .map(PathBuf::from);
        let runtime_dir = env_optional(runtime::PLAYGROUND_RUNTIME_DIR, &[])
            .map(PathBuf::from)
            .unwrap_or_else(default_runtime_dir);
        let failure_policy = if env_bool(runtime::PLAYGROUND_RETRY_RUNTIME_LOAD, &[], true) {
            FailurePolicy::RetryOnNextCall
        } else {
            FailurePolicy::CacheFailure
        };
        Self {
            python,
            runtime_dir,
            failure_policy,
        }
    }
}

fn default_runtime_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from(".").join(".cache"))
        .join("playground")
        .join("runtime")
}

/// Resource limits for one execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionLimits {
    /// Wall-clock budget for one run, in seconds (default: 30)
    pub timeout_secs: u64,
    /// Heap limit for the embedded runtime, in MB (default: 256)
    pub max_memory_mb: u64,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_memory_mb: DEFAULT_MAX_MEMORY_MB,
        }
    }
}

impl ExecutionLimits {
    pub fn max_memory_bytes(&self) -> u64 {
        self.max_memory_mb.saturating_mul(1024 * 1024)
    }

    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_secs)
    }

    /// Load limits from the environment; unparsable values use the defaults.
    pub fn from_env() -> Self {
        super::loader::load_dotenv();
        let timeout_secs = env_optional(limits::PLAYGROUND_TIMEOUT_SECS, &[])
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        let max_memory_mb = env_optional(limits::PLAYGROUND_MAX_MEMORY_MB, &[])
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_MAX_MEMORY_MB);
        Self {
            timeout_secs,
            max_memory_mb,
        }
    }

    /// Override with CLI parameters
    pub fn with_cli_overrides(mut self, cli_timeout: Option<u64>, cli_max_memory: Option<u64>) -> Self {
        if let Some(timeout) = cli_timeout {
            self.timeout_secs = timeout;
        }
        if let Some(max_memory) = cli_max_memory {
            self.max_memory_mb = max_memory;
        }
        self
    }
}
