use std::time::Duration;

use thiserror::Error;

/// Everything that can stop a run from producing output.
///
/// `Clone` because a pending runtime load hands the same error to every
/// caller waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecError {
    /// The host cannot supply the runtime's bootstrap entry point or interpreter.
    #[error("{0}")]
    RuntimeUnavailable(String),

    /// Injecting or initializing the runtime failed.
    #[error("{0}")]
    RuntimeLoadFailed(String),

    /// The user's code threw, raised or rejected.
    #[error("{0}")]
    Evaluation(String),

    #[error("Execution timed out after {}", describe_timeout(.0))]
    Timeout(Duration),

    /// The language has no execution strategy.
    #[error("{0} execution is not supported")]
    Unsupported(String),
}

impl ExecError {
    /// Load-time failures, as opposed to failures of the user's code.
    pub fn is_load_failure(&self) -> bool {
        matches!(
            self,
            ExecError::RuntimeUnavailable(_) | ExecError::RuntimeLoadFailed(_)
        )
    }
}

/// Whole seconds as `5s`, anything finer as milliseconds.
fn describe_timeout(timeout: &Duration) -> String {
    if timeout.subsec_nanos() == 0 {
        format!("{}s", timeout.as_secs())
    } else {
        format!("{}ms", timeout.as_millis())
    }
}
