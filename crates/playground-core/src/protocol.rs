//! Execution protocol types shared by the sandbox, the executor and the CLI.
//!
//! A run is one [`ExecutionRequest`] in and one [`ExecutionResult`] out. The
//! result carries only display text; callers never see runtime internals.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// ─── Language tags ───────────────────────────────────────────────────────────

/// Closed set of languages the playground knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    JavaScript,
    Java,
}

/// How a language is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Evaluated in-process on the calling thread.
    NativeSameProcess,
    /// Delegated to an external interpreter brought up on demand.
    DelegatedExternalRuntime,
    /// No execution strategy exists.
    Unsupported,
}

impl Language {
    pub const ALL: [Language; 3] = [Language::Python, Language::JavaScript, Language::Java];

    /// Stable tag used on the command line and in logs.
    pub fn tag(&self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::JavaScript => "javascript",
            Language::Java => "java",
        }
    }

    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Language::Python => "Python",
            Language::JavaScript => "JavaScript",
            Language::Java => "Java",
        }
    }

    pub fn strategy_kind(&self) -> StrategyKind {
        match self {
            Language::JavaScript => StrategyKind::NativeSameProcess,
            Language::Python => StrategyKind::DelegatedExternalRuntime,
            Language::Java => StrategyKind::Unsupported,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[derive(Debug, Clone, Error)]
#[error("Unknown language '{0}' (expected one of: python, javascript, java)")]
pub struct UnknownLanguage(pub String);

impl FromStr for Language {
    type Err = UnknownLanguage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "python" | "py" => Ok(Language::Python),
            "javascript" | "js" => Ok(Language::JavaScript),
            "java" => Ok(Language::Java),
            other => Err(UnknownLanguage(other.to_string())),
        }
    }
}

impl StrategyKind {
    pub fn name(&self) -> &'static str {
        match self {
            StrategyKind::NativeSameProcess => "native",
            StrategyKind::DelegatedExternalRuntime => "delegated",
            StrategyKind::Unsupported => "unsupported",
        }
    }
}

// ─── Request / result ────────────────────────────────────────────────────────

/// One run of user source text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRequest {
    pub language: Language,
    pub source: String,
}

impl ExecutionRequest {
    pub fn new(language: Language, source: impl Into<String>) -> Self {
        Self {
            language,
            source: source.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultKind {
    Success,
    Error,
    Unsupported,
}

impl ResultKind {
    pub fn name(&self) -> &'static str {
        match self {
            ResultKind::Success => "success",
            ResultKind::Error => "error",
            ResultKind::Unsupported => "unsupported",
        }
    }
}

/// Normalized outcome of a run, ready for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub kind: ResultKind,
    pub text: String,
}

impl ExecutionResult {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            kind: ResultKind::Success,
            text: text.into(),
        }
    }

    /// Error result; the message is placed under the fixed `Error:` label.
    pub fn error(message: impl fmt::Display) -> Self {
        Self {
            kind: ResultKind::Error,
            text: format!("{}\n{}", ERROR_LABEL, message),
        }
    }

    pub fn unsupported(language: Language) -> Self {
        Self {
            kind: ResultKind::Unsupported,
            text: unsupported_message(language),
        }
    }

    pub fn is_success(&self) -> bool {
        self.kind == ResultKind::Success
    }
}

pub const ERROR_LABEL: &str = "Error:";
pub const STDERR_LABEL: &str = "stderr:";
pub const RETURN_VALUE_LABEL: &str = "Return value:";
pub const EXECUTED_SUCCESSFULLY: &str = "Executed successfully.";

pub fn unsupported_message(language: Language) -> String {
    format!(
        "{} execution is not enabled in the playground yet. Use Python or JavaScript for live runs.",
        language.label()
    )
}
