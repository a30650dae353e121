//! RuntimeResolver trait: extension point for locating external interpreters.
//!
//! Delegated runtimes ask a resolver for their interpreter before they spawn
//! anything. Implement this trait to point a runtime at a different install.

use std::path::PathBuf;

use playground_core::protocol::Language;

/// Resolved interpreter for a given language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRuntime {
    /// Path to the interpreter executable (e.g. python3)
    pub interpreter: PathBuf,
    /// Extra environment variables for the interpreter process
    pub extra_env: Vec<(String, String)>,
}

/// Extension point for resolving interpreters by language.
pub trait RuntimeResolver: Send + Sync {
    /// Returns `None` if no interpreter is available for the language.
    fn resolve(&self, language: Language) -> Option<ResolvedRuntime>;
}

/// Resolves interpreters from an explicit override or the `PATH`.
#[derive(Debug, Clone, Default)]
pub struct SystemResolver {
    /// Used verbatim for Python when set.
    pub python: Option<PathBuf>,
}

/// Executable names tried in order when no override is configured.
const PYTHON_CANDIDATES: &[&str] = &["python3", "python"];

impl RuntimeResolver for SystemResolver {
    fn resolve(&self, language: Language) -> Option<ResolvedRuntime> {
        match language {
            Language::Python => {
                let interpreter = match &self.python {
                    Some(path) => which::which(path).ok()?,
                    None => PYTHON_CANDIDATES
                        .iter()
                        .find_map(|name| which::which(name).ok())?,
                };
                Some(ResolvedRuntime {
                    interpreter,
                    extra_env: vec![
                        ("PYTHONIOENCODING".to_string(), "utf-8".to_string()),
                        ("PYTHONDONTWRITEBYTECODE".to_string(), "1".to_string()),
                    ],
                })
            }
            Language::JavaScript | Language::Java => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_override_resolves_to_none() {
        let resolver = SystemResolver {
            python: Some(PathBuf::from("/nonexistent/bin/python-playground")),
        };
        assert_eq!(resolver.resolve(Language::Python), None);
    }

    #[test]
    fn test_non_delegated_languages_have_no_interpreter() {
        let resolver = SystemResolver::default();
        assert_eq!(resolver.resolve(Language::JavaScript), None);
        assert_eq!(resolver.resolve(Language::Java), None);
    }
}
