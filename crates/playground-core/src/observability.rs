//! Observability: tracing init and the execution audit log.
//!
//! Uses config::ObservabilityConfig for PLAYGROUND_QUIET, LOG_LEVEL, LOG_JSON and AUDIT_LOG.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use serde_json::json;
use tracing_subscriber::{prelude::*, EnvFilter};

static AUDIT_PATH: Mutex<Option<String>> = Mutex::new(None);

/// Initialize tracing. Call at process startup.
/// When PLAYGROUND_QUIET=1, only WARN and above are logged.
pub fn init_tracing() {
    let cfg = crate::config::ObservabilityConfig::from_env();
    let level: String = if cfg.quiet {
        "playground=warn".to_string()
    } else {
        cfg.log_level.clone()
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));

    let _ = if cfg.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()
    };
}

fn get_audit_path() -> Option<String> {
    {
        let guard = AUDIT_PATH.lock().ok()?;
        if let Some(ref p) = *guard {
            return Some(p.clone());
        }
    }
    let path = crate::config::ObservabilityConfig::from_env().audit_log.clone()?;
    if let Some(parent) = Path::new(&path).parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    {
        let mut guard = AUDIT_PATH.lock().ok()?;
        *guard = Some(path.clone());
    }
    Some(path)
}

fn append_jsonl(path: &str, record: &serde_json::Value) {
    if let Ok(mut f) = OpenOptions::new().create(true).append(true).open(path) {
        if let Ok(line) = serde_json::to_string(record) {
            let _ = writeln!(f, "{}", line);
        }
    }
}

/// One finished execution, as recorded in the audit log.
#[derive(Debug, Clone)]
pub struct ExecutionAudit<'a> {
    pub run_id: &'a str,
    pub language: &'a str,
    pub strategy: &'a str,
    pub kind: &'a str,
    pub duration_ms: u64,
    pub output_len: usize,
}

fn audit_record(entry: &ExecutionAudit<'_>) -> serde_json::Value {
    json!({
        "ts": Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        "event": "execution_completed",
        "run_id": entry.run_id,
        "language": entry.language,
        "strategy": entry.strategy,
        "kind": entry.kind,
        "duration_ms": entry.duration_ms,
        "output_len": entry.output_len,
    })
}

/// Audit: execution_completed. No-op unless PLAYGROUND_AUDIT_LOG is set.
pub fn audit_execution_completed(entry: &ExecutionAudit<'_>) {
    if let Some(path) = get_audit_path() {
        append_jsonl(&path, &audit_record(entry));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audit_record_shape() {
        let record = audit_record(&ExecutionAudit {
            run_id: "r-1",
            language: "python",
            strategy: "delegated",
            kind: "success",
            duration_ms: 12,
            output_len: 3,
        });
        assert_eq!(record["event"], "execution_completed");
        assert_eq!(record["language"], "python");
        assert_eq!(record["duration_ms"], 12);
        assert!(record["ts"].as_str().unwrap().ends_with('Z'));
    }

    #[test]
    fn test_append_jsonl_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let path = path.to_str().unwrap();
        append_jsonl(path, &json!({"n": 1}));
        append_jsonl(path, &json!({"n": 2}));
        let content = std::fs::read_to_string(path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines, vec![r#"{"n":1}"#, r#"{"n":2}"#]);
    }
}
