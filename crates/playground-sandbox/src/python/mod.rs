//! Delegated Python runtime.
//!
//! The bootstrap entry point is a small driver script injected into the
//! runtime directory. Initializing the runtime spawns the host interpreter on
//! that driver and waits for its handshake. Requests and replies are single
//! JSON lines on the child's stdin / stdout:
//!
//! ```text
//! → {"id": 1, "source": "print('a')\n1 + 2"}
//! ← {"id": 1, "ok": true, "value": {"kind": "json", "text": "3"}, "stdout": "a\n", "stderr": ""}
//! ```
//!
//! Every request runs in a fresh module namespace.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use playground_core::config::{ExecutionLimits, RuntimeConfig};
use playground_core::protocol::Language;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

use crate::error::ExecError;
use crate::format::ForeignValue;
use crate::loader::{RuntimeHost, RuntimeLoader};
use crate::runtime_resolver::{ResolvedRuntime, RuntimeResolver, SystemResolver};

/// Driver script shipped inside the binary.
pub const DRIVER_SOURCE: &str = include_str!("driver.py");

/// Bumped whenever the driver changes so stale copies are never reused.
pub const DRIVER_VERSION: u32 = 2;

/// Upper bound on interpreter start-up (spawn until handshake).
const STARTUP_TIMEOUT: Duration = Duration::from_secs(20);

/// Receives one line of runtime output.
pub type LineHandler = Arc<dyn Fn(&str) + Send + Sync>;

/// Output destinations for a single request.
#[derive(Clone)]
pub struct RunHandlers {
    pub stdout: LineHandler,
    pub stderr: LineHandler,
}

#[derive(Serialize)]
struct WireRequest<'a> {
    id: u64,
    source: &'a str,
}

#[derive(Deserialize)]
struct WireReply {
    id: u64,
    ok: bool,
    #[serde(default)]
    value: Option<ForeignValue>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    stdout: String,
    #[serde(default)]
    stderr: String,
}

#[derive(Deserialize)]
struct Handshake {
    ready: bool,
    #[serde(default)]
    version: String,
}

fn load_failed(detail: impl std::fmt::Display) -> ExecError {
    ExecError::RuntimeLoadFailed(format!("Failed to load Python runtime: {}", detail))
}

// ─── Host ────────────────────────────────────────────────────────────────────

pub struct PythonHost {
    resolver: Arc<dyn RuntimeResolver>,
    runtime_dir: PathBuf,
    default_timeout: Duration,
}

impl PythonHost {
    pub fn new(config: &RuntimeConfig, limits: ExecutionLimits) -> Self {
        Self::with_resolver(
            Arc::new(SystemResolver {
                python: config.python.clone(),
            }),
            config.runtime_dir.clone(),
            limits,
        )
    }

    pub fn with_resolver(
        resolver: Arc<dyn RuntimeResolver>,
        runtime_dir: PathBuf,
        limits: ExecutionLimits,
    ) -> Self {
        Self {
            resolver,
            runtime_dir,
            default_timeout: limits.timeout(),
        }
    }

    pub fn driver_path(&self) -> PathBuf {
        self.runtime_dir.join(format!("driver-v{}.py", DRIVER_VERSION))
    }
}

/// Write the driver atomically. Losing the race to another writer is fine:
/// the existing file is attached to instead.
fn inject_driver(dir: &Path, target: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)?;
    let mut staged = tempfile::NamedTempFile::new_in(dir)?;
    staged.write_all(DRIVER_SOURCE.as_bytes())?;
    staged.flush()?;
    match staged.persist_noclobber(target) {
        Ok(_) => Ok(()),
        Err(err) if err.error.kind() == std::io::ErrorKind::AlreadyExists => {
            tracing::debug!(path = %target.display(), "driver already injected, attaching");
            Ok(())
        }
        Err(err) => Err(err.error),
    }
}

#[async_trait]
impl RuntimeHost for PythonHost {
    type Runtime = PythonRuntime;
    type Entry = PathBuf;

    fn name(&self) -> &str {
        "Python"
    }

    fn entry_point(&self) -> Option<PathBuf> {
        let path = self.driver_path();
        path.is_file().then_some(path)
    }

    async fn inject_loader(&self) -> Result<(), ExecError> {
        let target = self.driver_path();
        inject_driver(&self.runtime_dir, &target).map_err(load_failed)?;
        crate::info_log!(path = %target.display(), "Python driver injected");
        Ok(())
    }

    async fn initialize(&self, entry: PathBuf) -> Result<PythonRuntime, ExecError> {
        let resolved = self.resolver.resolve(Language::Python).ok_or_else(|| {
            ExecError::RuntimeUnavailable(
                "Python runtime is unavailable on this host (no python3 interpreter found).".to_string(),
            )
        })?;
        PythonRuntime::spawn(&resolved, &entry, self.default_timeout).await
    }

    fn is_healthy(&self, runtime: &PythonRuntime) -> bool {
        runtime.is_alive()
    }
}

/// Process-wide loader for the Python runtime, configured from the environment.
pub fn shared_loader() -> Arc<RuntimeLoader<PythonHost>> {
    static LOADER: OnceLock<Arc<RuntimeLoader<PythonHost>>> = OnceLock::new();
    LOADER
        .get_or_init(|| {
            let config = RuntimeConfig::from_env();
            let host = PythonHost::new(&config, ExecutionLimits::from_env());
            Arc::new(RuntimeLoader::new(host, config.failure_policy))
        })
        .clone()
}

// ─── Runtime handle ──────────────────────────────────────────────────────────

struct DriverChannel {
    child: Child,
    stdin: ChildStdin,
    replies: Lines<BufReader<ChildStdout>>,
}

/// An initialized Python interpreter running the driver.
pub struct PythonRuntime {
    version: String,
    interpreter: PathBuf,
    default_timeout: Duration,
    channel: tokio::sync::Mutex<DriverChannel>,
    stdout: Mutex<Option<LineHandler>>,
    stderr: Mutex<Option<LineHandler>>,
    alive: AtomicBool,
    next_id: AtomicU64,
}

impl std::fmt::Debug for PythonRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PythonRuntime")
            .field("version", &self.version)
            .field("interpreter", &self.interpreter)
            .field("alive", &self.is_alive())
            .finish()
    }
}

impl PythonRuntime {
    async fn spawn(resolved: &ResolvedRuntime, driver: &Path, default_timeout: Duration) -> Result<Self, ExecError> {
        let mut child = Command::new(&resolved.interpreter)
            .arg("-u")
            .arg(driver)
            .envs(resolved.extra_env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(load_failed)?;

        let stdin = child.stdin.take().ok_or_else(|| load_failed("stdin not captured"))?;
        let stdout = child.stdout.take().ok_or_else(|| load_failed("stdout not captured"))?;
        if let Some(diagnostics) = child.stderr.take() {
            // Driver crashes only; user stderr is captured inside the driver.
            tokio::spawn(async move {
                let mut lines = BufReader::new(diagnostics).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    tracing::debug!(target: "playground::python", "{}", line);
                }
            });
        }

        let mut replies = BufReader::new(stdout).lines();
        let first = tokio::time::timeout(STARTUP_TIMEOUT, replies.next_line())
            .await
            .map_err(|_| load_failed("interpreter did not become ready in time"))?
            .map_err(load_failed)?
            .ok_or_else(|| load_failed("interpreter exited during start-up"))?;
        let handshake: Handshake = serde_json::from_str(&first).map_err(load_failed)?;
        if !handshake.ready {
            return Err(load_failed("driver reported not ready"));
        }

        crate::info_log!(
            interpreter = %resolved.interpreter.display(),
            version = %handshake.version,
            "Python runtime started"
        );

        Ok(Self {
            version: handshake.version,
            interpreter: resolved.interpreter.clone(),
            default_timeout,
            channel: tokio::sync::Mutex::new(DriverChannel {
                child,
                stdin,
                replies,
            }),
            stdout: Mutex::new(None),
            stderr: Mutex::new(None),
            alive: AtomicBool::new(true),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn interpreter(&self) -> &Path {
        &self.interpreter
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Redirect standard output to `handler`, one call per non-blank line.
    pub fn set_stdout(&self, handler: LineHandler) {
        *self.stdout.lock().unwrap_or_else(PoisonError::into_inner) = Some(handler);
    }

    /// Redirect standard error to `handler`, one call per non-blank line.
    pub fn set_stderr(&self, handler: LineHandler) {
        *self.stderr.lock().unwrap_or_else(PoisonError::into_inner) = Some(handler);
    }

    /// Evaluate `source`; resolves to the value of its final expression
    /// statement, or `None`. Output goes to the handlers installed with
    /// [`set_stdout`](Self::set_stdout) / [`set_stderr`](Self::set_stderr).
    pub async fn run_async(&self, source: &str) -> Result<ForeignValue, ExecError> {
        self.run_async_with_timeout(source, self.default_timeout).await
    }

    pub async fn run_async_with_timeout(&self, source: &str, timeout: Duration) -> Result<ForeignValue, ExecError> {
        let reply = self.exchange(source, timeout).await?;
        emit(&current_handler(&self.stdout), &reply.stdout);
        emit(&current_handler(&self.stderr), &reply.stderr);
        reply.into_value()
    }

    /// Like [`run_async_with_timeout`](Self::run_async_with_timeout), but this
    /// request's output goes only to `handlers`. Concurrent callers sharing
    /// the runtime never see each other's lines.
    pub async fn run_scoped(
        &self,
        source: &str,
        timeout: Duration,
        handlers: &RunHandlers,
    ) -> Result<ForeignValue, ExecError> {
        let reply = self.exchange(source, timeout).await?;
        emit(&Some(handlers.stdout.clone()), &reply.stdout);
        emit(&Some(handlers.stderr.clone()), &reply.stderr);
        reply.into_value()
    }

    /// One request / reply round trip on the driver channel.
    async fn exchange(&self, source: &str, timeout: Duration) -> Result<WireReply, ExecError> {
        let mut channel = self.channel.lock().await;
        if !self.is_alive() {
            return Err(ExecError::RuntimeLoadFailed(
                "Python runtime is no longer running.".to_string(),
            ));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let mut request = serde_json::to_string(&WireRequest { id, source })
            .map_err(|e| ExecError::Evaluation(e.to_string()))?;
        request.push('\n');

        let exchange = async {
            channel.stdin.write_all(request.as_bytes()).await?;
            channel.stdin.flush().await?;
            channel.replies.next_line().await
        };
        let outcome = tokio::time::timeout(timeout, exchange).await;

        let line = match outcome {
            Ok(Ok(Some(line))) => line,
            Ok(Ok(None)) => {
                self.alive.store(false, Ordering::SeqCst);
                return Err(ExecError::RuntimeLoadFailed(
                    "Python runtime exited unexpectedly.".to_string(),
                ));
            }
            Ok(Err(err)) => {
                self.alive.store(false, Ordering::SeqCst);
                return Err(ExecError::RuntimeLoadFailed(format!(
                    "Python runtime stopped responding: {}",
                    err
                )));
            }
            Err(_) => {
                self.alive.store(false, Ordering::SeqCst);
                if let Err(err) = channel.child.kill().await {
                    tracing::warn!(error = %err, "failed to kill timed-out Python runtime");
                }
                return Err(ExecError::Timeout(timeout));
            }
        };
        drop(channel);

        let reply: WireReply = serde_json::from_str(&line).map_err(|e| {
            self.alive.store(false, Ordering::SeqCst);
            ExecError::RuntimeLoadFailed(format!("Malformed reply from Python runtime: {}", e))
        })?;
        if reply.id != id {
            self.alive.store(false, Ordering::SeqCst);
            return Err(ExecError::RuntimeLoadFailed(format!(
                "Python runtime replied to request {} while {} was pending",
                reply.id, id
            )));
        }
        Ok(reply)
    }
}

impl WireReply {
    fn into_value(self) -> Result<ForeignValue, ExecError> {
        if self.ok {
            Ok(self.value.unwrap_or(ForeignValue::None))
        } else {
            Err(ExecError::Evaluation(
                self.error.unwrap_or_else(|| "Python raised an exception".to_string()),
            ))
        }
    }
}

fn current_handler(slot: &Mutex<Option<LineHandler>>) -> Option<LineHandler> {
    slot.lock().unwrap_or_else(PoisonError::into_inner).clone()
}

fn emit(handler: &Option<LineHandler>, text: &str) {
    for line in text.lines().filter(|line| !line.trim().is_empty()) {
        match handler {
            Some(handler) => handler(line),
            None => tracing::info!(target: "playground::python", "{}", line),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host_in(dir: &Path) -> PythonHost {
        PythonHost::with_resolver(
            Arc::new(SystemResolver::default()),
            dir.to_path_buf(),
            ExecutionLimits::default(),
        )
    }

    fn python_available() -> bool {
        SystemResolver::default().resolve(Language::Python).is_some()
    }

    #[test]
    fn test_injection_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let host = host_in(dir.path());
        assert!(host.entry_point().is_none());

        inject_driver(dir.path(), &host.driver_path()).unwrap();
        inject_driver(dir.path(), &host.driver_path()).unwrap();

        let entry = host.entry_point().unwrap();
        assert_eq!(std::fs::read_to_string(entry).unwrap(), DRIVER_SOURCE);
        let files = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(files, 1, "staging files must not be left behind");
    }

    #[test]
    fn test_emit_skips_blank_lines() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let handler: LineHandler = Arc::new(move |line: &str| {
            sink.lock().unwrap().push(line.to_string());
        });
        emit(&Some(handler), "a\n\n   \nb\n");
        assert_eq!(*seen.lock().unwrap(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_missing_interpreter_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let host = PythonHost::with_resolver(
            Arc::new(SystemResolver {
                python: Some(PathBuf::from("/nonexistent/python-playground")),
            }),
            dir.path().to_path_buf(),
            ExecutionLimits::default(),
        );
        let loader = RuntimeLoader::new(host, Default::default());
        let err = loader.acquire().await.err().unwrap();
        assert!(matches!(err, ExecError::RuntimeUnavailable(_)));
    }

    #[tokio::test]
    async fn test_runs_source_and_streams_output() {
        if !python_available() {
            eprintln!("python3 not installed, skipping");
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let loader = RuntimeLoader::new(host_in(dir.path()), Default::default());
        let runtime = loader.acquire().await.unwrap();

        let out = Arc::new(Mutex::new(Vec::new()));
        let err = Arc::new(Mutex::new(Vec::new()));
        let (o, e) = (out.clone(), err.clone());
        runtime.set_stdout(Arc::new(move |line: &str| o.lock().unwrap().push(line.to_string())));
        runtime.set_stderr(Arc::new(move |line: &str| e.lock().unwrap().push(line.to_string())));

        let value = runtime
            .run_async("import sys\nprint('a')\nprint('oops', file=sys.stderr)\nx = 40\nx + 2")
            .await
            .unwrap();
        assert_eq!(value, ForeignValue::Json { text: "42".into() });
        assert_eq!(*out.lock().unwrap(), vec!["a"]);
        assert_eq!(*err.lock().unwrap(), vec!["oops"]);

        // Fresh namespace per run.
        let leaked = runtime.run_async("x").await.err().unwrap();
        assert!(leaked.to_string().contains("NameError"));
    }

    fn collecting_handler() -> (Arc<Mutex<Vec<String>>>, LineHandler) {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let sink = lines.clone();
        let handler: LineHandler = Arc::new(move |line: &str| sink.lock().unwrap().push(line.to_string()));
        (lines, handler)
    }

    #[tokio::test]
    async fn test_scoped_handlers_keep_concurrent_requests_apart() {
        if !python_available() {
            eprintln!("python3 not installed, skipping");
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let loader = RuntimeLoader::new(host_in(dir.path()), Default::default());
        let runtime = loader.acquire().await.unwrap();

        let (a_lines, a_out) = collecting_handler();
        let (b_lines, b_out) = collecting_handler();
        let (err_lines, err) = collecting_handler();
        let a = RunHandlers {
            stdout: a_out,
            stderr: err.clone(),
        };
        let b = RunHandlers { stdout: b_out, stderr: err };

        let timeout = Duration::from_secs(10);
        let (first, second) = tokio::join!(
            runtime.run_scoped("import time\nprint('from A')\ntime.sleep(0.2)", timeout, &a),
            runtime.run_scoped("print('from B')", timeout, &b),
        );
        first.unwrap();
        second.unwrap();

        assert_eq!(*a_lines.lock().unwrap(), vec!["from A"]);
        assert_eq!(*b_lines.lock().unwrap(), vec!["from B"]);
        assert!(err_lines.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_top_level_await() {
        if !python_available() {
            eprintln!("python3 not installed, skipping");
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let loader = RuntimeLoader::new(host_in(dir.path()), Default::default());
        let runtime = loader.acquire().await.unwrap();

        let value = runtime
            .run_async("import asyncio\nawait asyncio.sleep(0)\n'done'")
            .await
            .unwrap();
        assert_eq!(value, ForeignValue::Text { text: "done".into() });

        let value = runtime
            .run_async("import asyncio\nasync def twice(n):\n    await asyncio.sleep(0)\n    return n * 2\nawait twice(21)")
            .await
            .unwrap();
        assert_eq!(value, ForeignValue::Json { text: "42".into() });
    }

    #[tokio::test]
    async fn test_big_integers_keep_every_digit() {
        if !python_available() {
            eprintln!("python3 not installed, skipping");
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let loader = RuntimeLoader::new(host_in(dir.path()), Default::default());
        let runtime = loader.acquire().await.unwrap();

        let value = runtime.run_async("2**100").await.unwrap();
        assert_eq!(
            crate::format::format_value(&value).as_deref(),
            Some("1267650600228229401496703205376")
        );
        let value = runtime.run_async("[2**64, -2**70]").await.unwrap();
        assert_eq!(
            crate::format::format_value(&value).as_deref(),
            Some("[\n  18446744073709551616,\n  -1180591620717411303424\n]")
        );
    }

    #[tokio::test]
    async fn test_timeout_kills_runtime() {
        if !python_available() {
            eprintln!("python3 not installed, skipping");
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let loader = RuntimeLoader::new(host_in(dir.path()), Default::default());
        let runtime = loader.acquire().await.unwrap();
        let err = runtime
            .run_async_with_timeout("while True:\n    pass", Duration::from_millis(300))
            .await
            .err()
            .unwrap();
        assert_eq!(err, ExecError::Timeout(Duration::from_millis(300)));
        assert_eq!(err.to_string(), "Execution timed out after 300ms");
        assert!(!runtime.is_alive());

        let replacement = loader.acquire().await.unwrap();
        assert!(!Arc::ptr_eq(&runtime, &replacement));
        assert!(replacement.is_alive());
    }
}
