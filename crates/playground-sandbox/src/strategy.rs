//! Execution strategies: one per way a language can be run.
//!
//! The dispatcher picks a strategy from [`Language::strategy_kind`] and never
//! branches on the language again.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use playground_core::config::ExecutionLimits;
use playground_core::protocol::{ExecutionRequest, StrategyKind};

use crate::capture::{with_captured_output, with_captured_output_async, CapturedOutput, Console};
use crate::error::ExecError;
use crate::format::format_value;
use crate::loader::RuntimeLoader;
use crate::native::JsEngine;
use crate::python::{self, PythonHost, RunHandlers};

/// What a successful run produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOutput {
    pub captured: CapturedOutput,
    /// Formatted return value; `None` when there is nothing to show.
    pub value: Option<String>,
}

#[async_trait]
pub trait ExecutionStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    /// Run `request` with `console` captured for the duration of evaluation.
    async fn run(&self, request: &ExecutionRequest, console: &Console) -> Result<RunOutput, ExecError>;
}

/// Same-thread evaluation in the embedded JavaScript engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeStrategy {
    engine: JsEngine,
}

impl NativeStrategy {
    pub fn new(limits: ExecutionLimits) -> Self {
        Self {
            engine: JsEngine::new(limits),
        }
    }
}

#[async_trait]
impl ExecutionStrategy for NativeStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::NativeSameProcess
    }

    async fn run(&self, request: &ExecutionRequest, console: &Console) -> Result<RunOutput, ExecError> {
        let console = console.fork();
        let (result, captured) = with_captured_output(&console, || self.engine.evaluate(&request.source, &console));
        Ok(RunOutput {
            captured,
            value: result?,
        })
    }
}

/// Evaluation in an external runtime brought up by a [`RuntimeLoader`].
pub struct DelegatedStrategy {
    loader: Arc<RuntimeLoader<PythonHost>>,
    timeout: Duration,
}

impl DelegatedStrategy {
    pub fn new(loader: Arc<RuntimeLoader<PythonHost>>, limits: ExecutionLimits) -> Self {
        Self {
            loader,
            timeout: limits.timeout(),
        }
    }

    /// Uses the process-wide Python loader.
    pub fn shared(limits: ExecutionLimits) -> Self {
        Self::new(python::shared_loader(), limits)
    }

    pub fn loader(&self) -> &Arc<RuntimeLoader<PythonHost>> {
        &self.loader
    }
}

#[async_trait]
impl ExecutionStrategy for DelegatedStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::DelegatedExternalRuntime
    }

    async fn run(&self, request: &ExecutionRequest, console: &Console) -> Result<RunOutput, ExecError> {
        let runtime = self.loader.acquire().await?;

        // Each run prints into its own console, so concurrent runs never
        // share a capture or rebind each other's handlers.
        let run_console = console.fork();
        let (out, err) = (run_console.clone(), run_console.clone());
        let handlers = RunHandlers {
            stdout: Arc::new(move |line: &str| out.log(line)),
            stderr: Arc::new(move |line: &str| err.error(line)),
        };

        let (result, captured) = with_captured_output_async(
            &run_console,
            runtime.run_scoped(&request.source, self.timeout, &handlers),
        )
        .await;
        let value = result?;
        Ok(RunOutput {
            captured,
            value: format_value(&value),
        })
    }
}

/// Languages with no live runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedStrategy;

#[async_trait]
impl ExecutionStrategy for UnsupportedStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Unsupported
    }

    async fn run(&self, request: &ExecutionRequest, _console: &Console) -> Result<RunOutput, ExecError> {
        Err(ExecError::Unsupported(request.language.label().to_string()))
    }
}
