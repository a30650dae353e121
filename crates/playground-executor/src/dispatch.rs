//! Execution dispatcher: language → strategy → normalized result.
//!
//! `execute` never fails. Every error, including a panicking strategy, is
//! turned into an `Error:` result at this boundary.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures_util::FutureExt;
use playground_core::config::ExecutionLimits;
use playground_core::observability::{audit_execution_completed, ExecutionAudit};
use playground_core::protocol::{
    ExecutionRequest, ExecutionResult, StrategyKind, EXECUTED_SUCCESSFULLY, RETURN_VALUE_LABEL, STDERR_LABEL,
};
use playground_sandbox::{
    CapturedOutput, Console, DelegatedStrategy, ExecError, ExecutionStrategy, NativeStrategy, UnsupportedStrategy,
};
use tracing::Instrument;

/// Anything that can turn a request into a displayable result.
#[async_trait]
pub trait Execute: Send + Sync {
    async fn execute(&self, request: ExecutionRequest) -> ExecutionResult;
}

pub struct Dispatcher {
    console: Console,
    native: Arc<dyn ExecutionStrategy>,
    delegated: Arc<dyn ExecutionStrategy>,
    unsupported: Arc<dyn ExecutionStrategy>,
}

impl Dispatcher {
    /// Embedded JavaScript plus the process-wide Python runtime.
    pub fn new(limits: ExecutionLimits) -> Self {
        Self::with_strategies(
            Console::default(),
            Arc::new(NativeStrategy::new(limits)),
            Arc::new(DelegatedStrategy::shared(limits)),
            Arc::new(UnsupportedStrategy),
        )
    }

    pub fn with_strategies(
        console: Console,
        native: Arc<dyn ExecutionStrategy>,
        delegated: Arc<dyn ExecutionStrategy>,
        unsupported: Arc<dyn ExecutionStrategy>,
    ) -> Self {
        Self {
            console,
            native,
            delegated,
            unsupported,
        }
    }

    pub fn console(&self) -> &Console {
        &self.console
    }

    fn strategy(&self, kind: StrategyKind) -> &dyn ExecutionStrategy {
        match kind {
            StrategyKind::NativeSameProcess => self.native.as_ref(),
            StrategyKind::DelegatedExternalRuntime => self.delegated.as_ref(),
            StrategyKind::Unsupported => self.unsupported.as_ref(),
        }
    }
}

#[async_trait]
impl Execute for Dispatcher {
    async fn execute(&self, request: ExecutionRequest) -> ExecutionResult {
        let strategy = self.strategy(request.language.strategy_kind());
        let run_id = uuid::Uuid::new_v4().to_string();
        let span = tracing::info_span!(
            "execution",
            run_id = %run_id,
            language = request.language.tag(),
            strategy = strategy.kind().name(),
        );

        let start = Instant::now();
        let outcome = AssertUnwindSafe(strategy.run(&request, &self.console))
            .catch_unwind()
            .instrument(span.clone())
            .await;
        let result = match outcome {
            Ok(Ok(output)) => ExecutionResult::success(assemble(&output.captured, output.value.as_deref())),
            Ok(Err(ExecError::Unsupported(_))) => ExecutionResult::unsupported(request.language),
            Ok(Err(err)) => ExecutionResult::error(err),
            Err(_) => {
                tracing::error!(parent: &span, "execution strategy panicked");
                ExecutionResult::error("Execution aborted unexpectedly.")
            }
        };
        let duration_ms = start.elapsed().as_millis() as u64;
        tracing::debug!(parent: &span, kind = result.kind.name(), duration_ms, "execution finished");

        audit_execution_completed(&ExecutionAudit {
            run_id: &run_id,
            language: request.language.tag(),
            strategy: strategy.kind().name(),
            kind: result.kind.name(),
            duration_ms,
            output_len: result.text.len(),
        });
        result
    }
}

/// Display text for a successful run: printed lines, then `stderr:` lines,
/// then `Return value:`, separated by blank lines.
pub fn assemble(captured: &CapturedOutput, value: Option<&str>) -> String {
    let mut blocks = Vec::with_capacity(3);
    if !captured.stdout.is_empty() {
        blocks.push(captured.stdout.join("\n"));
    }
    if !captured.stderr.is_empty() {
        blocks.push(format!("{}\n{}", STDERR_LABEL, captured.stderr.join("\n")));
    }
    if let Some(value) = value {
        blocks.push(format!("{}\n{}", RETURN_VALUE_LABEL, value));
    }
    if blocks.is_empty() {
        EXECUTED_SUCCESSFULLY.to_string()
    } else {
        blocks.join("\n\n")
    }
}
