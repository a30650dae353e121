//! Playground session: the editable buffer, the display text and the run
//! button, for one selected language.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use playground_core::protocol::{ExecutionRequest, ExecutionResult, Language};

use crate::dispatch::Execute;

pub const INITIAL_OUTPUT: &str = "Run code to see output.";
pub const RUNNING_OUTPUT: &str = "Running...";
pub const RESET_OUTPUT: &str = "Starter code restored.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The run settled and its text is now displayed.
    Completed(ExecutionResult),
    /// A run was already in flight; nothing was dispatched.
    Skipped,
    /// The selection changed while the run was in flight; its result was dropped.
    Stale,
}

#[derive(Debug)]
struct SessionState {
    language: Language,
    starter: String,
    source: String,
    output: String,
    running: bool,
    generation: u64,
}

pub struct PlaygroundSession {
    executor: Arc<dyn Execute>,
    state: Mutex<SessionState>,
}

/// Clears `running` if a run future is dropped before it settles.
struct RunningGuard<'a> {
    state: &'a Mutex<SessionState>,
    armed: bool,
}

impl RunningGuard<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.state.lock().unwrap_or_else(PoisonError::into_inner).running = false;
        }
    }
}

impl PlaygroundSession {
    pub fn new(executor: Arc<dyn Execute>, language: Language, starter: impl Into<String>) -> Self {
        let starter = starter.into();
        Self {
            executor,
            state: Mutex::new(SessionState {
                language,
                source: starter.clone(),
                starter,
                output: INITIAL_OUTPUT.to_string(),
                running: false,
                generation: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn language(&self) -> Language {
        self.lock().language
    }

    pub fn language_label(&self) -> &'static str {
        self.language().label()
    }

    pub fn source(&self) -> String {
        self.lock().source.clone()
    }

    pub fn set_source(&self, source: impl Into<String>) {
        self.lock().source = source.into();
    }

    pub fn starter(&self) -> String {
        self.lock().starter.clone()
    }

    pub fn output(&self) -> String {
        self.lock().output.clone()
    }

    pub fn is_running(&self) -> bool {
        self.lock().running
    }

    /// Dispatch the current source. Does nothing while a run is in flight.
    pub async fn run(&self) -> RunOutcome {
        let (request, generation) = {
            let mut state = self.lock();
            if state.running {
                tracing::debug!("run requested while another is in flight, ignoring");
                return RunOutcome::Skipped;
            }
            state.running = true;
            state.output = RUNNING_OUTPUT.to_string();
            (ExecutionRequest::new(state.language, state.source.clone()), state.generation)
        };
        let guard = RunningGuard {
            state: &self.state,
            armed: true,
        };

        let result = self.executor.execute(request).await;

        let outcome = {
            let mut state = self.lock();
            state.running = false;
            if state.generation == generation {
                state.output = result.text.clone();
                RunOutcome::Completed(result)
            } else {
                tracing::debug!(generation, current = state.generation, "dropping result of superseded run");
                RunOutcome::Stale
            }
        };
        guard.disarm();
        outcome
    }

    /// Restore the starter source. An in-flight run still updates the
    /// display when it settles.
    pub fn reset(&self) {
        let mut state = self.lock();
        state.source = state.starter.clone();
        state.output = RESET_OUTPUT.to_string();
    }

    /// Switch to a new language / starter pair from upstream.
    pub fn select(&self, language: Language, starter: impl Into<String>) {
        let mut state = self.lock();
        state.language = language;
        state.starter = starter.into();
        state.source = state.starter.clone();
        state.output = INITIAL_OUTPUT.to_string();
        state.generation += 1;
    }
}
