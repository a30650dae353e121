pub mod capture;
pub mod error;
pub mod format;
pub mod loader;
pub mod log;
pub mod native;
pub mod python;
pub mod runtime_resolver;
pub mod strategy;

pub use capture::{with_captured_output, with_captured_output_async, CapturedOutput, Console, OutputSink, Stream};
pub use error::ExecError;
pub use format::{format_value, ForeignValue, Inspect};
pub use loader::{LoaderState, RuntimeHost, RuntimeLoader};
pub use strategy::{DelegatedStrategy, ExecutionStrategy, NativeStrategy, RunOutput, UnsupportedStrategy};
