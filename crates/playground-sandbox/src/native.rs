//! Native JavaScript engine (embedded QuickJS).
//!
//! Every evaluation gets its own QuickJS runtime and context, so nothing a
//! program defines survives into the next run. The source is compiled as the
//! body of a strict-mode function and called with no arguments; its `return`
//! value is the run's value.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use playground_core::config::ExecutionLimits;
use rquickjs::prelude::Rest;
use rquickjs::{Context, Ctx, Function, Object, Runtime, Value};

use crate::capture::{Console, Stream};
use crate::error::ExecError;
use crate::format::{format_value, Inspect, Unserializable};

/// QuickJS stack budget; deep recursion becomes a RangeError instead of a crash.
const MAX_STACK_SIZE: usize = 512 * 1024;

/// `console` methods and the stream each one writes to.
const CONSOLE_METHODS: &[(&str, Stream)] = &[
    ("log", Stream::Stdout),
    ("info", Stream::Stdout),
    ("debug", Stream::Stdout),
    ("warn", Stream::Stderr),
    ("error", Stream::Stderr),
];

#[derive(Debug, Clone, Copy, Default)]
pub struct JsEngine {
    limits: ExecutionLimits,
}

impl JsEngine {
    pub fn new(limits: ExecutionLimits) -> Self {
        Self { limits }
    }

    /// Evaluate `source`, printing through `console`. Returns the formatted
    /// return value, `None` when there is nothing to show.
    pub fn evaluate(&self, source: &str, console: &Console) -> Result<Option<String>, ExecError> {
        let runtime = Runtime::new().map_err(engine_failure)?;
        runtime.set_memory_limit(usize::try_from(self.limits.max_memory_bytes()).unwrap_or(usize::MAX));
        runtime.set_max_stack_size(MAX_STACK_SIZE);

        let deadline = Instant::now() + self.limits.timeout();
        let timed_out = Arc::new(AtomicBool::new(false));
        let flag = timed_out.clone();
        runtime.set_interrupt_handler(Some(Box::new(move || {
            let expired = Instant::now() >= deadline;
            if expired {
                flag.store(true, Ordering::SeqCst);
            }
            expired
        })));

        let context = Context::full(&runtime).map_err(engine_failure)?;
        let outcome = context.with(|ctx| run_in_context(&ctx, source, console));
        if outcome.is_ok() {
            drain_jobs(&runtime);
        }

        if timed_out.load(Ordering::SeqCst) {
            return Err(ExecError::Timeout(self.limits.timeout()));
        }
        outcome.map_err(ExecError::Evaluation)
    }
}

fn engine_failure(err: rquickjs::Error) -> ExecError {
    ExecError::Evaluation(format!("JavaScript engine failed to start: {}", err))
}

/// Run promise callbacks queued by the program so their output is captured.
fn drain_jobs(runtime: &Runtime) {
    while runtime.is_job_pending() {
        match runtime.execute_pending_job() {
            Ok(true) => continue,
            Ok(false) => break,
            Err(_) => {
                tracing::debug!("pending job threw, remaining jobs skipped");
                break;
            }
        }
    }
}

fn run_in_context<'js>(ctx: &Ctx<'js>, source: &str, console: &Console) -> Result<Option<String>, String> {
    let run = || -> rquickjs::Result<Value<'js>> {
        install_console(ctx, console)?;
        let constructor: Function<'js> = ctx.globals().get("Function")?;
        let body = format!("\"use strict\";\n{}", source);
        let compiled: Function<'js> = constructor.call((body,))?;
        compiled.call(())
    };
    match run() {
        Ok(returned) => Ok(format_value(&JsValue::new(ctx.clone(), returned))),
        Err(err) => Err(describe_error(ctx, err)),
    }
}

fn install_console<'js>(ctx: &Ctx<'js>, console: &Console) -> rquickjs::Result<()> {
    let object = Object::new(ctx.clone())?;
    for &(name, stream) in CONSOLE_METHODS {
        let console = console.clone();
        let print = Function::new(ctx.clone(), move |ctx: Ctx<'js>, args: Rest<Value<'js>>| {
            console.write(stream, &join_args(&ctx, args.0));
        })?;
        object.set(name, print)?;
    }
    ctx.globals().set("console", object)
}

/// One console line: each argument formatted, joined by a single space.
/// Arguments with nothing to show (`null` included) print as `undefined`.
fn join_args<'js>(ctx: &Ctx<'js>, args: Vec<Value<'js>>) -> String {
    args.into_iter()
        .map(|value| format_value(&JsValue::new(ctx.clone(), value)).unwrap_or_else(|| "undefined".to_string()))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Message of a thrown error, or the string form of whatever was thrown.
fn describe_error<'js>(ctx: &Ctx<'js>, err: rquickjs::Error) -> String {
    if !matches!(err, rquickjs::Error::Exception) {
        return err.to_string();
    }
    let thrown = ctx.catch();
    if let Some(object) = thrown.as_object() {
        if let Ok(Some(message)) = object.get::<_, Option<String>>("message") {
            return message;
        }
    }
    JsValue::new(ctx.clone(), thrown).display()
}

/// A QuickJS value together with the context it lives in.
pub struct JsValue<'js> {
    ctx: Ctx<'js>,
    value: Value<'js>,
}

impl<'js> JsValue<'js> {
    pub fn new(ctx: Ctx<'js>, value: Value<'js>) -> Self {
        Self { ctx, value }
    }
}

impl<'js> Inspect for JsValue<'js> {
    fn is_nullish(&self) -> bool {
        self.value.is_undefined() || self.value.is_null()
    }

    fn text(&self) -> Option<String> {
        self.value.as_string().and_then(|s| s.to_string().ok())
    }

    fn structured(&self) -> Result<Option<String>, Unserializable> {
        let stringify = || -> rquickjs::Result<Option<String>> {
            let json: Object<'js> = self.ctx.globals().get("JSON")?;
            let stringify: Function<'js> = json.get("stringify")?;
            stringify.call((self.value.clone(), Value::new_null(self.ctx.clone()), 2))
        };
        stringify().map_err(|err| Unserializable(describe_error(&self.ctx, err)))
    }

    fn display(&self) -> String {
        let convert = || -> rquickjs::Result<String> {
            let string: Function<'js> = self.ctx.globals().get("String")?;
            string.call((self.value.clone(),))
        };
        match convert() {
            Ok(text) => text,
            Err(err) => {
                if matches!(err, rquickjs::Error::Exception) {
                    // Clear the pending exception; there is nothing better to show.
                    let _ = self.ctx.catch();
                }
                "[unprintable value]".to_string()
            }
        }
    }
}
