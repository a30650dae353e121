//! `playground run`: one-shot execution of a file or stdin.

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use playground_core::config::ExecutionLimits;
use playground_core::protocol::{ExecutionRequest, Language, ResultKind};
use playground_executor::{Dispatcher, Execute};

/// Run `file` and print its result. Returns `false` when the run failed.
pub async fn run_file(file: &str, language: Option<Language>, limits: ExecutionLimits, json: bool) -> Result<bool> {
    let language = match language {
        Some(language) => language,
        None => infer_language(file).with_context(|| {
            format!("Cannot infer the language of '{}'; pass --language", file)
        })?,
    };
    let source = read_source(file)?;
    tracing::debug!(file, language = %language, bytes = source.len(), "running source file");

    let dispatcher = Dispatcher::new(limits);
    let result = dispatcher.execute(ExecutionRequest::new(language, source)).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{}", result.text);
    }
    Ok(result.kind != ResultKind::Error)
}

fn read_source(file: &str) -> Result<String> {
    if file == "-" {
        let mut source = String::new();
        std::io::stdin()
            .read_to_string(&mut source)
            .context("Failed to read source from stdin")?;
        return Ok(source);
    }
    std::fs::read_to_string(file).with_context(|| format!("Failed to read source file '{}'", file))
}

fn infer_language(file: &str) -> Option<Language> {
    match Path::new(file).extension()?.to_str()? {
        "py" => Some(Language::Python),
        "js" | "mjs" | "cjs" => Some(Language::JavaScript),
        "java" => Some(Language::Java),
        _ => None,
    }
}
