//! `playground repl`: drive a session from the terminal.
//!
//! Plain lines are appended to the source buffer; lines starting with `:`
//! are commands.

use std::sync::Arc;

use anyhow::{Context, Result};
use playground_core::config::ExecutionLimits;
use playground_core::protocol::Language;
use playground_executor::session::RUNNING_OUTPUT;
use playground_executor::{Dispatcher, PlaygroundSession, RunOutcome};

#[derive(Debug, PartialEq, Eq)]
enum ReplCommand<'a> {
    Run,
    Reset,
    Show,
    Clear,
    Lang(&'a str),
    Quit,
    Unknown(&'a str),
}

fn parse_command(line: &str) -> Option<ReplCommand<'_>> {
    let command = line.trim().strip_prefix(':')?;
    let (name, arg) = match command.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (command, ""),
    };
    Some(match name {
        "run" | "r" => ReplCommand::Run,
        "reset" => ReplCommand::Reset,
        "show" | "s" => ReplCommand::Show,
        "clear" => ReplCommand::Clear,
        "lang" => ReplCommand::Lang(arg),
        "quit" | "q" | "exit" => ReplCommand::Quit,
        _ => ReplCommand::Unknown(command),
    })
}

fn default_starter(language: Language) -> &'static str {
    match language {
        Language::Python => "print('Hello from Python!')",
        Language::JavaScript => "console.log('Hello from JavaScript!');",
        Language::Java => "class Main {\n    public static void main(String[] args) {}\n}",
    }
}

fn append_line(session: &PlaygroundSession, line: &str) {
    let mut source = session.source();
    if !source.is_empty() {
        source.push('\n');
    }
    source.push_str(line);
    session.set_source(source);
}

fn print_source(session: &PlaygroundSession) {
    eprintln!("── {} source ──", session.language_label());
    println!("{}", session.source());
}

pub async fn run_repl(language: Language, starter_file: Option<&str>, limits: ExecutionLimits) -> Result<()> {
    let starter = match starter_file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read starter file '{}'", path))?,
        None => default_starter(language).to_string(),
    };
    let session = PlaygroundSession::new(Arc::new(Dispatcher::new(limits)), language, starter);

    eprintln!("┌────────────────────────────────────────────────────────────");
    eprintln!("│  Playground  ·  {}", session.language_label());
    eprintln!("│  :run  :reset  :show  :clear  :lang <language>  :quit");
    eprintln!("└────────────────────────────────────────────────────────────\n");
    print_source(&session);
    eprintln!("{}", session.output());

    let mut rl = rustyline::DefaultEditor::new()
        .map_err(|e| anyhow::anyhow!("Failed to create line editor: {}", e))?;

    loop {
        let prompt = format!("{}> ", session.language().tag());
        match rl.readline(&prompt) {
            Ok(line) => {
                let Some(command) = parse_command(&line) else {
                    append_line(&session, &line);
                    continue;
                };
                let _ = rl.add_history_entry(line.trim());

                match command {
                    ReplCommand::Run => {
                        eprintln!("{}", RUNNING_OUTPUT);
                        match session.run().await {
                            RunOutcome::Completed(_) => println!("{}", session.output()),
                            RunOutcome::Skipped => eprintln!("A run is already in progress."),
                            RunOutcome::Stale => {}
                        }
                    }
                    ReplCommand::Reset => {
                        session.reset();
                        eprintln!("{}", session.output());
                        print_source(&session);
                    }
                    ReplCommand::Show => print_source(&session),
                    ReplCommand::Clear => session.set_source(""),
                    ReplCommand::Lang(tag) => match tag.parse::<Language>() {
                        Ok(language) => {
                            session.select(language, default_starter(language));
                            eprintln!("Switched to {}.", session.language_label());
                            print_source(&session);
                            eprintln!("{}", session.output());
                        }
                        Err(e) => eprintln!("{}", e),
                    },
                    ReplCommand::Quit => break,
                    ReplCommand::Unknown(name) => eprintln!("Unknown command ':{}'", name),
                }
            }
            Err(rustyline::error::ReadlineError::Interrupted) | Err(rustyline::error::ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("Error: {}", e);
                break;
            }
        }
    }

    Ok(())
}
