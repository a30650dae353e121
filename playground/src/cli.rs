use clap::{Parser, Subcommand};
use playground_core::protocol::Language;

/// Playground - run Python and JavaScript snippets in an embedded sandbox
#[derive(Parser, Debug)]
#[command(name = "playground")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a source file once and print the result
    Run {
        /// Source file, or "-" to read from stdin
        #[arg(value_name = "FILE")]
        file: String,

        /// python, javascript or java (default: inferred from the file extension)
        #[arg(long, short)]
        language: Option<Language>,

        /// Execution timeout in seconds (default: from env or 30)
        #[arg(long, env = "PLAYGROUND_TIMEOUT_SECS")]
        timeout: Option<u64>,

        /// Memory limit for the embedded runtime in MB (default: from env or 256)
        #[arg(long, env = "PLAYGROUND_MAX_MEMORY_MB")]
        max_memory: Option<u64>,

        /// Print the result as JSON ({"kind": ..., "text": ...})
        #[arg(long, default_value = "false")]
        json: bool,
    },

    /// Interactive session: edit a buffer, run it, reset to the starter code
    Repl {
        /// python, javascript or java
        #[arg(long, short, default_value = "python")]
        language: Language,

        /// File whose contents become the starter code
        #[arg(long, value_name = "FILE")]
        starter: Option<String>,

        /// Execution timeout in seconds (default: from env or 30)
        #[arg(long)]
        timeout: Option<u64>,

        /// Memory limit for the embedded runtime in MB (default: from env or 256)
        #[arg(long)]
        max_memory: Option<u64>,
    },

    /// Load the Python runtime and report its status
    Runtime,
}
