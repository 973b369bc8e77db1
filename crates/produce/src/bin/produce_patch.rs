//! `produce-patch`: replay a producer's patch list on a JSON document.
//!
//! See [`produce::cli::USAGE`] for arguments. Set `RUST_LOG=debug` to see
//! the draft sessions on stderr.

use std::io::{self, Read, Write};
use std::process::ExitCode;

use produce::cli::{patch_document, render, CliError, Options, USAGE};
use tracing::debug;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.iter().any(|a| a == "-h" || a == "--help") {
        println!("{USAGE}");
        return ExitCode::SUCCESS;
    }
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e @ CliError::Usage(_)) => {
            eprintln!("{e}\n\n{USAGE}");
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Vec<String>) -> Result<(), CliError> {
    let options = Options::parse(args)?;
    let patches = options.read_patches()?;
    let mut doc = String::new();
    io::stdin().read_to_string(&mut doc)?;
    debug!(doc_bytes = doc.len(), patch_bytes = patches.len(), "applying patch list");
    let result = patch_document(doc.trim(), &patches)?;
    writeln!(io::stdout().lock(), "{}", render(&result, options.compact)?)?;
    Ok(())
}
