//! DocScout CLI — documentation research pipeline.
//!
//! Turns a (domain, architecture-pattern) request into a validated research
//! bundle: crawled reference pages, extracted code patterns, gotchas, and a
//! coverage report gating downstream use.

mod commands;

use std::process::ExitCode;

use clap::Parser;

use commands::Cli;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = color_eyre::install() {
        eprintln!("failed to install error reporting: {e}");
        return ExitCode::from(2);
    }

    let cli = Cli::parse();
    commands::init_tracing(&cli);

    match commands::run(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(2)
        }
    }
}
