//! # agora-verify: CLI Entry Point
//!
//! Parses arguments with clap, installs a tracing subscriber whose level
//! follows `-v`, and dispatches to [`agora_cli::run_verify`].

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Verify the hash chain of an exported Agora audit bundle.
#[derive(Parser, Debug)]
#[command(name = "agora-verify", version, about)]
struct Cli {
    /// Path to the exported bundle (JSON).
    #[arg(value_name = "BUNDLE")]
    bundle: PathBuf,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let stdout = std::io::stdout();
    match agora_cli::run_verify(&cli.bundle, cli.verbose > 0, &mut stdout.lock()) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(agora_cli::EXIT_UNREADABLE)
        }
    }
}
