//! spanscope: rebuild span trees and active scopes from a heap snapshot
//!
//! Reads a JSON heap export of a traced process and prints the trace forests
//! found on the heap, followed by the span active on each thread.

use anyhow::Result;
use clap::Parser;
use spanscope::{Config, OutputFormat};
use std::io;
use std::path::PathBuf;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "spanscope")]
#[command(about = "Rebuild span trees and active scopes from a heap snapshot")]
#[command(version)]
struct Command {
    /// Path to the heap snapshot
    snapshot: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Report format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

fn init_logging(config: &Config) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::default().add_directive(LevelFilter::from_level(config.log_level()).into())
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn main() -> Result<()> {
    let opts = Command::parse();

    let Some(snapshot) = opts.snapshot else {
        println!("Usage: spanscope <path to memory snapshot>");
        return Ok(());
    };

    let config = Config {
        verbosity: opts.verbose,
        snapshot,
        format: opts.format,
    };
    init_logging(&config);

    spanscope::run(&config, io::stdout().lock())
}
