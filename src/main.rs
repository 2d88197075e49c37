//! Nimbus CLI entry point
//!
//! Thin composition layer: parse arguments, initialize logging, route the
//! command, and exit nonzero on failure.

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use nimbus::cli::{execute_command, Cli};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = execute_command(cli.command).await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
