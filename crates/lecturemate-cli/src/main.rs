//! LectureMate CLI entry point.

use clap::Parser;
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};

use lecturemate_cli::cli::Cli;
use lecturemate_cli::commands;

#[tokio::main]
async fn main() {
    // Config directory first, then .env.local / .env in the working directory
    let loaded = lecturemate_core::load_env();

    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.log_filter()));
    fmt().with_env_filter(filter).with_target(false).init();

    debug!(files = ?loaded, "Environment loaded");

    if let Err(e) = commands::execute(cli.command, cli.model).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
