//! dcd CLI
//!
//! Command-line entry point: runs a pipeline definition against the current
//! checkout and prints its events as they happen.

mod commands;
mod config;

use clap::Parser;
use colored::*;
use commands::{Commands, handle_command};
use config::Config;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "dcd")]
#[command(about = "Minimal continuous delivery pipeline runner", long_about = None)]
struct Cli {
    /// Checkout the pipeline runs for
    #[arg(long, global = true, default_value = ".")]
    repo: PathBuf,

    /// State database (default: dcd/state.db in the user's state directory)
    #[arg(long, global = true, env = "DCD_DATABASE_URL")]
    database_url: Option<String>,

    /// Keep build state in memory instead of the state database
    #[arg(long, global = true)]
    memory: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Events go to stdout, diagnostics to stderr
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dcd=info,dcd_runner=info,dcd_store=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = Config {
        repo: cli.repo,
        database_url: cli.database_url,
        memory: cli.memory,
    };

    match handle_command(cli.command, &config).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}
