//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod run;

use anyhow::Result;
use clap::Subcommand;
use std::path::PathBuf;
use std::process::ExitCode;

use crate::config::Config;

/// Printed when the container image is started without a command
pub const IMAGE_USAGE_MESSAGE: &str =
    "This image should be used as a base image, not run directly - see README.md for more information.";

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Run a pipeline definition
    Run {
        /// Path to the pipeline YAML file
        pipeline_file: PathBuf,
    },
    /// Explain how the container image is meant to be used
    ImageUsageMessage,
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
///
/// # Arguments
/// * `command` - The command to execute
/// * `config` - The CLI configuration
///
/// # Returns
/// The exit code the process should terminate with
pub async fn handle_command(command: Commands, config: &Config) -> Result<ExitCode> {
    match command {
        Commands::Run { pipeline_file } => run::handle_run(&pipeline_file, config).await,
        Commands::ImageUsageMessage => {
            println!("{}", IMAGE_USAGE_MESSAGE);
            Ok(ExitCode::FAILURE)
        }
    }
}
