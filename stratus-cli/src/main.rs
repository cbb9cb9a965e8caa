// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Stratus CLI
//!
//! Command-line interface for building layers and deploying functions.

use clap::{Parser, Subcommand};

mod commands;

/// Stratus - Lambda layer builds and function deploys
#[derive(Parser)]
#[command(name = "stratus")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "stratus.yaml")]
    pub config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build a layer in an isolated container and publish a new version
    PublishLayer {
        /// Layer name from the configuration file
        name: String,

        /// Use the locally cached build image instead of pulling it
        #[arg(long)]
        no_pull: bool,
    },

    /// Create or update a function and wire its HTTP front door
    Deploy {
        /// Function name from the configuration file
        name: String,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Update the code and configuration of an existing function
    Update {
        /// Function name from the configuration file
        name: String,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete a function
    Delete {
        /// Function name
        name: String,
    },

    /// Validate a configuration file
    Validate {
        /// Path to the configuration file (defaults to --config)
        file: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt().with_env_filter(log_level).init();

    // Dispatch to command handlers
    match cli.command {
        Commands::PublishLayer { name, no_pull } => {
            commands::publish_layer::execute(&cli.config, &name, no_pull).await
        }
        Commands::Deploy { name, json } => commands::deploy::execute(&cli.config, &name, json).await,
        Commands::Update { name, json } => commands::update::execute(&cli.config, &name, json).await,
        Commands::Delete { name } => commands::delete::execute(&cli.config, &name).await,
        Commands::Validate { file } => {
            commands::validate::execute(file.as_deref().unwrap_or(&cli.config)).await
        }
    }
}
