//! # Establishment CLI Module
//!
//! This module implements the CLI interface for Establishment.
//!
//! ## Available Commands
//!
//! - `server` - Start the HTTP server
//! - `init` - Initialize a new database
//! - `status` - Show store status
//! - `persons` - List all persons
//! - `graph` - Print the assembled relationship graph

mod commands;

use crate::config::Config;
use clap::{Parser, Subcommand};
use establishment_core::EstablishmentError;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Establishment - relationship graph server
///
/// Persons and typed relationships behind an HTTP API, with
/// cookie-session authentication for writes.
#[derive(Parser, Debug)]
#[command(name = "establishment")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the redb database (overrides config and environment)
    #[arg(short = 'D', long, global = true)]
    pub database: Option<PathBuf>,

    /// Path to a TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start HTTP server
    Server {
        /// Host to bind to
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind to
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Initialize a new empty database
    Init {
        /// Force initialization even if database exists
        #[arg(short, long)]
        force: bool,
    },

    /// Show store status
    Status,

    /// List all persons
    Persons,

    /// Print the assembled relationship graph
    Graph,
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Resolve configuration: file and environment first, then CLI flags.
pub fn resolve_config(cli: &Cli) -> Result<Config, EstablishmentError> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(database) = &cli.database {
        config.database = database.clone();
    }
    if let Some(Commands::Server { host, port }) = &cli.command {
        if let Some(host) = host {
            config.host = host.clone();
        }
        if let Some(port) = port {
            config.port = *port;
        }
    }
    Ok(config)
}

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), EstablishmentError> {
    let config = resolve_config(&cli)?;
    let json_mode = cli.json_mode;

    match cli.command {
        Some(Commands::Server { .. }) => cmd_server(config).await,
        Some(Commands::Init { force }) => cmd_init(&config.database, force),
        Some(Commands::Persons) => cmd_persons(&config.database, json_mode),
        Some(Commands::Graph) => cmd_graph(&config.database, json_mode),
        Some(Commands::Status) | None => cmd_status(&config.database, json_mode),
    }
}

// =============================================================================
// TESTS
// =============================================================================
