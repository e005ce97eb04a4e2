//! # Establishment - Relationship Graph Server
//!
//! The main binary for the Establishment relationship graph.
//!
//! This application provides:
//! - HTTP REST API server (axum-based) with cookie sessions
//! - CLI interface for inspecting the store
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │              apps/establishment (THE BINARY)             │
//! │                                                          │
//! │     ┌─────────────┐            ┌─────────────┐           │
//! │     │   CLI       │            │   HTTP API  │           │
//! │     │  (clap)     │            │   (axum)    │           │
//! │     └──────┬──────┘            └──────┬──────┘           │
//! │            └─────────────┬────────────┘                  │
//! │                          ▼                               │
//! │              ┌──────────────────────┐                    │
//! │              │  establishment-core  │                    │
//! │              │     (THE LOGIC)      │                    │
//! │              └──────────────────────┘                    │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Start the HTTP server
//! establishment server --host 0.0.0.0 --port 8080
//!
//! # CLI operations
//! establishment status
//! establishment graph --json-mode
//! ```

use clap::Parser;
use establishment::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    // ESTABLISHMENT_LOG_FORMAT=json enables machine-parseable output.
    let log_format =
        std::env::var("ESTABLISHMENT_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "establishment=info,tower_http=debug".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    let cli = cli::Cli::parse();

    if !cli.quiet {
        print_banner();
    }

    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the startup banner.
fn print_banner() {
    println!(
        r#"
  Establishment v{}
  Who knows whom, and how.
"#,
        env!("CARGO_PKG_VERSION")
    );
}
