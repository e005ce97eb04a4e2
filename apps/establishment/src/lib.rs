//! # establishment
//!
//! The Establishment server binary's library half: the axum HTTP API, the
//! clap CLI and layered configuration. `main.rs` only sets up tracing and
//! dispatches to [`cli::execute`].

pub mod api;
pub mod cli;
pub mod config;
