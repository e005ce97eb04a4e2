//! # Configuration
//!
//! Server configuration, resolved in layers:
//!
//! 1. Built-in defaults
//! 2. Optional TOML file (`--config establishment.toml`)
//! 3. Environment variables
//! 4. CLI flags (applied by the `cli` module)
//!
//! ## Environment Variables
//!
//! - `ESTABLISHMENT_DB`: Path to the redb database file
//! - `ESTABLISHMENT_HOST` / `ESTABLISHMENT_PORT`: Bind address
//! - `ESTABLISHMENT_STATIC_DIR`: Directory served for unmatched paths
//! - `ESTABLISHMENT_CORS_ORIGINS`: Comma-separated allowed origins, or "*"
//! - `ESTABLISHMENT_RATE_LIMIT`: Requests per second (0 disables)
//! - `ESTABLISHMENT_REQUEST_TIMEOUT_SECS`: Per-request store deadline
//! - `ESTABLISHMENT_SESSION_TTL_SECS`: Session lifetime
//! - `ESTABLISHMENT_COOKIE_SECURE`: Mark the session cookie `Secure`

use establishment_core::EstablishmentError;
use establishment_core::primitives::{REQUEST_TIMEOUT_SECS, SESSION_TTL_SECS};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Resolved server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database: PathBuf,
    pub static_dir: PathBuf,
    pub cors_origins: Vec<String>,
    pub rate_limit: u32,
    pub request_timeout_secs: u64,
    pub session_ttl_secs: i64,
    pub cookie_secure: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            database: PathBuf::from("establishment.redb"),
            static_dir: PathBuf::from("static"),
            cors_origins: vec![
                "http://localhost:5500".to_string(),
                "http://127.0.0.1:5500".to_string(),
            ],
            rate_limit: 100,
            request_timeout_secs: REQUEST_TIMEOUT_SECS,
            session_ttl_secs: SESSION_TTL_SECS,
            cookie_secure: false,
        }
    }
}

impl Config {
    /// Load defaults, then the optional TOML file, then the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, EstablishmentError> {
        let mut config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|e| {
                    EstablishmentError::ValidationError(format!(
                        "cannot read config '{}': {}",
                        path.display(),
                        e
                    ))
                })?;
                Self::from_toml_str(&text)?
            }
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Parse a TOML document; absent keys keep their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, EstablishmentError> {
        toml::from_str(text)
            .map_err(|e| EstablishmentError::ValidationError(format!("invalid config: {}", e)))
    }

    /// Apply `ESTABLISHMENT_*` overrides from `lookup`.
    ///
    /// Unparseable values are ignored with a warning.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("ESTABLISHMENT_DB") {
            self.database = PathBuf::from(v);
        }
        if let Some(v) = lookup("ESTABLISHMENT_HOST") {
            self.host = v;
        }
        if let Some(v) = lookup("ESTABLISHMENT_STATIC_DIR") {
            self.static_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("ESTABLISHMENT_CORS_ORIGINS") {
            self.cors_origins = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        parse_into(&lookup, "ESTABLISHMENT_PORT", &mut self.port);
        parse_into(&lookup, "ESTABLISHMENT_RATE_LIMIT", &mut self.rate_limit);
        parse_into(
            &lookup,
            "ESTABLISHMENT_REQUEST_TIMEOUT_SECS",
            &mut self.request_timeout_secs,
        );
        parse_into(
            &lookup,
            "ESTABLISHMENT_SESSION_TTL_SECS",
            &mut self.session_ttl_secs,
        );
        parse_into(&lookup, "ESTABLISHMENT_COOKIE_SECURE", &mut self.cookie_secure);
    }

    /// The per-request deadline for store operations.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    /// `host:port` for the listener.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_into<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    slot: &mut T,
) {
    if let Some(raw) = lookup(key) {
        match raw.trim().parse() {
            Ok(value) => *slot = value,
            Err(_) => tracing::warn!("Ignoring invalid {}='{}'", key, raw),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
