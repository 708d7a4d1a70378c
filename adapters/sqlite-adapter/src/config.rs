//! Environment configuration for the SQLite store.
//!
//! Variables:
//! - `DB_PATH`: database file; absent, empty or `:memory:` means in-memory.
//! - `SQLITE_BUSY_TIMEOUT_MS`: lock wait in milliseconds (default 5000).
//! - `SQLITE_CREATE_SCHEMA`: whether harnesses create and drop the schema
//!   themselves (default true).

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
const MEMORY_PATH: &str = ":memory:";

#[derive(Debug, Error)]
#[error("invalid configuration for {field}: {message}")]
pub struct ConfigError {
    pub field: &'static str,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DatabaseLocation {
    Memory,
    File(PathBuf),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SqliteConfig {
    pub location: DatabaseLocation,
    pub busy_timeout: Duration,
    pub create_schema: bool,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            location: DatabaseLocation::Memory,
            busy_timeout: Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS),
            create_schema: true,
        }
    }
}

impl SqliteConfig {
    /// Loads the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Loads the configuration through `lookup`, which returns the value of
    /// a variable when it is set.
    pub fn from_vars<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let location = match lookup("DB_PATH").map(|path| path.trim().to_string()) {
            Some(path) if !path.is_empty() && path != MEMORY_PATH => {
                DatabaseLocation::File(PathBuf::from(path))
            }
            _ => DatabaseLocation::Memory,
        };

        let busy_timeout = match lookup("SQLITE_BUSY_TIMEOUT_MS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|e| ConfigError {
                    field: "SQLITE_BUSY_TIMEOUT_MS",
                    message: format!("expected milliseconds, got {raw:?}: {e}"),
                })?,
            None => Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS),
        };

        let create_schema = match lookup("SQLITE_CREATE_SCHEMA") {
            Some(raw) => parse_bool(&raw).ok_or_else(|| ConfigError {
                field: "SQLITE_CREATE_SCHEMA",
                message: format!("expected a boolean, got {raw:?}"),
            })?,
            None => true,
        };

        Ok(Self {
            location,
            busy_timeout,
            create_schema,
        })
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
