//! Error types for the Quarry facade
//!
//! Engine and configuration errors are wrapped rather than flattened so
//! callers can tell a bad config file from a failed query.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum QuarryError {
    #[error("Engine error: {0}")]
    Engine(#[from] query_engine::EngineError),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Database connection error: {0}")]
    DatabaseConnection(#[from] sqlx::Error),
}
