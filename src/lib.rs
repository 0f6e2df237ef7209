//! # Quarry
//!
//! A Rust database abstraction library: fluent query building over
//! parameterized SQL for MySQL, MariaDB, PostgreSQL and SQLite, with
//! relation resolution, case-convention mapping and transactions.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use quarry::prelude::*;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = DatabaseConfig::new(
//!         "postgres".to_string(),
//!         "localhost".to_string(), 5432, "quarry".to_string(),
//!         "postgres".to_string(), "password".to_string(),
//!         1, 5, 30, 600, 3600,
//!     );
//!
//!     let mut quarry = SqlDataSource::connect(&config).await?;
//!     quarry.register_model(
//!         ModelDescriptor::new("User", "users")
//!             .primary_key("id")
//!             .columns(&["id", "firstName", "email"])
//!             .has_many("orders", "Order", "userId"),
//!     )?;
//!     quarry.register_model(
//!         ModelDescriptor::new("Order", "orders")
//!             .primary_key("id")
//!             .columns(&["id", "userId", "total"]),
//!     )?;
//!
//!     let users = quarry
//!         .manager("User")?
//!         .query()
//!         .where_("email", json!("ada@example.com"))
//!         .with("orders")
//!         .many()
//!         .await?;
//!     println!("fetched {} users", users.len());
//!
//!     Ok(())
//! }
//! ```

/// Conditional debug logging macros
/// These macros only compile in code when the `debug-logging` feature is enabled
#[cfg(feature = "debug-logging")]
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {
        tracing::debug!($($arg)*)
    };
}

#[cfg(not(feature = "debug-logging"))]
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {};
}

#[cfg(feature = "debug-logging")]
#[macro_export]
macro_rules! trace_log {
    ($($arg:tt)*) => {
        tracing::trace!($($arg)*)
    };
}

#[cfg(not(feature = "debug-logging"))]
#[macro_export]
macro_rules! trace_log {
    ($($arg:tt)*) => {};
}

pub mod core;
pub mod errors;
pub mod prelude;

// Re-export the main public types for convenience
pub use crate::core::SqlDataSource;
pub use errors::QuarryError;

// Re-export centralized config
pub use config::{AppConfig, ConfigError, DatabaseConfig, LoggingConfig};

// Re-export the engine crate so model and query types are reachable without
// a separate dependency declaration
pub use query_engine;

// Re-export external dependencies used in public API
pub use async_trait;
pub use sqlx;
