//! Drivers
//!
//! A driver supplies the raw `execute(sql, params) -> rows` primitive for one
//! dialect plus a way to acquire a dedicated connection for transactions.
//! Rows cross this boundary as JSON maps keyed by database-cased column
//! names; decoding from native wire types happens inside each driver. Driver
//! errors propagate unchanged — no retries are added at this layer.

pub mod mysql;
pub mod postgres;
pub mod sqlite;

use crate::dialect::statements::{display_sql, resolve_placeholders};
use crate::dialect::Dialect;
use crate::errors::EngineError;
use async_trait::async_trait;
use serde_json::{Map, Value};

pub use mysql::MySqlDriver;
pub use postgres::PostgresDriver;
pub use sqlite::SqliteDriver;

/// Raw result row: database-cased column name to JSON value
pub type Row = Map<String, Value>;

#[async_trait]
pub trait Driver: Send + Sync {
    fn dialect(&self) -> Dialect;

    /// Execute a statement with resolved placeholders and return its rows
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, EngineError>;

    /// Execute a statement that returns no rows; yields the affected count
    async fn execute_update(&self, sql: &str, params: &[Value]) -> Result<u64, EngineError>;

    /// Acquire a dedicated connection, distinct from the pooled one used for
    /// ordinary queries
    async fn dedicated(&self) -> Result<Box<dyn DriverConnection>, EngineError>;
}

/// A single checked-out connection. Dropping it releases it back to the
/// pool; transactions rely on that to release exactly once.
#[async_trait]
pub trait DriverConnection: Send {
    async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>, EngineError>;

    async fn begin(&mut self) -> Result<(), EngineError>;
    async fn commit(&mut self) -> Result<(), EngineError>;
    async fn rollback(&mut self) -> Result<(), EngineError>;
}

/// Log the statement (display substitution only, never executed), resolve
/// the neutral tokens into the dialect's placeholder style, and execute.
pub(crate) async fn execute_logged(
    driver: &dyn Driver,
    dialect: Dialect,
    sql: &str,
    params: &[Value],
) -> Result<Vec<Row>, EngineError> {
    tracing::debug!(target: "quarry::sql", sql = %display_sql(sql, params), "executing query");
    let resolved = resolve_placeholders(sql, dialect);
    driver.execute(&resolved, params).await
}

pub(crate) async fn execute_update_logged(
    driver: &dyn Driver,
    dialect: Dialect,
    sql: &str,
    params: &[Value],
) -> Result<u64, EngineError> {
    tracing::debug!(target: "quarry::sql", sql = %display_sql(sql, params), "executing statement");
    let resolved = resolve_placeholders(sql, dialect);
    driver.execute_update(&resolved, params).await
}
