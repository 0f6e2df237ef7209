//! Core Quarry functionality
//!
//! `SqlDataSource` is the main coordinator: it owns the connection pool
//! behind a dialect-specific driver, the model registry, and hands out
//! per-model managers. One data source per database; managers and query
//! builders borrow its driver through `Arc`.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use config::DatabaseConfig;
use query_engine::transaction::{self, TransactionFuture};
use query_engine::{
    Dialect, Driver, ModelDescriptor, ModelManager, ModelRegistry, MySqlDriver, PostgresDriver,
    Row, SqliteDriver, Transaction,
};
use serde_json::Value;

use crate::errors::QuarryError;

pub struct SqlDataSource {
    driver: Arc<dyn Driver>,
    dialect: Dialect,
    registry: Arc<ModelRegistry>,
}

impl SqlDataSource {
    /// Connect to the configured database and build the matching driver
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, QuarryError> {
        config.validate()?;
        let dialect = Dialect::from_str(&config.dialect)?;
        let url = config.connection_url()?;

        let driver: Arc<dyn Driver> = match dialect {
            Dialect::Postgres => {
                let pool = sqlx::postgres::PgPoolOptions::new()
                    .max_connections(config.max_connections)
                    .min_connections(config.min_connections)
                    .acquire_timeout(Duration::from_secs(config.connection_timeout_seconds))
                    .idle_timeout(Duration::from_secs(config.idle_timeout_seconds))
                    .max_lifetime(Duration::from_secs(config.max_lifetime_seconds))
                    .connect(&url)
                    .await?;
                Arc::new(PostgresDriver::new(pool))
            }
            Dialect::MySql | Dialect::MariaDb => {
                let pool = sqlx::mysql::MySqlPoolOptions::new()
                    .max_connections(config.max_connections)
                    .min_connections(config.min_connections)
                    .acquire_timeout(Duration::from_secs(config.connection_timeout_seconds))
                    .idle_timeout(Duration::from_secs(config.idle_timeout_seconds))
                    .max_lifetime(Duration::from_secs(config.max_lifetime_seconds))
                    .connect(&url)
                    .await?;
                if dialect == Dialect::MariaDb {
                    Arc::new(MySqlDriver::mariadb(pool))
                } else {
                    Arc::new(MySqlDriver::new(pool))
                }
            }
            Dialect::Sqlite => {
                let pool = sqlx::sqlite::SqlitePoolOptions::new()
                    .max_connections(config.max_connections)
                    .min_connections(config.min_connections)
                    .acquire_timeout(Duration::from_secs(config.connection_timeout_seconds))
                    .connect(&url)
                    .await?;
                Arc::new(SqliteDriver::new(pool))
            }
        };

        crate::debug_log!(dialect = dialect.as_str(), "connected data source");
        Ok(Self {
            driver,
            dialect,
            registry: Arc::new(ModelRegistry::new()),
        })
    }

    /// Build a data source over an already-constructed driver
    pub fn from_driver(driver: Arc<dyn Driver>) -> Self {
        let dialect = driver.dialect();
        Self {
            driver,
            dialect,
            registry: Arc::new(ModelRegistry::new()),
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn driver(&self) -> Arc<dyn Driver> {
        Arc::clone(&self.driver)
    }

    /// Register a model descriptor; duplicate names are rejected
    pub fn register_model(&mut self, descriptor: ModelDescriptor) -> Result<(), QuarryError> {
        Arc::make_mut(&mut self.registry).register(descriptor)?;
        Ok(())
    }

    /// Get a manager for a registered model
    pub fn manager(&self, model: &str) -> Result<ModelManager, QuarryError> {
        let descriptor = self.registry.get(model)?;
        Ok(ModelManager::new(
            descriptor,
            Arc::clone(&self.registry),
            Arc::clone(&self.driver),
        ))
    }

    /// List registered model names
    pub fn model_names(&self) -> Vec<&String> {
        self.registry.model_names()
    }

    /// Begin a transaction on a dedicated connection
    pub async fn start_transaction(&self) -> Result<Transaction, QuarryError> {
        Ok(Transaction::begin(self.driver.as_ref()).await?)
    }

    /// Begin, run the closure, commit on success, roll back on error
    pub async fn with_transaction<T, F>(&self, f: F) -> Result<T, QuarryError>
    where
        F: for<'a> FnOnce(&'a mut Transaction) -> TransactionFuture<'a, T>,
    {
        Ok(transaction::with_transaction(self.driver.as_ref(), f).await?)
    }

    /// Run a raw statement. The SQL may carry neutral placeholder tokens;
    /// they are resolved into the dialect's style before execution.
    pub async fn execute_raw(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, QuarryError> {
        let resolved = query_engine::dialect::statements::resolve_placeholders(sql, self.dialect);
        Ok(self.driver.execute(&resolved, params).await?)
    }

    /// Run a batch of parameterless statements in order, stopping at the
    /// first failure
    pub async fn run_statements(&self, statements: &[&str]) -> Result<(), QuarryError> {
        for statement in statements {
            self.driver.execute_update(statement, &[]).await?;
        }
        Ok(())
    }

    /// Check database connection health
    pub async fn health_check(&self) -> Result<(), QuarryError> {
        self.driver.execute("SELECT 1", &[]).await?;
        Ok(())
    }
}
