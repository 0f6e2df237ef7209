//! Transactions
//!
//! A transaction owns one dedicated connection for its whole life; pooled
//! connections can never interleave its statements with other traffic. The
//! state machine is strict: statements only run while `Active`, and both
//! `commit` and `rollback` move to a terminal state and release the
//! connection exactly once — even when the database rejects the COMMIT, the
//! connection is released before the error propagates.

use crate::dialect::statements::{display_sql, resolve_placeholders};
use crate::dialect::Dialect;
use crate::driver::{Driver, DriverConnection, Row};
use crate::errors::EngineError;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Active,
    Committed,
    RolledBack,
}

impl TransactionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Committed => "committed",
            Self::RolledBack => "rolled back",
        }
    }
}

pub struct Transaction {
    conn: Option<Box<dyn DriverConnection>>,
    state: TransactionState,
    dialect: Dialect,
}

impl Transaction {
    /// Check out a dedicated connection and issue the dialect's BEGIN
    pub async fn begin(driver: &dyn Driver) -> Result<Self, EngineError> {
        let mut conn = driver.dedicated().await?;
        conn.begin().await?;
        Ok(Self {
            conn: Some(conn),
            state: TransactionState::Active,
            dialect: driver.dialect(),
        })
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == TransactionState::Active
    }

    fn require_active(&mut self) -> Result<&mut Box<dyn DriverConnection>, EngineError> {
        let actual = self.state.as_str();
        match (&mut self.conn, self.state) {
            (Some(conn), TransactionState::Active) => Ok(conn),
            _ => Err(EngineError::InvalidTransactionState {
                expected: TransactionState::Active.as_str(),
                actual,
            }),
        }
    }

    /// Run a statement on the transaction's connection
    pub async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>, EngineError> {
        let dialect = self.dialect;
        let conn = self.require_active()?;
        tracing::debug!(target: "quarry::sql", sql = %display_sql(sql, params), "executing in transaction");
        let resolved = resolve_placeholders(sql, dialect);
        conn.execute(&resolved, params).await
    }

    /// Commit and release the connection. The state becomes `Committed`
    /// before the COMMIT result is inspected, so a rejected commit still
    /// releases exactly once.
    pub async fn commit(&mut self) -> Result<(), EngineError> {
        self.require_active()?;
        self.state = TransactionState::Committed;
        let result = match self.conn.take() {
            Some(mut conn) => conn.commit().await,
            None => Ok(()),
        };
        // conn dropped here, returning it to the pool
        result
    }

    /// Roll back and release the connection
    pub async fn rollback(&mut self) -> Result<(), EngineError> {
        self.require_active()?;
        self.state = TransactionState::RolledBack;
        let result = match self.conn.take() {
            Some(mut conn) => conn.rollback().await,
            None => Ok(()),
        };
        result
    }
}

/// Closure future type accepted by [`with_transaction`]
pub type TransactionFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, EngineError>> + Send + 'a>>;

/// Begin, run the closure, then commit on success or roll back on error.
/// The closure's error wins over any rollback failure.
pub async fn with_transaction<T, F>(driver: &dyn Driver, f: F) -> Result<T, EngineError>
where
    F: for<'a> FnOnce(&'a mut Transaction) -> TransactionFuture<'a, T>,
{
    let mut tx = Transaction::begin(driver).await?;
    match f(&mut tx).await {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if tx.is_active() {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::error!(error = %rollback_err, "rollback failed after transaction error");
                }
            }
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct Calls {
        begins: AtomicUsize,
        commits: AtomicUsize,
        rollbacks: AtomicUsize,
        releases: AtomicUsize,
    }

    struct MockConnection {
        calls: Arc<Calls>,
        fail_commit: bool,
    }

    impl Drop for MockConnection {
        fn drop(&mut self) {
            self.calls.releases.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl DriverConnection for MockConnection {
        async fn execute(&mut self, _sql: &str, _params: &[Value]) -> Result<Vec<Row>, EngineError> {
            Ok(vec![])
        }

        async fn begin(&mut self) -> Result<(), EngineError> {
            self.calls.begins.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn commit(&mut self) -> Result<(), EngineError> {
            self.calls.commits.fetch_add(1, Ordering::SeqCst);
            if self.fail_commit {
                return Err(EngineError::Configuration("commit rejected".to_string()));
            }
            Ok(())
        }

        async fn rollback(&mut self) -> Result<(), EngineError> {
            self.calls.rollbacks.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct MockDriver {
        calls: Arc<Calls>,
        fail_commit: bool,
    }

    #[async_trait]
    impl Driver for MockDriver {
        fn dialect(&self) -> Dialect {
            Dialect::Sqlite
        }

        async fn execute(&self, _sql: &str, _params: &[Value]) -> Result<Vec<Row>, EngineError> {
            Ok(vec![])
        }

        async fn execute_update(&self, _sql: &str, _params: &[Value]) -> Result<u64, EngineError> {
            Ok(0)
        }

        async fn dedicated(&self) -> Result<Box<dyn DriverConnection>, EngineError> {
            Ok(Box::new(MockConnection {
                calls: Arc::clone(&self.calls),
                fail_commit: self.fail_commit,
            }))
        }
    }

    fn driver(fail_commit: bool) -> (MockDriver, Arc<Calls>) {
        let calls = Arc::new(Calls::default());
        (
            MockDriver {
                calls: Arc::clone(&calls),
                fail_commit,
            },
            calls,
        )
    }

    #[tokio::test]
    async fn test_commit_releases_exactly_once() {
        let (driver, calls) = driver(false);
        let mut tx = Transaction::begin(&driver).await.unwrap();
        assert!(tx.is_active());
        tx.commit().await.unwrap();
        assert_eq!(tx.state(), TransactionState::Committed);
        assert_eq!(calls.begins.load(Ordering::SeqCst), 1);
        assert_eq!(calls.commits.load(Ordering::SeqCst), 1);
        assert_eq!(calls.releases.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_statements_rejected_after_commit() {
        let (driver, _) = driver(false);
        let mut tx = Transaction::begin(&driver).await.unwrap();
        tx.commit().await.unwrap();
        let err = tx.execute("SELECT 1", &[]).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::InvalidTransactionState {
                actual: "committed",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_double_commit_is_rejected() {
        let (driver, calls) = driver(false);
        let mut tx = Transaction::begin(&driver).await.unwrap();
        tx.commit().await.unwrap();
        assert!(tx.commit().await.is_err());
        assert_eq!(calls.commits.load(Ordering::SeqCst), 1);
        assert_eq!(calls.releases.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_commit_still_releases() {
        let (driver, calls) = driver(true);
        let mut tx = Transaction::begin(&driver).await.unwrap();
        assert!(tx.commit().await.is_err());
        assert_eq!(tx.state(), TransactionState::Committed);
        assert_eq!(calls.releases.load(Ordering::SeqCst), 1);
        // terminal state means no rollback can follow
        assert!(tx.rollback().await.is_err());
        assert_eq!(calls.rollbacks.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_with_transaction_commits_on_success() {
        let (driver, calls) = driver(false);
        let result = with_transaction(&driver, |tx| {
            Box::pin(async move {
                tx.execute("SELECT PLACEHOLDER", &[json!(1)]).await?;
                Ok(42)
            })
        })
        .await
        .unwrap();
        assert_eq!(result, 42);
        assert_eq!(calls.commits.load(Ordering::SeqCst), 1);
        assert_eq!(calls.rollbacks.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_with_transaction_rolls_back_on_error() {
        let (driver, calls) = driver(false);
        let result: Result<(), _> = with_transaction(&driver, |_tx| {
            Box::pin(async move { Err(EngineError::Configuration("boom".to_string())) })
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.commits.load(Ordering::SeqCst), 0);
        assert_eq!(calls.rollbacks.load(Ordering::SeqCst), 1);
        assert_eq!(calls.releases.load(Ordering::SeqCst), 1);
    }
}
