//! Facade-level integration tests over an in-memory driver.

use async_trait::async_trait;
use quarry::prelude::*;
use quarry::query_engine::{DriverConnection, EngineError, ModelDescriptor};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

struct ScriptedDriver {
    dialect: Dialect,
    responses: Mutex<VecDeque<Vec<Row>>>,
    captured: Mutex<Vec<String>>,
}

impl ScriptedDriver {
    fn new(dialect: Dialect, responses: Vec<Vec<Row>>) -> Arc<Self> {
        Arc::new(Self {
            dialect,
            responses: Mutex::new(responses.into()),
            captured: Mutex::new(Vec::new()),
        })
    }

    fn captured(&self) -> Vec<String> {
        self.captured.lock().unwrap().clone()
    }
}

#[async_trait]
impl Driver for ScriptedDriver {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    async fn execute(&self, sql: &str, _params: &[Value]) -> Result<Vec<Row>, EngineError> {
        self.captured.lock().unwrap().push(sql.to_string());
        Ok(self.responses.lock().unwrap().pop_front().unwrap_or_default())
    }

    async fn execute_update(&self, sql: &str, _params: &[Value]) -> Result<u64, EngineError> {
        self.captured.lock().unwrap().push(sql.to_string());
        Ok(1)
    }

    async fn dedicated(&self) -> Result<Box<dyn DriverConnection>, EngineError> {
        Ok(Box::new(ScriptedConnection))
    }
}

struct ScriptedConnection;

#[async_trait]
impl DriverConnection for ScriptedConnection {
    async fn execute(&mut self, _sql: &str, _params: &[Value]) -> Result<Vec<Row>, EngineError> {
        Ok(vec![])
    }

    async fn begin(&mut self) -> Result<(), EngineError> {
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), EngineError> {
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), EngineError> {
        Ok(())
    }
}

fn row(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        other => panic!("not a row: {other}"),
    }
}

fn data_source(driver: &Arc<ScriptedDriver>) -> SqlDataSource {
    let mut source = SqlDataSource::from_driver(Arc::clone(driver) as Arc<dyn Driver>);
    source
        .register_model(
            ModelDescriptor::new("User", "users")
                .primary_key("id")
                .columns(&["id", "firstName", "email"]),
        )
        .unwrap();
    source
}

#[tokio::test]
async fn test_manager_round_trip() {
    let driver = ScriptedDriver::new(
        Dialect::Postgres,
        vec![vec![row(json!({"id": 1, "first_name": "Ada", "email": "ada@example.com"}))]],
    );
    let source = data_source(&driver);

    let user = source
        .manager("User")
        .unwrap()
        .find_one_or_fail(json!(1))
        .await
        .unwrap();
    assert_eq!(user.get("firstName"), Some(&json!("Ada")));
    assert_eq!(
        driver.captured()[0],
        "SELECT * FROM \"users\" WHERE \"id\" = $1 LIMIT 1"
    );
}

#[tokio::test]
async fn test_unknown_model_is_rejected() {
    let driver = ScriptedDriver::new(Dialect::Sqlite, vec![]);
    let source = data_source(&driver);
    assert!(source.manager("Ghost").is_err());
}

#[tokio::test]
async fn test_duplicate_model_registration_fails() {
    let driver = ScriptedDriver::new(Dialect::Sqlite, vec![]);
    let mut source = data_source(&driver);
    assert!(source
        .register_model(ModelDescriptor::new("User", "users_v2"))
        .is_err());
}

#[tokio::test]
async fn test_execute_raw_resolves_placeholders() {
    let driver = ScriptedDriver::new(Dialect::Postgres, vec![]);
    let source = data_source(&driver);
    source
        .execute_raw(
            "SELECT * FROM \"users\" WHERE \"email\" = PLACEHOLDER",
            &[json!("ada@example.com")],
        )
        .await
        .unwrap();
    assert_eq!(
        driver.captured()[0],
        "SELECT * FROM \"users\" WHERE \"email\" = $1"
    );
}

#[tokio::test]
async fn test_transaction_lifecycle_through_facade() {
    let driver = ScriptedDriver::new(Dialect::MySql, vec![]);
    let source = data_source(&driver);

    let mut tx = source.start_transaction().await.unwrap();
    assert_eq!(tx.state(), TransactionState::Active);
    tx.commit().await.unwrap();
    assert_eq!(tx.state(), TransactionState::Committed);
    assert!(tx.execute("SELECT 1", &[]).await.is_err());

    let value = source
        .with_transaction(|tx| {
            Box::pin(async move {
                tx.execute("SELECT 1", &[]).await?;
                Ok(7)
            })
        })
        .await
        .unwrap();
    assert_eq!(value, 7);
}
