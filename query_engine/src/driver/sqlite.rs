//! SQLite driver
//!
//! sqlx already adapts sqlite's callback-style C API to the same async
//! contract as the server dialects, so this driver looks just like the
//! others from the engine's point of view.

use super::{Driver, DriverConnection, Row};
use crate::dialect::Dialect;
use crate::errors::EngineError;
use async_trait::async_trait;
use serde_json::Value;
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqlitePool, SqliteRow};
use sqlx::{Column, Row as SqlxRow, Sqlite, TypeInfo};

pub struct SqliteDriver {
    pool: SqlitePool,
}

impl SqliteDriver {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn bind_value<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    value: &Value,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        Value::Null => query.bind(Option::<String>::None),
        Value::Bool(b) => query.bind(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                query.bind(i)
            } else {
                query.bind(n.as_f64().unwrap_or(0.0))
            }
        }
        Value::String(s) => query.bind(s.clone()),
        other => query.bind(other.to_string()),
    }
}

fn build_query<'q>(sql: &'q str, params: &[Value]) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    let mut query = sqlx::query(sql);
    for param in params {
        query = bind_value(query, param);
    }
    query
}

fn decode_column(row: &SqliteRow, index: usize, type_name: &str) -> Result<Value, EngineError> {
    let value = match type_name {
        "BOOLEAN" => row.try_get::<Option<bool>, _>(index)?.map(Value::from),
        "INTEGER" | "INT" | "BIGINT" | "NUMERIC" => {
            row.try_get::<Option<i64>, _>(index)?.map(Value::from)
        }
        "REAL" => row.try_get::<Option<f64>, _>(index)?.map(Value::from),
        "TEXT" | "VARCHAR" | "DATETIME" | "DATE" | "TIME" => {
            row.try_get::<Option<String>, _>(index)?.map(Value::from)
        }
        // sqlite has no dedicated JSON storage class; JSON comes back as TEXT
        _ => row
            .try_get::<Option<String>, _>(index)
            .ok()
            .flatten()
            .map(Value::String),
    };
    Ok(value.unwrap_or(Value::Null))
}

fn row_to_json(row: &SqliteRow) -> Result<Row, EngineError> {
    let mut out = Row::new();
    for column in row.columns() {
        let value = decode_column(row, column.ordinal(), column.type_info().name())?;
        out.insert(column.name().to_string(), value);
    }
    Ok(out)
}

#[async_trait]
impl Driver for SqliteDriver {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, EngineError> {
        let rows = build_query(sql, params).fetch_all(&self.pool).await?;
        rows.iter().map(row_to_json).collect()
    }

    async fn execute_update(&self, sql: &str, params: &[Value]) -> Result<u64, EngineError> {
        let result = build_query(sql, params).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn dedicated(&self) -> Result<Box<dyn DriverConnection>, EngineError> {
        let conn = self.pool.acquire().await?;
        Ok(Box::new(SqliteConnection { conn }))
    }
}

pub struct SqliteConnection {
    conn: sqlx::pool::PoolConnection<Sqlite>,
}

#[async_trait]
impl DriverConnection for SqliteConnection {
    async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>, EngineError> {
        let rows = build_query(sql, params)
            .fetch_all(&mut *self.conn)
            .await?;
        rows.iter().map(row_to_json).collect()
    }

    async fn begin(&mut self) -> Result<(), EngineError> {
        sqlx::query("BEGIN").execute(&mut *self.conn).await?;
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), EngineError> {
        sqlx::query("COMMIT").execute(&mut *self.conn).await?;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), EngineError> {
        sqlx::query("ROLLBACK").execute(&mut *self.conn).await?;
        Ok(())
    }
}
