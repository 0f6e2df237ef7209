//! PostgreSQL driver

use super::{Driver, DriverConnection, Row};
use crate::dialect::Dialect;
use crate::errors::EngineError;
use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgArguments, PgPool, PgRow};
use sqlx::query::Query;
use sqlx::{Column, Postgres, Row as SqlxRow, TypeInfo};

pub struct PostgresDriver {
    pool: PgPool,
}

impl PostgresDriver {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn bind_value<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: &Value,
) -> Query<'q, Postgres, PgArguments> {
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
        // arrays and objects bind as JSON text
        other => query.bind(other.to_string()),
    }
}

fn build_query<'q>(sql: &'q str, params: &[Value]) -> Query<'q, Postgres, PgArguments> {
    let mut query = sqlx::query(sql);
    for param in params {
        query = bind_value(query, param);
    }
    query
}

fn decode_column(row: &PgRow, index: usize, type_name: &str) -> Result<Value, EngineError> {
    let value = match type_name {
        "BOOL" => row.try_get::<Option<bool>, _>(index)?.map(Value::from),
        "INT2" => row.try_get::<Option<i16>, _>(index)?.map(Value::from),
        "INT4" => row.try_get::<Option<i32>, _>(index)?.map(Value::from),
        "INT8" => row.try_get::<Option<i64>, _>(index)?.map(Value::from),
        "FLOAT4" => row.try_get::<Option<f32>, _>(index)?.map(Value::from),
        "FLOAT8" => row.try_get::<Option<f64>, _>(index)?.map(Value::from),
        "TEXT" | "VARCHAR" | "CHAR" | "BPCHAR" | "NAME" => {
            row.try_get::<Option<String>, _>(index)?.map(Value::from)
        }
        "UUID" => row
            .try_get::<Option<uuid::Uuid>, _>(index)?
            .map(|u| Value::String(u.to_string())),
        "JSON" | "JSONB" => row.try_get::<Option<Value>, _>(index)?,
        "TIMESTAMPTZ" => row
            .try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(index)?
            .map(|t| Value::String(t.to_rfc3339())),
        "TIMESTAMP" => row
            .try_get::<Option<chrono::NaiveDateTime>, _>(index)?
            .map(|t| Value::String(t.to_string())),
        "DATE" => row
            .try_get::<Option<chrono::NaiveDate>, _>(index)?
            .map(|d| Value::String(d.to_string())),
        "TIME" => row
            .try_get::<Option<chrono::NaiveTime>, _>(index)?
            .map(|t| Value::String(t.to_string())),
        // NUMERIC and anything else: fall back to text
        _ => row
            .try_get::<Option<String>, _>(index)
            .ok()
            .flatten()
            .map(Value::String),
    };
    Ok(value.unwrap_or(Value::Null))
}

fn row_to_json(row: &PgRow) -> Result<Row, EngineError> {
    let mut out = Row::new();
    for column in row.columns() {
        let value = decode_column(row, column.ordinal(), column.type_info().name())?;
        out.insert(column.name().to_string(), value);
    }
    Ok(out)
}

#[async_trait]
impl Driver for PostgresDriver {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
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
        Ok(Box::new(PostgresConnection { conn }))
    }
}

pub struct PostgresConnection {
    conn: sqlx::pool::PoolConnection<Postgres>,
}

#[async_trait]
impl DriverConnection for PostgresConnection {
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
