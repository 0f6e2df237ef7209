//! MySQL / MariaDB driver
//!
//! One driver serves both dialect tags; the SQL they receive only differs
//! upstream in the template layer.

use super::{Driver, DriverConnection, Row};
use crate::dialect::Dialect;
use crate::errors::EngineError;
use async_trait::async_trait;
use serde_json::Value;
use sqlx::mysql::{MySqlArguments, MySqlPool, MySqlRow};
use sqlx::query::Query;
use sqlx::{Column, MySql, Row as SqlxRow, TypeInfo};

pub struct MySqlDriver {
    pool: MySqlPool,
    dialect: Dialect,
}

impl MySqlDriver {
    pub fn new(pool: MySqlPool) -> Self {
        Self {
            pool,
            dialect: Dialect::MySql,
        }
    }

    /// Same wire protocol, different dialect tag
    pub fn mariadb(pool: MySqlPool) -> Self {
        Self {
            pool,
            dialect: Dialect::MariaDb,
        }
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }
}

fn bind_value<'q>(
    query: Query<'q, MySql, MySqlArguments>,
    value: &Value,
) -> Query<'q, MySql, MySqlArguments> {
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

fn build_query<'q>(sql: &'q str, params: &[Value]) -> Query<'q, MySql, MySqlArguments> {
    let mut query = sqlx::query(sql);
    for param in params {
        query = bind_value(query, param);
    }
    query
}

/// Last-resort decode for DECIMAL and unrecognized types
fn decode_fallback(row: &MySqlRow, index: usize) -> Value {
    if let Ok(Some(s)) = row.try_get::<Option<String>, _>(index) {
        return Value::String(s);
    }
    if let Ok(Some(f)) = row.try_get::<Option<f64>, _>(index) {
        return Value::from(f);
    }
    if let Ok(Some(i)) = row.try_get::<Option<i64>, _>(index) {
        return Value::from(i);
    }
    Value::Null
}

fn decode_column(row: &MySqlRow, index: usize, type_name: &str) -> Result<Value, EngineError> {
    let value = match type_name {
        "BOOLEAN" => row.try_get::<Option<bool>, _>(index)?.map(Value::from),
        "TINYINT" => row.try_get::<Option<i8>, _>(index)?.map(Value::from),
        "SMALLINT" => row.try_get::<Option<i16>, _>(index)?.map(Value::from),
        "INT" | "MEDIUMINT" => row.try_get::<Option<i32>, _>(index)?.map(Value::from),
        "BIGINT" => row.try_get::<Option<i64>, _>(index)?.map(Value::from),
        "TINYINT UNSIGNED" => row.try_get::<Option<u8>, _>(index)?.map(Value::from),
        "SMALLINT UNSIGNED" => row.try_get::<Option<u16>, _>(index)?.map(Value::from),
        "INT UNSIGNED" | "MEDIUMINT UNSIGNED" => {
            row.try_get::<Option<u32>, _>(index)?.map(Value::from)
        }
        "BIGINT UNSIGNED" => row.try_get::<Option<u64>, _>(index)?.map(Value::from),
        "FLOAT" => row.try_get::<Option<f32>, _>(index)?.map(Value::from),
        "DOUBLE" => row.try_get::<Option<f64>, _>(index)?.map(Value::from),
        "VARCHAR" | "TEXT" | "CHAR" | "TINYTEXT" | "MEDIUMTEXT" | "LONGTEXT" | "ENUM" => {
            row.try_get::<Option<String>, _>(index)?.map(Value::from)
        }
        "JSON" => row.try_get::<Option<Value>, _>(index)?,
        "DATETIME" => row
            .try_get::<Option<chrono::NaiveDateTime>, _>(index)?
            .map(|t| Value::String(t.to_string())),
        "TIMESTAMP" => row
            .try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(index)?
            .map(|t| Value::String(t.to_rfc3339())),
        "DATE" => row
            .try_get::<Option<chrono::NaiveDate>, _>(index)?
            .map(|d| Value::String(d.to_string())),
        "TIME" => row
            .try_get::<Option<chrono::NaiveTime>, _>(index)?
            .map(|t| Value::String(t.to_string())),
        _ => Some(decode_fallback(row, index)),
    };
    Ok(value.unwrap_or(Value::Null))
}

fn row_to_json(row: &MySqlRow) -> Result<Row, EngineError> {
    let mut out = Row::new();
    for column in row.columns() {
        let value = decode_column(row, column.ordinal(), column.type_info().name())?;
        out.insert(column.name().to_string(), value);
    }
    Ok(out)
}

#[async_trait]
impl Driver for MySqlDriver {
    fn dialect(&self) -> Dialect {
        self.dialect
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
        Ok(Box::new(MySqlConnection { conn }))
    }
}

pub struct MySqlConnection {
    conn: sqlx::pool::PoolConnection<MySql>,
}

#[async_trait]
impl DriverConnection for MySqlConnection {
    async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>, EngineError> {
        let rows = build_query(sql, params)
            .fetch_all(&mut *self.conn)
            .await?;
        rows.iter().map(row_to_json).collect()
    }

    async fn begin(&mut self) -> Result<(), EngineError> {
        sqlx::query("START TRANSACTION")
            .execute(&mut *self.conn)
            .await?;
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
