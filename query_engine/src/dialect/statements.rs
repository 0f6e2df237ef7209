//! Statement templates
//!
//! Pure functions that turn a `ModelDescriptor` plus accumulated state into
//! dialect-correct SQL text. All fragments carry the neutral `PLACEHOLDER`
//! token; `resolve_placeholders` rewrites it into the dialect's style exactly
//! once, immediately before execution.

use crate::dialect::{Dialect, PLACEHOLDER};
use crate::model::{ModelDescriptor, Record};
use crate::serializer::ADDITIONAL_COLUMNS;
use serde_json::Value;

/// Resolve neutral tokens into the dialect's placeholder style, numbering
/// left-to-right from 1. For positional dialects every token becomes `?`;
/// for postgres the n-th token becomes `$n`.
pub fn resolve_placeholders(sql: &str, dialect: Dialect) -> String {
    let templates = dialect.templates();
    let mut out = String::with_capacity(sql.len());
    let mut rest = sql;
    let mut index = 1usize;
    while let Some(pos) = rest.find(PLACEHOLDER) {
        out.push_str(&rest[..pos]);
        out.push_str(&templates.placeholder(index));
        index += 1;
        rest = &rest[pos + PLACEHOLDER.len()..];
    }
    out.push_str(rest);
    out
}

/// Substitute literal-looking values for display only. The result is never
/// executed; actual execution always goes through bound parameters.
pub fn display_sql(sql: &str, params: &[Value]) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut rest = sql;
    let mut index = 0usize;
    while let Some(pos) = rest.find(PLACEHOLDER) {
        out.push_str(&rest[..pos]);
        match params.get(index) {
            Some(Value::String(s)) => out.push_str(&format!("'{}'", s)),
            Some(other) => out.push_str(&other.to_string()),
            None => out.push_str("NULL"),
        }
        index += 1;
        rest = &rest[pos + PLACEHOLDER.len()..];
    }
    out.push_str(rest);
    out
}

/// `SELECT * FROM <table>`
pub fn select_from(descriptor: &ModelDescriptor, dialect: Dialect) -> String {
    format!(
        "SELECT * FROM {}",
        dialect.templates().quote(&descriptor.table)
    )
}

/// `SELECT <columns and raw expressions> FROM <table>`
///
/// `columns` are model-cased and converted to quoted database identifiers;
/// `raw_exprs` (aggregates, computed columns) pass through untouched.
pub fn select_columns(
    descriptor: &ModelDescriptor,
    dialect: Dialect,
    columns: &[String],
    raw_exprs: &[String],
) -> String {
    let templates = dialect.templates();
    let mut parts: Vec<String> = columns
        .iter()
        .map(|column| templates.quote(&descriptor.db_column(column)))
        .collect();
    parts.extend(raw_exprs.iter().cloned());
    if parts.is_empty() {
        parts.push("*".to_string());
    }
    format!(
        "SELECT {} FROM {}",
        parts.join(", "),
        templates.quote(&descriptor.table)
    )
}

/// `SELECT COUNT(*) AS total FROM <table>`
pub fn count_from(descriptor: &ModelDescriptor, dialect: Dialect) -> String {
    format!(
        "SELECT COUNT(*) AS total FROM {}",
        dialect.templates().quote(&descriptor.table)
    )
}

/// `SELECT SUM(<column>) AS total FROM <table>`
pub fn sum_from(descriptor: &ModelDescriptor, dialect: Dialect, column: &str) -> String {
    let templates = dialect.templates();
    format!(
        "SELECT SUM({}) AS total FROM {}",
        templates.quote(&descriptor.db_column(column)),
        templates.quote(&descriptor.table)
    )
}

/// Run the column's `prepare` hook and JSON-stringify nested structures so
/// they bind as text
fn prepare_value(descriptor: &ModelDescriptor, column: &str, value: Value) -> Value {
    let value = match descriptor
        .column_descriptor(column)
        .and_then(|c| c.prepare.clone())
    {
        Some(prepare) => prepare(value),
        None => value,
    };
    match value {
        Value::Object(_) | Value::Array(_) => Value::String(value.to_string()),
        other => other,
    }
}

/// `INSERT INTO <table> (cols) VALUES (tokens)`, with per-column prepare
/// hooks applied and the additional-columns pseudo-column stripped. Postgres
/// gets `RETURNING *` so the inserted row can be materialized directly.
pub fn insert(
    descriptor: &ModelDescriptor,
    dialect: Dialect,
    record: &Record,
) -> (String, Vec<Value>) {
    let templates = dialect.templates();
    let mut columns = Vec::new();
    let mut params = Vec::new();
    for (field, value) in record {
        // bookkeeping bag, never a real column
        if field == ADDITIONAL_COLUMNS {
            continue;
        }
        columns.push(templates.quote(&descriptor.db_column(field)));
        params.push(prepare_value(descriptor, field, value.clone()));
    }
    let tokens = vec![PLACEHOLDER; columns.len()].join(", ");
    let mut sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        templates.quote(&descriptor.table),
        columns.join(", "),
        tokens
    );
    if dialect == Dialect::Postgres {
        sql.push_str(" RETURNING *");
    }
    (sql, params)
}

/// `UPDATE <table> SET col = token, ...` — the caller appends the WHERE
/// fragment and its params after these
pub fn update_set(
    descriptor: &ModelDescriptor,
    dialect: Dialect,
    record: &Record,
) -> (String, Vec<Value>) {
    let templates = dialect.templates();
    let mut assignments = Vec::new();
    let mut params = Vec::new();
    for (field, value) in record {
        if field == ADDITIONAL_COLUMNS {
            continue;
        }
        assignments.push(format!(
            "{} = {}",
            templates.quote(&descriptor.db_column(field)),
            PLACEHOLDER
        ));
        params.push(prepare_value(descriptor, field, value.clone()));
    }
    let sql = format!(
        "UPDATE {} SET {}",
        templates.quote(&descriptor.table),
        assignments.join(", ")
    );
    (sql, params)
}

/// `DELETE FROM <table>`
pub fn delete_from(descriptor: &ModelDescriptor, dialect: Dialect) -> String {
    format!(
        "DELETE FROM {}",
        dialect.templates().quote(&descriptor.table)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user_descriptor() -> ModelDescriptor {
        ModelDescriptor::new("User", "users")
            .primary_key("id")
            .columns(&["id", "firstName", "metadata"])
    }

    #[test]
    fn test_placeholder_resolution_positional() {
        let sql = "SELECT * FROM t WHERE a = PLACEHOLDER AND b IN (PLACEHOLDER, PLACEHOLDER)";
        assert_eq!(
            resolve_placeholders(sql, Dialect::MySql),
            "SELECT * FROM t WHERE a = ? AND b IN (?, ?)"
        );
    }

    #[test]
    fn test_placeholder_resolution_postgres_is_gapless() {
        let sql = "a = PLACEHOLDER AND b = PLACEHOLDER AND c IN (PLACEHOLDER, PLACEHOLDER)";
        assert_eq!(
            resolve_placeholders(sql, Dialect::Postgres),
            "a = $1 AND b = $2 AND c IN ($3, $4)"
        );
    }

    #[test]
    fn test_display_sql_is_literal_looking() {
        let sql = "SELECT * FROM t WHERE a = PLACEHOLDER AND b = PLACEHOLDER";
        let rendered = display_sql(sql, &[json!("x"), json!(7)]);
        assert_eq!(rendered, "SELECT * FROM t WHERE a = 'x' AND b = 7");
    }

    #[test]
    fn test_insert_strips_additional_columns() {
        let mut record = Record::new();
        record.insert("firstName".to_string(), json!("Ada"));
        record.insert(ADDITIONAL_COLUMNS.to_string(), json!({"x": 1}));

        let (sql, params) = insert(&user_descriptor(), Dialect::MySql, &record);
        assert_eq!(sql, "INSERT INTO `users` (`first_name`) VALUES (PLACEHOLDER)");
        assert_eq!(params, vec![json!("Ada")]);
        assert!(!sql.contains("additionalColumns"));
    }

    #[test]
    fn test_insert_postgres_returns_rows() {
        let mut record = Record::new();
        record.insert("firstName".to_string(), json!("Ada"));
        let (sql, _) = insert(&user_descriptor(), Dialect::Postgres, &record);
        assert!(sql.ends_with("RETURNING *"));
    }

    #[test]
    fn test_nested_objects_are_json_encoded() {
        let mut record = Record::new();
        record.insert("metadata".to_string(), json!({"tags": ["a", "b"]}));
        let (_, params) = insert(&user_descriptor(), Dialect::Sqlite, &record);
        assert_eq!(params, vec![json!(r#"{"tags":["a","b"]}"#)]);
    }

    #[test]
    fn test_update_set_clause() {
        let mut record = Record::new();
        record.insert("firstName".to_string(), json!("Ada"));
        let (sql, params) = update_set(&user_descriptor(), Dialect::Postgres, &record);
        assert_eq!(sql, "UPDATE \"users\" SET \"first_name\" = PLACEHOLDER");
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn test_sum_template_is_well_formed() {
        let sql = sum_from(&user_descriptor(), Dialect::Sqlite, "id");
        assert_eq!(sql, "SELECT SUM(\"id\") AS total FROM \"users\"");
    }
}
