//! Per-dialect template strategies
//!
//! Everything dialect-specific that is not a whole statement lives here:
//! identifier quoting, placeholder rendering, JSON comparison wrapping, JSON
//! aggregation functions and serial primary-key syntax. The statement
//! builders in `statements.rs` and the where-clause engine call through this
//! trait so no string-tag switches leak into the rest of the engine.

use super::PLACEHOLDER;

pub trait DialectTemplates: Send + Sync {
    /// Quote a single (unqualified) identifier
    fn quote(&self, ident: &str) -> String;

    /// Render the placeholder for the 1-based parameter index
    fn placeholder(&self, index: usize) -> String;

    /// Wrap a quoted column reference for comparison against a JSON value
    fn json_column(&self, column: &str) -> String;

    /// The neutral-token expression to use on the value side of a JSON
    /// comparison
    fn json_placeholder(&self) -> String;

    /// Aggregate `expr` (one JSON object per row) into a JSON array, `[]` on
    /// no rows
    fn json_array_agg(&self, expr: &str) -> String;

    /// Build a JSON object from `(key, value-expression)` pairs
    fn json_object(&self, pairs: &[(String, String)]) -> String {
        let body = pairs
            .iter()
            .map(|(key, expr)| format!("'{}', {}", key, expr))
            .collect::<Vec<_>>()
            .join(", ");
        format!("{}({})", self.json_object_function(), body)
    }

    fn json_object_function(&self) -> &'static str;

    /// Column clause for an auto-incrementing integer primary key, consumed
    /// by the external DDL generator
    fn serial_primary_key(&self) -> &'static str;

    /// Regex-match operator, if the dialect has one
    fn regexp_operator(&self) -> Option<&'static str>;

    /// Case-insensitive LIKE; dialects without ILIKE fall back to LIKE
    fn ilike_operator(&self) -> &'static str {
        "LIKE"
    }

    fn not_ilike_operator(&self) -> &'static str {
        "NOT LIKE"
    }
}

/// MySQL and MariaDB
pub struct MySqlTemplates;

impl DialectTemplates for MySqlTemplates {
    fn quote(&self, ident: &str) -> String {
        format!("`{}`", ident)
    }

    fn placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    fn json_column(&self, column: &str) -> String {
        format!("JSON_UNQUOTE(JSON_EXTRACT({}, '$'))", column)
    }

    fn json_placeholder(&self) -> String {
        PLACEHOLDER.to_string()
    }

    fn json_array_agg(&self, expr: &str) -> String {
        format!("COALESCE(JSON_ARRAYAGG({}), JSON_ARRAY())", expr)
    }

    fn json_object_function(&self) -> &'static str {
        "JSON_OBJECT"
    }

    fn serial_primary_key(&self) -> &'static str {
        "INT AUTO_INCREMENT PRIMARY KEY"
    }

    fn regexp_operator(&self) -> Option<&'static str> {
        Some("REGEXP")
    }
}

/// PostgreSQL
pub struct PostgresTemplates;

impl DialectTemplates for PostgresTemplates {
    fn quote(&self, ident: &str) -> String {
        format!("\"{}\"", ident)
    }

    fn placeholder(&self, index: usize) -> String {
        format!("${}", index)
    }

    fn json_column(&self, column: &str) -> String {
        format!("{}::jsonb", column)
    }

    fn json_placeholder(&self) -> String {
        format!("{}::jsonb", PLACEHOLDER)
    }

    fn json_array_agg(&self, expr: &str) -> String {
        format!("COALESCE(json_agg({}), '[]'::json)", expr)
    }

    fn json_object_function(&self) -> &'static str {
        "json_build_object"
    }

    fn serial_primary_key(&self) -> &'static str {
        "SERIAL PRIMARY KEY"
    }

    fn regexp_operator(&self) -> Option<&'static str> {
        Some("~")
    }

    fn ilike_operator(&self) -> &'static str {
        "ILIKE"
    }

    fn not_ilike_operator(&self) -> &'static str {
        "NOT ILIKE"
    }
}

/// SQLite
pub struct SqliteTemplates;

impl DialectTemplates for SqliteTemplates {
    fn quote(&self, ident: &str) -> String {
        format!("\"{}\"", ident)
    }

    fn placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    fn json_column(&self, column: &str) -> String {
        format!("JSON_UNQUOTE(JSON_EXTRACT({}, '$'))", column)
    }

    fn json_placeholder(&self) -> String {
        PLACEHOLDER.to_string()
    }

    fn json_array_agg(&self, expr: &str) -> String {
        format!("JSON_GROUP_ARRAY({})", expr)
    }

    fn json_object_function(&self) -> &'static str {
        "JSON_OBJECT"
    }

    fn serial_primary_key(&self) -> &'static str {
        "INTEGER PRIMARY KEY AUTOINCREMENT"
    }

    // sqlite has no native regex operator; callers must fail fast instead of
    // emitting invalid SQL
    fn regexp_operator(&self) -> Option<&'static str> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::Dialect;

    #[test]
    fn test_placeholder_styles() {
        assert_eq!(Dialect::MySql.templates().placeholder(3), "?");
        assert_eq!(Dialect::Sqlite.templates().placeholder(3), "?");
        assert_eq!(Dialect::Postgres.templates().placeholder(3), "$3");
    }

    #[test]
    fn test_json_column_wrapping() {
        assert_eq!(
            Dialect::MySql.templates().json_column("`meta`"),
            "JSON_UNQUOTE(JSON_EXTRACT(`meta`, '$'))"
        );
        assert_eq!(
            Dialect::Postgres.templates().json_column("\"meta\""),
            "\"meta\"::jsonb"
        );
    }

    #[test]
    fn test_json_object_rendering() {
        let pairs = vec![
            ("id".to_string(), "t.\"id\"".to_string()),
            ("name".to_string(), "t.\"name\"".to_string()),
        ];
        assert_eq!(
            Dialect::Postgres.templates().json_object(&pairs),
            "json_build_object('id', t.\"id\", 'name', t.\"name\")"
        );
        assert_eq!(
            Dialect::MariaDb.templates().json_object(&pairs),
            "JSON_OBJECT('id', t.\"id\", 'name', t.\"name\")"
        );
    }

    #[test]
    fn test_regex_support() {
        assert_eq!(Dialect::Postgres.templates().regexp_operator(), Some("~"));
        assert_eq!(Dialect::MySql.templates().regexp_operator(), Some("REGEXP"));
        assert!(Dialect::Sqlite.templates().regexp_operator().is_none());
    }
}
