use super::*;
use crate::dialect::statements::resolve_placeholders;
use crate::dialect::Dialect;
use crate::driver::{Driver, DriverConnection, Row};
use crate::errors::EngineError;
use crate::model::{CaseConvention, ModelDescriptor, ModelRegistry};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

/// Driver stub for SQL-shape tests; nothing here ever executes
struct NullDriver(Dialect);

#[async_trait]
impl Driver for NullDriver {
    fn dialect(&self) -> Dialect {
        self.0
    }

    async fn execute(&self, _sql: &str, _params: &[Value]) -> Result<Vec<Row>, EngineError> {
        Ok(vec![])
    }

    async fn execute_update(&self, _sql: &str, _params: &[Value]) -> Result<u64, EngineError> {
        Ok(0)
    }

    async fn dedicated(&self) -> Result<Box<dyn DriverConnection>, EngineError> {
        Err(EngineError::Configuration(
            "stub driver has no connections".to_string(),
        ))
    }
}

fn user_builder(dialect: Dialect) -> QueryBuilder {
    let mut registry = ModelRegistry::new();
    registry
        .register(
            ModelDescriptor::new("User", "users")
                .primary_key("id")
                .columns(&["id", "firstName", "email", "metadata"]),
        )
        .unwrap();
    let descriptor = registry.get("User").unwrap();
    QueryBuilder::new(descriptor, Arc::new(registry), Arc::new(NullDriver(dialect)))
}

fn snake_where(dialect: Dialect) -> WhereClauseBuilder {
    WhereClauseBuilder::new(dialect).with_column_case(CaseConvention::Snake)
}

// ---- where engine ----

#[test]
fn test_first_condition_writes_where() {
    let (sql, params) = snake_where(Dialect::MySql)
        .where_("firstName", json!("Ada"))
        .into_parts();
    assert_eq!(sql, "WHERE `first_name` = PLACEHOLDER");
    assert_eq!(params, vec![json!("Ada")]);
}

#[test]
fn test_n_conditions_carry_n_minus_one_connectives() {
    let built = snake_where(Dialect::Sqlite)
        .where_("a", json!(1))
        .where_("b", json!(2))
        .or_where("c", json!(3));
    let (sql, params) = built.into_parts();
    assert_eq!(
        sql,
        "WHERE \"a\" = PLACEHOLDER AND \"b\" = PLACEHOLDER OR \"c\" = PLACEHOLDER"
    );
    assert_eq!(sql.matches("PLACEHOLDER").count(), params.len());
}

#[test]
fn test_nested_group_is_parenthesized_without_stray_connective() {
    let (sql, params) = snake_where(Dialect::MySql)
        .where_("status", json!("active"))
        .or_where_builder(|g| g.where_("role", json!("admin")).or_where("role", json!("owner")))
        .into_parts();
    assert_eq!(
        sql,
        "WHERE `status` = PLACEHOLDER OR (`role` = PLACEHOLDER OR `role` = PLACEHOLDER)"
    );
    assert_eq!(params.len(), 3);
}

#[test]
fn test_nested_group_inherits_column_case() {
    let (sql, _) = snake_where(Dialect::Postgres)
        .where_builder(|g| g.where_("firstName", json!("Ada")))
        .into_parts();
    assert_eq!(sql, "WHERE (\"first_name\" = PLACEHOLDER)");
}

#[test]
fn test_empty_group_is_skipped() {
    let (sql, _) = snake_where(Dialect::MySql)
        .where_("a", json!(1))
        .where_builder(|g| g)
        .into_parts();
    assert_eq!(sql, "WHERE `a` = PLACEHOLDER");
}

#[test]
fn test_null_equality_becomes_is_null() {
    let (sql, params) = snake_where(Dialect::MySql)
        .where_("deletedAt", Value::Null)
        .where_op("archivedAt", Operator::Ne, Value::Null)
        .into_parts();
    assert_eq!(
        sql,
        "WHERE `deleted_at` IS NULL AND `archived_at` IS NOT NULL"
    );
    assert!(params.is_empty());
}

#[test]
fn test_object_comparison_uses_json_wrapping() {
    let (sql, params) = snake_where(Dialect::MySql)
        .where_("metadata", json!({"plan": "pro"}))
        .into_parts();
    assert_eq!(
        sql,
        "WHERE JSON_UNQUOTE(JSON_EXTRACT(`metadata`, '$')) = PLACEHOLDER"
    );
    assert_eq!(params, vec![json!(r#"{"plan":"pro"}"#)]);

    let (sql, _) = snake_where(Dialect::Postgres)
        .where_("metadata", json!({"plan": "pro"}))
        .into_parts();
    assert_eq!(sql, "WHERE \"metadata\"::jsonb = PLACEHOLDER::jsonb");
}

#[test]
fn test_ilike_lowers_to_like_outside_postgres() {
    let (sql, _) = snake_where(Dialect::MySql)
        .where_op("email", Operator::ILike, json!("%a%"))
        .into_parts();
    assert!(sql.contains("LIKE"));
    assert!(!sql.contains("ILIKE"));

    let (sql, _) = snake_where(Dialect::Postgres)
        .where_op("email", Operator::ILike, json!("%a%"))
        .into_parts();
    assert!(sql.contains("ILIKE"));
}

#[test]
fn test_empty_in_lists_short_circuit() {
    let (sql, params) = snake_where(Dialect::Sqlite)
        .where_in("id", vec![])
        .into_parts();
    assert_eq!(sql, "WHERE 1=0");
    assert!(params.is_empty());

    let (sql, _) = snake_where(Dialect::Sqlite)
        .where_not_in("id", vec![])
        .into_parts();
    assert_eq!(sql, "WHERE 1=1");
}

#[test]
fn test_in_list_binds_every_value() {
    let (sql, params) = snake_where(Dialect::Postgres)
        .where_in("id", vec![json!(1), json!(2), json!(3)])
        .into_parts();
    assert_eq!(
        sql,
        "WHERE \"id\" IN (PLACEHOLDER, PLACEHOLDER, PLACEHOLDER)"
    );
    assert_eq!(params.len(), 3);
}

#[test]
fn test_between_binds_both_bounds() {
    let (sql, params) = snake_where(Dialect::MySql)
        .where_between("age", json!(18), json!(65))
        .into_parts();
    assert_eq!(
        sql,
        "WHERE `age` BETWEEN PLACEHOLDER AND PLACEHOLDER"
    );
    assert_eq!(params, vec![json!(18), json!(65)]);
}

#[test]
fn test_regexp_fails_fast_on_sqlite() {
    let err = snake_where(Dialect::Sqlite)
        .where_regexp("email", ".*@example\\.com$")
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::UnsupportedOperator {
            operator: "REGEXP",
            dialect: "sqlite"
        }
    ));

    let (sql, _) = snake_where(Dialect::Postgres)
        .where_regexp("email", ".*")
        .unwrap()
        .into_parts();
    assert_eq!(sql, "WHERE \"email\" ~ PLACEHOLDER");
}

#[test]
fn test_raw_fragment_keeps_param_order() {
    let (sql, params) = snake_where(Dialect::Postgres)
        .where_("a", json!(1))
        .raw_where("LOWER(\"b\") = PLACEHOLDER", vec![json!("x")])
        .where_("c", json!(3))
        .into_parts();
    assert_eq!(sql.matches("PLACEHOLDER").count(), 3);
    assert_eq!(params, vec![json!(1), json!("x"), json!(3)]);
    // resolved left-to-right, so the raw fragment keeps its slot
    assert_eq!(
        resolve_placeholders(&sql, Dialect::Postgres),
        "WHERE \"a\" = $1 AND LOWER(\"b\") = $2 AND \"c\" = $3"
    );
}

// ---- builder SQL shapes ----

#[test]
fn test_default_select_is_star() {
    let (sql, params) = user_builder(Dialect::MySql).build_select_sql();
    assert_eq!(sql, "SELECT * FROM `users`");
    assert!(params.is_empty());
}

#[test]
fn test_full_select_shape() {
    let builder = user_builder(Dialect::Postgres)
        .select(&["id", "firstName"])
        .select_raw("COUNT(*) AS total")
        .where_("email", json!("ada@example.com"))
        .group_by("firstName")
        .having_raw("COUNT(*) > PLACEHOLDER", vec![json!(1)])
        .order_by("firstName", SortOrder::Desc)
        .limit(10)
        .offset(20);
    let (sql, params) = builder.build_select_sql();
    assert_eq!(
        sql,
        "SELECT \"id\", \"first_name\", COUNT(*) AS total FROM \"users\" \
         WHERE \"email\" = PLACEHOLDER \
         GROUP BY \"first_name\" \
         HAVING COUNT(*) > PLACEHOLDER \
         ORDER BY \"first_name\" DESC LIMIT 10 OFFSET 20"
    );
    assert_eq!(params, vec![json!("ada@example.com"), json!(1)]);
}

#[test]
fn test_join_fragment_lands_between_from_and_where() {
    let builder = user_builder(Dialect::MySql)
        .join_raw("JOIN `orders` ON `orders`.`user_id` = `users`.`id`")
        .where_("id", json!(1));
    let (sql, _) = builder.build_select_sql();
    assert_eq!(
        sql,
        "SELECT * FROM `users` JOIN `orders` ON `orders`.`user_id` = `users`.`id` WHERE `id` = PLACEHOLDER"
    );
}

#[test]
fn test_copy_diverges_after_fork() {
    let base = user_builder(Dialect::Sqlite).where_("id", json!(1));
    let forked = base.copy().where_("email", json!("x@y.z"));
    let (base_sql, base_params) = base.build_select_sql();
    let (forked_sql, forked_params) = forked.build_select_sql();
    assert_eq!(base_params.len(), 1);
    assert_eq!(forked_params.len(), 2);
    assert!(forked_sql.contains("AND"));
    assert!(!base_sql.contains("AND"));
}

#[test]
fn test_filter_columns_convert_to_database_case() {
    let (sql, _) = user_builder(Dialect::MySql)
        .where_("firstName", json!("Ada"))
        .build_select_sql();
    assert!(sql.contains("`first_name`"));
    assert!(!sql.contains("firstName"));
}

#[test]
fn test_with_filtered_rejects_unknown_relation() {
    let err = user_builder(Dialect::MySql)
        .with_filtered("ghosts", |q| q)
        .unwrap_err();
    assert!(matches!(err, EngineError::Configuration(_)));
}
