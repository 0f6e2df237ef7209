//! Relation resolution engine
//!
//! Given already-fetched parent models and a relation request, issues one
//! dedicated batch query per relation (never one per parent row) and
//! stitches the results back onto the parents by key equality, translating
//! case conventions on both sides.
//!
//! Strategies per relation type:
//! - `belongs_to` / `has_one`: IN-filtered batch select plus an in-memory
//!   map keyed by the matching column.
//! - `has_many` with limit/offset: a single global LIMIT would cap the total
//!   row count, so the filtered rows are wrapped in
//!   `ROW_NUMBER() OVER (PARTITION BY fk ORDER BY ...)` and the rank is
//!   filtered in an outer select, giving per-parent paging in one statement.
//! - `many_to_many`: one outer query over the parent keys with a correlated
//!   JSON-aggregating subquery per parent; the relation's own filters,
//!   ordering and paging apply inside the subquery.

use crate::dialect::{Dialect, PLACEHOLDER};
use crate::driver::{execute_logged, Driver};
use crate::errors::EngineError;
use crate::model::{ModelDescriptor, ModelRegistry, RelationDescriptor, RelationKind};
use crate::query_builder::state::{RelationQuery, RelationRequest};
use crate::query_builder::where_clause::WhereClauseBuilder;
use crate::serializer::{self, SerializedModel};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};

/// Key used to carry the parent key through a many-to-many query
const PARENT_KEY_ALIAS: &str = "parent_key";
/// Rank column added by the has-many window wrapper, stripped before
/// materialization
const ROW_NUM_ALIAS: &str = "row_num";

/// Normalize a key value for map lookups so `1` and `"1"` compare equal
/// across drivers
fn key_token(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Every parent must carry a non-null value for the relation's key; any gap
/// is a fatal data error raised before SQL is issued.
fn collect_keys(
    models: &[SerializedModel],
    field: &str,
    relation: &str,
) -> Result<Vec<Value>, EngineError> {
    let mut keys = Vec::new();
    let mut seen = HashSet::new();
    let mut offenders = Vec::new();
    for model in models {
        match model.get(field) {
            Some(value) if !value.is_null() => {
                if seen.insert(key_token(value)) {
                    keys.push(value.clone());
                }
            }
            other => offenders.push(format!("{:?}", other)),
        }
    }
    if !offenders.is_empty() {
        let offenders = offenders.join(", ");
        tracing::error!(
            relation,
            key = field,
            %offenders,
            "cannot resolve relation: parent rows are missing key values"
        );
        return Err(EngineError::MissingRelationKey {
            relation: relation.to_string(),
            key: field.to_string(),
            offenders,
        });
    }
    Ok(keys)
}

fn order_sql(related: &ModelDescriptor, dialect: Dialect, query: Option<&RelationQuery>) -> String {
    let Some(query) = query else {
        return String::new();
    };
    if query.order_by.is_empty() {
        return String::new();
    }
    let items: Vec<String> = query
        .order_by
        .iter()
        .map(|(column, order)| {
            format!(
                "{} {}",
                dialect.templates().quote(&related.db_column(column)),
                order.to_sql()
            )
        })
        .collect();
    format!(" ORDER BY {}", items.join(", "))
}

/// IN-filter over `key_column` plus the relation's own where conditions
fn keyed_where(
    dialect: Dialect,
    key_column: &str,
    keys: Vec<Value>,
    query: Option<&RelationQuery>,
) -> (String, Vec<Value>) {
    let mut builder = WhereClauseBuilder::new(dialect).where_in(key_column, keys);
    if let Some(query) = query {
        if !query.where_clause.is_empty() {
            builder = builder.raw_and_where(query.where_clause.fragment(), query.where_clause.params().to_vec());
        }
    }
    builder.into_parts()
}

/// Plain batch select for belongs-to, has-one and unpaged has-many
pub(crate) fn build_batch_sql(
    related: &ModelDescriptor,
    dialect: Dialect,
    key_column: &str,
    keys: Vec<Value>,
    query: Option<&RelationQuery>,
) -> (String, Vec<Value>) {
    let (where_sql, params) = keyed_where(dialect, key_column, keys, query);
    let sql = format!(
        "SELECT * FROM {} {}{}",
        dialect.templates().quote(&related.table),
        where_sql,
        order_sql(related, dialect, query)
    );
    (sql, params)
}

/// Window-function wrapper giving per-parent LIMIT/OFFSET in one statement
pub(crate) fn build_windowed_has_many_sql(
    related: &ModelDescriptor,
    dialect: Dialect,
    fk_db_column: &str,
    keys: Vec<Value>,
    query: &RelationQuery,
) -> (String, Vec<Value>) {
    let templates = dialect.templates();
    let quoted_table = templates.quote(&related.table);
    let quoted_fk = templates.quote(fk_db_column);
    let (where_sql, params) = keyed_where(dialect, fk_db_column, keys, Some(query));

    // rank within each parent's group; identity order when none is requested
    let partition_order = {
        let rendered = order_sql(related, dialect, Some(query));
        if rendered.is_empty() {
            format!("ORDER BY {}", quoted_fk)
        } else {
            rendered.trim_start().to_string()
        }
    };

    let inner = format!(
        "SELECT {table}.*, ROW_NUMBER() OVER (PARTITION BY {fk} {order}) AS {rank} FROM {table} {where_sql}",
        table = quoted_table,
        fk = quoted_fk,
        order = partition_order,
        rank = ROW_NUM_ALIAS,
        where_sql = where_sql,
    );

    let offset = query.offset.unwrap_or(0);
    let mut outer_filter = format!("{} > {}", ROW_NUM_ALIAS, offset);
    if let Some(limit) = query.limit {
        outer_filter.push_str(&format!(" AND {} <= {}", ROW_NUM_ALIAS, offset + limit));
    }

    let sql = format!(
        "SELECT * FROM ({}) AS grouped_rows WHERE {}",
        inner, outer_filter
    );
    (sql, params)
}

/// Correlated JSON-aggregation query for many-to-many
pub(crate) fn build_many_to_many_sql(
    parent: &ModelDescriptor,
    related: &ModelDescriptor,
    relation: &RelationDescriptor,
    parent_fk_in_pivot: &str,
    dialect: Dialect,
    keys: Vec<Value>,
    query: Option<&RelationQuery>,
) -> Result<(String, Vec<Value>), EngineError> {
    let templates = dialect.templates();
    let pivot = relation
        .through
        .as_deref()
        .ok_or_else(|| EngineError::Configuration(format!(
            "Many-to-many relation '{}' declares no pivot table",
            relation.name
        )))?;

    let pairs: Vec<(String, String)> = related
        .columns
        .iter()
        .filter(|column| !column.hidden)
        .map(|column| {
            (
                column.name.clone(),
                format!("t.{}", templates.quote(&related.db_column(&column.name))),
            )
        })
        .collect();
    if pairs.is_empty() {
        return Err(EngineError::Configuration(format!(
            "Many-to-many relation '{}' requires declared columns on model '{}'",
            relation.name, related.name
        )));
    }

    let parent_pk_db = parent.db_column(parent.require_primary_key()?);
    let related_pk_db = related.db_column(related.require_primary_key()?);
    let quoted_parent_table = templates.quote(&parent.table);
    let quoted_related_table = templates.quote(&related.table);
    let quoted_pivot = templates.quote(pivot);

    let mut inner = format!(
        "SELECT {related_table}.* FROM {pivot} JOIN {related_table} ON {related_table}.{related_pk} = {pivot}.{related_fk} WHERE {pivot}.{parent_fk} = {parent_table}.{parent_pk}",
        related_table = quoted_related_table,
        pivot = quoted_pivot,
        related_pk = templates.quote(&related_pk_db),
        related_fk = templates.quote(&relation.foreign_key),
        parent_fk = templates.quote(parent_fk_in_pivot),
        parent_table = quoted_parent_table,
        parent_pk = templates.quote(&parent_pk_db),
    );

    let mut params = Vec::new();
    if let Some(query) = query {
        if !query.where_clause.is_empty() {
            inner.push_str(&format!(" AND {}", query.where_clause.fragment()));
            params.extend(query.where_clause.params().to_vec());
        }
        inner.push_str(&order_sql(related, dialect, Some(query)));
        if let Some(limit) = query.limit {
            inner.push_str(&format!(" LIMIT {}", limit));
        }
        if let Some(offset) = query.offset {
            inner.push_str(&format!(" OFFSET {}", offset));
        }
    }

    let aggregate = templates.json_array_agg(&templates.json_object(&pairs));
    let in_tokens = vec![PLACEHOLDER; keys.len()].join(", ");
    let sql = format!(
        "SELECT {parent_table}.{parent_pk} AS {alias}, (SELECT {aggregate} FROM ({inner}) AS t) AS {relation} FROM {parent_table} WHERE {parent_table}.{parent_pk} IN ({in_tokens})",
        parent_table = quoted_parent_table,
        parent_pk = templates.quote(&parent_pk_db),
        alias = PARENT_KEY_ALIAS,
        aggregate = aggregate,
        inner = inner,
        relation = templates.quote(&relation.name),
        in_tokens = in_tokens,
    );
    // subquery params precede the IN keys in the final text, so they bind
    // first
    params.extend(keys);
    Ok((sql, params))
}

fn attach_scalar(
    models: &mut [SerializedModel],
    relation_name: &str,
    parent_field: &str,
    by_key: HashMap<String, Value>,
) {
    for model in models.iter_mut() {
        // keys are deduped before the fetch, so one related row may serve
        // several parents
        let value = model
            .get(parent_field)
            .map(key_token)
            .and_then(|token| by_key.get(&token).cloned());
        model
            .relations
            .insert(relation_name.to_string(), value.unwrap_or(Value::Null));
    }
}

/// Resolve one requested relation for a batch of parent models
pub async fn resolve(
    parent: &ModelDescriptor,
    request: &RelationRequest,
    models: &mut [SerializedModel],
    registry: &ModelRegistry,
    driver: &dyn Driver,
    dialect: Dialect,
) -> Result<(), EngineError> {
    let relation = parent.relation(&request.name).ok_or_else(|| {
        EngineError::Configuration(format!(
            "Model '{}' declares no relation named '{}'",
            parent.name, request.name
        ))
    })?;
    let related = registry.get(&relation.related_model)?;

    // the key the parents must carry: their own FK for belongs-to, their PK
    // for everything else
    let parent_field = match relation.kind {
        RelationKind::BelongsTo => relation.foreign_key.clone(),
        _ => parent.require_primary_key()?.to_string(),
    };
    let keys = collect_keys(models, &parent_field, &relation.name)?;
    if keys.is_empty() {
        // nothing to fetch; the serializer's defaults already hold
        return Ok(());
    }
    let query = request.query.as_ref();

    match relation.kind {
        RelationKind::BelongsTo => {
            let related_pk = related.require_primary_key()?.to_string();
            let (sql, params) =
                build_batch_sql(&related, dialect, &related.db_column(&related_pk), keys, query);
            let rows = execute_logged(driver, dialect, &sql, &params).await?;
            let fetched = serializer::serialize_rows(&related, rows)?;
            let by_key = fetched
                .into_iter()
                .filter_map(|m| m.get(&related_pk).map(|v| (key_token(v), m.to_value())))
                .collect();
            attach_scalar(models, &relation.name, &parent_field, by_key);
        }
        RelationKind::HasOne => {
            let fk_field = relation.foreign_key.clone();
            let (sql, params) =
                build_batch_sql(&related, dialect, &related.db_column(&fk_field), keys, query);
            let rows = execute_logged(driver, dialect, &sql, &params).await?;
            let fetched = serializer::serialize_rows(&related, rows)?;
            let by_key = fetched
                .into_iter()
                .filter_map(|m| m.get(&fk_field).map(|v| (key_token(v), m.to_value())))
                .collect();
            attach_scalar(models, &relation.name, &parent_field, by_key);
        }
        RelationKind::HasMany => {
            let fk_field = relation.foreign_key.clone();
            let fk_db = related.db_column(&fk_field);
            let windowed = query.filter(|q| q.limit.is_some() || q.offset.is_some());
            let paged = windowed.is_some();
            let (sql, params) = match windowed {
                Some(q) => build_windowed_has_many_sql(&related, dialect, &fk_db, keys, q),
                None => build_batch_sql(&related, dialect, &fk_db, keys, query),
            };
            let mut rows = execute_logged(driver, dialect, &sql, &params).await?;
            if paged {
                for row in rows.iter_mut() {
                    row.remove(ROW_NUM_ALIAS);
                }
            }
            let fetched = serializer::serialize_rows(&related, rows)?;
            let mut grouped: HashMap<String, Vec<Value>> = HashMap::new();
            for model in fetched {
                if let Some(fk_value) = model.get(&fk_field) {
                    grouped
                        .entry(key_token(fk_value))
                        .or_default()
                        .push(model.to_value());
                }
            }
            for model in models.iter_mut() {
                let value = model
                    .get(&parent_field)
                    .map(key_token)
                    .and_then(|token| grouped.remove(&token))
                    .map(Value::Array)
                    .unwrap_or_else(|| json!([]));
                model.relations.insert(relation.name.clone(), value);
            }
        }
        RelationKind::ManyToMany => {
            // the reciprocal declaration on the related model supplies the
            // pivot column pointing back at this side
            let reciprocal = related
                .relations
                .iter()
                .find(|r| {
                    r.kind == RelationKind::ManyToMany
                        && r.related_model == parent.name
                        && r.through == relation.through
                })
                .ok_or_else(|| EngineError::MissingReciprocalRelation {
                    relation: relation.name.clone(),
                    through: relation.through.clone().unwrap_or_default(),
                })?;
            let (sql, params) = build_many_to_many_sql(
                parent,
                &related,
                relation,
                &reciprocal.foreign_key,
                dialect,
                keys,
                query,
            )?;
            let rows = execute_logged(driver, dialect, &sql, &params).await?;
            let mut by_key: HashMap<String, Value> = HashMap::new();
            for row in rows {
                let Some(parent_key) = row.get(PARENT_KEY_ALIAS) else {
                    continue;
                };
                let aggregate = row.get(&relation.name).cloned().unwrap_or(Value::Null);
                by_key.insert(key_token(parent_key), parse_aggregate(&related, aggregate)?);
            }
            for model in models.iter_mut() {
                let value = model
                    .get(&parent_field)
                    .map(key_token)
                    .and_then(|token| by_key.remove(&token))
                    .unwrap_or_else(|| json!([]));
                model.relations.insert(relation.name.clone(), value);
            }
        }
    }
    Ok(())
}

/// Drivers without native JSON decoding hand the aggregate back as a string;
/// parse it, then run the related model's serialize hooks over each element.
fn parse_aggregate(related: &ModelDescriptor, aggregate: Value) -> Result<Value, EngineError> {
    let parsed = match aggregate {
        Value::String(s) => serde_json::from_str(&s)?,
        Value::Null => json!([]),
        other => other,
    };
    let Value::Array(items) = parsed else {
        return Ok(json!([]));
    };
    let items = items
        .into_iter()
        .map(|item| apply_serialize_hooks(related, item))
        .collect();
    Ok(Value::Array(items))
}

fn apply_serialize_hooks(related: &ModelDescriptor, item: Value) -> Value {
    let Value::Object(mut fields) = item else {
        return item;
    };
    for column in &related.columns {
        if let Some(serialize) = &column.serialize {
            if let Some(value) = fields.remove(&column.name) {
                fields.insert(column.name.clone(), serialize(value));
            }
        }
    }
    Value::Object(fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query_builder::SortOrder;

    fn orders() -> ModelDescriptor {
        ModelDescriptor::new("Order", "orders")
            .primary_key("id")
            .columns(&["id", "userId", "total"])
    }

    fn roles() -> ModelDescriptor {
        ModelDescriptor::new("Role", "roles")
            .primary_key("id")
            .columns(&["id", "name"])
    }

    fn users_with_roles() -> ModelDescriptor {
        ModelDescriptor::new("User", "users")
            .primary_key("id")
            .columns(&["id", "firstName"])
            .many_to_many("roles", "Role", "user_roles", "role_id")
    }

    #[test]
    fn test_batch_sql_filters_on_keys() {
        let (sql, params) = build_batch_sql(
            &orders(),
            Dialect::MySql,
            "user_id",
            vec![json!(1), json!(2)],
            None,
        );
        assert_eq!(
            sql,
            "SELECT * FROM `orders` WHERE `user_id` IN (PLACEHOLDER, PLACEHOLDER)"
        );
        assert_eq!(params, vec![json!(1), json!(2)]);
    }

    #[test]
    fn test_batch_sql_merges_relation_filters_and_order() {
        let query = RelationQuery::new(Dialect::Postgres, crate::model::CaseConvention::Snake)
            .where_("total", json!(10))
            .order_by("total", SortOrder::Desc);
        let (sql, params) = build_batch_sql(
            &orders(),
            Dialect::Postgres,
            "user_id",
            vec![json!(1)],
            Some(&query),
        );
        assert_eq!(
            sql,
            "SELECT * FROM \"orders\" WHERE \"user_id\" IN (PLACEHOLDER) AND \"total\" = PLACEHOLDER ORDER BY \"total\" DESC"
        );
        assert_eq!(params, vec![json!(1), json!(10)]);
    }

    #[test]
    fn test_windowed_sql_pages_per_parent() {
        let query = RelationQuery::new(Dialect::Postgres, crate::model::CaseConvention::Snake)
            .limit(2)
            .offset(1);
        let (sql, _) = build_windowed_has_many_sql(
            &orders(),
            Dialect::Postgres,
            "user_id",
            vec![json!(1), json!(2)],
            &query,
        );
        assert!(sql.starts_with("SELECT * FROM (SELECT \"orders\".*, ROW_NUMBER() OVER (PARTITION BY \"user_id\" ORDER BY \"user_id\") AS row_num FROM \"orders\""));
        assert!(sql.ends_with("AS grouped_rows WHERE row_num > 1 AND row_num <= 3"));
    }

    #[test]
    fn test_windowed_sql_without_limit_has_open_upper_bound() {
        let query = RelationQuery::new(Dialect::MySql, crate::model::CaseConvention::Snake)
            .offset(5);
        let (sql, _) = build_windowed_has_many_sql(
            &orders(),
            Dialect::MySql,
            "user_id",
            vec![json!(1)],
            &query,
        );
        assert!(sql.ends_with("WHERE row_num > 5"));
        assert!(!sql.contains("<="));
    }

    #[test]
    fn test_many_to_many_sql_shape_and_param_order() {
        let parent = users_with_roles();
        let related = roles();
        let relation = parent.relation("roles").unwrap();
        let query = RelationQuery::new(Dialect::MySql, crate::model::CaseConvention::Snake)
            .where_("name", json!("admin"));
        let (sql, params) = build_many_to_many_sql(
            &parent,
            &related,
            relation,
            "user_id",
            Dialect::MySql,
            vec![json!(1), json!(2)],
            Some(&query),
        )
        .unwrap();
        assert!(sql.starts_with("SELECT `users`.`id` AS parent_key, (SELECT COALESCE(JSON_ARRAYAGG(JSON_OBJECT('id', t.`id`, 'name', t.`name`)), JSON_ARRAY())"));
        assert!(sql.contains(
            "FROM `user_roles` JOIN `roles` ON `roles`.`id` = `user_roles`.`role_id` WHERE `user_roles`.`user_id` = `users`.`id` AND `name` = PLACEHOLDER"
        ));
        assert!(sql.ends_with("WHERE `users`.`id` IN (PLACEHOLDER, PLACEHOLDER)"));
        // subquery params bind before the outer IN keys
        assert_eq!(params, vec![json!("admin"), json!(1), json!(2)]);
    }

    #[test]
    fn test_many_to_many_requires_declared_columns() {
        let parent = users_with_roles();
        let related = ModelDescriptor::new("Role", "roles").primary_key("id");
        let relation = parent.relation("roles").unwrap();
        let err = build_many_to_many_sql(
            &parent,
            &related,
            relation,
            "user_id",
            Dialect::MySql,
            vec![json!(1)],
            None,
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::Configuration(_)));
    }

    #[test]
    fn test_key_collection_dedupes_and_rejects_gaps() {
        let descriptor = orders();
        let rows = vec![
            crate::driver::Row::from_iter([("id".to_string(), json!(1)), ("user_id".to_string(), json!(7))]),
            crate::driver::Row::from_iter([("id".to_string(), json!(2)), ("user_id".to_string(), json!(7))]),
        ];
        let models = serializer::serialize_rows(&descriptor, rows).unwrap();
        let keys = collect_keys(&models, "userId", "orders").unwrap();
        assert_eq!(keys, vec![json!(7)]);

        let rows = vec![crate::driver::Row::from_iter([("id".to_string(), json!(3))])];
        let models = serializer::serialize_rows(&descriptor, rows).unwrap();
        assert!(matches!(
            collect_keys(&models, "userId", "orders"),
            Err(EngineError::MissingRelationKey { .. })
        ));
    }

    #[test]
    fn test_key_tokens_compare_across_value_kinds() {
        assert_eq!(key_token(&json!(1)), key_token(&json!("1")));
        assert_ne!(key_token(&json!(1)), key_token(&json!(2)));
    }
}
