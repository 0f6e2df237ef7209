//! Fluent query builder
//!
//! One builder per statement: chainable methods accumulate state, a terminal
//! method compiles the SQL, executes it through the model's driver and
//! materializes the rows. Filter columns are written in the model's own case
//! convention; the where engine converts and quotes them. Values always bind
//! as parameters, identifiers are always quoted, so user input never lands in
//! SQL text.

use crate::dialect::{statements, Dialect};
use crate::driver::{execute_logged, execute_update_logged, Driver, Row};
use crate::errors::EngineError;
use crate::model::{Hook, ModelDescriptor, ModelRegistry, Record};
use crate::query_builder::ordering::SortOrder;
use crate::query_builder::pagination::{get_pagination_metadata, Pagination, PaginationMetadata};
use crate::query_builder::state::{QueryState, RelationQuery, RelationRequest};
use crate::query_builder::where_clause::{Operator, WhereClauseBuilder};
use crate::relations;
use crate::serializer::{self, SerializedModel};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Paged fetch result: the page's rows plus the page arithmetic
#[derive(Debug, Clone)]
pub struct PaginatedResult {
    pub data: Vec<SerializedModel>,
    pub metadata: PaginationMetadata,
}

pub struct QueryBuilder {
    descriptor: Arc<ModelDescriptor>,
    registry: Arc<ModelRegistry>,
    driver: Arc<dyn Driver>,
    dialect: Dialect,
    state: QueryState,
}

// Manual impl: the driver is a trait object
impl fmt::Debug for QueryBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryBuilder")
            .field("model", &self.descriptor.name)
            .field("dialect", &self.dialect)
            .field("state", &self.state)
            .finish()
    }
}

impl QueryBuilder {
    pub fn new(
        descriptor: Arc<ModelDescriptor>,
        registry: Arc<ModelRegistry>,
        driver: Arc<dyn Driver>,
    ) -> Self {
        let dialect = driver.dialect();
        let state = QueryState::new(dialect, descriptor.database_case.clone());
        Self {
            descriptor,
            registry,
            driver,
            dialect,
            state,
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Fork the builder: both copies share descriptors but accumulate state
    /// independently from here on
    pub fn copy(&self) -> Self {
        Self {
            descriptor: Arc::clone(&self.descriptor),
            registry: Arc::clone(&self.registry),
            driver: Arc::clone(&self.driver),
            dialect: self.dialect,
            state: self.state.copy(),
        }
    }

    // ---- projection ----

    /// Restrict the projection to these model-cased columns
    pub fn select(mut self, columns: &[&str]) -> Self {
        self.state
            .selected_columns
            .extend(columns.iter().map(|c| c.to_string()));
        self
    }

    /// Add a raw select expression; its result lands in the
    /// additional-columns bag during materialization
    pub fn select_raw(mut self, expr: &str) -> Self {
        self.state.raw_columns.push(expr.to_string());
        self
    }

    /// Append a pre-rendered JOIN fragment
    pub fn join_raw(mut self, sql: &str) -> Self {
        if !self.state.joins.is_empty() {
            self.state.joins.push(' ');
        }
        self.state.joins.push_str(sql);
        self
    }

    // ---- filters, delegated to the where engine ----

    pub fn where_(mut self, column: &str, value: Value) -> Self {
        self.state.where_clause = self.state.where_clause.where_(column, value);
        self
    }

    pub fn where_op(mut self, column: &str, operator: Operator, value: Value) -> Self {
        self.state.where_clause = self.state.where_clause.where_op(column, operator, value);
        self
    }

    pub fn or_where(mut self, column: &str, value: Value) -> Self {
        self.state.where_clause = self.state.where_clause.or_where(column, value);
        self
    }

    pub fn or_where_op(mut self, column: &str, operator: Operator, value: Value) -> Self {
        self.state.where_clause = self.state.where_clause.or_where_op(column, operator, value);
        self
    }

    pub fn where_in(mut self, column: &str, values: Vec<Value>) -> Self {
        self.state.where_clause = self.state.where_clause.where_in(column, values);
        self
    }

    pub fn where_not_in(mut self, column: &str, values: Vec<Value>) -> Self {
        self.state.where_clause = self.state.where_clause.where_not_in(column, values);
        self
    }

    pub fn or_where_in(mut self, column: &str, values: Vec<Value>) -> Self {
        self.state.where_clause = self.state.where_clause.or_where_in(column, values);
        self
    }

    pub fn where_between(mut self, column: &str, low: Value, high: Value) -> Self {
        self.state.where_clause = self.state.where_clause.where_between(column, low, high);
        self
    }

    pub fn where_not_between(mut self, column: &str, low: Value, high: Value) -> Self {
        self.state.where_clause = self.state.where_clause.where_not_between(column, low, high);
        self
    }

    pub fn where_null(mut self, column: &str) -> Self {
        self.state.where_clause = self.state.where_clause.where_null(column);
        self
    }

    pub fn where_not_null(mut self, column: &str) -> Self {
        self.state.where_clause = self.state.where_clause.where_not_null(column);
        self
    }

    pub fn or_where_null(mut self, column: &str) -> Self {
        self.state.where_clause = self.state.where_clause.or_where_null(column);
        self
    }

    pub fn where_regexp(mut self, column: &str, pattern: &str) -> Result<Self, EngineError> {
        self.state.where_clause = self.state.where_clause.where_regexp(column, pattern)?;
        Ok(self)
    }

    pub fn raw_where(mut self, sql: &str, params: Vec<Value>) -> Self {
        self.state.where_clause = self.state.where_clause.raw_where(sql, params);
        self
    }

    pub fn or_raw_where(mut self, sql: &str, params: Vec<Value>) -> Self {
        self.state.where_clause = self.state.where_clause.raw_or_where(sql, params);
        self
    }

    /// Parenthesized condition group combined with `AND`
    pub fn where_builder<F>(mut self, f: F) -> Self
    where
        F: FnOnce(WhereClauseBuilder) -> WhereClauseBuilder,
    {
        self.state.where_clause = self.state.where_clause.where_builder(f);
        self
    }

    /// Parenthesized condition group combined with `OR`
    pub fn or_where_builder<F>(mut self, f: F) -> Self
    where
        F: FnOnce(WhereClauseBuilder) -> WhereClauseBuilder,
    {
        self.state.where_clause = self.state.where_clause.or_where_builder(f);
        self
    }

    // ---- grouping, ordering, paging ----

    pub fn group_by(mut self, column: &str) -> Self {
        self.state.group_by.push(self.descriptor.db_column(column));
        self
    }

    /// Raw HAVING fragment; may carry its own placeholder tokens
    pub fn having_raw(mut self, sql: &str, params: Vec<Value>) -> Self {
        self.state.having = Some((sql.to_string(), params));
        self
    }

    pub fn order_by(mut self, column: &str, order: SortOrder) -> Self {
        self.state.order_by.push((column.to_string(), order));
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.state.pagination.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.state.pagination.offset = Some(offset);
        self
    }

    // ---- relations and hooks ----

    /// Eager-load a declared relation with no extra filtering
    pub fn with(mut self, relation: &str) -> Self {
        self.state.relations.push(RelationRequest {
            name: relation.to_string(),
            query: None,
        });
        self
    }

    /// Eager-load a declared relation with its own filters, ordering and
    /// per-parent paging
    pub fn with_filtered<F>(mut self, relation: &str, f: F) -> Result<Self, EngineError>
    where
        F: FnOnce(RelationQuery) -> RelationQuery,
    {
        let descriptor = self.descriptor.relation(relation).ok_or_else(|| {
            EngineError::Configuration(format!(
                "Model '{}' declares no relation named '{}'",
                self.descriptor.name, relation
            ))
        })?;
        let related = self.registry.get(&descriptor.related_model)?;
        let query = f(RelationQuery::new(self.dialect, related.database_case.clone()));
        self.state.relations.push(RelationRequest {
            name: relation.to_string(),
            query: Some(query),
        });
        Ok(self)
    }

    /// Skip the named hook points for this query only
    pub fn ignore_hooks(mut self, hooks: &[Hook]) -> Self {
        self.state.ignored_hooks.extend_from_slice(hooks);
        self
    }

    // ---- compilation ----

    pub(crate) fn build_select_sql(&self) -> (String, Vec<Value>) {
        let templates = self.dialect.templates();
        let mut sql = statements::select_columns(
            &self.descriptor,
            self.dialect,
            &self.state.selected_columns,
            &self.state.raw_columns,
        );
        let mut params = Vec::new();
        if !self.state.joins.is_empty() {
            sql.push(' ');
            sql.push_str(&self.state.joins);
        }
        if !self.state.where_clause.is_empty() {
            sql.push(' ');
            sql.push_str(self.state.where_clause.fragment());
            params.extend(self.state.where_clause.params().iter().cloned());
        }
        if !self.state.group_by.is_empty() {
            let columns: Vec<String> = self
                .state
                .group_by
                .iter()
                .map(|c| templates.quote(c))
                .collect();
            sql.push_str(&format!(" GROUP BY {}", columns.join(", ")));
        }
        if let Some((having, having_params)) = &self.state.having {
            sql.push_str(&format!(" HAVING {}", having));
            params.extend(having_params.iter().cloned());
        }
        if !self.state.order_by.is_empty() {
            let columns: Vec<String> = self
                .state
                .order_by
                .iter()
                .map(|(column, order)| {
                    format!(
                        "{} {}",
                        templates.quote(&self.descriptor.db_column(column)),
                        order.to_sql()
                    )
                })
                .collect();
            sql.push_str(&format!(" ORDER BY {}", columns.join(", ")));
        }
        let paging = self.state.pagination.to_sql();
        if !paging.is_empty() {
            sql.push(' ');
            sql.push_str(&paging);
        }
        (sql, params)
    }

    /// Aggregate statement reusing the filter and join state but none of the
    /// projection, grouping or paging
    fn build_aggregate_sql(&self, head: String) -> (String, Vec<Value>) {
        let mut sql = head;
        let mut params = Vec::new();
        if !self.state.joins.is_empty() {
            sql.push(' ');
            sql.push_str(&self.state.joins);
        }
        if !self.state.where_clause.is_empty() {
            sql.push(' ');
            sql.push_str(self.state.where_clause.fragment());
            params.extend(self.state.where_clause.params().iter().cloned());
        }
        (sql, params)
    }

    fn run_before_fetch(&mut self) {
        if self.state.ignores(Hook::BeforeFetch) {
            return;
        }
        if let Some(hook) = &self.descriptor.hooks.before_fetch {
            hook(&mut self.state);
        }
    }

    async fn fetch_models(&mut self) -> Result<Vec<SerializedModel>, EngineError> {
        let (sql, params) = self.build_select_sql();
        let rows = execute_logged(self.driver.as_ref(), self.dialect, &sql, &params).await?;
        let mut models = serializer::serialize_rows(&self.descriptor, rows)?;
        if !models.is_empty() {
            let requests = std::mem::take(&mut self.state.relations);
            for request in &requests {
                relations::resolve(
                    &self.descriptor,
                    request,
                    &mut models,
                    &self.registry,
                    self.driver.as_ref(),
                    self.dialect,
                )
                .await?;
            }
        }
        if !self.state.ignores(Hook::AfterFetch) {
            if let Some(hook) = &self.descriptor.hooks.after_fetch {
                models = hook(models);
            }
        }
        Ok(models)
    }

    // ---- terminal operations ----

    /// Fetch every matching row
    pub async fn many(mut self) -> Result<Vec<SerializedModel>, EngineError> {
        self.run_before_fetch();
        self.fetch_models().await
    }

    /// Fetch the first matching row, if any
    pub async fn one(mut self) -> Result<Option<SerializedModel>, EngineError> {
        self.run_before_fetch();
        self.state.pagination.limit = Some(1);
        let mut models = self.fetch_models().await?;
        if models.is_empty() {
            Ok(None)
        } else {
            Ok(Some(models.remove(0)))
        }
    }

    /// Fetch the first matching row or fail with a not-found error
    pub async fn one_or_fail(self) -> Result<SerializedModel, EngineError> {
        let model = self.descriptor.name.clone();
        self.one().await?.ok_or(EngineError::NotFound { model })
    }

    /// Like [`one_or_fail`](Self::one_or_fail) but with a caller-supplied
    /// error for the empty case
    pub async fn one_or_fail_with<F>(self, make_error: F) -> Result<SerializedModel, EngineError>
    where
        F: FnOnce() -> EngineError,
    {
        match self.one().await? {
            Some(model) => Ok(model),
            None => Err(make_error()),
        }
    }

    /// `COUNT(*)` over the current filters
    pub async fn count(mut self) -> Result<u64, EngineError> {
        self.run_before_fetch();
        let (sql, params) =
            self.build_aggregate_sql(statements::count_from(&self.descriptor, self.dialect));
        let rows = execute_logged(self.driver.as_ref(), self.dialect, &sql, &params).await?;
        Ok(scalar_total(&rows).and_then(|v| v.as_u64()).unwrap_or(0))
    }

    /// `SUM(column)` over the current filters; `null` when no rows match
    pub async fn sum(mut self, column: &str) -> Result<Value, EngineError> {
        self.run_before_fetch();
        let (sql, params) = self.build_aggregate_sql(statements::sum_from(
            &self.descriptor,
            self.dialect,
            column,
        ));
        let rows = execute_logged(self.driver.as_ref(), self.dialect, &sql, &params).await?;
        Ok(scalar_total(&rows).unwrap_or(Value::Null))
    }

    /// Count matching rows, then fetch one page of them
    pub async fn paginate(mut self, page: u64, per_page: u64) -> Result<PaginatedResult, EngineError> {
        self.run_before_fetch();
        let (sql, params) =
            self.build_aggregate_sql(statements::count_from(&self.descriptor, self.dialect));
        let rows = execute_logged(self.driver.as_ref(), self.dialect, &sql, &params).await?;
        let total = scalar_total(&rows).and_then(|v| v.as_u64()).unwrap_or(0);

        let page = page.max(1);
        let per_page = per_page.max(1);
        self.state.pagination = Pagination::new()
            .with_limit(per_page)
            .with_offset((page - 1) * per_page);
        let data = self.fetch_models().await?;
        Ok(PaginatedResult {
            data,
            metadata: get_pagination_metadata(page, per_page, total),
        })
    }

    /// Update matching rows from a model-cased record; returns the affected
    /// count. The additional-columns bag never reaches the SET list.
    pub async fn update(mut self, record: &Record) -> Result<u64, EngineError> {
        if !self.state.ignores(Hook::BeforeUpdate) {
            if let Some(hook) = &self.descriptor.hooks.before_update {
                hook(&mut self.state);
            }
        }
        let (mut sql, mut params) =
            statements::update_set(&self.descriptor, self.dialect, record);
        if !self.state.where_clause.is_empty() {
            sql.push(' ');
            sql.push_str(self.state.where_clause.fragment());
            params.extend(self.state.where_clause.params().iter().cloned());
        }
        execute_update_logged(self.driver.as_ref(), self.dialect, &sql, &params).await
    }

    /// Delete matching rows; returns the affected count
    pub async fn delete(mut self) -> Result<u64, EngineError> {
        if !self.state.ignores(Hook::BeforeDelete) {
            if let Some(hook) = &self.descriptor.hooks.before_delete {
                hook(&mut self.state);
            }
        }
        let (mut sql, mut params) = (
            statements::delete_from(&self.descriptor, self.dialect),
            Vec::new(),
        );
        if !self.state.where_clause.is_empty() {
            sql.push(' ');
            sql.push_str(self.state.where_clause.fragment());
            params.extend(self.state.where_clause.params().iter().cloned());
        }
        execute_update_logged(self.driver.as_ref(), self.dialect, &sql, &params).await
    }
}

/// Aggregate queries alias their result as `total`; drivers may hand it back
/// as a number or as text
fn scalar_total(rows: &[Row]) -> Option<Value> {
    let value = rows.first()?.get("total")?;
    match value {
        Value::Null => None,
        Value::String(s) => s
            .parse::<i64>()
            .map(Value::from)
            .or_else(|_| s.parse::<f64>().map(Value::from))
            .ok(),
        other => Some(other.clone()),
    }
}
