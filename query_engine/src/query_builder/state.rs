//! Accumulated query state
//!
//! `QueryState` is the mutable accumulator owned by exactly one query
//! builder. `copy()` produces a deep-enough clone (fresh fragment strings
//! and params vector, shared descriptors) so two builders can diverge after
//! a common prefix. One state instance must never be mutated from two
//! logical callers at once.

use crate::dialect::Dialect;
use crate::model::{CaseConvention, Hook};
use crate::query_builder::ordering::SortOrder;
use crate::query_builder::pagination::Pagination;
use crate::query_builder::where_clause::{Operator, WhereClauseBuilder};
use serde_json::Value;

/// Per-relation query state: filters, ordering and paging applied to the
/// relation's own rows (per parent, never globally)
#[derive(Debug, Clone)]
pub struct RelationQuery {
    pub where_clause: WhereClauseBuilder,
    /// Model-cased columns of the related model
    pub order_by: Vec<(String, SortOrder)>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl RelationQuery {
    /// `database_case` is the related model's database convention so filter
    /// columns can be written in model casing
    pub fn new(dialect: Dialect, database_case: CaseConvention) -> Self {
        Self {
            where_clause: WhereClauseBuilder::nested(dialect).with_column_case(database_case),
            order_by: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    pub fn where_(mut self, column: &str, value: Value) -> Self {
        self.where_clause = self.where_clause.where_(column, value);
        self
    }

    pub fn where_op(mut self, column: &str, operator: Operator, value: Value) -> Self {
        self.where_clause = self.where_clause.where_op(column, operator, value);
        self
    }

    pub fn or_where(mut self, column: &str, value: Value) -> Self {
        self.where_clause = self.where_clause.or_where(column, value);
        self
    }

    pub fn order_by(mut self, column: &str, order: SortOrder) -> Self {
        self.order_by.push((column.to_string(), order));
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }
}

/// An eager-load request recorded on the parent query
#[derive(Debug, Clone)]
pub struct RelationRequest {
    pub name: String,
    pub query: Option<RelationQuery>,
}

#[derive(Debug, Clone)]
pub struct QueryState {
    /// Model-cased columns to select; empty means `*`
    pub selected_columns: Vec<String>,
    /// Raw SQL select expressions (aggregates, computed columns); their
    /// results land in the additional-columns bag
    pub raw_columns: Vec<String>,
    /// Pre-rendered JOIN fragment
    pub joins: String,
    pub where_clause: WhereClauseBuilder,
    /// Database-cased GROUP BY columns
    pub group_by: Vec<String>,
    /// Raw HAVING fragment plus its params
    pub having: Option<(String, Vec<Value>)>,
    pub order_by: Vec<(String, SortOrder)>,
    pub pagination: Pagination,
    pub relations: Vec<RelationRequest>,
    pub ignored_hooks: Vec<Hook>,
}

impl QueryState {
    pub fn new(dialect: Dialect, database_case: CaseConvention) -> Self {
        Self {
            selected_columns: Vec::new(),
            raw_columns: Vec::new(),
            joins: String::new(),
            where_clause: WhereClauseBuilder::new(dialect).with_column_case(database_case),
            group_by: Vec::new(),
            having: None,
            order_by: Vec::new(),
            pagination: Pagination::new(),
            relations: Vec::new(),
            ignored_hooks: Vec::new(),
        }
    }

    pub fn ignores(&self, hook: Hook) -> bool {
        self.ignored_hooks.contains(&hook)
    }

    /// Deep-enough clone: new params vector and fragments, shared nothing
    /// mutable with the original
    pub fn copy(&self) -> Self {
        self.clone()
    }
}
