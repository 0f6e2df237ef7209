//! Where clause engine
//!
//! Composes WHERE fragments and their parameter list. A builder has two
//! effective states: empty (the next condition writes the leading `WHERE`,
//! or nothing at all for nested builders) and has-condition (the next
//! condition writes its boolean connective). Parameters are kept 1:1 and in
//! the same left-to-right order as their `PLACEHOLDER` tokens, which is what
//! lets positional dialects bind correctly after any amount of nesting.

use crate::dialect::{Dialect, PLACEHOLDER};
use crate::errors::EngineError;
use crate::model::CaseConvention;
use serde_json::Value;

/// Comparison operators accepted by the `where_op` family.
///
/// Regex matching is a separate, fallible method because sqlite has no
/// native operator for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
    ILike,
    NotLike,
    NotILike,
}

impl Operator {
    pub fn parse(op: &str) -> Result<Self, EngineError> {
        match op {
            "=" => Ok(Self::Eq),
            "!=" | "<>" => Ok(Self::Ne),
            ">" => Ok(Self::Gt),
            ">=" => Ok(Self::Gte),
            "<" => Ok(Self::Lt),
            "<=" => Ok(Self::Lte),
            "LIKE" | "like" => Ok(Self::Like),
            "ILIKE" | "ilike" => Ok(Self::ILike),
            "NOT LIKE" | "not like" => Ok(Self::NotLike),
            "NOT ILIKE" | "not ilike" => Ok(Self::NotILike),
            other => Err(EngineError::Configuration(format!(
                "Unknown where operator '{}'",
                other
            ))),
        }
    }

    fn sql(&self, dialect: Dialect) -> &'static str {
        let templates = dialect.templates();
        match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Like => "LIKE",
            Self::ILike => templates.ilike_operator(),
            Self::NotLike => "NOT LIKE",
            Self::NotILike => templates.not_ilike_operator(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Connective {
    And,
    Or,
}

impl Connective {
    fn sql(&self) -> &'static str {
        match self {
            Self::And => " AND ",
            Self::Or => " OR ",
        }
    }
}

#[derive(Debug, Clone)]
pub struct WhereClauseBuilder {
    dialect: Dialect,
    column_case: CaseConvention,
    fragment: String,
    params: Vec<Value>,
    condition_count: usize,
    nested: bool,
}

impl WhereClauseBuilder {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            column_case: CaseConvention::None,
            fragment: String::new(),
            params: Vec::new(),
            condition_count: 0,
            nested: false,
        }
    }

    /// A builder whose fragment will be embedded by a caller: the leading
    /// `WHERE` keyword is omitted so the caller can parenthesize and splice
    pub fn nested(dialect: Dialect) -> Self {
        Self {
            nested: true,
            ..Self::new(dialect)
        }
    }

    /// Convert column names through `case` (the model's database convention)
    /// before quoting; nested group builders inherit it
    pub fn with_column_case(mut self, case: CaseConvention) -> Self {
        self.column_case = case;
        self
    }

    fn column_sql(&self, column: &str) -> String {
        let converted = column
            .split('.')
            .map(|part| self.column_case.apply(part))
            .collect::<Vec<_>>()
            .join(".");
        self.dialect.quote_path(&converted)
    }

    pub fn is_empty(&self) -> bool {
        self.condition_count == 0
    }

    pub fn fragment(&self) -> &str {
        &self.fragment
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    pub fn into_parts(self) -> (String, Vec<Value>) {
        (self.fragment, self.params)
    }

    fn write_connective(&mut self, connective: Connective) {
        if self.condition_count == 0 {
            if !self.nested {
                self.fragment.push_str("WHERE ");
            }
        } else {
            self.fragment.push_str(connective.sql());
        }
        self.condition_count += 1;
    }

    fn push_comparison(
        mut self,
        connective: Connective,
        column: &str,
        operator: Operator,
        value: Value,
    ) -> Self {
        self.write_connective(connective);
        let templates = self.dialect.templates();
        let column_sql = self.column_sql(column);
        match value {
            // equality against NULL means a null check, as in ordinary SQL
            // usage of the fluent API
            Value::Null if operator == Operator::Eq => {
                self.fragment.push_str(&format!("{} IS NULL", column_sql));
            }
            Value::Null if operator == Operator::Ne => {
                self.fragment
                    .push_str(&format!("{} IS NOT NULL", column_sql));
            }
            // non-null objects compare through the dialect's JSON functions
            // and bind as encoded JSON text
            Value::Object(_) => {
                self.fragment.push_str(&format!(
                    "{} {} {}",
                    templates.json_column(&column_sql),
                    operator.sql(self.dialect),
                    templates.json_placeholder()
                ));
                self.params.push(Value::String(value.to_string()));
            }
            other => {
                self.fragment.push_str(&format!(
                    "{} {} {}",
                    column_sql,
                    operator.sql(self.dialect),
                    PLACEHOLDER
                ));
                self.params.push(other);
            }
        }
        self
    }

    /// `column = value` (first call writes `WHERE`, later calls `AND`)
    pub fn where_(self, column: &str, value: Value) -> Self {
        self.push_comparison(Connective::And, column, Operator::Eq, value)
    }

    pub fn where_op(self, column: &str, operator: Operator, value: Value) -> Self {
        self.push_comparison(Connective::And, column, operator, value)
    }

    pub fn and_where(self, column: &str, value: Value) -> Self {
        self.push_comparison(Connective::And, column, Operator::Eq, value)
    }

    pub fn and_where_op(self, column: &str, operator: Operator, value: Value) -> Self {
        self.push_comparison(Connective::And, column, operator, value)
    }

    pub fn or_where(self, column: &str, value: Value) -> Self {
        self.push_comparison(Connective::Or, column, Operator::Eq, value)
    }

    pub fn or_where_op(self, column: &str, operator: Operator, value: Value) -> Self {
        self.push_comparison(Connective::Or, column, operator, value)
    }

    fn push_in(mut self, connective: Connective, column: &str, negated: bool, values: Vec<Value>) -> Self {
        self.write_connective(connective);
        let column_sql = self.column_sql(column);
        if values.is_empty() {
            // empty IN can never match; empty NOT IN always does
            self.fragment
                .push_str(if negated { "1=1" } else { "1=0" });
            return self;
        }
        let tokens = vec![PLACEHOLDER; values.len()].join(", ");
        let keyword = if negated { "NOT IN" } else { "IN" };
        self.fragment
            .push_str(&format!("{} {} ({})", column_sql, keyword, tokens));
        self.params.extend(values);
        self
    }

    pub fn where_in(self, column: &str, values: Vec<Value>) -> Self {
        self.push_in(Connective::And, column, false, values)
    }

    pub fn where_not_in(self, column: &str, values: Vec<Value>) -> Self {
        self.push_in(Connective::And, column, true, values)
    }

    pub fn or_where_in(self, column: &str, values: Vec<Value>) -> Self {
        self.push_in(Connective::Or, column, false, values)
    }

    pub fn or_where_not_in(self, column: &str, values: Vec<Value>) -> Self {
        self.push_in(Connective::Or, column, true, values)
    }

    fn push_between(
        mut self,
        connective: Connective,
        column: &str,
        negated: bool,
        low: Value,
        high: Value,
    ) -> Self {
        self.write_connective(connective);
        let keyword = if negated { "NOT BETWEEN" } else { "BETWEEN" };
        self.fragment.push_str(&format!(
            "{} {} {} AND {}",
            self.column_sql(column),
            keyword,
            PLACEHOLDER,
            PLACEHOLDER
        ));
        self.params.push(low);
        self.params.push(high);
        self
    }

    pub fn where_between(self, column: &str, low: Value, high: Value) -> Self {
        self.push_between(Connective::And, column, false, low, high)
    }

    pub fn where_not_between(self, column: &str, low: Value, high: Value) -> Self {
        self.push_between(Connective::And, column, true, low, high)
    }

    pub fn or_where_between(self, column: &str, low: Value, high: Value) -> Self {
        self.push_between(Connective::Or, column, false, low, high)
    }

    fn push_null(mut self, connective: Connective, column: &str, negated: bool) -> Self {
        self.write_connective(connective);
        let keyword = if negated { "IS NOT NULL" } else { "IS NULL" };
        self.fragment
            .push_str(&format!("{} {}", self.column_sql(column), keyword));
        self
    }

    pub fn where_null(self, column: &str) -> Self {
        self.push_null(Connective::And, column, false)
    }

    pub fn where_not_null(self, column: &str) -> Self {
        self.push_null(Connective::And, column, true)
    }

    pub fn or_where_null(self, column: &str) -> Self {
        self.push_null(Connective::Or, column, false)
    }

    pub fn or_where_not_null(self, column: &str) -> Self {
        self.push_null(Connective::Or, column, true)
    }

    fn push_regexp(
        mut self,
        connective: Connective,
        column: &str,
        pattern: &str,
    ) -> Result<Self, EngineError> {
        let operator = self.dialect.templates().regexp_operator().ok_or(
            EngineError::UnsupportedOperator {
                operator: "REGEXP",
                dialect: self.dialect.as_str(),
            },
        )?;
        self.write_connective(connective);
        self.fragment.push_str(&format!(
            "{} {} {}",
            self.column_sql(column),
            operator,
            PLACEHOLDER
        ));
        self.params.push(Value::String(pattern.to_string()));
        Ok(self)
    }

    /// Regex match; fails fast on sqlite instead of emitting invalid SQL
    pub fn where_regexp(self, column: &str, pattern: &str) -> Result<Self, EngineError> {
        self.push_regexp(Connective::And, column, pattern)
    }

    pub fn or_where_regexp(self, column: &str, pattern: &str) -> Result<Self, EngineError> {
        self.push_regexp(Connective::Or, column, pattern)
    }

    fn push_raw(mut self, connective: Connective, sql: &str, params: Vec<Value>) -> Self {
        self.write_connective(connective);
        self.fragment.push_str(sql);
        self.params.extend(params);
        self
    }

    /// Raw SQL escape; the fragment may carry its own `PLACEHOLDER` tokens
    pub fn raw_where(self, sql: &str, params: Vec<Value>) -> Self {
        self.push_raw(Connective::And, sql, params)
    }

    pub fn raw_and_where(self, sql: &str, params: Vec<Value>) -> Self {
        self.push_raw(Connective::And, sql, params)
    }

    pub fn raw_or_where(self, sql: &str, params: Vec<Value>) -> Self {
        self.push_raw(Connective::Or, sql, params)
    }

    fn push_group<F>(mut self, connective: Connective, f: F) -> Self
    where
        F: FnOnce(WhereClauseBuilder) -> WhereClauseBuilder,
    {
        let built = f(WhereClauseBuilder::nested(self.dialect).with_column_case(self.column_case.clone()));
        if built.is_empty() {
            return self;
        }
        // a raw fragment spliced into a nested builder can still open with a
        // connective token; strip it before parenthesizing
        let mut fragment = built.fragment.trim().to_string();
        for prefix in ["AND ", "OR "] {
            if let Some(stripped) = fragment.strip_prefix(prefix) {
                fragment = stripped.to_string();
                break;
            }
        }
        self.write_connective(connective);
        self.fragment.push('(');
        self.fragment.push_str(&fragment);
        self.fragment.push(')');
        self.params.extend(built.params);
        self
    }

    /// Parenthesized group combined with `AND`
    pub fn where_builder<F>(self, f: F) -> Self
    where
        F: FnOnce(WhereClauseBuilder) -> WhereClauseBuilder,
    {
        self.push_group(Connective::And, f)
    }

    pub fn and_where_builder<F>(self, f: F) -> Self
    where
        F: FnOnce(WhereClauseBuilder) -> WhereClauseBuilder,
    {
        self.push_group(Connective::And, f)
    }

    /// Parenthesized group combined with `OR`
    pub fn or_where_builder<F>(self, f: F) -> Self
    where
        F: FnOnce(WhereClauseBuilder) -> WhereClauseBuilder,
    {
        self.push_group(Connective::Or, f)
    }
}
