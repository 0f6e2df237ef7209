//! Model descriptors
//!
//! A `ModelDescriptor` is the static replacement for reflection-based model
//! metadata: table name, primary key, ordered column descriptors, the case
//! convention pair, relation descriptors and lifecycle hooks. Descriptors are
//! built once at model-definition time, wrapped in `Arc`, and referenced by
//! every query builder for that model.

use crate::errors::EngineError;
use crate::model::case::CaseConvention;
use crate::model::hooks::ModelHooks;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Per-column output transform, run during materialization
pub type SerializeHook = Arc<dyn Fn(Value) -> Value + Send + Sync>;
/// Per-column input transform, run before a value is bound
pub type PrepareHook = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// A declared model column, named in the model's own case convention
#[derive(Clone, Default)]
pub struct ColumnDescriptor {
    pub name: String,
    /// Hidden columns are dropped during materialization
    pub hidden: bool,
    pub serialize: Option<SerializeHook>,
    pub prepare: Option<PrepareHook>,
}

impl ColumnDescriptor {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn hidden(name: &str) -> Self {
        Self {
            name: name.to_string(),
            hidden: true,
            ..Default::default()
        }
    }

    pub fn with_serialize<F>(mut self, f: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.serialize = Some(Arc::new(f));
        self
    }

    pub fn with_prepare<F>(mut self, f: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.prepare = Some(Arc::new(f));
        self
    }
}

impl fmt::Debug for ColumnDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnDescriptor")
            .field("name", &self.name)
            .field("hidden", &self.hidden)
            .field("serialize", &self.serialize.is_some())
            .field("prepare", &self.prepare.is_some())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    HasOne,
    BelongsTo,
    HasMany,
    ManyToMany,
}

impl RelationKind {
    /// Array-typed relations default to `[]`, scalar ones to `null`
    pub fn is_array(&self) -> bool {
        matches!(self, Self::HasMany | Self::ManyToMany)
    }
}

/// A declared relation.
///
/// `foreign_key` names the column that physically carries the link, in the
/// case convention of the model that owns it: the related model for
/// `HasOne`/`HasMany`, this model for `BelongsTo`. For `ManyToMany` it is the
/// pivot-table column referencing the *related* side's primary key, written
/// in database casing (pivot tables have no descriptor of their own).
#[derive(Debug, Clone)]
pub struct RelationDescriptor {
    pub name: String,
    pub kind: RelationKind,
    pub foreign_key: String,
    pub related_model: String,
    /// Pivot table name, many-to-many only
    pub through: Option<String>,
}

/// Static metadata for one model
#[derive(Debug, Clone)]
pub struct ModelDescriptor {
    pub name: String,
    pub table: String,
    /// Model-cased primary key column, if the model has one
    pub primary_key: Option<String>,
    pub columns: Vec<ColumnDescriptor>,
    pub model_case: CaseConvention,
    pub database_case: CaseConvention,
    pub relations: Vec<RelationDescriptor>,
    pub hooks: ModelHooks,
}

impl ModelDescriptor {
    pub fn new(name: &str, table: &str) -> Self {
        Self {
            name: name.to_string(),
            table: table.to_string(),
            primary_key: None,
            columns: Vec::new(),
            model_case: CaseConvention::Camel,
            database_case: CaseConvention::Snake,
            relations: Vec::new(),
            hooks: ModelHooks::default(),
        }
    }

    pub fn primary_key(mut self, column: &str) -> Self {
        self.primary_key = Some(column.to_string());
        self
    }

    pub fn column(mut self, column: ColumnDescriptor) -> Self {
        self.columns.push(column);
        self
    }

    pub fn columns(mut self, names: &[&str]) -> Self {
        self.columns
            .extend(names.iter().map(|name| ColumnDescriptor::new(name)));
        self
    }

    pub fn case_conventions(mut self, model: CaseConvention, database: CaseConvention) -> Self {
        self.model_case = model;
        self.database_case = database;
        self
    }

    pub fn hooks(mut self, hooks: ModelHooks) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn has_one(mut self, name: &str, related_model: &str, foreign_key: &str) -> Self {
        self.relations.push(RelationDescriptor {
            name: name.to_string(),
            kind: RelationKind::HasOne,
            foreign_key: foreign_key.to_string(),
            related_model: related_model.to_string(),
            through: None,
        });
        self
    }

    pub fn belongs_to(mut self, name: &str, related_model: &str, foreign_key: &str) -> Self {
        self.relations.push(RelationDescriptor {
            name: name.to_string(),
            kind: RelationKind::BelongsTo,
            foreign_key: foreign_key.to_string(),
            related_model: related_model.to_string(),
            through: None,
        });
        self
    }

    pub fn has_many(mut self, name: &str, related_model: &str, foreign_key: &str) -> Self {
        self.relations.push(RelationDescriptor {
            name: name.to_string(),
            kind: RelationKind::HasMany,
            foreign_key: foreign_key.to_string(),
            related_model: related_model.to_string(),
            through: None,
        });
        self
    }

    pub fn many_to_many(
        mut self,
        name: &str,
        related_model: &str,
        through: &str,
        foreign_key: &str,
    ) -> Self {
        self.relations.push(RelationDescriptor {
            name: name.to_string(),
            kind: RelationKind::ManyToMany,
            foreign_key: foreign_key.to_string(),
            related_model: related_model.to_string(),
            through: Some(through.to_string()),
        });
        self
    }

    /// Database-cased name for a model-cased column
    pub fn db_column(&self, model_column: &str) -> String {
        self.database_case.apply(model_column)
    }

    /// Model-cased field for a database-cased column key
    pub fn model_field(&self, db_column: &str) -> String {
        self.model_case.apply(db_column)
    }

    pub fn relation(&self, name: &str) -> Option<&RelationDescriptor> {
        self.relations.iter().find(|r| r.name == name)
    }

    pub fn column_descriptor(&self, model_column: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.name == model_column)
    }

    pub fn require_primary_key(&self) -> Result<&str, EngineError> {
        self.primary_key
            .as_deref()
            .ok_or_else(|| EngineError::MissingPrimaryKey {
                model: self.name.clone(),
            })
    }
}
