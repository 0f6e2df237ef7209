//! Model lifecycle hooks
//!
//! Hooks are owned by the model layer and invoked by the engine at fixed
//! points: before SQL generation for fetch/update/delete, before value
//! preparation for insert, and after materialization for fetch. Each call
//! site honors the per-query ignore list.

use crate::query_builder::QueryState;
use crate::serializer::SerializedModel;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// Plain model-cased record, as accepted by insert/update
pub type Record = Map<String, Value>;

/// Identifies a hook point for the `ignore_hooks` skip-list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hook {
    BeforeFetch,
    BeforeInsert,
    BeforeUpdate,
    BeforeDelete,
    AfterFetch,
}

/// Callbacks attached to a model descriptor
#[derive(Clone, Default)]
pub struct ModelHooks {
    pub before_fetch: Option<Arc<dyn Fn(&mut QueryState) + Send + Sync>>,
    pub before_insert: Option<Arc<dyn Fn(&mut Record) + Send + Sync>>,
    pub before_update: Option<Arc<dyn Fn(&mut QueryState) + Send + Sync>>,
    pub before_delete: Option<Arc<dyn Fn(&mut QueryState) + Send + Sync>>,
    pub after_fetch: Option<Arc<dyn Fn(Vec<SerializedModel>) -> Vec<SerializedModel> + Send + Sync>>,
}

impl ModelHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_before_fetch<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut QueryState) + Send + Sync + 'static,
    {
        self.before_fetch = Some(Arc::new(f));
        self
    }

    pub fn on_before_insert<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Record) + Send + Sync + 'static,
    {
        self.before_insert = Some(Arc::new(f));
        self
    }

    pub fn on_before_update<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut QueryState) + Send + Sync + 'static,
    {
        self.before_update = Some(Arc::new(f));
        self
    }

    pub fn on_before_delete<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut QueryState) + Send + Sync + 'static,
    {
        self.before_delete = Some(Arc::new(f));
        self
    }

    pub fn on_after_fetch<F>(mut self, f: F) -> Self
    where
        F: Fn(Vec<SerializedModel>) -> Vec<SerializedModel> + Send + Sync + 'static,
    {
        self.after_fetch = Some(Arc::new(f));
        self
    }
}

impl fmt::Debug for ModelHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelHooks")
            .field("before_fetch", &self.before_fetch.is_some())
            .field("before_insert", &self.before_insert.is_some())
            .field("before_update", &self.before_update.is_some())
            .field("before_delete", &self.before_delete.is_some())
            .field("after_fetch", &self.after_fetch.is_some())
            .finish()
    }
}
