//! Model managers
//!
//! A `ModelManager` is the per-model entry point handed out by the data
//! source: it spawns query builders and carries the primary-key convenience
//! operations and inserts. Records cross this API in the model's own case
//! convention; everything database-cased stays internal.

use crate::driver::{execute_logged, execute_update_logged, Driver};
use crate::errors::EngineError;
use crate::model::{Hook, ModelDescriptor, ModelRegistry, Record};
use crate::query_builder::QueryBuilder;
use crate::serializer::{self, SerializedModel};
use crate::dialect::{statements, Dialect};
use serde_json::Value;
use std::sync::Arc;

pub struct ModelManager {
    descriptor: Arc<ModelDescriptor>,
    registry: Arc<ModelRegistry>,
    driver: Arc<dyn Driver>,
}

impl ModelManager {
    pub fn new(
        descriptor: Arc<ModelDescriptor>,
        registry: Arc<ModelRegistry>,
        driver: Arc<dyn Driver>,
    ) -> Self {
        Self {
            descriptor,
            registry,
            driver,
        }
    }

    pub fn descriptor(&self) -> &ModelDescriptor {
        &self.descriptor
    }

    /// Start a fluent query against this model
    pub fn query(&self) -> QueryBuilder {
        QueryBuilder::new(
            Arc::clone(&self.descriptor),
            Arc::clone(&self.registry),
            Arc::clone(&self.driver),
        )
    }

    /// Fetch one row by primary key
    pub async fn find_one(&self, pk: Value) -> Result<Option<SerializedModel>, EngineError> {
        let key = self.descriptor.require_primary_key()?.to_string();
        self.query().where_(&key, pk).one().await
    }

    /// Fetch one row by primary key or fail with a not-found error
    pub async fn find_one_or_fail(&self, pk: Value) -> Result<SerializedModel, EngineError> {
        let key = self.descriptor.require_primary_key()?.to_string();
        self.query().where_(&key, pk).one_or_fail().await
    }

    /// Insert one record and return the stored row.
    ///
    /// On postgres the row comes straight back through `RETURNING *`; other
    /// dialects materialize from the caller-supplied record, so database
    /// defaults are not reflected there.
    pub async fn insert(&self, mut record: Record) -> Result<SerializedModel, EngineError> {
        self.insert_with_ignored(&mut record, &[]).await
    }

    /// Insert, skipping the named hook points
    pub async fn insert_ignoring_hooks(
        &self,
        mut record: Record,
        ignored: &[Hook],
    ) -> Result<SerializedModel, EngineError> {
        self.insert_with_ignored(&mut record, ignored).await
    }

    async fn insert_with_ignored(
        &self,
        record: &mut Record,
        ignored: &[Hook],
    ) -> Result<SerializedModel, EngineError> {
        if !ignored.contains(&Hook::BeforeInsert) {
            if let Some(hook) = &self.descriptor.hooks.before_insert {
                hook(record);
            }
        }
        let dialect = self.driver.dialect();
        let (sql, params) = statements::insert(&self.descriptor, dialect, record);
        if dialect == Dialect::Postgres {
            let mut rows =
                execute_logged(self.driver.as_ref(), dialect, &sql, &params).await?;
            if let Some(row) = rows.pop() {
                return serializer::serialize_row(&self.descriptor, row);
            }
        } else {
            execute_update_logged(self.driver.as_ref(), dialect, &sql, &params).await?;
        }
        Ok(serializer::from_record(&self.descriptor, record))
    }

    /// Insert several records in declaration order
    pub async fn insert_many(
        &self,
        records: Vec<Record>,
    ) -> Result<Vec<SerializedModel>, EngineError> {
        let mut out = Vec::with_capacity(records.len());
        for record in records {
            out.push(self.insert(record).await?);
        }
        Ok(out)
    }

    /// Update one row by primary key; returns the affected count
    pub async fn update_by_pk(&self, pk: Value, record: &Record) -> Result<u64, EngineError> {
        let key = self.descriptor.require_primary_key()?.to_string();
        self.query().where_(&key, pk).update(record).await
    }

    /// Delete one row by primary key; returns the affected count
    pub async fn delete_by_pk(&self, pk: Value) -> Result<u64, EngineError> {
        let key = self.descriptor.require_primary_key()?.to_string();
        self.query().where_(&key, pk).delete().await
    }
}
