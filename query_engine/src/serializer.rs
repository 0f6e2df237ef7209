//! Result materializer
//!
//! Turns raw database rows into model-cased `SerializedModel` values:
//! database-to-model case conversion per key, `hidden` columns dropped,
//! per-column `serialize` hooks applied, and any selected expression or
//! column not declared on the model routed into the additional-columns bag
//! so ad-hoc SELECT expressions survive materialization.

use crate::driver::Row;
use crate::errors::EngineError;
use crate::model::ModelDescriptor;
use serde_json::{json, Map, Value};
use std::collections::HashMap;

/// Pseudo-column key for the bag of undeclared values. Bookkeeping only; it
/// is stripped from every INSERT/UPDATE before SQL is built.
pub const ADDITIONAL_COLUMNS: &str = "$additionalColumns";

/// A materialized row: model-cased declared values, the additional-columns
/// bag, and one entry per declared relation (`null`/`[]` until resolved,
/// never absent).
#[derive(Debug, Clone, Default)]
pub struct SerializedModel {
    pub values: Map<String, Value>,
    pub additional_columns: Map<String, Value>,
    pub relations: Map<String, Value>,
}

impl SerializedModel {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    pub fn relation(&self, name: &str) -> Option<&Value> {
        self.relations.get(name)
    }

    /// Flatten into one JSON object, with the additional-columns bag nested
    /// under its pseudo-column key
    pub fn to_value(&self) -> Value {
        let mut out = self.values.clone();
        for (name, value) in &self.relations {
            out.insert(name.clone(), value.clone());
        }
        if !self.additional_columns.is_empty() {
            out.insert(
                ADDITIONAL_COLUMNS.to_string(),
                Value::Object(self.additional_columns.clone()),
            );
        }
        Value::Object(out)
    }
}

/// Materialize one raw row against a model descriptor
pub fn serialize_row(descriptor: &ModelDescriptor, row: Row) -> Result<SerializedModel, EngineError> {
    let mut by_db_name = HashMap::new();
    for column in &descriptor.columns {
        by_db_name.insert(descriptor.db_column(&column.name), column);
    }

    let mut model = SerializedModel::default();
    for (key, value) in row {
        match by_db_name.get(&key) {
            Some(column) => {
                if column.hidden {
                    continue;
                }
                let value = match &column.serialize {
                    Some(serialize) => serialize(value),
                    None => value,
                };
                model.values.insert(column.name.clone(), value);
            }
            None => {
                model
                    .additional_columns
                    .insert(descriptor.model_field(&key), value);
            }
        }
    }

    for relation in &descriptor.relations {
        let default = if relation.kind.is_array() {
            json!([])
        } else {
            Value::Null
        };
        model.relations.insert(relation.name.clone(), default);
    }
    Ok(model)
}

pub fn serialize_rows(
    descriptor: &ModelDescriptor,
    rows: Vec<Row>,
) -> Result<Vec<SerializedModel>, EngineError> {
    rows.into_iter()
        .map(|row| serialize_row(descriptor, row))
        .collect()
}

/// Build a `SerializedModel` from caller-supplied model-cased data, used
/// when a dialect cannot return the inserted row
pub fn from_record(descriptor: &ModelDescriptor, record: &Map<String, Value>) -> SerializedModel {
    let mut model = SerializedModel::default();
    for (field, value) in record {
        if field == ADDITIONAL_COLUMNS {
            continue;
        }
        if descriptor.column_descriptor(field).is_some() {
            model.values.insert(field.clone(), value.clone());
        } else {
            model.additional_columns.insert(field.clone(), value.clone());
        }
    }
    for relation in &descriptor.relations {
        let default = if relation.kind.is_array() {
            json!([])
        } else {
            Value::Null
        };
        model.relations.insert(relation.name.clone(), default);
    }
    model
}
