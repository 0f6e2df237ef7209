//! Error types for the query engine
//!
//! Errors fall into four groups: configuration errors (raised before any SQL
//! is issued), data errors (bad key values discovered while resolving
//! relations), not-found errors from the `*_or_fail` fetch variants, and
//! driver errors propagated unchanged from sqlx.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Unsupported dialect: {0}")]
    UnsupportedDialect(String),

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Model '{0}' is not registered")]
    UnknownModel(String),

    #[error("Model '{model}' has no primary key but the operation requires one")]
    MissingPrimaryKey { model: String },

    #[error(
        "Relation '{relation}' through pivot '{through}' has no reciprocal many-to-many declaration on the related model"
    )]
    MissingReciprocalRelation { relation: String, through: String },

    #[error("Relation '{relation}' requires a value for '{key}' on every parent row; missing on: {offenders}")]
    MissingRelationKey {
        relation: String,
        key: String,
        offenders: String,
    },

    #[error("Operator '{operator}' is not supported on dialect '{dialect}'")]
    UnsupportedOperator {
        operator: &'static str,
        dialect: &'static str,
    },

    #[error("No '{model}' record found")]
    NotFound { model: String },

    #[error("Transaction is {actual} but the operation requires it to be {expected}")]
    InvalidTransactionState {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
