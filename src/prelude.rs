//! Convenience re-exports for common Quarry usage
//!
//! # Example
//!
//! ```rust
//! use quarry::prelude::*;
//!
//! // Now you have access to all the common Quarry types
//! ```

// Core Quarry components
pub use crate::core::SqlDataSource;
pub use crate::errors::QuarryError;

// Re-export centralized config
pub use config::{AppConfig, DatabaseConfig, LoggingConfig};

// Model metadata and hooks
pub use query_engine::{
    CaseConvention, ColumnDescriptor, Hook, ModelDescriptor, ModelHooks, ModelManager, Record,
    RelationKind,
};

// Query building
pub use query_engine::{
    Operator, PaginatedResult, PaginationMetadata, QueryBuilder, SerializedModel, SortOrder,
    WhereClauseBuilder,
};

// Drivers and transactions
pub use query_engine::{Dialect, Driver, Row, Transaction, TransactionState};

// Common external dependencies
pub use async_trait;
pub use serde_json;
pub use sqlx;
pub use tokio;
