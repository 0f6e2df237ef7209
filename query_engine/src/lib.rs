//! Query engine
//!
//! Dialect-aware SQL generation, drivers, relation resolution and result
//! materialization. This crate is the machinery underneath the `quarry`
//! facade: model descriptors go in, parameterized SQL goes out through a
//! driver, and JSON-shaped models come back.
//!
//! SQL text and parameter values never mix: identifiers are quoted by the
//! dialect templates and every value binds through a placeholder.

pub mod dialect;
pub mod driver;
pub mod errors;
pub mod manager;
pub mod model;
pub mod query_builder;
pub mod relations;
pub mod serializer;
pub mod transaction;

pub use dialect::Dialect;
pub use driver::{Driver, DriverConnection, MySqlDriver, PostgresDriver, Row, SqliteDriver};
pub use errors::EngineError;
pub use manager::ModelManager;
pub use model::{
    CaseConvention, ColumnDescriptor, Hook, ModelDescriptor, ModelHooks, ModelRegistry, Record,
    RelationDescriptor, RelationKind,
};
pub use query_builder::{
    get_pagination_metadata, Operator, PaginatedResult, Pagination, PaginationMetadata,
    QueryBuilder, RelationQuery, SortOrder, WhereClauseBuilder,
};
pub use serializer::{SerializedModel, ADDITIONAL_COLUMNS};
pub use transaction::{with_transaction, Transaction, TransactionState};
