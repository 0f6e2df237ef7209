//! Query building
//!
//! The fluent builder, the where engine it delegates filters to, and the
//! ordering/pagination pieces shared with relation queries.

pub mod builder;
pub mod ordering;
pub mod pagination;
pub mod state;
pub mod where_clause;

pub use builder::{PaginatedResult, QueryBuilder};
pub use ordering::SortOrder;
pub use pagination::{get_pagination_metadata, Pagination, PaginationMetadata};
pub use state::{QueryState, RelationQuery, RelationRequest};
pub use where_clause::{Operator, WhereClauseBuilder};

#[cfg(test)]
mod tests;
