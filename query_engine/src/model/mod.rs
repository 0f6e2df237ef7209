//! Model metadata
//!
//! Static descriptors, case conventions, lifecycle hooks and the registry
//! that replaces reflection-based model discovery.

pub mod case;
pub mod descriptor;
pub mod hooks;
pub mod registry;

pub use case::CaseConvention;
pub use descriptor::{
    ColumnDescriptor, ModelDescriptor, PrepareHook, RelationDescriptor, RelationKind,
    SerializeHook,
};
pub use hooks::{Hook, ModelHooks, Record};
pub use registry::ModelRegistry;
