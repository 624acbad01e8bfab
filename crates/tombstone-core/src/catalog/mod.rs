//! Table catalog for tombstone.
//!
//! The catalog holds the canonical metadata of every table in the corpus:
//! columns, constraints, indexes, temporal details and the resolved primary key.

mod column;
mod constraint;
mod name;
mod registry;
mod table;

pub use column::{ColumnDefinition, PeriodColumn};
pub use constraint::{
    action_sql, ConstraintDefinition, ConstraintKind, ConstraintOrigin, ForeignKeyTarget,
    IndexDefinition,
};
pub use name::{QualifiedName, DEFAULT_SCHEMA};
pub use registry::{IndexSource, RegistryBuilder, TableRegistry};
pub use table::{TableDraft, TableMetadata, TemporalInfo};
