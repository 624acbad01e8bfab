//! Table metadata.

use super::{
    ColumnDefinition, ConstraintDefinition, ConstraintKind, IndexDefinition, QualifiedName,
};
use crate::annotation::Annotations;
use crate::config::SoftDeleteColumns;
use crate::diagnostics::Location;
use serde::Serialize;

/// System-versioning details of a table.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemporalInfo {
    pub enabled: bool,
    /// History table; `None` on a temporal table means it could not be resolved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history: Option<QualifiedName>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period_start: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period_end: Option<String>,
}

/// One table as extracted from a single `CREATE TABLE`, before corpus merge.
#[derive(Debug, Clone, PartialEq)]
pub struct TableDraft {
    pub name: QualifiedName,
    pub columns: Vec<ColumnDefinition>,
    /// Constraints declared in the body, in declaration order.
    pub constraints: Vec<ConstraintDefinition>,
    /// Inline `INDEX` elements.
    pub indexes: Vec<IndexDefinition>,
    pub temporal: TemporalInfo,
    pub annotations: Annotations,
    pub file: String,
    pub location: Location,
}

/// Canonical metadata of one table. Built once by the registry, never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct TableMetadata {
    pub name: QualifiedName,
    pub columns: Vec<ColumnDefinition>,
    /// Inline and `ALTER TABLE` constraints in arrival order.
    pub constraints: Vec<ConstraintDefinition>,
    pub indexes: Vec<IndexDefinition>,
    pub temporal: TemporalInfo,
    /// Resolved primary key, in key order. `None` when the table has none.
    pub primary_key: Option<Vec<String>>,
    pub soft_delete: SoftDeleteColumns,
    pub restrict: bool,
    pub exclude: bool,
    pub annotations: Annotations,
    pub file: String,
    pub location: Location,
}

impl TableMetadata {
    /// Find a column (case-insensitive).
    pub fn column(&self, name: &str) -> Option<&ColumnDefinition> {
        self.columns.iter().find(|c| c.is(name))
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Check whether soft-delete objects are generated for this table.
    pub fn participates(&self) -> bool {
        !self.exclude && self.has_column(&self.soft_delete.active_column)
    }

    /// Active flag column, in declared casing when present.
    pub fn active_column(&self) -> &str {
        self.column(&self.soft_delete.active_column)
            .map(|c| c.name.as_str())
            .unwrap_or(&self.soft_delete.active_column)
    }

    /// Updated-by column, if the table has a writable one.
    pub fn updated_by_column(&self) -> Option<&str> {
        self.writable_column(&self.soft_delete.updated_by_column)
    }

    /// Updated-at column, if the table has a writable one.
    pub fn updated_at_column(&self) -> Option<&str> {
        self.writable_column(&self.soft_delete.updated_at_column)
    }

    fn writable_column(&self, name: &str) -> Option<&str> {
        self.column(name)
            .filter(|c| !c.is_engine_maintained())
            .map(|c| c.name.as_str())
    }

    /// Timestamp compared against the purge cutoff: the period start of a
    /// temporal table, else the updated-at column.
    pub fn retention_column(&self) -> Option<&str> {
        if self.temporal.enabled {
            self.temporal.period_start.as_deref()
        } else {
            self.updated_at_column()
        }
    }

    pub fn primary_key(&self) -> Option<&[String]> {
        self.primary_key.as_deref()
    }

    /// Foreign key constraints in arrival order.
    pub fn foreign_keys(&self) -> impl Iterator<Item = &ConstraintDefinition> {
        self.constraints
            .iter()
            .filter(|c| c.kind == ConstraintKind::ForeignKey)
    }
}
