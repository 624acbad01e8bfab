//! tombstone core - soft-delete object synthesis from T-SQL DDL.
//!
//! This crate reads a corpus of table definitions and generates the objects
//! that implement a soft-delete convention across the schema: cascade triggers,
//! reactivation guards, restrict triggers, active-row views and one purge
//! procedure. Objects the user already wrote are left alone.
//!
//! # Pipeline
//!
//! ```text
//! *.sql --analyze (parallel)--> FileAnalysis --merge--> TableRegistry
//!                                    |                       |
//!                                    v                       v
//!                            DiscoveryRegistry        RelationshipGraph
//!                                    \                       /
//!                                     +---> Generator <-----+
//!                                               |
//!                                 generated files + Manifest
//! ```
//!
//! Problems found in the input are [`Diagnostic`]s, collected rather than
//! returned as errors. [`Error`] covers I/O and configuration failures only.

pub mod annotation;
pub mod catalog;
pub mod config;
pub mod diagnostics;
pub mod discovery;
pub mod error;
pub mod extract;
pub mod generate;
pub mod graph;
pub mod manifest;
pub mod output;
pub mod pipeline;

#[cfg(test)]
mod test_support;

pub use annotation::Annotations;
pub use catalog::{
    ColumnDefinition, ConstraintDefinition, ConstraintKind, IndexDefinition, QualifiedName,
    TableMetadata, TableRegistry, TemporalInfo,
};
pub use config::{Grammar, GeneratorConfig, SoftDeleteColumns, TableOverride};
pub use diagnostics::{Diagnostic, DiagnosticCode, Location, Severity};
pub use discovery::{DiscoveredObject, DiscoveryRegistry, OwnedObject};
pub use error::{Error, Result};
pub use generate::{GeneratedObject, GenerationResult, Generator, ObjectPurpose, SuppressedObject};
pub use graph::{CascadePolicy, RelationshipEdge, RelationshipGraph};
pub use manifest::Manifest;
pub use output::{FileChange, OutputPlan, GENERATED_MARKER};
pub use pipeline::{analyze_dir, analyze_sources, check, generate, Analysis, RunReport, SourceFile};
