//! JSON metadata manifest.
//!
//! The manifest describes the analysed schema and what was generated from it.
//! It carries no timestamps, so unchanged input gives a byte-identical file.

use crate::catalog::{
    ColumnDefinition, ConstraintDefinition, IndexDefinition, TableMetadata, TableRegistry,
    TemporalInfo,
};
use crate::config::SoftDeleteColumns;
use crate::diagnostics::{self, Diagnostic, Severity};
use crate::discovery::{DiscoveryRegistry, OwnedObject};
use crate::error::Result;
use crate::generate::GenerationResult;
use crate::graph::{RelationshipEdge, RelationshipGraph};
use serde::Serialize;

/// JSON schema identifier of the manifest format.
pub const MANIFEST_SCHEMA: &str =
    "https://github.com/Skelf-Research/tombstone/schemas/manifest/v1.json";

/// Manifest format version.
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    #[serde(rename = "$schema")]
    pub schema: &'static str,
    pub format_version: u32,
    pub tables: Vec<TableEntry>,
    pub relationships: Vec<RelationshipEdge>,
    pub user_owned_objects: Vec<OwnedObject>,
    pub generated_files: Vec<GeneratedFile>,
    pub diagnostics: Vec<Diagnostic>,
    pub statistics: Statistics,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableEntry {
    pub schema: String,
    pub name: String,
    pub file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub columns: Vec<ColumnEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_key: Option<Vec<String>>,
    pub constraints: Vec<ConstraintDefinition>,
    pub indexes: Vec<IndexDefinition>,
    pub temporal: TemporalInfo,
    pub soft_delete: SoftDeleteEntry,
    pub participates: bool,
    pub restrict: bool,
    pub exclude: bool,
    /// Names of generated objects.
    pub generated: Vec<String>,
    /// Names of objects left to user-authored definitions.
    pub suppressed: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnEntry {
    #[serde(flatten)]
    pub column: ColumnDefinition,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Resolved soft-delete column names of one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SoftDeleteEntry {
    pub active_column: String,
    pub created_by_column: String,
    pub updated_by_column: String,
    pub updated_at_column: String,
}

impl From<&SoftDeleteColumns> for SoftDeleteEntry {
    fn from(columns: &SoftDeleteColumns) -> Self {
        Self {
            active_column: columns.active_column.clone(),
            created_by_column: columns.created_by_column.clone(),
            updated_by_column: columns.updated_by_column.clone(),
            updated_at_column: columns.updated_at_column.clone(),
        }
    }
}

/// A generated file and its content digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedFile {
    pub file: String,
    pub object: String,
    /// blake3 digest of the file contents, hex encoded.
    pub blake3: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    pub tables: usize,
    pub participating_tables: usize,
    pub relationships: usize,
    pub rejected_relationships: usize,
    pub generated_objects: usize,
    pub suppressed_objects: usize,
    pub warnings: usize,
    pub errors: usize,
}

impl Manifest {
    /// Assemble the manifest. `diagnostics` should already be sorted.
    pub fn build(
        registry: &TableRegistry,
        graph: &RelationshipGraph,
        discovery: &DiscoveryRegistry,
        generation: &GenerationResult,
        diagnostics: &[Diagnostic],
    ) -> Self {
        let tables: Vec<TableEntry> = registry
            .iter()
            .map(|table| table_entry(table, generation))
            .collect();

        let generated_files = generation
            .objects
            .iter()
            .map(|object| GeneratedFile {
                file: object.file_name.clone(),
                object: object.name.to_string(),
                blake3: blake3::hash(object.sql.as_bytes()).to_hex().to_string(),
            })
            .collect();

        let statistics = Statistics {
            tables: registry.len(),
            participating_tables: registry.iter().filter(|t| t.participates()).count(),
            relationships: graph.edges().len(),
            rejected_relationships: graph.edges().iter().filter(|e| e.rejected).count(),
            generated_objects: generation.objects.len(),
            suppressed_objects: generation.suppressed.len(),
            warnings: diagnostics::count(diagnostics, Severity::Warning),
            errors: diagnostics::count(diagnostics, Severity::Error),
        };

        Self {
            schema: MANIFEST_SCHEMA,
            format_version: FORMAT_VERSION,
            tables,
            relationships: graph.edges().to_vec(),
            user_owned_objects: discovery.owned().collect(),
            generated_files,
            diagnostics: diagnostics.to_vec(),
            statistics,
        }
    }

    /// Pretty-printed JSON with a trailing newline.
    pub fn to_json(&self) -> Result<String> {
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        Ok(json)
    }
}

fn table_entry(table: &TableMetadata, generation: &GenerationResult) -> TableEntry {
    let columns = table
        .columns
        .iter()
        .map(|c| ColumnEntry {
            column: c.clone(),
            description: table.annotations.column(&c.name).map(str::to_string),
        })
        .collect();

    TableEntry {
        schema: table.name.schema.clone(),
        name: table.name.name.clone(),
        file: table.file.clone(),
        description: table.annotations.description.clone(),
        category: table.annotations.category.clone(),
        columns,
        primary_key: table.primary_key.clone(),
        constraints: table.constraints.clone(),
        indexes: table.indexes.clone(),
        temporal: table.temporal.clone(),
        soft_delete: SoftDeleteEntry::from(&table.soft_delete),
        participates: table.participates(),
        restrict: table.restrict,
        exclude: table.exclude,
        generated: generation
            .objects_for(&table.name)
            .map(|o| o.name.to_string())
            .collect(),
        suppressed: generation
            .suppressed_for(&table.name)
            .map(|o| o.name.to_string())
            .collect(),
    }
}
