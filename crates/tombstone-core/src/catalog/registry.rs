//! Corpus-wide table registry.
//!
//! Per-file drafts, `ALTER TABLE` constraints and standalone indexes are merged
//! by qualified table name, never by file.

use super::{
    ConstraintDefinition, ConstraintKind, IndexDefinition, QualifiedName, TableDraft,
    TableMetadata,
};
use crate::config::GeneratorConfig;
use crate::diagnostics::{Diagnostic, DiagnosticCode, Location};
use std::collections::BTreeMap;

/// Where an index declaration was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexSource {
    /// `INDEX` element inside `CREATE TABLE`.
    Inline,
    /// Separate `CREATE INDEX` statement.
    Standalone,
}

struct PendingTable {
    draft: TableDraft,
    /// Constraints tagged with their arrival number.
    constraints: Vec<(usize, ConstraintDefinition)>,
}

/// Collects per-file results in arrival order.
///
/// Callers add items in sorted path order, statements in file order.
#[derive(Default)]
pub struct RegistryBuilder {
    tables: BTreeMap<QualifiedName, PendingTable>,
    altered: Vec<(usize, QualifiedName, ConstraintDefinition)>,
    indexes: Vec<(QualifiedName, IndexDefinition, Location)>,
    arrival: usize,
    diagnostics: Vec<Diagnostic>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_arrival(&mut self) -> usize {
        self.arrival += 1;
        self.arrival
    }

    /// Add a table definition. A second definition of the same name is reported
    /// and dropped.
    pub fn add_table(&mut self, mut draft: TableDraft) {
        if let Some(existing) = self.tables.get(&draft.name) {
            self.diagnostics.push(
                Diagnostic::new(
                    DiagnosticCode::DuplicateTable,
                    format!(
                        "table {} is already defined in {}; this definition is ignored",
                        draft.name, existing.draft.file
                    ),
                )
                .at(draft.location.clone()),
            );
            return;
        }

        let constraints = std::mem::take(&mut draft.constraints)
            .into_iter()
            .map(|c| (self.next_arrival(), c))
            .collect();
        self.tables
            .insert(draft.name.clone(), PendingTable { draft, constraints });
    }

    /// Add a constraint from `ALTER TABLE ... ADD`.
    pub fn add_constraint(&mut self, table: QualifiedName, constraint: ConstraintDefinition) {
        let arrival = self.next_arrival();
        self.altered.push((arrival, table, constraint));
    }

    /// Add an index from `CREATE INDEX`.
    pub fn add_index(&mut self, table: QualifiedName, index: IndexDefinition, location: Location) {
        self.indexes.push((table, index, location));
    }

    /// Merge everything into the registry.
    ///
    /// `index_order` decides which index source is listed first.
    pub fn finish(
        mut self,
        config: &GeneratorConfig,
        index_order: &[IndexSource],
    ) -> (TableRegistry, Vec<Diagnostic>) {
        for (arrival, table, constraint) in std::mem::take(&mut self.altered) {
            match self.tables.get_mut(&table) {
                Some(pending) => pending.constraints.push((arrival, constraint)),
                None => self.diagnostics.push(
                    Diagnostic::new(
                        DiagnosticCode::UndefinedTarget,
                        format!(
                            "constraint {} targets undefined table {}",
                            constraint.display_name(),
                            table
                        ),
                    )
                    .at(constraint.location.clone()),
                ),
            }
        }

        let mut standalone: BTreeMap<QualifiedName, Vec<IndexDefinition>> = BTreeMap::new();
        for (table, index, location) in std::mem::take(&mut self.indexes) {
            if self.tables.contains_key(&table) {
                standalone.entry(table).or_default().push(index);
            } else {
                self.diagnostics.push(
                    Diagnostic::new(
                        DiagnosticCode::UndefinedTarget,
                        format!("index {} targets undefined table {}", index.name, table),
                    )
                    .at(location),
                );
            }
        }

        let mut tables = BTreeMap::new();
        for (name, pending) in std::mem::take(&mut self.tables) {
            let extra = standalone.remove(&name).unwrap_or_default();
            let table = self.finish_table(pending, extra, config, index_order);
            tables.insert(name, table);
        }

        tracing::debug!(tables = tables.len(), "table registry built");
        (TableRegistry { tables }, self.diagnostics)
    }

    fn finish_table(
        &mut self,
        pending: PendingTable,
        standalone: Vec<IndexDefinition>,
        config: &GeneratorConfig,
        index_order: &[IndexSource],
    ) -> TableMetadata {
        let PendingTable {
            draft,
            mut constraints,
        } = pending;
        constraints.sort_by_key(|(arrival, _)| *arrival);
        let constraints: Vec<_> = constraints.into_iter().map(|(_, c)| c).collect();

        let primary_keys: Vec<&ConstraintDefinition> = constraints
            .iter()
            .filter(|c| c.kind == ConstraintKind::PrimaryKey)
            .collect();

        let primary_key = match primary_keys.as_slice() {
            [] => {
                self.diagnostics.push(
                    Diagnostic::new(
                        DiagnosticCode::MissingPrimaryKey,
                        format!(
                            "table {} has no primary key; objects that need row identity are not generated",
                            draft.name
                        ),
                    )
                    .at(draft.location.clone()),
                );
                None
            }
            [first, rest @ ..] => {
                for extra in rest {
                    self.diagnostics.push(
                        Diagnostic::new(
                            DiagnosticCode::MultiplePrimaryKeys,
                            format!(
                                "table {} has more than one primary key; using {}",
                                draft.name,
                                first.display_name()
                            ),
                        )
                        .at(extra.location.clone()),
                    );
                }
                Some(canonical_columns(&first.columns, &draft.columns))
            }
        };

        let mut indexes = Vec::new();
        let mut inline = Some(draft.indexes);
        let mut standalone = Some(standalone);
        for source in index_order {
            let batch = match source {
                IndexSource::Inline => inline.take(),
                IndexSource::Standalone => standalone.take(),
            };
            indexes.extend(batch.unwrap_or_default());
        }

        let restrict = config.is_restrict(&draft.name, draft.annotations.category.as_deref());
        let exclude = config.is_excluded(&draft.name);

        TableMetadata {
            soft_delete: config.soft_delete_for(&draft.name),
            name: draft.name,
            columns: draft.columns,
            constraints,
            indexes,
            temporal: draft.temporal,
            primary_key,
            restrict,
            exclude,
            annotations: draft.annotations,
            file: draft.file,
            location: draft.location,
        }
    }
}

/// Map key column names to the declared casing of the table's columns.
fn canonical_columns(
    names: &[String],
    columns: &[super::ColumnDefinition],
) -> Vec<String> {
    names
        .iter()
        .map(|n| {
            columns
                .iter()
                .find(|c| c.is(n))
                .map(|c| c.name.clone())
                .unwrap_or_else(|| n.clone())
        })
        .collect()
}

/// All tables of the corpus, ordered by qualified name.
#[derive(Debug, Clone, Default)]
pub struct TableRegistry {
    tables: BTreeMap<QualifiedName, TableMetadata>,
}

impl TableRegistry {
    pub fn get(&self, name: &QualifiedName) -> Option<&TableMetadata> {
        self.tables.get(name)
    }

    pub fn contains(&self, name: &QualifiedName) -> bool {
        self.tables.contains_key(name)
    }

    /// Tables in (schema, name) order.
    pub fn iter(&self) -> impl Iterator<Item = &TableMetadata> {
        self.tables.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &QualifiedName> {
        self.tables.keys()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
