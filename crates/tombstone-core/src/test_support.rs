//! Shared fixtures for unit tests.

use crate::catalog::{RegistryBuilder, TableRegistry};
use crate::config::GeneratorConfig;
use crate::diagnostics::Diagnostic;
use crate::extract::{adapter_for, analyze, ExtractedItem, SourceRole};

/// Build a registry from in-memory files, in the given order.
pub(crate) fn registry_with(
    files: &[(&str, &str)],
    config: &GeneratorConfig,
) -> (TableRegistry, Vec<Diagnostic>) {
    let adapter = adapter_for(config.grammar);
    let mut builder = RegistryBuilder::new();
    let mut diagnostics = Vec::new();
    for (file, source) in files {
        let analysis = analyze(file, source, SourceRole::Input, config, adapter);
        diagnostics.extend(analysis.diagnostics);
        for item in analysis.items {
            match item {
                ExtractedItem::Table(draft) => builder.add_table(draft),
                ExtractedItem::Constraint { table, constraint } => {
                    builder.add_constraint(table, constraint)
                }
                ExtractedItem::Index {
                    table,
                    index,
                    location,
                } => builder.add_index(table, index, location),
            }
        }
    }
    let (registry, registry_diagnostics) = builder.finish(config, adapter.index_sources());
    diagnostics.extend(registry_diagnostics);
    (registry, diagnostics)
}

pub(crate) fn registry(files: &[(&str, &str)]) -> TableRegistry {
    registry_with(files, &GeneratorConfig::default()).0
}
