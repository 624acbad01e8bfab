//! Grammar adapters.
//!
//! Project grammars differ in where they put the history table of a temporal
//! table and in which index declarations they favour. Each adapter fixes the
//! order in which the known shapes are tried; it is chosen once per run.

use crate::catalog::{IndexSource, QualifiedName};
use crate::config::Grammar;
use tombstone_ddl::TableOption;

/// Known placements of the history table name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemporalShape {
    /// `SYSTEM_VERSIONING = ON (HISTORY_TABLE = s.t)`
    NestedHistory,
    /// `SYSTEM_VERSIONING = ON, HISTORY_TABLE = s.t`
    FlatHistory,
}

impl TemporalShape {
    /// Resolve the history table if the options have this shape.
    pub fn history_table(
        &self,
        options: &[TableOption],
        default_schema: &str,
    ) -> Option<QualifiedName> {
        match self {
            TemporalShape::NestedHistory => options
                .iter()
                .filter(|o| o.is("SYSTEM_VERSIONING"))
                .flat_map(|o| o.nested.iter())
                .find(|o| o.is("HISTORY_TABLE"))
                .and_then(|o| name_from_parts(&o.value, default_schema)),
            TemporalShape::FlatHistory => options
                .iter()
                .find(|o| o.is("HISTORY_TABLE"))
                .and_then(|o| name_from_parts(&o.value, default_schema)),
        }
    }
}

fn name_from_parts(parts: &[String], default_schema: &str) -> Option<QualifiedName> {
    match parts {
        [] => None,
        [name] => Some(QualifiedName::new(default_schema, name.as_str())),
        [.., schema, name] => Some(QualifiedName::new(schema.as_str(), name.as_str())),
    }
}

/// Versioned view over grammar-dependent AST shapes.
pub trait GrammarAdapter: Send + Sync {
    /// The grammar this adapter reads.
    fn grammar(&self) -> Grammar;

    /// History table shapes, in the order they are tried.
    fn temporal_shapes(&self) -> &'static [TemporalShape];

    /// Index sources, in the order they are listed.
    fn index_sources(&self) -> &'static [IndexSource];

    /// Check for `SYSTEM_VERSIONING = ON`.
    fn system_versioning(&self, options: &[TableOption]) -> bool {
        options.iter().any(|o| {
            o.is("SYSTEM_VERSIONING")
                && o.value
                    .first()
                    .is_some_and(|v| v.eq_ignore_ascii_case("ON"))
        })
    }

    /// Resolve the history table using the first shape that matches.
    fn history_table(&self, options: &[TableOption], default_schema: &str) -> Option<QualifiedName> {
        self.temporal_shapes()
            .iter()
            .find_map(|shape| shape.history_table(options, default_schema))
    }
}

/// SQL Server 2022 grammar (default).
#[derive(Debug, Clone, Copy, Default)]
pub struct Sql160;

impl GrammarAdapter for Sql160 {
    fn grammar(&self) -> Grammar {
        Grammar::Sql160
    }

    fn temporal_shapes(&self) -> &'static [TemporalShape] {
        &[TemporalShape::NestedHistory, TemporalShape::FlatHistory]
    }

    fn index_sources(&self) -> &'static [IndexSource] {
        &[IndexSource::Inline, IndexSource::Standalone]
    }
}

/// SQL Server 2016 grammar.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sql130;

impl GrammarAdapter for Sql130 {
    fn grammar(&self) -> Grammar {
        Grammar::Sql130
    }

    fn temporal_shapes(&self) -> &'static [TemporalShape] {
        &[TemporalShape::FlatHistory, TemporalShape::NestedHistory]
    }

    fn index_sources(&self) -> &'static [IndexSource] {
        &[IndexSource::Standalone, IndexSource::Inline]
    }
}

static SQL160: Sql160 = Sql160;
static SQL130: Sql130 = Sql130;

/// Select the adapter for a grammar.
pub fn adapter_for(grammar: Grammar) -> &'static dyn GrammarAdapter {
    match grammar {
        Grammar::Sql160 => &SQL160,
        Grammar::Sql130 => &SQL130,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_options(sql: &str) -> Vec<TableOption> {
        let script = tombstone_ddl::parse(sql).unwrap();
        let options = script.tables().next().map(|t| t.options.clone()).unwrap_or_default();
        options
    }

    #[test]
    fn test_nested_history() {
        let options = table_options(
            "CREATE TABLE t (id INT) WITH (SYSTEM_VERSIONING = ON (HISTORY_TABLE = history.t))",
        );
        let adapter = adapter_for(Grammar::Sql160);
        assert!(adapter.system_versioning(&options));
        assert_eq!(
            adapter.history_table(&options, "dbo"),
            Some(QualifiedName::new("history", "t"))
        );
    }

    #[test]
    fn test_flat_history_with_default_schema() {
        let options = table_options(
            "CREATE TABLE t (id INT) WITH (SYSTEM_VERSIONING = ON, HISTORY_TABLE = t_history)",
        );
        assert_eq!(
            adapter_for(Grammar::Sql130).history_table(&options, "app"),
            Some(QualifiedName::new("app", "t_history"))
        );
    }

    #[test]
    fn test_fallback_order_differs() {
        let options = table_options(
            "CREATE TABLE t (id INT) WITH (SYSTEM_VERSIONING = ON (HISTORY_TABLE = a.nested), HISTORY_TABLE = b.flat)",
        );
        assert_eq!(
            adapter_for(Grammar::Sql160).history_table(&options, "dbo"),
            Some(QualifiedName::new("a", "nested"))
        );
        assert_eq!(
            adapter_for(Grammar::Sql130).history_table(&options, "dbo"),
            Some(QualifiedName::new("b", "flat"))
        );
    }

    #[test]
    fn test_versioning_without_history() {
        let options = table_options("CREATE TABLE t (id INT) WITH (SYSTEM_VERSIONING = ON)");
        let adapter = adapter_for(Grammar::Sql160);
        assert!(adapter.system_versioning(&options));
        assert_eq!(adapter.history_table(&options, "dbo"), None);

        let options = table_options("CREATE TABLE t (id INT) WITH (DATA_COMPRESSION = PAGE)");
        assert!(!adapter.system_versioning(&options));
    }
}
