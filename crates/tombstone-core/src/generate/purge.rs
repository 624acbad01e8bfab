//! The global purge procedure.
//!
//! Inactive rows older than the retention window are deleted for good, children
//! before parents. A row is kept while any row of any child table still
//! references it, whatever that child's own state.

use super::naming::purge_procedure_name;
use super::sql::{column, join_condition, qualified, temp_table};
use crate::catalog::{QualifiedName, TableMetadata, TableRegistry};
use crate::config::GeneratorConfig;
use crate::diagnostics::{Diagnostic, DiagnosticCode};
use crate::graph::RelationshipGraph;

/// A table the procedure purges, with what its statements need.
#[derive(Debug, Clone, PartialEq)]
pub struct PurgeTarget {
    pub table: QualifiedName,
    pub key: Vec<String>,
    pub active_column: String,
    pub retention_column: String,
    /// History table of a system-versioned table.
    pub history: Option<QualifiedName>,
}

/// Select the purged tables in child-before-parent order.
///
/// Tables without a key or on a cascade cycle are already reported elsewhere
/// and are skipped quietly.
pub fn purge_targets(
    registry: &TableRegistry,
    graph: &RelationshipGraph,
) -> (Vec<PurgeTarget>, Vec<Diagnostic>) {
    let mut targets = Vec::new();
    let mut diagnostics = Vec::new();

    for name in graph.purge_order() {
        let Some(table) = registry.get(name) else {
            continue;
        };
        if !table.participates() || graph.in_cycle(name) {
            continue;
        }
        let Some(key) = table.primary_key() else {
            continue;
        };

        match eligibility(table) {
            Ok((retention_column, history)) => targets.push(PurgeTarget {
                table: table.name.clone(),
                key: key.to_vec(),
                active_column: table.active_column().to_string(),
                retention_column,
                history,
            }),
            Err(reason) => {
                tracing::debug!(table = %table.name, reason, "table left out of purge");
                diagnostics.push(
                    Diagnostic::new(
                        DiagnosticCode::PurgeSkipped,
                        format!("table {} is not purged: {}", table.name, reason),
                    )
                    .at(table.location.clone()),
                );
            }
        }
    }

    (targets, diagnostics)
}

fn eligibility(table: &TableMetadata) -> Result<(String, Option<QualifiedName>), &'static str> {
    let retention = match table.retention_column() {
        Some(column) => column.to_string(),
        None if table.temporal.enabled => return Err("it has no period start column"),
        None => return Err("it has no updated-at column to measure retention"),
    };
    if !table.temporal.enabled {
        return Ok((retention, None));
    }
    match &table.temporal.history {
        Some(history) => Ok((retention, Some(history.clone()))),
        None => Err("its history table is unknown"),
    }
}

/// Render the procedure. `targets` must be non-empty and in purge order.
pub fn purge_procedure(
    targets: &[PurgeTarget],
    graph: &RelationshipGraph,
    config: &GeneratorConfig,
) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "CREATE OR ALTER PROCEDURE {}\n",
        qualified(&purge_procedure_name(&config.purge_schema))
    ));
    out.push_str(&format!(
        "    @retention_days INT = {}\nAS\nBEGIN\n",
        config.retention_days
    ));
    out.push_str("    SET NOCOUNT ON;\n    SET XACT_ABORT ON;\n\n");
    out.push_str(
        "    DECLARE @cutoff DATETIME2 = DATEADD(DAY, -@retention_days, SYSUTCDATETIME());\n",
    );
    out.push_str("    DECLARE @purged INT = 0;\n\n");
    out.push_str("    BEGIN TRANSACTION;\n");

    for target in targets {
        purge_table(&mut out, target, graph);
    }

    out.push_str("\n    COMMIT TRANSACTION;\n\n");
    out.push_str("    SELECT @purged AS purged_rows;\nEND;\nGO\n");
    out
}

fn purge_table(out: &mut String, target: &PurgeTarget, graph: &RelationshipGraph) {
    let table = qualified(&target.table);
    let staging = temp_table("purge", &target.table);
    let key_join = join_condition("t", &target.key, "h", &target.key);

    let selected: Vec<String> = target.key.iter().map(|k| column("t", k)).collect();
    out.push_str(&format!("\n    -- {}\n", target.table));
    out.push_str(&format!("    SELECT {}\n", selected.join(", ")));
    out.push_str(&format!("    INTO {}\n", staging));
    out.push_str(&format!("    FROM {} AS t\n", table));
    out.push_str(&format!("    WHERE {} = 0\n", column("t", &target.active_column)));
    out.push_str(&format!(
        "      AND {} < @cutoff",
        column("t", &target.retention_column)
    ));
    for edge in graph.children_of(&target.table) {
        if edge.child_columns.is_empty() || edge.parent_columns.is_empty() {
            continue;
        }
        out.push_str(&format!(
            "\n      AND NOT EXISTS (SELECT 1 FROM {} AS c WHERE {})",
            qualified(&edge.child),
            join_condition("c", &edge.child_columns, "t", &edge.parent_columns)
        ));
    }
    out.push_str(";\n\n");

    if target.history.is_some() {
        out.push_str(&format!(
            "    ALTER TABLE {} SET (SYSTEM_VERSIONING = OFF);\n\n",
            table
        ));
    }

    out.push_str(&format!("    DELETE t\n    FROM {} AS t\n", table));
    out.push_str(&format!(
        "    INNER JOIN {} AS h ON {};\n",
        staging, key_join
    ));
    out.push_str("    SET @purged += @@ROWCOUNT;\n");

    if let Some(history) = &target.history {
        out.push_str(&format!(
            "\n    DELETE t\n    FROM {} AS t\n",
            qualified(history)
        ));
        out.push_str(&format!(
            "    INNER JOIN {} AS h ON {};\n\n",
            staging, key_join
        ));
        out.push_str(&format!(
            "    ALTER TABLE {} SET (SYSTEM_VERSIONING = ON (HISTORY_TABLE = {}));\n",
            table,
            qualified(history)
        ));
    }

    out.push_str(&format!("\n    DROP TABLE {};\n", staging));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::registry;
    use pretty_assertions::assert_eq;

    const COUNTRIES: &str = "CREATE TABLE dbo.countries (\n    iso_alpha2 CHAR(2) NOT NULL PRIMARY KEY,\n    is_active BIT NOT NULL,\n    updated_at DATETIME2 NOT NULL\n)";
    const DIALLING_CODES: &str = "CREATE TABLE dbo.dialling_codes (\n    country_code CHAR(2) NOT NULL,\n    dialling_code VARCHAR(8) NOT NULL,\n    is_active BIT NOT NULL,\n    updated_at DATETIME2 NOT NULL,\n    CONSTRAINT fk_dialling_codes_countries FOREIGN KEY (country_code) REFERENCES dbo.countries (iso_alpha2)\n)\nGO\nALTER TABLE dbo.dialling_codes ADD CONSTRAINT pk_dialling_codes PRIMARY KEY (country_code, dialling_code);";

    fn targets(files: &[(&str, &str)]) -> (Vec<PurgeTarget>, Vec<Diagnostic>, RelationshipGraph) {
        let registry = registry(files);
        let (graph, _) = RelationshipGraph::build(&registry);
        let (targets, diags) = purge_targets(&registry, &graph);
        (targets, diags, graph)
    }

    #[test]
    fn test_composite_key_purge() {
        let (targets, diags, graph) = targets(&[
            ("countries.sql", COUNTRIES),
            ("dialling_codes.sql", DIALLING_CODES),
        ]);
        assert!(diags.is_empty());
        let order: Vec<_> = targets.iter().map(|t| t.table.name.as_str()).collect();
        assert_eq!(order, vec!["dialling_codes", "countries"]);

        let sql = purge_procedure(&targets, &graph, &GeneratorConfig::default());
        let expected_codes = "
    -- dbo.dialling_codes
    SELECT t.country_code, t.dialling_code
    INTO #purge_dbo_dialling_codes
    FROM dbo.dialling_codes AS t
    WHERE t.is_active = 0
      AND t.updated_at < @cutoff;

    DELETE t
    FROM dbo.dialling_codes AS t
    INNER JOIN #purge_dbo_dialling_codes AS h ON t.country_code = h.country_code AND t.dialling_code = h.dialling_code;
    SET @purged += @@ROWCOUNT;

    DROP TABLE #purge_dbo_dialling_codes;
";
        assert!(sql.contains(expected_codes), "{sql}");
        assert!(sql.contains(
            "      AND NOT EXISTS (SELECT 1 FROM dbo.dialling_codes AS c WHERE c.country_code = t.iso_alpha2);\n"
        ));
        assert!(!sql.contains("t.id"));
        assert!(sql.starts_with(
            "CREATE OR ALTER PROCEDURE dbo.usp_purge_soft_deleted\n    @retention_days INT = 90\n"
        ));
        assert!(sql.ends_with("    SELECT @purged AS purged_rows;\nEND;\nGO\n"));
    }

    #[test]
    fn test_temporal_table_purges_history() {
        let users = "CREATE TABLE app.users (\n    id INT NOT NULL PRIMARY KEY,\n    is_active BIT NOT NULL,\n    valid_from DATETIME2 GENERATED ALWAYS AS ROW START,\n    valid_to DATETIME2 GENERATED ALWAYS AS ROW END,\n    PERIOD FOR SYSTEM_TIME (valid_from, valid_to)\n) WITH (SYSTEM_VERSIONING = ON (HISTORY_TABLE = history.users))";
        let (targets, diags, graph) = targets(&[("users.sql", users)]);
        assert!(diags.is_empty());
        assert_eq!(targets[0].retention_column, "valid_from");

        let sql = purge_procedure(&targets, &graph, &GeneratorConfig::default());
        assert!(sql.contains("AND t.valid_from < @cutoff;"));
        let off = sql.find("ALTER TABLE app.users SET (SYSTEM_VERSIONING = OFF);").unwrap();
        let delete = sql.find("FROM app.users AS t\n    INNER JOIN").unwrap();
        let history = sql.find("FROM history.users AS t").unwrap();
        let on = sql
            .find("ALTER TABLE app.users SET (SYSTEM_VERSIONING = ON (HISTORY_TABLE = history.users));")
            .unwrap();
        assert!(off < delete && delete < history && history < on);
    }

    #[test]
    fn test_skipped_tables() {
        let no_retention = "CREATE TABLE dbo.tags (id INT PRIMARY KEY, is_active BIT)";
        let unknown_history = "CREATE TABLE dbo.notes (id INT PRIMARY KEY, is_active BIT, s DATETIME2 GENERATED ALWAYS AS ROW START, e DATETIME2 GENERATED ALWAYS AS ROW END, PERIOD FOR SYSTEM_TIME (s, e)) WITH (SYSTEM_VERSIONING = ON)";
        let no_key = "CREATE TABLE dbo.events (name NVARCHAR(50), is_active BIT, updated_at DATETIME2)";
        let (targets, diags, _) = targets(&[
            ("tags.sql", no_retention),
            ("notes.sql", unknown_history),
            ("events.sql", no_key),
        ]);
        assert!(targets.is_empty());
        assert_eq!(diags.len(), 2);
        assert!(diags.iter().all(|d| d.code == DiagnosticCode::PurgeSkipped));
        assert!(diags.iter().any(|d| d.message.contains("history table is unknown")));
    }

    #[test]
    fn test_rejected_edges_still_guard() {
        let users = "CREATE TABLE users (id INT PRIMARY KEY, email NVARCHAR(320) UNIQUE, is_active BIT, updated_at DATETIME2)";
        let invites = "CREATE TABLE invites (id INT PRIMARY KEY, email NVARCHAR(320) REFERENCES users (email))";
        let (targets, _, graph) = targets(&[("users.sql", users), ("invites.sql", invites)]);
        assert_eq!(targets.len(), 1);
        let sql = purge_procedure(&targets, &graph, &GeneratorConfig::default());
        assert!(sql.contains("NOT EXISTS (SELECT 1 FROM dbo.invites AS c WHERE c.email = t.email)"));
    }
}
