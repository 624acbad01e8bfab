//! Pass-through views over active rows.

use super::naming::{object_name, ObjectPurpose};
use super::sql::{column, qualified};
use crate::catalog::TableMetadata;

/// `vw_<table>`: every column of the table, active rows only.
pub fn active_view(table: &TableMetadata) -> String {
    let columns: Vec<String> = table
        .columns
        .iter()
        .map(|c| column("t", &c.name))
        .collect();

    let mut out = String::new();
    out.push_str(&format!(
        "CREATE OR ALTER VIEW {}\nAS\n",
        qualified(&object_name(&table.name, ObjectPurpose::View))
    ));
    out.push_str(&format!("SELECT\n    {}\n", columns.join(",\n    ")));
    out.push_str(&format!("FROM {} AS t\n", qualified(&table.name)));
    out.push_str(&format!(
        "WHERE {} = 1;\nGO\n",
        column("t", table.active_column())
    ));
    out
}
