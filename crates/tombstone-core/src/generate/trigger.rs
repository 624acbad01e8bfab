//! Soft-delete triggers.
//!
//! All three triggers fire `AFTER UPDATE` and look only at rows whose active
//! flag changed between `deleted` and `inserted`.

use super::naming::{object_name, ObjectPurpose};
use super::sql::{column, join_condition, nstring, qualified, quote_ident};
use crate::catalog::{TableMetadata, TableRegistry};
use crate::graph::RelationshipEdge;

/// Error number raised by the reactivation guard.
pub const REACTIVATION_ERROR: u32 = 50001;
/// Error number raised by the restrict trigger.
pub const RESTRICT_ERROR: u32 = 50002;

fn header(table: &TableMetadata, purpose: ObjectPurpose) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "CREATE OR ALTER TRIGGER {}\n",
        qualified(&object_name(&table.name, purpose))
    ));
    out.push_str(&format!("ON {}\n", qualified(&table.name)));
    out.push_str("AFTER UPDATE\nAS\nBEGIN\n");
    out.push_str("    SET NOCOUNT ON;\n\n");
    out.push_str(&format!(
        "    IF NOT UPDATE({}) RETURN;\n",
        quote_ident(table.active_column())
    ));
    out
}

fn footer(out: &mut String) {
    out.push_str("END;\nGO\n");
}

/// Join of `inserted` to `deleted` on the table's key.
fn transition_join(key: &[String]) -> String {
    format!(
        "INNER JOIN deleted AS d ON {}",
        join_condition("d", key, "i", key)
    )
}

/// Cascade trigger on a parent: deactivating it deactivates active children.
///
/// `edges` are the parent's cascade edges. The parent must have a primary key.
pub fn cascade_trigger(
    parent: &TableMetadata,
    key: &[String],
    edges: &[&RelationshipEdge],
    registry: &TableRegistry,
) -> String {
    let mut out = header(parent, ObjectPurpose::CascadeSoftDelete);
    let active = parent.active_column();

    for edge in edges {
        let Some(child) = registry.get(&edge.child) else {
            continue;
        };
        let child_active = child.active_column();

        let mut assignments = vec![format!("{} = 0", column("c", child_active))];
        if let (Some(child_by), Some(parent_by)) =
            (child.updated_by_column(), parent.updated_by_column())
        {
            assignments.push(format!("{} = {}", column("c", child_by), column("i", parent_by)));
        }
        if let Some(child_at) = child.updated_at_column() {
            assignments.push(format!("{} = SYSUTCDATETIME()", column("c", child_at)));
        }

        out.push_str(&format!("\n    -- {} via {}\n", edge.child, edge.name));
        out.push_str("    UPDATE c\n");
        out.push_str(&format!("    SET {}\n", assignments.join(",\n        ")));
        out.push_str(&format!("    FROM {} AS c\n", qualified(&edge.child)));
        out.push_str(&format!(
            "    INNER JOIN inserted AS i ON {}\n",
            join_condition("c", &edge.child_columns, "i", &edge.parent_columns)
        ));
        out.push_str(&format!("    {}\n", transition_join(key)));
        out.push_str(&format!("    WHERE {} = 1\n", column("d", active)));
        out.push_str(&format!("      AND {} = 0\n", column("i", active)));
        out.push_str(&format!("      AND {} = 1;\n", column("c", child_active)));
    }

    footer(&mut out);
    out
}

/// Reactivation guard on a child: a row cannot become active while the
/// parent it references is inactive.
pub fn reactivation_guard(
    child: &TableMetadata,
    key: &[String],
    edges: &[&RelationshipEdge],
    registry: &TableRegistry,
) -> String {
    let mut out = header(child, ObjectPurpose::ReactivationGuard);
    let active = child.active_column();

    for edge in edges {
        let Some(parent) = registry.get(&edge.parent) else {
            continue;
        };
        let message = format!(
            "Cannot reactivate a row of {} while its parent row in {} is inactive ({}).",
            child.name, parent.name, edge.name
        );

        out.push_str(&format!("\n    -- parent {} via {}\n", edge.parent, edge.name));
        out.push_str("    IF EXISTS (\n        SELECT 1\n        FROM inserted AS i\n");
        out.push_str(&format!("        {}\n", transition_join(key)));
        out.push_str(&format!(
            "        INNER JOIN {} AS p ON {}\n",
            qualified(&edge.parent),
            join_condition("p", &edge.parent_columns, "i", &edge.child_columns)
        ));
        out.push_str(&format!("        WHERE {} = 0\n", column("d", active)));
        out.push_str(&format!("          AND {} = 1\n", column("i", active)));
        out.push_str(&format!(
            "          AND {} = 0\n    )\n",
            column("p", parent.active_column())
        ));
        throw(&mut out, REACTIVATION_ERROR, &message);
    }

    footer(&mut out);
    out
}

/// Restrict trigger on a parent: deactivation fails while any active child
/// row references it.
pub fn restrict_trigger(
    parent: &TableMetadata,
    key: &[String],
    edges: &[&RelationshipEdge],
    registry: &TableRegistry,
) -> String {
    let mut out = header(parent, ObjectPurpose::RestrictSoftDelete);
    let active = parent.active_column();

    for edge in edges {
        let Some(child) = registry.get(&edge.child) else {
            continue;
        };
        let message = format!(
            "Cannot deactivate a row of {} while active rows in {} reference it ({}).",
            parent.name, child.name, edge.name
        );

        out.push_str(&format!("\n    -- {} via {}\n", edge.child, edge.name));
        out.push_str("    IF EXISTS (\n        SELECT 1\n        FROM inserted AS i\n");
        out.push_str(&format!("        {}\n", transition_join(key)));
        out.push_str(&format!(
            "        INNER JOIN {} AS c ON {}\n",
            qualified(&edge.child),
            join_condition("c", &edge.child_columns, "i", &edge.parent_columns)
        ));
        out.push_str(&format!("        WHERE {} = 1\n", column("d", active)));
        out.push_str(&format!("          AND {} = 0\n", column("i", active)));
        out.push_str(&format!(
            "          AND {} = 1\n    )\n",
            column("c", child.active_column())
        ));
        throw(&mut out, RESTRICT_ERROR, &message);
    }

    footer(&mut out);
    out
}

fn throw(out: &mut String, number: u32, message: &str) {
    out.push_str("    BEGIN\n        ROLLBACK TRANSACTION;\n");
    out.push_str(&format!(
        "        THROW {}, {}, 1;\n    END;\n",
        number,
        nstring(message)
    ));
}
