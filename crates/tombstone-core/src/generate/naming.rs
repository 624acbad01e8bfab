//! Naming convention for generated objects.
//!
//! Discovery matches user-authored objects against these exact names, so
//! changing one here changes which files are considered user-owned.

use crate::catalog::QualifiedName;
use serde::Serialize;
use std::fmt;

/// Name of the global purge procedure.
pub const PURGE_PROCEDURE: &str = "usp_purge_soft_deleted";

/// What a generated object is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ObjectPurpose {
    CascadeSoftDelete,
    ReactivationGuard,
    RestrictSoftDelete,
    View,
    Purge,
}

impl ObjectPurpose {
    /// Check whether the object is a DML trigger attached to its table.
    pub fn is_trigger(&self) -> bool {
        matches!(
            self,
            ObjectPurpose::CascadeSoftDelete
                | ObjectPurpose::ReactivationGuard
                | ObjectPurpose::RestrictSoftDelete
        )
    }

    fn suffix(&self) -> &'static str {
        match self {
            ObjectPurpose::CascadeSoftDelete => "cascade_soft_delete",
            ObjectPurpose::ReactivationGuard => "reactivation_guard",
            ObjectPurpose::RestrictSoftDelete => "restrict_soft_delete",
            ObjectPurpose::View => "view",
            ObjectPurpose::Purge => "purge",
        }
    }
}

impl fmt::Display for ObjectPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

/// Name of the object generated for a table. Objects live in the table's schema.
///
/// `Purge` is global; see [`purge_procedure_name`].
pub fn object_name(table: &QualifiedName, purpose: ObjectPurpose) -> QualifiedName {
    let name = match purpose {
        ObjectPurpose::View => format!("vw_{}", table.name),
        ObjectPurpose::Purge => PURGE_PROCEDURE.to_string(),
        trigger => format!("trg_{}_{}", table.name, trigger.suffix()),
    };
    QualifiedName::new(table.schema.as_str(), name)
}

pub fn purge_procedure_name(purge_schema: &str) -> QualifiedName {
    QualifiedName::new(purge_schema, PURGE_PROCEDURE)
}

/// File name of a generated object, schema-prefixed outside the default schema.
pub fn file_name(object: &QualifiedName, default_schema: &str) -> String {
    if object.in_schema(default_schema) {
        format!("{}.sql", object.name)
    } else {
        format!("{}.{}.sql", object.schema, object.name)
    }
}
