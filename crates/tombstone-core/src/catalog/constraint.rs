//! Constraint and index definitions.

use super::QualifiedName;
use crate::diagnostics::Location;
use serde::Serialize;
use tombstone_ddl::ReferentialAction;

/// Kind of table constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ConstraintKind {
    PrimaryKey,
    ForeignKey,
    Unique,
    Check,
    Default,
}

/// Where a constraint was declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ConstraintOrigin {
    /// In the `CREATE TABLE` body (column or table level).
    Inline,
    /// In a later `ALTER TABLE ... ADD CONSTRAINT`.
    AlterTable,
}

/// The referenced side of a foreign key.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForeignKeyTarget {
    pub table: QualifiedName,
    /// Referenced columns; empty when the declaration omits them.
    pub columns: Vec<String>,
    #[serde(serialize_with = "serialize_action")]
    pub on_delete: ReferentialAction,
    #[serde(serialize_with = "serialize_action")]
    pub on_update: ReferentialAction,
}

/// SQL spelling of a referential action.
pub fn action_sql(action: ReferentialAction) -> &'static str {
    match action {
        ReferentialAction::NoAction => "NO ACTION",
        ReferentialAction::Cascade => "CASCADE",
        ReferentialAction::SetNull => "SET NULL",
        ReferentialAction::SetDefault => "SET DEFAULT",
    }
}

fn serialize_action<S: serde::Serializer>(
    action: &ReferentialAction,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(action_sql(*action))
}

/// A table constraint after extraction.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstraintDefinition {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub kind: ConstraintKind,
    /// Constrained columns in declaration order.
    pub columns: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub references: Option<ForeignKeyTarget>,
    /// Expression text for `CHECK` and `DEFAULT`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
    pub origin: ConstraintOrigin,
    #[serde(skip)]
    pub location: Location,
}

impl ConstraintDefinition {
    pub fn new(kind: ConstraintKind, origin: ConstraintOrigin, location: Location) -> Self {
        Self {
            name: None,
            kind,
            columns: Vec::new(),
            references: None,
            expression: None,
            origin,
            location,
        }
    }

    pub fn with_name(mut self, name: Option<String>) -> Self {
        self.name = name;
        self
    }

    pub fn with_columns(mut self, columns: Vec<String>) -> Self {
        self.columns = columns;
        self
    }

    pub fn with_references(mut self, target: ForeignKeyTarget) -> Self {
        self.references = Some(target);
        self
    }

    pub fn with_expression(mut self, expression: impl Into<String>) -> Self {
        self.expression = Some(expression.into());
        self
    }

    /// Name for messages: the declared name or a description of the kind.
    pub fn display_name(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("unnamed {:?} on ({})", self.kind, self.columns.join(", ")),
        }
    }
}

/// An index, from an inline `INDEX` element or `CREATE INDEX`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexDefinition {
    pub name: String,
    pub columns: Vec<String>,
    pub unique: bool,
    pub clustered: bool,
}
