//! Relationship edges between tables.

use crate::catalog::QualifiedName;
use crate::diagnostics::Location;
use serde::Serialize;

/// What the generator does along an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CascadePolicy {
    /// Deactivating the parent deactivates its active children.
    CascadeSoftDelete,
    /// A child cannot be reactivated under an inactive parent.
    ReactivationGuard,
    /// Deactivating the parent fails while active children exist.
    RestrictSoftDelete,
    None,
}

/// One foreign key, from child to parent.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipEdge {
    /// Declared constraint name, or a synthesized one for unnamed keys.
    pub name: String,
    pub child: QualifiedName,
    pub child_columns: Vec<String>,
    pub parent: QualifiedName,
    /// Referenced columns; the parent key when the declaration omits them.
    pub parent_columns: Vec<String>,
    pub policies: Vec<CascadePolicy>,
    /// The key does not match the parent primary key. Only the purge uses it.
    pub rejected: bool,
    #[serde(skip)]
    pub location: Location,
}

impl RelationshipEdge {
    pub fn has_policy(&self, policy: CascadePolicy) -> bool {
        self.policies.contains(&policy)
    }

    pub fn is_cascade(&self) -> bool {
        self.has_policy(CascadePolicy::CascadeSoftDelete)
    }

    pub fn is_self_reference(&self) -> bool {
        self.child == self.parent
    }

    /// Child and parent column pairs, in key order.
    pub fn column_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.child_columns
            .iter()
            .map(String::as_str)
            .zip(self.parent_columns.iter().map(String::as_str))
    }
}
