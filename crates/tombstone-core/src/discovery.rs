//! Existing-object discovery.
//!
//! Triggers, views, procedures and functions that already exist in the input
//! tree (or hand-written in the output directory) are user-owned: when one has
//! exactly the name the generator would produce, the generator leaves it alone.

use crate::catalog::QualifiedName;
use crate::diagnostics::{Diagnostic, DiagnosticCode, Location};
use serde::Serialize;
use std::collections::BTreeMap;
use tombstone_ddl::{CreateVerb, ObjectKind, ObjectStatement};

/// A programmable object found in the corpus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredObject {
    pub kind: ObjectKind,
    pub name: QualifiedName,
    /// `ON` table of a DML trigger.
    pub target: Option<QualifiedName>,
    pub verb: CreateVerb,
    pub location: Location,
}

impl DiscoveredObject {
    /// Build from a parsed statement, resolving names against `default_schema`.
    pub fn from_statement(
        statement: &ObjectStatement,
        default_schema: &str,
        location: Location,
    ) -> Self {
        Self {
            kind: statement.kind,
            name: QualifiedName::from_object_name(&statement.name, default_schema),
            target: statement
                .target
                .as_ref()
                .map(|t| QualifiedName::from_object_name(t, default_schema)),
            verb: statement.verb,
            location,
        }
    }
}

/// Summary of a user-owned object, as listed in the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnedObject {
    pub name: QualifiedName,
    pub kind: String,
    pub created: bool,
    pub location: Location,
}

/// The outcome of claiming a generated name that a user already owns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suppression {
    /// Where the owning object was first seen.
    pub owner: Location,
    pub diagnostics: Vec<Diagnostic>,
}

/// Discovered objects keyed by qualified name.
#[derive(Debug, Clone, Default)]
pub struct DiscoveryRegistry {
    objects: BTreeMap<QualifiedName, Vec<DiscoveredObject>>,
}

impl DiscoveryRegistry {
    /// Build from objects in arrival order.
    pub fn new(objects: impl IntoIterator<Item = DiscoveredObject>) -> Self {
        let mut registry = Self::default();
        for object in objects {
            registry
                .objects
                .entry(object.name.clone())
                .or_default()
                .push(object);
        }
        tracing::debug!(objects = registry.objects.len(), "discovery registry built");
        registry
    }

    /// Check whether an object of this name exists in any form.
    pub fn is_user_owned(&self, name: &QualifiedName) -> bool {
        self.objects.contains_key(name)
    }

    /// All statements seen for a name.
    pub fn get(&self, name: &QualifiedName) -> &[DiscoveredObject] {
        self.objects.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Owned objects in name order.
    pub fn owned(&self) -> impl Iterator<Item = OwnedObject> + '_ {
        self.objects.iter().filter_map(|(name, seen)| {
            let first = seen.first()?;
            Some(OwnedObject {
                name: name.clone(),
                kind: first.kind.to_string().to_ascii_lowercase(),
                created: seen.iter().any(|o| o.verb.creates()),
                location: first.location.clone(),
            })
        })
    }

    /// Check a name the generator wants to produce.
    ///
    /// Returns `None` when nobody owns the name. `expected_target` is the table
    /// a generated trigger would be attached to.
    pub fn claim(
        &self,
        name: &QualifiedName,
        expected_target: Option<&QualifiedName>,
    ) -> Option<Suppression> {
        let seen = self.objects.get(name)?;
        let first = seen.first()?;
        let mut diagnostics = Vec::new();

        if let Some(expected) = expected_target {
            for object in seen {
                let Some(target) = &object.target else {
                    continue;
                };
                if target != expected {
                    diagnostics.push(
                        Diagnostic::new(
                            DiagnosticCode::TriggerTargetMismatch,
                            format!(
                                "trigger {} targets {} but the generated trigger of that name belongs to {}; generation is still skipped",
                                name, target, expected
                            ),
                        )
                        .at(object.location.clone()),
                    );
                }
            }
        }

        if !seen.iter().any(|o| o.verb.creates()) {
            diagnostics.push(
                Diagnostic::new(
                    DiagnosticCode::AlterOnlyObject,
                    format!(
                        "{} is only altered, never created; deployment needs it to exist already",
                        name
                    ),
                )
                .at(first.location.clone()),
            );
        }

        Some(Suppression {
            owner: first.location.clone(),
            diagnostics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object(verb: CreateVerb, name: &str, target: Option<&str>) -> DiscoveredObject {
        DiscoveredObject {
            kind: ObjectKind::Trigger,
            name: QualifiedName::parse(name, "dbo"),
            target: target.map(|t| QualifiedName::parse(t, "dbo")),
            verb,
            location: Location::new("triggers.sql", 1, 1),
        }
    }

    #[test]
    fn test_conventional_name_is_claimed() {
        let registry = DiscoveryRegistry::new([object(
            CreateVerb::Create,
            "trg_users_cascade_soft_delete",
            Some("users"),
        )]);
        let name = QualifiedName::new("DBO", "TRG_Users_Cascade_Soft_Delete");
        assert!(registry.is_user_owned(&name));

        let suppression = registry
            .claim(&name, Some(&QualifiedName::new("dbo", "users")))
            .unwrap();
        assert!(suppression.diagnostics.is_empty());
        assert_eq!(suppression.owner.file, "triggers.sql");
    }

    #[test]
    fn test_unknown_name_is_not_claimed() {
        let registry = DiscoveryRegistry::new([object(
            CreateVerb::Create,
            "users_audit",
            Some("users"),
        )]);
        let name = QualifiedName::new("dbo", "trg_users_cascade_soft_delete");
        assert!(registry.claim(&name, None).is_none());
    }

    #[test]
    fn test_schema_scoped_match() {
        let registry = DiscoveryRegistry::new([object(
            CreateVerb::Create,
            "app.trg_users_cascade_soft_delete",
            Some("app.users"),
        )]);
        let name = QualifiedName::new("dbo", "trg_users_cascade_soft_delete");
        assert!(!registry.is_user_owned(&name));
    }

    #[test]
    fn test_target_mismatch_still_suppresses() {
        let registry = DiscoveryRegistry::new([object(
            CreateVerb::CreateOrAlter,
            "trg_users_cascade_soft_delete",
            Some("accounts"),
        )]);
        let name = QualifiedName::new("dbo", "trg_users_cascade_soft_delete");
        let suppression = registry
            .claim(&name, Some(&QualifiedName::new("dbo", "users")))
            .unwrap();
        assert_eq!(suppression.diagnostics.len(), 1);
        assert_eq!(
            suppression.diagnostics[0].code,
            DiagnosticCode::TriggerTargetMismatch
        );
    }

    #[test]
    fn test_alter_only_warns() {
        let registry = DiscoveryRegistry::new([object(CreateVerb::Alter, "vw_users", None)]);
        let name = QualifiedName::new("dbo", "vw_users");
        let suppression = registry.claim(&name, None).unwrap();
        assert_eq!(
            suppression.diagnostics[0].code,
            DiagnosticCode::AlterOnlyObject
        );

        let owned: Vec<_> = registry.owned().collect();
        assert_eq!(owned.len(), 1);
        assert!(!owned[0].created);
        assert_eq!(owned[0].kind, "trigger");
    }

    #[test]
    fn test_alter_with_create_elsewhere_is_quiet() {
        let registry = DiscoveryRegistry::new([
            object(CreateVerb::Alter, "vw_users", None),
            object(CreateVerb::Create, "vw_users", None),
        ]);
        let name = QualifiedName::new("dbo", "vw_users");
        assert!(registry.claim(&name, None).unwrap().diagnostics.is_empty());
        assert_eq!(registry.get(&name).len(), 2);
    }
}
