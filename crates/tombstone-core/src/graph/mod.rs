//! Foreign-key relationship graph and cascade classification.
//!
//! One node per registry table, one edge per foreign key. Edges point from
//! child to parent in referential terms; cascades travel the other way.

mod cycles;
mod edge;

pub use cycles::find_cycles;
pub use edge::{CascadePolicy, RelationshipEdge};

use crate::catalog::{QualifiedName, TableMetadata, TableRegistry};
use crate::diagnostics::{Diagnostic, DiagnosticCode};
use std::collections::{BTreeMap, BTreeSet};

/// The classified relationship graph. Frozen once built.
#[derive(Debug, Clone, Default)]
pub struct RelationshipGraph {
    /// Kept edges ordered by (child, constraint name).
    edges: Vec<RelationshipEdge>,
    /// Tables that are part of a cascade cycle.
    cyclic: BTreeSet<QualifiedName>,
    /// Every table, children before parents.
    purge_order: Vec<QualifiedName>,
}

impl RelationshipGraph {
    /// Build and classify the graph of a registry.
    pub fn build(registry: &TableRegistry) -> (Self, Vec<Diagnostic>) {
        let mut diagnostics = Vec::new();
        let mut edges = Vec::new();

        for child in registry.iter() {
            for (ordinal, fk) in child.foreign_keys().enumerate() {
                let Some(target) = &fk.references else {
                    continue;
                };
                let name = fk.name.clone().unwrap_or_else(|| {
                    format!("fk_{}_{}_{}", child.name.name, target.table.name, ordinal + 1)
                });

                let Some(parent) = registry.get(&target.table) else {
                    diagnostics.push(
                        Diagnostic::new(
                            DiagnosticCode::UndefinedReference,
                            format!(
                                "foreign key {} on {} references undefined table {}",
                                name, child.name, target.table
                            ),
                        )
                        .at(fk.location.clone()),
                    );
                    continue;
                };

                let child_columns = declared_casing(&fk.columns, child);
                let parent_columns = if target.columns.is_empty() {
                    parent.primary_key().map(<[String]>::to_vec).unwrap_or_default()
                } else {
                    declared_casing(&target.columns, parent)
                };

                let rejected = !matches_primary_key(&child_columns, &parent_columns, parent);
                if rejected {
                    diagnostics.push(
                        Diagnostic::new(
                            DiagnosticCode::ForeignKeyMismatch,
                            format!(
                                "foreign key {} on {} references ({}) but the primary key of {} is ({}); no cascade is generated",
                                name,
                                child.name,
                                parent_columns.join(", "),
                                parent.name,
                                parent.primary_key().map(|k| k.join(", ")).unwrap_or_default()
                            ),
                        )
                        .at(fk.location.clone()),
                    );
                }

                let policies = if rejected {
                    vec![CascadePolicy::None]
                } else {
                    classify(child, parent)
                };

                edges.push(RelationshipEdge {
                    name,
                    child: child.name.clone(),
                    child_columns,
                    parent: parent.name.clone(),
                    parent_columns,
                    policies,
                    rejected,
                    location: fk.location.clone(),
                });
            }
        }

        edges.sort_by(|a, b| {
            a.child
                .cmp(&b.child)
                .then_with(|| a.name.to_ascii_lowercase().cmp(&b.name.to_ascii_lowercase()))
        });

        let mut cyclic = BTreeSet::new();
        let mut adjacency: BTreeMap<QualifiedName, Vec<QualifiedName>> = BTreeMap::new();
        for edge in edges.iter().filter(|e| e.is_cascade()) {
            adjacency
                .entry(edge.parent.clone())
                .or_default()
                .push(edge.child.clone());
            adjacency.entry(edge.child.clone()).or_default();
        }
        for cycle in find_cycles(&adjacency) {
            let members: BTreeSet<&QualifiedName> = cycle.iter().collect();
            let location = edges
                .iter()
                .find(|e| {
                    e.is_cascade() && members.contains(&e.child) && members.contains(&e.parent)
                })
                .map(|e| e.location.clone());
            let listed: Vec<String> = cycle.iter().map(ToString::to_string).collect();
            let mut diagnostic = Diagnostic::new(
                DiagnosticCode::CascadeCycle,
                format!(
                    "cascade cycle through {}; soft-delete triggers and purge are skipped for these tables",
                    listed.join(" -> ")
                ),
            );
            if let Some(location) = location {
                diagnostic = diagnostic.at(location);
            }
            diagnostics.push(diagnostic);
            cyclic.extend(cycle);
        }

        let purge_order = purge_order(registry, &edges);

        tracing::debug!(
            edges = edges.len(),
            cyclic = cyclic.len(),
            "relationship graph built"
        );

        (
            Self {
                edges,
                cyclic,
                purge_order,
            },
            diagnostics,
        )
    }

    /// All kept edges, rejected ones included.
    pub fn edges(&self) -> &[RelationshipEdge] {
        &self.edges
    }

    /// Edges whose parent is `table`.
    pub fn children_of<'a>(
        &'a self,
        table: &'a QualifiedName,
    ) -> impl Iterator<Item = &'a RelationshipEdge> + 'a {
        self.edges.iter().filter(move |e| &e.parent == table)
    }

    /// Edges whose child is `table`.
    pub fn parents_of<'a>(
        &'a self,
        table: &'a QualifiedName,
    ) -> impl Iterator<Item = &'a RelationshipEdge> + 'a {
        self.edges.iter().filter(move |e| &e.child == table)
    }

    /// Outgoing edges of a parent carrying a policy.
    pub fn children_with<'a>(
        &'a self,
        table: &'a QualifiedName,
        policy: CascadePolicy,
    ) -> impl Iterator<Item = &'a RelationshipEdge> + 'a {
        self.children_of(table).filter(move |e| e.has_policy(policy))
    }

    /// Incoming edges of a child carrying a policy.
    pub fn parents_with<'a>(
        &'a self,
        table: &'a QualifiedName,
        policy: CascadePolicy,
    ) -> impl Iterator<Item = &'a RelationshipEdge> + 'a {
        self.parents_of(table).filter(move |e| e.has_policy(policy))
    }

    pub fn in_cycle(&self, table: &QualifiedName) -> bool {
        self.cyclic.contains(table)
    }

    pub fn cyclic_tables(&self) -> impl Iterator<Item = &QualifiedName> {
        self.cyclic.iter()
    }

    /// Tables ordered children first. Tables caught in a referential cycle
    /// follow the ordered ones.
    pub fn purge_order(&self) -> &[QualifiedName] {
        &self.purge_order
    }
}

/// Policies of a valid edge.
fn classify(child: &TableMetadata, parent: &TableMetadata) -> Vec<CascadePolicy> {
    if !(child.participates() && parent.participates()) {
        vec![CascadePolicy::None]
    } else if parent.restrict {
        vec![
            CascadePolicy::ReactivationGuard,
            CascadePolicy::RestrictSoftDelete,
        ]
    } else {
        vec![
            CascadePolicy::CascadeSoftDelete,
            CascadePolicy::ReactivationGuard,
        ]
    }
}

/// Referenced columns equal the parent key in length and order.
fn matches_primary_key(child: &[String], referenced: &[String], parent: &TableMetadata) -> bool {
    let Some(key) = parent.primary_key() else {
        return false;
    };
    child.len() == referenced.len()
        && referenced.len() == key.len()
        && referenced
            .iter()
            .zip(key)
            .all(|(r, k)| r.eq_ignore_ascii_case(k))
}

fn declared_casing(names: &[String], table: &TableMetadata) -> Vec<String> {
    names
        .iter()
        .map(|n| {
            table
                .column(n)
                .map(|c| c.name.clone())
                .unwrap_or_else(|| n.clone())
        })
        .collect()
}

/// Kahn's algorithm from the leaves: a table is ready once all of its
/// children are placed.
fn purge_order(registry: &TableRegistry, edges: &[RelationshipEdge]) -> Vec<QualifiedName> {
    let mut children: BTreeMap<&QualifiedName, BTreeSet<&QualifiedName>> =
        registry.names().map(|n| (n, BTreeSet::new())).collect();
    let mut parents: BTreeMap<&QualifiedName, BTreeSet<&QualifiedName>> = BTreeMap::new();
    for edge in edges.iter().filter(|e| !e.is_self_reference()) {
        if let Some(set) = children.get_mut(&edge.parent) {
            set.insert(&edge.child);
        }
        parents.entry(&edge.child).or_default().insert(&edge.parent);
    }

    let mut pending: BTreeMap<&QualifiedName, usize> =
        children.iter().map(|(n, c)| (*n, c.len())).collect();
    let mut ready: BTreeSet<&QualifiedName> = pending
        .iter()
        .filter(|(_, count)| **count == 0)
        .map(|(n, _)| *n)
        .collect();
    let mut order = Vec::with_capacity(pending.len());

    while let Some(next) = ready.pop_first() {
        pending.remove(next);
        order.push(next.clone());
        for parent in parents.get(next).into_iter().flatten() {
            if let Some(count) = pending.get_mut(parent) {
                *count -= 1;
                if *count == 0 {
                    ready.insert(*parent);
                }
            }
        }
    }

    // Whatever is left sits on a referential cycle.
    order.extend(pending.into_keys().cloned());
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GeneratorConfig, TableOverride};
    use crate::test_support::registry_with;

    const USERS: &str = "CREATE TABLE dbo.users (id INT NOT NULL PRIMARY KEY, is_active BIT NOT NULL, updated_by NVARCHAR(100) NULL)";
    const ORDERS: &str = "CREATE TABLE dbo.orders (id INT NOT NULL PRIMARY KEY, user_id INT NOT NULL REFERENCES dbo.users (id), is_active BIT NOT NULL)";

    fn build(files: &[(&str, &str)]) -> (RelationshipGraph, Vec<Diagnostic>) {
        build_with(files, &GeneratorConfig::default())
    }

    fn build_with(
        files: &[(&str, &str)],
        config: &GeneratorConfig,
    ) -> (RelationshipGraph, Vec<Diagnostic>) {
        let (registry, _) = registry_with(files, config);
        RelationshipGraph::build(&registry)
    }

    fn name(n: &str) -> QualifiedName {
        QualifiedName::new("dbo", n)
    }

    #[test]
    fn test_cascade_edge() {
        let (graph, diags) = build(&[("users.sql", USERS), ("orders.sql", ORDERS)]);
        assert!(diags.is_empty());
        assert_eq!(graph.edges().len(), 1);

        let edge = &graph.edges()[0];
        assert_eq!(edge.name, "fk_orders_users_1");
        assert_eq!(edge.child, name("orders"));
        assert_eq!(edge.child_columns, vec!["user_id"]);
        assert_eq!(edge.parent_columns, vec!["id"]);
        assert_eq!(
            edge.policies,
            vec![
                CascadePolicy::CascadeSoftDelete,
                CascadePolicy::ReactivationGuard
            ]
        );
        assert_eq!(
            graph
                .children_with(&name("users"), CascadePolicy::CascadeSoftDelete)
                .count(),
            1
        );
        assert_eq!(graph.purge_order(), &[name("orders"), name("users")]);
    }

    #[test]
    fn test_non_participating_child_gets_none() {
        let (graph, _) = build(&[
            ("users.sql", USERS),
            (
                "logins.sql",
                "CREATE TABLE logins (id INT PRIMARY KEY, user_id INT REFERENCES users)",
            ),
        ]);
        let edge = &graph.edges()[0];
        assert_eq!(edge.parent_columns, vec!["id"]);
        assert_eq!(edge.policies, vec![CascadePolicy::None]);
        assert!(!edge.rejected);
    }

    #[test]
    fn test_restrict_parent() {
        let config = GeneratorConfig::default().with_table(
            "dbo.users",
            TableOverride {
                restrict: true,
                ..TableOverride::default()
            },
        );
        let (graph, _) = build_with(&[("users.sql", USERS), ("orders.sql", ORDERS)], &config);
        let edge = &graph.edges()[0];
        assert!(edge.has_policy(CascadePolicy::RestrictSoftDelete));
        assert!(edge.has_policy(CascadePolicy::ReactivationGuard));
        assert!(!edge.is_cascade());
    }

    #[test]
    fn test_mismatched_key_is_rejected() {
        let (graph, diags) = build(&[
            ("users.sql", USERS),
            (
                "orders.sql",
                "CREATE TABLE orders (id INT PRIMARY KEY, email NVARCHAR(320), is_active BIT,\n  CONSTRAINT fk_orders_email FOREIGN KEY (email) REFERENCES users (email))",
            ),
        ]);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].code, DiagnosticCode::ForeignKeyMismatch);
        assert_eq!(diags[0].location.as_ref().unwrap().line, 2);

        let edge = &graph.edges()[0];
        assert_eq!(edge.name, "fk_orders_email");
        assert!(edge.rejected);
        assert_eq!(edge.policies, vec![CascadePolicy::None]);
        assert_eq!(graph.purge_order(), &[name("orders"), name("users")]);
    }

    #[test]
    fn test_undefined_parent_drops_edge() {
        let (graph, diags) = build(&[("orders.sql", ORDERS)]);
        assert!(graph.edges().is_empty());
        assert_eq!(diags[0].code, DiagnosticCode::UndefinedReference);
    }

    #[test]
    fn test_composite_key_must_match_in_order() {
        let parent = "CREATE TABLE regions (country CHAR(2) NOT NULL, code INT NOT NULL, is_active BIT, PRIMARY KEY (country, code))";
        let (graph, diags) = build(&[
            ("regions.sql", parent),
            (
                "stores.sql",
                "CREATE TABLE stores (id INT PRIMARY KEY, c CHAR(2), r INT, is_active BIT, FOREIGN KEY (c, r) REFERENCES regions (COUNTRY, CODE))",
            ),
            (
                "depots.sql",
                "CREATE TABLE depots (id INT PRIMARY KEY, c CHAR(2), r INT, is_active BIT, FOREIGN KEY (r, c) REFERENCES regions (code, country))",
            ),
        ]);
        assert_eq!(diags.len(), 1);
        let depots_name = name("depots");
        let depots = graph.parents_of(&depots_name).next().unwrap();
        assert!(depots.rejected);
        let stores_name = name("stores");
        let stores = graph.parents_of(&stores_name).next().unwrap();
        assert!(stores.is_cascade());
        assert_eq!(stores.parent_columns, vec!["country", "code"]);
        assert_eq!(
            stores.column_pairs().collect::<Vec<_>>(),
            vec![("c", "country"), ("r", "code")]
        );
    }

    #[test]
    fn test_two_table_cycle() {
        let a = "CREATE TABLE a (id INT PRIMARY KEY, b_id INT REFERENCES b (id), is_active BIT)";
        let b = "CREATE TABLE b (id INT PRIMARY KEY, a_id INT REFERENCES a (id), is_active BIT)";
        let (graph, diags) = build(&[
            ("a.sql", a),
            ("b.sql", b),
            ("users.sql", USERS),
            ("orders.sql", ORDERS),
        ]);

        let cycles: Vec<_> = diags
            .iter()
            .filter(|d| d.code == DiagnosticCode::CascadeCycle)
            .collect();
        assert_eq!(cycles.len(), 1);
        assert!(cycles[0].location.is_some());
        assert!(graph.in_cycle(&name("a")));
        assert!(graph.in_cycle(&name("b")));
        assert!(!graph.in_cycle(&name("users")));

        // Referential cycles go last, in name order.
        assert_eq!(
            graph.purge_order(),
            &[name("orders"), name("users"), name("a"), name("b")]
        );
    }

    #[test]
    fn test_self_reference_cycle() {
        let employees = "CREATE TABLE employees (id INT PRIMARY KEY, manager_id INT REFERENCES employees (id), is_active BIT)";
        let (graph, diags) = build(&[("employees.sql", employees)]);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].code, DiagnosticCode::CascadeCycle);
        assert!(graph.in_cycle(&name("employees")));
        assert_eq!(graph.purge_order(), &[name("employees")]);
    }
}
