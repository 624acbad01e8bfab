//! SQL generation.
//!
//! Planning decides which objects each table gets and drops the ones a user
//! already owns; rendering then runs in parallel over the frozen inputs and the
//! results are sorted by file name.

pub mod naming;
mod purge;
pub mod sql;
mod trigger;
mod view;

pub use naming::{file_name, object_name, purge_procedure_name, ObjectPurpose, PURGE_PROCEDURE};
pub use purge::{purge_procedure, purge_targets, PurgeTarget};
pub use trigger::{
    cascade_trigger, reactivation_guard, restrict_trigger, REACTIVATION_ERROR, RESTRICT_ERROR,
};
pub use view::active_view;

use crate::catalog::{QualifiedName, TableMetadata, TableRegistry};
use crate::config::GeneratorConfig;
use crate::diagnostics::{Diagnostic, Location};
use crate::discovery::DiscoveryRegistry;
use crate::graph::{CascadePolicy, RelationshipGraph};
use crate::output::GENERATED_MARKER;
use rayon::prelude::*;
use serde::Serialize;

/// A generated file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedObject {
    pub name: QualifiedName,
    pub purpose: ObjectPurpose,
    /// Owning table; `None` for the purge procedure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table: Option<QualifiedName>,
    pub file_name: String,
    #[serde(skip)]
    pub sql: String,
}

/// An object left to its user-authored definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuppressedObject {
    pub name: QualifiedName,
    pub purpose: ObjectPurpose,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table: Option<QualifiedName>,
    /// Where the user's definition was found.
    pub owner: Location,
}

/// Everything generation produced.
#[derive(Debug, Clone, Default)]
pub struct GenerationResult {
    /// Generated objects sorted by file name.
    pub objects: Vec<GeneratedObject>,
    pub suppressed: Vec<SuppressedObject>,
    pub diagnostics: Vec<Diagnostic>,
}

impl GenerationResult {
    /// Generated objects of one table.
    pub fn objects_for<'a>(
        &'a self,
        table: &'a QualifiedName,
    ) -> impl Iterator<Item = &'a GeneratedObject> + 'a {
        self.objects
            .iter()
            .filter(move |o| o.table.as_ref() == Some(table))
    }

    /// Suppressed objects of one table.
    pub fn suppressed_for<'a>(
        &'a self,
        table: &'a QualifiedName,
    ) -> impl Iterator<Item = &'a SuppressedObject> + 'a {
        self.suppressed
            .iter()
            .filter(move |o| o.table.as_ref() == Some(table))
    }
}

/// One object to render.
#[derive(Debug, Clone)]
struct Planned<'a> {
    name: QualifiedName,
    purpose: ObjectPurpose,
    table: Option<&'a TableMetadata>,
}

/// Generates soft-delete objects from the frozen analysis results.
pub struct Generator<'a> {
    registry: &'a TableRegistry,
    graph: &'a RelationshipGraph,
    discovery: &'a DiscoveryRegistry,
    config: &'a GeneratorConfig,
}

impl<'a> Generator<'a> {
    pub fn new(
        registry: &'a TableRegistry,
        graph: &'a RelationshipGraph,
        discovery: &'a DiscoveryRegistry,
        config: &'a GeneratorConfig,
    ) -> Self {
        Self {
            registry,
            graph,
            discovery,
            config,
        }
    }

    /// Plan, filter and render every object.
    pub fn generate(&self) -> GenerationResult {
        let mut result = GenerationResult::default();
        let mut planned = Vec::new();

        for table in self.registry.iter() {
            for purpose in self.purposes(table) {
                planned.push(Planned {
                    name: object_name(&table.name, purpose),
                    purpose,
                    table: Some(table),
                });
            }
        }

        let (targets, purge_diagnostics) = purge_targets(self.registry, self.graph);
        result.diagnostics.extend(purge_diagnostics);
        if !targets.is_empty() {
            planned.push(Planned {
                name: purge_procedure_name(&self.config.purge_schema),
                purpose: ObjectPurpose::Purge,
                table: None,
            });
        }

        let mut kept = Vec::with_capacity(planned.len());
        for plan in planned {
            let target = plan
                .table
                .filter(|_| plan.purpose.is_trigger())
                .map(|t| &t.name);
            match self.discovery.claim(&plan.name, target) {
                Some(suppression) => {
                    tracing::warn!(
                        object = %plan.name,
                        owner = %suppression.owner.file,
                        "user-owned object found; not generating"
                    );
                    result.diagnostics.extend(suppression.diagnostics);
                    result.suppressed.push(SuppressedObject {
                        name: plan.name,
                        purpose: plan.purpose,
                        table: plan.table.map(|t| t.name.clone()),
                        owner: suppression.owner,
                    });
                }
                None => kept.push(plan),
            }
        }

        let mut objects: Vec<GeneratedObject> = kept
            .par_iter()
            .map(|plan| self.render(plan, &targets))
            .collect();
        objects.sort_by(|a, b| a.file_name.cmp(&b.file_name));
        result.objects = objects;

        tracing::debug!(
            generated = result.objects.len(),
            suppressed = result.suppressed.len(),
            "generation planned and rendered"
        );
        result
    }

    /// Per-table objects, in a fixed order.
    fn purposes(&self, table: &TableMetadata) -> Vec<ObjectPurpose> {
        let mut purposes = Vec::new();
        if !table.participates() {
            tracing::debug!(table = %table.name, "not participating in soft delete");
            return purposes;
        }

        if table.primary_key().is_some() && !self.graph.in_cycle(&table.name) {
            let name = &table.name;
            if table.restrict {
                if self
                    .graph
                    .children_with(name, CascadePolicy::RestrictSoftDelete)
                    .next()
                    .is_some()
                {
                    purposes.push(ObjectPurpose::RestrictSoftDelete);
                }
            } else if self
                .graph
                .children_with(name, CascadePolicy::CascadeSoftDelete)
                .next()
                .is_some()
            {
                purposes.push(ObjectPurpose::CascadeSoftDelete);
            }
            if self
                .graph
                .parents_with(name, CascadePolicy::ReactivationGuard)
                .next()
                .is_some()
            {
                purposes.push(ObjectPurpose::ReactivationGuard);
            }
        }

        purposes.push(ObjectPurpose::View);
        purposes
    }

    fn render(&self, plan: &Planned<'_>, targets: &[PurgeTarget]) -> GeneratedObject {
        let body = match (plan.purpose, plan.table) {
            (ObjectPurpose::Purge, _) | (_, None) => {
                purge_procedure(targets, self.graph, self.config)
            }
            (ObjectPurpose::View, Some(table)) => active_view(table),
            (purpose, Some(table)) => self.render_trigger(purpose, table),
        };

        GeneratedObject {
            file_name: file_name(&plan.name, &self.config.default_schema),
            name: plan.name.clone(),
            purpose: plan.purpose,
            table: plan.table.map(|t| t.name.clone()),
            sql: format!("{}\n{}", GENERATED_MARKER, body),
        }
    }

    fn render_trigger(&self, purpose: ObjectPurpose, table: &TableMetadata) -> String {
        let key = table.primary_key().unwrap_or_default();
        let name = &table.name;
        match purpose {
            ObjectPurpose::ReactivationGuard => {
                let edges: Vec<_> = self
                    .graph
                    .parents_with(name, CascadePolicy::ReactivationGuard)
                    .collect();
                reactivation_guard(table, key, &edges, self.registry)
            }
            ObjectPurpose::RestrictSoftDelete => {
                let edges: Vec<_> = self
                    .graph
                    .children_with(name, CascadePolicy::RestrictSoftDelete)
                    .collect();
                restrict_trigger(table, key, &edges, self.registry)
            }
            _ => {
                let edges: Vec<_> = self
                    .graph
                    .children_with(name, CascadePolicy::CascadeSoftDelete)
                    .collect();
                cascade_trigger(table, key, &edges, self.registry)
            }
        }
    }
}
