//! Per-file analysis.

use super::table::{standalone_index, table_constraint, table_draft, ExtractContext};
use super::GrammarAdapter;
use crate::annotation;
use crate::catalog::{
    ConstraintDefinition, ConstraintOrigin, IndexDefinition, QualifiedName, TableDraft,
};
use crate::config::GeneratorConfig;
use crate::diagnostics::{Diagnostic, DiagnosticCode, Location};
use crate::discovery::DiscoveredObject;
use crate::output::is_generated;
use tombstone_ddl::{AlterTableAction, Statement};

/// Something a file contributes to the table registry.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractedItem {
    Table(TableDraft),
    /// `ALTER TABLE ... ADD CONSTRAINT`.
    Constraint {
        table: QualifiedName,
        constraint: ConstraintDefinition,
    },
    /// `CREATE INDEX`.
    Index {
        table: QualifiedName,
        index: IndexDefinition,
        location: Location,
    },
}

/// Where a file was found. Input files sort first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SourceRole {
    /// Part of the input corpus.
    Input,
    /// A hand-written file in the output directory. Only its objects count.
    OutputArea,
}

/// Result of analysing one file. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct FileAnalysis {
    pub file: String,
    /// The file carries the generated-file marker and was skipped.
    pub generated: bool,
    /// Registry items in statement order.
    pub items: Vec<ExtractedItem>,
    pub objects: Vec<DiscoveredObject>,
    pub diagnostics: Vec<Diagnostic>,
}

impl FileAnalysis {
    fn empty(file: &str) -> Self {
        Self {
            file: file.to_string(),
            generated: false,
            items: Vec::new(),
            objects: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Tables defined by this file.
    pub fn tables(&self) -> impl Iterator<Item = &TableDraft> {
        self.items.iter().filter_map(|item| match item {
            ExtractedItem::Table(t) => Some(t),
            _ => None,
        })
    }
}

/// Analyse one file.
///
/// `file` is the path relative to the input root, as reported in diagnostics.
/// A file that fails to parse contributes nothing but its ST2001.
pub fn analyze(
    file: &str,
    source: &str,
    role: SourceRole,
    config: &GeneratorConfig,
    adapter: &dyn GrammarAdapter,
) -> FileAnalysis {
    let mut analysis = FileAnalysis::empty(file);

    if is_generated(source) {
        tracing::debug!(file, "skipping generated file");
        analysis.generated = true;
        return analysis;
    }

    let script = match tombstone_ddl::parse(source) {
        Ok(script) => script,
        Err(err) => {
            let (line, column) = err.line_col(source);
            let message = match &err.hint {
                Some(hint) => format!("failed to parse: {} ({})", err.message, hint),
                None => format!("failed to parse: {}", err.message),
            };
            analysis.diagnostics.push(
                Diagnostic::new(DiagnosticCode::ParseFailed, message)
                    .at(Location::new(file, line, column)),
            );
            return analysis;
        }
    };

    let ctx = ExtractContext::new(file, source, &config.default_schema, adapter);

    for statement in &script.statements {
        match statement {
            Statement::CreateTable(table) if role == SourceRole::Input => {
                let (draft, diagnostics) = table_draft(table, &ctx);
                analysis.diagnostics.extend(diagnostics);
                analysis.items.push(ExtractedItem::Table(draft));
            }
            Statement::AlterTable(alter) if role == SourceRole::Input => {
                let table = ctx.qualify(&alter.table);
                for action in &alter.actions {
                    match action {
                        AlterTableAction::AddConstraint(c) => {
                            analysis.items.push(ExtractedItem::Constraint {
                                table: table.clone(),
                                constraint: table_constraint(c, ConstraintOrigin::AlterTable, &ctx),
                            })
                        }
                        AlterTableAction::Other(_) => {}
                    }
                }
            }
            Statement::CreateIndex(create) if role == SourceRole::Input => {
                analysis.items.push(ExtractedItem::Index {
                    table: ctx.qualify(&create.table),
                    index: standalone_index(&create.index),
                    location: ctx.location(create.span),
                });
            }
            Statement::Object(object) => {
                analysis.objects.push(DiscoveredObject::from_statement(
                    object,
                    &config.default_schema,
                    ctx.location(object.span),
                ));
            }
            Statement::CreateTable(_)
            | Statement::AlterTable(_)
            | Statement::CreateIndex(_)
            | Statement::Other(_) => {}
        }
    }

    if role == SourceRole::Input {
        attach_annotations(&mut analysis, source, &script);
    }

    tracing::debug!(
        file,
        items = analysis.items.len(),
        objects = analysis.objects.len(),
        diagnostics = analysis.diagnostics.len(),
        "file analysed"
    );
    analysis
}

/// Annotations belong to the first table of the file.
fn attach_annotations(analysis: &mut FileAnalysis, source: &str, script: &tombstone_ddl::Script) {
    let Some(table) = script.tables().next() else {
        // Still surface an unterminated leading comment, which can hide the table.
        if let Err(open) = annotation::leading_comments(source) {
            analysis.diagnostics.push(
                Diagnostic::new(
                    DiagnosticCode::UnterminatedComment,
                    "unterminated block comment in leading comments; annotations ignored",
                )
                .at(Location::new(analysis.file.as_str(), open.line, open.column)),
            );
        }
        return;
    };

    let columns: Vec<&str> = table.columns().map(|c| c.name.value.as_str()).collect();
    let (annotations, diagnostics) =
        annotation::extract(source, &analysis.file, Some(table.body_span), &columns);
    analysis.diagnostics.extend(diagnostics);

    if let Some(ExtractedItem::Table(draft)) = analysis
        .items
        .iter_mut()
        .find(|item| matches!(item, ExtractedItem::Table(_)))
    {
        draft.annotations = annotations;
    }
}
