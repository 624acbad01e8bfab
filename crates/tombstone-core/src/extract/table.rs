//! Conversion of parsed table statements into catalog drafts.

use super::GrammarAdapter;
use crate::annotation::Annotations;
use crate::catalog::{
    ColumnDefinition, ConstraintDefinition, ConstraintKind, ConstraintOrigin, ForeignKeyTarget,
    IndexDefinition, PeriodColumn, QualifiedName, TableDraft, TemporalInfo,
};
use crate::diagnostics::{Diagnostic, DiagnosticCode, Location};
use tombstone_ddl::{
    ColumnConstraintKind, ColumnDef, CreateTable, ForeignKeyRef, GeneratedAlways, IndexDef,
    LineIndex, Span, Spanned, TableConstraint, TableConstraintKind, TableElement,
};

/// Per-file state shared by the conversions.
pub struct ExtractContext<'a> {
    pub file: &'a str,
    pub default_schema: &'a str,
    pub adapter: &'a dyn GrammarAdapter,
    lines: LineIndex,
}

impl<'a> ExtractContext<'a> {
    pub fn new(
        file: &'a str,
        source: &str,
        default_schema: &'a str,
        adapter: &'a dyn GrammarAdapter,
    ) -> Self {
        Self {
            file,
            default_schema,
            adapter,
            lines: LineIndex::new(source),
        }
    }

    /// Location of the start of a span.
    pub fn location(&self, span: Span) -> Location {
        let (line, column) = self.lines.line_col(span.start);
        Location::new(self.file, line, column)
    }

    pub fn qualify(&self, name: &tombstone_ddl::ObjectName) -> QualifiedName {
        QualifiedName::from_object_name(name, self.default_schema)
    }
}

fn names(columns: &[Spanned<String>]) -> Vec<String> {
    columns.iter().map(|c| c.value.clone()).collect()
}

fn foreign_key_target(reference: &ForeignKeyRef, ctx: &ExtractContext<'_>) -> ForeignKeyTarget {
    ForeignKeyTarget {
        table: ctx.qualify(&reference.table),
        columns: names(&reference.columns),
        on_delete: reference.on_delete,
        on_update: reference.on_update,
    }
}

/// Convert a table-level constraint.
pub fn table_constraint(
    constraint: &TableConstraint,
    origin: ConstraintOrigin,
    ctx: &ExtractContext<'_>,
) -> ConstraintDefinition {
    let name = constraint.name.as_ref().map(|n| n.value.clone());
    let base = |kind| {
        ConstraintDefinition::new(kind, origin, ctx.location(constraint.span))
            .with_name(name.clone())
    };

    match &constraint.kind {
        TableConstraintKind::PrimaryKey { columns, .. } => {
            base(ConstraintKind::PrimaryKey).with_columns(names(columns))
        }
        TableConstraintKind::Unique { columns, .. } => {
            base(ConstraintKind::Unique).with_columns(names(columns))
        }
        TableConstraintKind::ForeignKey {
            columns,
            references,
        } => base(ConstraintKind::ForeignKey)
            .with_columns(names(columns))
            .with_references(foreign_key_target(references, ctx)),
        TableConstraintKind::Check { expression } => {
            base(ConstraintKind::Check).with_expression(expression.as_str())
        }
        TableConstraintKind::Default { expression, column } => base(ConstraintKind::Default)
            .with_columns(vec![column.value.clone()])
            .with_expression(expression.as_str()),
    }
}

/// Convert a column and collect the constraints declared on it.
fn column(
    def: &ColumnDef,
    ctx: &ExtractContext<'_>,
    constraints: &mut Vec<ConstraintDefinition>,
) -> ColumnDefinition {
    let mut column = ColumnDefinition::new(def.name.value.as_str(), def.data_type.as_str());
    column.identity = def.identity;
    column.hidden = def.hidden;
    column.computed = def.computed;
    column.generated = def.generated.map(|g| match g {
        GeneratedAlways::RowStart => PeriodColumn::RowStart,
        GeneratedAlways::RowEnd => PeriodColumn::RowEnd,
    });

    let mut key_column = false;
    for c in &def.constraints {
        let name = c.name.as_ref().map(|n| n.value.clone());
        let base = |kind| {
            ConstraintDefinition::new(kind, ConstraintOrigin::Inline, ctx.location(c.span))
                .with_name(name.clone())
                .with_columns(vec![def.name.value.clone()])
        };
        let converted = match &c.kind {
            ColumnConstraintKind::PrimaryKey { .. } => {
                key_column = true;
                base(ConstraintKind::PrimaryKey)
            }
            ColumnConstraintKind::Unique { .. } => base(ConstraintKind::Unique),
            ColumnConstraintKind::References(reference) => {
                base(ConstraintKind::ForeignKey).with_references(foreign_key_target(reference, ctx))
            }
            ColumnConstraintKind::Check { expression } => {
                base(ConstraintKind::Check).with_expression(expression.as_str())
            }
            ColumnConstraintKind::Default { expression } => {
                column.default = Some(expression.clone());
                base(ConstraintKind::Default).with_expression(expression.as_str())
            }
        };
        constraints.push(converted);
    }

    // Key, identity and period columns are implicitly NOT NULL.
    column.nullable = def
        .nullable
        .unwrap_or(!(key_column || def.identity || def.generated.is_some()));
    column
}

fn index(def: &IndexDef) -> IndexDefinition {
    IndexDefinition {
        name: def.name.value.clone(),
        columns: names(&def.columns),
        unique: def.unique,
        clustered: def.clustered.unwrap_or(false),
    }
}

/// Convert a standalone index declaration.
pub fn standalone_index(def: &IndexDef) -> IndexDefinition {
    index(def)
}

/// Build the draft of one `CREATE TABLE`.
pub fn table_draft(table: &CreateTable, ctx: &ExtractContext<'_>) -> (TableDraft, Vec<Diagnostic>) {
    let name = ctx.qualify(&table.name);
    let location = ctx.location(table.span);
    let mut diagnostics = Vec::new();

    let mut columns = Vec::new();
    let mut constraints = Vec::new();
    let mut indexes = Vec::new();
    let mut period: Option<(String, String)> = None;

    for element in &table.elements {
        match element {
            TableElement::Column(def) => columns.push(column(def, ctx, &mut constraints)),
            TableElement::Constraint(c) => {
                constraints.push(table_constraint(c, ConstraintOrigin::Inline, ctx))
            }
            TableElement::Index(def) => indexes.push(index(def)),
            TableElement::Period { start, end, .. } => {
                period = Some((start.value.clone(), end.value.clone()))
            }
        }
    }

    let (period_start, period_end) = match period {
        Some((start, end)) => (Some(start), Some(end)),
        None => (
            generated_column(&columns, PeriodColumn::RowStart),
            generated_column(&columns, PeriodColumn::RowEnd),
        ),
    };

    let enabled = ctx.adapter.system_versioning(&table.options);
    let history = if enabled {
        ctx.adapter.history_table(&table.options, ctx.default_schema)
    } else {
        None
    };
    if enabled && history.is_none() {
        diagnostics.push(
            Diagnostic::new(
                DiagnosticCode::UnresolvedHistoryTable,
                format!(
                    "temporal table {} has no resolvable history table; it is left out of the purge",
                    name
                ),
            )
            .at(location.clone()),
        );
    }

    let draft = TableDraft {
        name,
        columns,
        constraints,
        indexes,
        temporal: TemporalInfo {
            enabled,
            history,
            period_start,
            period_end,
        },
        annotations: Annotations::default(),
        file: ctx.file.to_string(),
        location,
    };
    (draft, diagnostics)
}

fn generated_column(columns: &[ColumnDefinition], which: PeriodColumn) -> Option<String> {
    columns
        .iter()
        .find(|c| c.generated == Some(which))
        .map(|c| c.name.clone())
}
