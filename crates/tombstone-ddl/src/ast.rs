//! Abstract Syntax Tree types for T-SQL DDL scripts.
//!
//! Only the statement forms tombstone reasons about are modelled in detail.
//! Everything else is kept as [`Statement::Other`] with its span so callers
//! can still account for it.

use crate::span::{Span, Spanned};

/// A parsed script (one source file).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Script {
    /// Statements in source order.
    pub statements: Vec<Statement>,
}

impl Script {
    /// Iterate over the `CREATE TABLE` statements.
    pub fn tables(&self) -> impl Iterator<Item = &CreateTable> {
        self.statements.iter().filter_map(|s| match s {
            Statement::CreateTable(t) => Some(t),
            _ => None,
        })
    }
}

/// A top-level statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// `CREATE TABLE`.
    CreateTable(CreateTable),
    /// `ALTER TABLE`.
    AlterTable(AlterTable),
    /// `CREATE INDEX`.
    CreateIndex(CreateIndex),
    /// `CREATE`/`CREATE OR ALTER`/`ALTER` of a trigger, view, procedure or function.
    Object(ObjectStatement),
    /// Any statement the parser does not model.
    Other(Span),
}

impl Statement {
    /// Get the span of this statement.
    pub fn span(&self) -> Span {
        match self {
            Statement::CreateTable(t) => t.span,
            Statement::AlterTable(a) => a.span,
            Statement::CreateIndex(i) => i.span,
            Statement::Object(o) => o.span,
            Statement::Other(span) => *span,
        }
    }
}

/// A possibly schema-qualified object name.
///
/// Server and database prefixes of four-part names are dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectName {
    /// Schema part, if written.
    pub schema: Option<Spanned<String>>,
    /// Object name part.
    pub name: Spanned<String>,
}

impl ObjectName {
    /// Span covering the whole name.
    pub fn span(&self) -> Span {
        match &self.schema {
            Some(schema) => schema.span.merge(self.name.span),
            None => self.name.span,
        }
    }

    /// Schema text, if written.
    pub fn schema_str(&self) -> Option<&str> {
        self.schema.as_ref().map(|s| s.value.as_str())
    }
}

impl std::fmt::Display for ObjectName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{}.{}", schema.value, self.name.value),
            None => write!(f, "{}", self.name.value),
        }
    }
}

/// `CREATE TABLE name ( elements ) [WITH (options)]`.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateTable {
    pub name: ObjectName,
    pub elements: Vec<TableElement>,
    /// Options from the trailing `WITH ( ... )` clause.
    pub options: Vec<TableOption>,
    pub span: Span,
    /// Span of the parenthesised body.
    pub body_span: Span,
}

impl CreateTable {
    /// Iterate over column definitions.
    pub fn columns(&self) -> impl Iterator<Item = &ColumnDef> {
        self.elements.iter().filter_map(|e| match e {
            TableElement::Column(c) => Some(c),
            _ => None,
        })
    }
}

/// An element of a table body.
#[derive(Debug, Clone, PartialEq)]
pub enum TableElement {
    Column(ColumnDef),
    Constraint(TableConstraint),
    /// Inline `INDEX name (...)`.
    Index(IndexDef),
    /// `PERIOD FOR SYSTEM_TIME (start, end)`.
    Period {
        start: Spanned<String>,
        end: Spanned<String>,
        span: Span,
    },
}

/// Which end of the system-time period a column records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratedAlways {
    RowStart,
    RowEnd,
}

/// A column definition.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub name: Spanned<String>,
    /// Declared type as written, e.g. `NVARCHAR(320)`. Computed columns carry
    /// their `AS (...)` expression instead.
    pub data_type: String,
    /// `Some(true)` for `NULL`, `Some(false)` for `NOT NULL`, `None` if unspecified.
    pub nullable: Option<bool>,
    pub identity: bool,
    pub generated: Option<GeneratedAlways>,
    pub hidden: bool,
    pub computed: bool,
    pub constraints: Vec<ColumnConstraint>,
    pub span: Span,
}

/// A constraint declared on a column.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnConstraint {
    pub name: Option<Spanned<String>>,
    pub kind: ColumnConstraintKind,
    pub span: Span,
}

/// Kinds of column-level constraints.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnConstraintKind {
    PrimaryKey { clustered: Option<bool> },
    Unique { clustered: Option<bool> },
    References(ForeignKeyRef),
    Check { expression: String },
    Default { expression: String },
}

/// A table-level constraint (in a body or added by `ALTER TABLE`).
#[derive(Debug, Clone, PartialEq)]
pub struct TableConstraint {
    pub name: Option<Spanned<String>>,
    pub kind: TableConstraintKind,
    pub span: Span,
}

/// Kinds of table-level constraints.
#[derive(Debug, Clone, PartialEq)]
pub enum TableConstraintKind {
    PrimaryKey {
        columns: Vec<Spanned<String>>,
        clustered: Option<bool>,
    },
    Unique {
        columns: Vec<Spanned<String>>,
        clustered: Option<bool>,
    },
    ForeignKey {
        columns: Vec<Spanned<String>>,
        references: ForeignKeyRef,
    },
    Check {
        expression: String,
    },
    /// `DEFAULT expr FOR column` (only legal in `ALTER TABLE ... ADD`).
    Default {
        expression: String,
        column: Spanned<String>,
    },
}

/// Referential action for `ON DELETE` / `ON UPDATE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReferentialAction {
    #[default]
    NoAction,
    Cascade,
    SetNull,
    SetDefault,
}

/// The `REFERENCES` part of a foreign key.
#[derive(Debug, Clone, PartialEq)]
pub struct ForeignKeyRef {
    pub table: ObjectName,
    /// Referenced columns; empty when omitted (refers to the primary key).
    pub columns: Vec<Spanned<String>>,
    pub on_delete: ReferentialAction,
    pub on_update: ReferentialAction,
}

/// An index, inline or standalone.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexDef {
    pub name: Spanned<String>,
    pub columns: Vec<Spanned<String>>,
    pub unique: bool,
    pub clustered: Option<bool>,
    pub span: Span,
}

/// A `WITH ( ... )` table option, possibly with nested sub-options.
///
/// `SYSTEM_VERSIONING = ON (HISTORY_TABLE = history.users)` parses as an option
/// named `SYSTEM_VERSIONING` with value `["ON"]` and one nested option.
#[derive(Debug, Clone, PartialEq)]
pub struct TableOption {
    pub name: Spanned<String>,
    /// Value parts; a dotted name yields one part per segment.
    pub value: Vec<String>,
    pub nested: Vec<TableOption>,
    pub span: Span,
}

impl TableOption {
    /// Check the option name (case-insensitive).
    pub fn is(&self, name: &str) -> bool {
        self.name.value.eq_ignore_ascii_case(name)
    }

    /// Check whether the value is the single word `ON`.
    pub fn is_on(&self) -> bool {
        matches!(self.value.as_slice(), [v] if v.eq_ignore_ascii_case("ON"))
    }
}

/// `ALTER TABLE name ...`.
#[derive(Debug, Clone, PartialEq)]
pub struct AlterTable {
    pub table: ObjectName,
    pub actions: Vec<AlterTableAction>,
    pub span: Span,
}

/// An action inside `ALTER TABLE`.
#[derive(Debug, Clone, PartialEq)]
pub enum AlterTableAction {
    AddConstraint(TableConstraint),
    /// Any other alteration (add column, drop, set options, ...).
    Other(Span),
}

/// `CREATE [UNIQUE] [CLUSTERED|NONCLUSTERED] INDEX name ON table (...)`.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateIndex {
    pub table: ObjectName,
    pub index: IndexDef,
    pub span: Span,
}

/// Kind of programmable object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Trigger,
    View,
    Procedure,
    Function,
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ObjectKind::Trigger => "TRIGGER",
            ObjectKind::View => "VIEW",
            ObjectKind::Procedure => "PROCEDURE",
            ObjectKind::Function => "FUNCTION",
        };
        f.write_str(s)
    }
}

/// How the object statement was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateVerb {
    Create,
    CreateOrAlter,
    Alter,
}

impl CreateVerb {
    /// Check whether this statement brings the object into existence.
    pub fn creates(&self) -> bool {
        matches!(self, CreateVerb::Create | CreateVerb::CreateOrAlter)
    }
}

/// A trigger, view, procedure or function statement. Bodies are not parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectStatement {
    pub verb: CreateVerb,
    pub kind: ObjectKind,
    pub name: ObjectName,
    /// `ON table` for DML triggers.
    pub target: Option<ObjectName>,
    pub span: Span,
}
