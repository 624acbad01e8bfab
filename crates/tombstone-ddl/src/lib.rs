//! Tolerant T-SQL DDL parser
//!
//! This crate reads SQL Server schema scripts (the kind a database project keeps
//! under source control) and produces a small AST covering the statements that
//! describe tables, keys and programmable objects.
//!
//! # Modelled statements
//!
//! ```text
//! CREATE TABLE schema.name ( columns, constraints, INDEX ..., PERIOD FOR SYSTEM_TIME (...) )
//!     [ON filegroup] [WITH ( SYSTEM_VERSIONING = ON (HISTORY_TABLE = ...) )]
//! ALTER TABLE schema.name [WITH CHECK] ADD CONSTRAINT ...
//! CREATE [UNIQUE] [CLUSTERED|NONCLUSTERED] INDEX name ON schema.name (...)
//! CREATE | CREATE OR ALTER | ALTER  TRIGGER | VIEW | PROCEDURE | FUNCTION  schema.name ...
//! ```
//!
//! Anything else is skipped to the next statement boundary (`;`, `GO`, or a
//! statement keyword) and kept as [`Statement::Other`].
//!
//! # Usage
//!
//! ```rust
//! use tombstone_ddl::parse;
//!
//! let script = parse("CREATE TABLE dbo.users (id INT NOT NULL PRIMARY KEY)").unwrap();
//! assert_eq!(script.tables().count(), 1);
//! ```

pub mod ast;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod span;

// Re-export main types
pub use ast::{
    AlterTable, AlterTableAction, ColumnConstraint, ColumnConstraintKind, ColumnDef, CreateIndex,
    CreateTable, CreateVerb, ForeignKeyRef, GeneratedAlways, IndexDef, ObjectKind, ObjectName,
    ObjectStatement, ReferentialAction, Script, Statement, TableConstraint, TableConstraintKind,
    TableElement, TableOption,
};
pub use error::ParseError;
pub use span::{offset_to_line_col, LineIndex, Span, Spanned};

/// Parse a source string into a script.
///
/// # Example
///
/// ```rust
/// use tombstone_ddl::parse;
///
/// let script = parse("CREATE VIEW dbo.v AS SELECT 1 AS one").unwrap();
/// assert_eq!(script.statements.len(), 1);
/// ```
pub fn parse(source: &str) -> Result<Script, ParseError> {
    parser::parse(source)
}

/// Tokenize a source string (for debugging/testing).
///
/// # Example
///
/// ```rust
/// use tombstone_ddl::tokenize;
///
/// let tokens = tokenize("CREATE TABLE t (id INT)");
/// assert!(!tokens.is_empty());
/// ```
pub fn tokenize(source: &str) -> Vec<lexer::SpannedToken> {
    lexer::tokenize(source)
}
