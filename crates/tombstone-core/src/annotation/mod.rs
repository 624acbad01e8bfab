//! Documentation annotations carried in SQL comments.
//!
//! ```text
//! /*
//! @description Customer accounts, one row per billing
//!   relationship.
//! @category master-data
//! */
//! CREATE TABLE dbo.customers (
//!     customer_id INT NOT NULL, -- surrogate key
//!     ...
//! ```

mod comments;
mod extract;

pub use comments::{
    leading_comments, trailing_comment_start, trailing_comments, ColumnComment, CommentLine,
    UnterminatedComment,
};
pub use extract::{column_annotations, table_annotations};

use crate::diagnostics::{Diagnostic, DiagnosticCode, Location};
use std::collections::BTreeMap;
use tombstone_ddl::Span;

/// Annotations of one table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Annotations {
    pub description: Option<String>,
    pub category: Option<String>,
    /// Column descriptions keyed by declared column name.
    pub columns: BTreeMap<String, String>,
}

impl Annotations {
    pub fn is_empty(&self) -> bool {
        self.description.is_none() && self.category.is_none() && self.columns.is_empty()
    }

    /// Description of a column (case-insensitive lookup).
    pub fn column(&self, name: &str) -> Option<&str> {
        self.columns
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Extract all annotations of a file.
///
/// `table_body` and `columns` describe the first table in the file; without them
/// only the leading block is read. An unterminated leading block comment
/// discards every annotation of the file.
pub fn extract(
    source: &str,
    file: &str,
    table_body: Option<Span>,
    columns: &[&str],
) -> (Annotations, Vec<Diagnostic>) {
    let lines = match leading_comments(source) {
        Ok(lines) => lines,
        Err(open) => {
            let diag = Diagnostic::new(
                DiagnosticCode::UnterminatedComment,
                "unterminated block comment in leading comments; annotations ignored",
            )
            .at(Location::new(file, open.line, open.column));
            return (Annotations::default(), vec![diag]);
        }
    };

    let (mut annotations, mut diagnostics) = table_annotations(&lines, file);

    if let Some(body) = table_body {
        let comments = trailing_comments(source, body);
        diagnostics.extend(column_annotations(&comments, columns, file, &mut annotations));
    }

    (annotations, diagnostics)
}
