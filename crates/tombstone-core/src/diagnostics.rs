//! Diagnostics reported against the analysed DDL.
//!
//! Diagnostics are accumulated, never thrown. A run fails only when at least
//! one [`Severity::Error`] diagnostic exists.

use serde::Serialize;
use std::fmt;

/// Diagnostic severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => f.write_str("warning"),
            Severity::Error => f.write_str("error"),
        }
    }
}

/// Stable diagnostic codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum DiagnosticCode {
    /// Unknown annotation key.
    #[serde(rename = "ST1001")]
    UnknownAnnotation,
    /// Annotation key without a value.
    #[serde(rename = "ST1002")]
    EmptyAnnotation,
    /// Unterminated block comment in the leading comments.
    #[serde(rename = "ST1003")]
    UnterminatedComment,
    /// Annotation given more than once.
    #[serde(rename = "ST1004")]
    DuplicateAnnotation,
    /// File failed to parse.
    #[serde(rename = "ST2001")]
    ParseFailed,
    /// Table has no primary key.
    #[serde(rename = "ST2002")]
    MissingPrimaryKey,
    /// Table defined more than once.
    #[serde(rename = "ST2003")]
    DuplicateTable,
    /// Constraint or index targets an undefined table.
    #[serde(rename = "ST2004")]
    UndefinedTarget,
    /// More than one primary key.
    #[serde(rename = "ST2005")]
    MultiplePrimaryKeys,
    /// Temporal table whose history table cannot be resolved.
    #[serde(rename = "ST2007")]
    UnresolvedHistoryTable,
    /// Foreign key columns do not match the parent primary key.
    #[serde(rename = "ST3001")]
    ForeignKeyMismatch,
    /// Cascade cycle.
    #[serde(rename = "ST3002")]
    CascadeCycle,
    /// Foreign key references an undefined table.
    #[serde(rename = "ST3003")]
    UndefinedReference,
    /// Table skipped by the purge procedure.
    #[serde(rename = "ST3004")]
    PurgeSkipped,
    /// Conventionally named object is altered but never created.
    #[serde(rename = "ST4001")]
    AlterOnlyObject,
    /// Conventionally named trigger targets another table.
    #[serde(rename = "ST4002")]
    TriggerTargetMismatch,
}

impl DiagnosticCode {
    /// The `STnnnn` code string.
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticCode::UnknownAnnotation => "ST1001",
            DiagnosticCode::EmptyAnnotation => "ST1002",
            DiagnosticCode::UnterminatedComment => "ST1003",
            DiagnosticCode::DuplicateAnnotation => "ST1004",
            DiagnosticCode::ParseFailed => "ST2001",
            DiagnosticCode::MissingPrimaryKey => "ST2002",
            DiagnosticCode::DuplicateTable => "ST2003",
            DiagnosticCode::UndefinedTarget => "ST2004",
            DiagnosticCode::MultiplePrimaryKeys => "ST2005",
            DiagnosticCode::UnresolvedHistoryTable => "ST2007",
            DiagnosticCode::ForeignKeyMismatch => "ST3001",
            DiagnosticCode::CascadeCycle => "ST3002",
            DiagnosticCode::UndefinedReference => "ST3003",
            DiagnosticCode::PurgeSkipped => "ST3004",
            DiagnosticCode::AlterOnlyObject => "ST4001",
            DiagnosticCode::TriggerTargetMismatch => "ST4002",
        }
    }

    /// The fixed severity of this code.
    pub fn severity(&self) -> Severity {
        match self {
            DiagnosticCode::UnterminatedComment
            | DiagnosticCode::ParseFailed
            | DiagnosticCode::DuplicateTable
            | DiagnosticCode::UndefinedTarget
            | DiagnosticCode::MultiplePrimaryKeys
            | DiagnosticCode::ForeignKeyMismatch
            | DiagnosticCode::CascadeCycle
            | DiagnosticCode::UndefinedReference => Severity::Error,
            _ => Severity::Warning,
        }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A position in an input file.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Location {
    /// Path relative to the input root, `/`-separated.
    pub file: String,
    /// 1-based line.
    pub line: usize,
    /// 1-based column.
    pub column: usize,
}

impl Location {
    pub fn new(file: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            file: file.into(),
            line,
            column,
        }
    }

    /// Location of the start of a file.
    pub fn file_start(file: impl Into<String>) -> Self {
        Self::new(file, 1, 1)
    }
}

/// A problem found while analysing the corpus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub code: DiagnosticCode,
    pub severity: Severity,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

impl Diagnostic {
    /// Create a diagnostic with the code's severity and no location.
    pub fn new(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self {
            code,
            severity: code.severity(),
            message: message.into(),
            location: None,
        }
    }

    /// Attach a location.
    pub fn at(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// Canonical build-host form: `path(line,col): warning ST1001: message`.
impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(loc) => write!(
                f,
                "{}({},{}): {} {}: {}",
                loc.file, loc.line, loc.column, self.severity, self.code, self.message
            ),
            None => write!(
                f,
                "tombstone: {} {}: {}",
                self.severity, self.code, self.message
            ),
        }
    }
}

/// Check whether any diagnostic is an error.
pub fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(Diagnostic::is_error)
}

/// Count diagnostics of one severity.
pub fn count(diagnostics: &[Diagnostic], severity: Severity) -> usize {
    diagnostics.iter().filter(|d| d.severity == severity).count()
}

/// Sort diagnostics by location, then code, keeping arrival order for ties.
pub fn sort(diagnostics: &mut [Diagnostic]) {
    diagnostics.sort_by(|a, b| a.location.cmp(&b.location).then(a.code.cmp(&b.code)));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_format() {
        let diag = Diagnostic::new(DiagnosticCode::UnknownAnnotation, "unknown annotation '@owner'")
            .at(Location::new("tables/users.sql", 3, 4));
        assert_eq!(
            diag.to_string(),
            "tables/users.sql(3,4): warning ST1001: unknown annotation '@owner'"
        );
    }

    #[test]
    fn test_severity_follows_code() {
        assert_eq!(
            Diagnostic::new(DiagnosticCode::CascadeCycle, "x").severity,
            Severity::Error
        );
        assert_eq!(
            Diagnostic::new(DiagnosticCode::MissingPrimaryKey, "x").severity,
            Severity::Warning
        );
        assert_eq!(DiagnosticCode::UnterminatedComment.severity(), Severity::Error);
    }

    #[test]
    fn test_has_errors_and_counts() {
        let diags = vec![
            Diagnostic::new(DiagnosticCode::DuplicateAnnotation, "a"),
            Diagnostic::new(DiagnosticCode::PurgeSkipped, "b"),
        ];
        assert!(!has_errors(&diags));
        assert_eq!(count(&diags, Severity::Warning), 2);

        let mut diags = diags;
        diags.push(Diagnostic::new(DiagnosticCode::UndefinedReference, "c"));
        assert!(has_errors(&diags));
        assert_eq!(count(&diags, Severity::Error), 1);
    }

    #[test]
    fn test_sort_orders_by_location() {
        let mut diags = vec![
            Diagnostic::new(DiagnosticCode::PurgeSkipped, "b").at(Location::new("b.sql", 1, 1)),
            Diagnostic::new(DiagnosticCode::ParseFailed, "a").at(Location::new("a.sql", 9, 1)),
            Diagnostic::new(DiagnosticCode::UnknownAnnotation, "a").at(Location::new("a.sql", 2, 1)),
        ];
        sort(&mut diags);
        let order: Vec<_> = diags.iter().map(|d| d.code.as_str()).collect();
        assert_eq!(order, vec!["ST1001", "ST2001", "ST3004"]);
    }

    #[test]
    fn test_serializes_code_string() {
        let diag = Diagnostic::new(DiagnosticCode::AlterOnlyObject, "m");
        let json = serde_json::to_value(&diag).unwrap();
        assert_eq!(json["code"], "ST4001");
        assert_eq!(json["severity"], "warning");
        assert!(json.get("location").is_none());
    }
}
