//! Annotation extraction from normalized comment lines.
//!
//! Syntax is `@key [value]` at the start of a line. The vocabulary is closed:
//! `@description` (continues over following plain lines) and `@category`
//! (a single token).

use super::comments::{ColumnComment, CommentLine};
use super::Annotations;
use crate::diagnostics::{Diagnostic, DiagnosticCode, Location};

/// Known annotation keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Key {
    Description,
    Category,
}

impl Key {
    fn parse(key: &str) -> Option<Self> {
        if key.eq_ignore_ascii_case("description") {
            Some(Key::Description)
        } else if key.eq_ignore_ascii_case("category") {
            Some(Key::Category)
        } else {
            None
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Key::Description => "description",
            Key::Category => "category",
        }
    }
}

/// Line-loop state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    /// The last key seen; `contiguous` is false once a blank line follows it,
    /// and stays false over continuation text.
    AfterKey { key: Key, contiguous: bool },
}

/// An `@key value` line split into parts.
struct KeyLine<'a> {
    key: &'a str,
    value: &'a str,
    /// Byte offset of the key within the line text.
    value_offset: usize,
}

/// Split `@key value`. Returns `None` for lines that are not annotations.
fn split_key(text: &str) -> Option<KeyLine<'_>> {
    let rest = text.strip_prefix('@')?;
    let key_len = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '-'))
        .unwrap_or(rest.len());
    if key_len == 0 {
        return None;
    }
    let after = &rest[key_len..];
    let value = after.trim();
    let value_offset = 1 + key_len + (after.len() - after.trim_start().len());
    Some(KeyLine {
        key: &rest[..key_len],
        value,
        value_offset,
    })
}

/// Builds table annotations from the leading comment block.
struct TableAnnotationBuilder<'a> {
    file: &'a str,
    annotations: Annotations,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> TableAnnotationBuilder<'a> {
    fn new(file: &'a str) -> Self {
        Self {
            file,
            annotations: Annotations::default(),
            diagnostics: Vec::new(),
        }
    }

    fn report(&mut self, code: DiagnosticCode, message: String, line: &CommentLine, offset: usize) {
        self.diagnostics.push(
            Diagnostic::new(code, message)
                .at(Location::new(self.file, line.line, line.column + offset)),
        );
    }

    /// Advance the state machine by one line.
    fn step(&mut self, state: State, line: &CommentLine) -> State {
        if line.is_blank() {
            return match state {
                State::AfterKey { key, .. } => State::AfterKey {
                    key,
                    contiguous: false,
                },
                State::Idle => State::Idle,
            };
        }

        let Some(key_line) = split_key(&line.text) else {
            return self.plain_line(state, &line.text);
        };

        let Some(key) = Key::parse(key_line.key) else {
            self.report(
                DiagnosticCode::UnknownAnnotation,
                format!("unknown annotation '@{}' ignored", key_line.key),
                line,
                0,
            );
            return State::Idle;
        };

        let value = match key {
            Key::Description => key_line.value.to_string(),
            Key::Category => key_line
                .value
                .split_whitespace()
                .next()
                .unwrap_or_default()
                .to_string(),
        };

        if value.is_empty() {
            self.report(
                DiagnosticCode::EmptyAnnotation,
                format!("annotation '@{}' has no value", key.as_str()),
                line,
                0,
            );
            return State::Idle;
        }

        let continues = state
            == State::AfterKey {
                key: Key::Description,
                contiguous: true,
            };

        match key {
            Key::Description if continues => {
                if let Some(existing) = self.annotations.description.as_mut() {
                    existing.push(' ');
                    existing.push_str(&value);
                }
            }
            Key::Description => {
                if self.annotations.description.is_some() {
                    self.report_duplicate(key, line, key_line.value_offset);
                }
                self.annotations.description = Some(value);
            }
            Key::Category => {
                if self.annotations.category.is_some() {
                    self.report_duplicate(key, line, key_line.value_offset);
                }
                self.annotations.category = Some(value);
            }
        }

        State::AfterKey {
            key,
            contiguous: true,
        }
    }

    fn report_duplicate(&mut self, key: Key, line: &CommentLine, offset: usize) {
        self.report(
            DiagnosticCode::DuplicateAnnotation,
            format!(
                "duplicate annotation '@{}'; the later value replaces the earlier one",
                key.as_str()
            ),
            line,
            offset,
        );
    }

    /// A line that is not an annotation continues a description, if one is open.
    fn plain_line(&mut self, state: State, text: &str) -> State {
        match state {
            State::AfterKey {
                key: Key::Description,
                contiguous,
            } => {
                if let Some(existing) = self.annotations.description.as_mut() {
                    existing.push(' ');
                    existing.push_str(text);
                }
                // A blank line stays a gap until the next key.
                State::AfterKey {
                    key: Key::Description,
                    contiguous,
                }
            }
            State::AfterKey {
                key: Key::Category,
                ..
            }
            | State::Idle => State::Idle,
        }
    }
}

/// Extract table annotations from the leading comment block.
pub fn table_annotations(lines: &[CommentLine], file: &str) -> (Annotations, Vec<Diagnostic>) {
    let mut builder = TableAnnotationBuilder::new(file);
    let mut state = State::Idle;
    for line in lines {
        state = builder.step(state, line);
    }
    (builder.annotations, builder.diagnostics)
}

/// Apply trailing column comments to `annotations`.
///
/// A comment may start with `@description`; any other key is reported and the
/// comment dropped. `columns` holds the declared column names; comments on
/// unknown names are ignored.
pub fn column_annotations(
    comments: &[ColumnComment],
    columns: &[&str],
    file: &str,
    annotations: &mut Annotations,
) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    for comment in comments {
        let Some(column) = columns
            .iter()
            .find(|c| c.eq_ignore_ascii_case(&comment.column_name))
        else {
            continue;
        };
        let location = Location::new(file, comment.line, comment.column);

        let text = match split_key(&comment.text) {
            None => comment.text.clone(),
            Some(key_line) => match Key::parse(key_line.key) {
                Some(Key::Description) if !key_line.value.is_empty() => key_line.value.to_string(),
                Some(Key::Description) => {
                    diagnostics.push(
                        Diagnostic::new(
                            DiagnosticCode::EmptyAnnotation,
                            format!("annotation '@description' on column '{}' has no value", column),
                        )
                        .at(location),
                    );
                    continue;
                }
                _ => {
                    diagnostics.push(
                        Diagnostic::new(
                            DiagnosticCode::UnknownAnnotation,
                            format!(
                                "annotation '@{}' is not supported on column '{}'",
                                key_line.key, column
                            ),
                        )
                        .at(location),
                    );
                    continue;
                }
            },
        };

        if annotations
            .columns
            .insert(column.to_string(), text)
            .is_some()
        {
            diagnostics.push(
                Diagnostic::new(
                    DiagnosticCode::DuplicateAnnotation,
                    format!("column '{}' is described more than once; the later comment wins", column),
                )
                .at(location),
            );
        }
    }

    diagnostics
}
