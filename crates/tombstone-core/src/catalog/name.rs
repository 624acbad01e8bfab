//! Schema-qualified object names.

use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use tombstone_ddl::ObjectName;

/// Default schema when a name is written without one.
pub const DEFAULT_SCHEMA: &str = "dbo";

/// A `schema.name` pair.
///
/// Equality, hashing and ordering ignore ASCII case, matching SQL Server's
/// default collation for identifiers. The written casing is kept for output.
#[derive(Debug, Clone, Serialize)]
pub struct QualifiedName {
    pub schema: String,
    pub name: String,
}

impl QualifiedName {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
        }
    }

    /// Resolve a parsed object name, filling in the default schema.
    pub fn from_object_name(name: &ObjectName, default_schema: &str) -> Self {
        Self::new(
            name.schema_str().unwrap_or(default_schema),
            name.name.value.as_str(),
        )
    }

    /// Parse `schema.name` or `name`. Brackets around either part are stripped.
    pub fn parse(text: &str, default_schema: &str) -> Self {
        let strip = |s: &str| {
            s.trim()
                .trim_start_matches('[')
                .trim_end_matches(']')
                .to_string()
        };
        match text.rsplit_once('.') {
            Some((schema, name)) if !schema.trim().is_empty() => {
                Self::new(strip(schema), strip(name))
            }
            Some((_, name)) => Self::new(default_schema, strip(name)),
            None => Self::new(default_schema, strip(text)),
        }
    }

    /// Lowercased `(schema, name)` key.
    pub fn key(&self) -> (String, String) {
        (self.schema.to_ascii_lowercase(), self.name.to_ascii_lowercase())
    }

    /// Check whether the schema matches (case-insensitive).
    pub fn in_schema(&self, schema: &str) -> bool {
        self.schema.eq_ignore_ascii_case(schema)
    }
}

fn cmp_ignore_case(a: &str, b: &str) -> Ordering {
    a.bytes()
        .map(|c| c.to_ascii_lowercase())
        .cmp(b.bytes().map(|c| c.to_ascii_lowercase()))
}

impl PartialEq for QualifiedName {
    fn eq(&self, other: &Self) -> bool {
        self.schema.eq_ignore_ascii_case(&other.schema) && self.name.eq_ignore_ascii_case(&other.name)
    }
}

impl Eq for QualifiedName {}

impl Hash for QualifiedName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl PartialOrd for QualifiedName {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QualifiedName {
    fn cmp(&self, other: &Self) -> Ordering {
        cmp_ignore_case(&self.schema, &other.schema).then_with(|| cmp_ignore_case(&self.name, &other.name))
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}
