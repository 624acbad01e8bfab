//! Column definitions.

use serde::Serialize;

/// Which end of the system-time period a column holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PeriodColumn {
    RowStart,
    RowEnd,
}

/// A column as declared in `CREATE TABLE`. Immutable once extracted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDefinition {
    pub name: String,
    /// Declared type as written, with arguments.
    pub data_type: String,
    pub nullable: bool,
    pub identity: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated: Option<PeriodColumn>,
    pub hidden: bool,
    pub computed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable: true,
            identity: false,
            generated: None,
            hidden: false,
            computed: false,
            default: None,
        }
    }

    /// Check the column name (case-insensitive).
    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    /// Check whether the engine maintains this column's value.
    pub fn is_engine_maintained(&self) -> bool {
        self.identity || self.computed || self.generated.is_some()
    }
}
