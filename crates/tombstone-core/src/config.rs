//! Generator configuration.
//!
//! Loaded from an optional `tombstone.toml`; command-line flags override the
//! file values. Every key has a default, so an empty file is valid.

use crate::catalog::{QualifiedName, DEFAULT_SCHEMA};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Configuration file name looked up in the input root.
pub const CONFIG_FILE_NAME: &str = "tombstone.toml";

/// Default output directory, relative to the input root.
pub const DEFAULT_OUTPUT_DIR: &str = "generated";

/// Default manifest file name, placed in the output directory.
pub const DEFAULT_MANIFEST_NAME: &str = "tombstone.manifest.json";

/// Default purge retention in days.
pub const DEFAULT_RETENTION_DAYS: u32 = 90;

/// DDL grammar version, selecting how option and index shapes are read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Grammar {
    /// SQL Server 2022 project grammar.
    #[default]
    Sql160,
    /// SQL Server 2016 project grammar.
    Sql130,
}

impl FromStr for Grammar {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sql160" => Ok(Grammar::Sql160),
            "sql130" => Ok(Grammar::Sql130),
            other => Err(Error::InvalidConfig(format!(
                "unknown grammar '{}' (expected sql160 or sql130)",
                other
            ))),
        }
    }
}

/// Names of the soft-delete bookkeeping columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SoftDeleteColumns {
    /// Active flag; `1` means active.
    pub active_column: String,
    pub created_by_column: String,
    pub updated_by_column: String,
    pub updated_at_column: String,
}

impl Default for SoftDeleteColumns {
    fn default() -> Self {
        Self {
            active_column: "is_active".to_string(),
            created_by_column: "created_by".to_string(),
            updated_by_column: "updated_by".to_string(),
            updated_at_column: "updated_at".to_string(),
        }
    }
}

/// Per-table settings from `[tables."schema.name"]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TableOverride {
    /// Refuse deactivation while active children exist.
    pub restrict: bool,
    /// Leave the table out of soft-delete generation.
    pub exclude: bool,
    pub active_column: Option<String>,
    pub created_by_column: Option<String>,
    pub updated_by_column: Option<String>,
    pub updated_at_column: Option<String>,
}

/// Generator configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeneratorConfig {
    /// Schema assumed for unqualified names.
    pub default_schema: String,
    pub grammar: Grammar,
    /// Output directory; relative paths resolve against the input root.
    pub output_dir: PathBuf,
    /// Manifest path; defaults to `<output_dir>/tombstone.manifest.json`.
    pub manifest_path: Option<PathBuf>,
    /// Schema of the purge procedure.
    pub purge_schema: String,
    /// Default for the purge procedure's `@retention_days` parameter.
    pub retention_days: u32,
    pub soft_delete: SoftDeleteColumns,
    /// Tables whose `@category` is listed here are restrict tables.
    pub restrict_categories: Vec<String>,
    /// Per-table overrides keyed by `schema.name` (or `name` in the default schema).
    pub tables: BTreeMap<String, TableOverride>,
}

impl GeneratorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a configuration document.
    pub fn from_toml_str(contents: &str, path: &Path) -> Result<Self> {
        let config: Self = toml::from_str(contents).map_err(|source| Error::ConfigParse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::from_toml_str(&contents, path)
    }

    /// Load `explicit` if given, else `tombstone.toml` in the input root if present,
    /// else the defaults.
    pub fn discover(input_root: &Path, explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        let candidate = input_root.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            tracing::debug!(path = %candidate.display(), "loading configuration");
            Self::load(&candidate)
        } else {
            Ok(Self::default())
        }
    }

    /// Reject values no run can use.
    pub fn validate(&self) -> Result<()> {
        if self.default_schema.trim().is_empty() {
            return Err(Error::InvalidConfig("default_schema must not be empty".into()));
        }
        if self.purge_schema.trim().is_empty() {
            return Err(Error::InvalidConfig("purge_schema must not be empty".into()));
        }
        if self.soft_delete.active_column.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "soft_delete.active_column must not be empty".into(),
            ));
        }
        for (key, table) in &self.tables {
            if table.active_column.as_deref().is_some_and(|c| c.trim().is_empty()) {
                return Err(Error::InvalidConfig(format!(
                    "tables.\"{}\".active_column must not be empty",
                    key
                )));
            }
        }
        Ok(())
    }

    pub fn with_default_schema(mut self, schema: impl Into<String>) -> Self {
        self.default_schema = schema.into();
        self
    }

    pub fn with_grammar(mut self, grammar: Grammar) -> Self {
        self.grammar = grammar;
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_manifest_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.manifest_path = Some(path.into());
        self
    }

    pub fn with_purge_schema(mut self, schema: impl Into<String>) -> Self {
        self.purge_schema = schema.into();
        self
    }

    pub fn with_retention_days(mut self, days: u32) -> Self {
        self.retention_days = days;
        self
    }

    pub fn with_soft_delete(mut self, columns: SoftDeleteColumns) -> Self {
        self.soft_delete = columns;
        self
    }

    pub fn with_restrict_category(mut self, category: impl Into<String>) -> Self {
        self.restrict_categories.push(category.into());
        self
    }

    /// Add or replace the override for one table.
    pub fn with_table(mut self, name: impl Into<String>, table: TableOverride) -> Self {
        self.tables.insert(name.into(), table);
        self
    }

    /// Output directory resolved against the input root.
    pub fn resolve_output_dir(&self, input_root: &Path) -> PathBuf {
        if self.output_dir.is_absolute() {
            self.output_dir.clone()
        } else {
            input_root.join(&self.output_dir)
        }
    }

    /// Manifest path resolved against the input root.
    pub fn resolve_manifest_path(&self, input_root: &Path) -> PathBuf {
        match &self.manifest_path {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => input_root.join(path),
            None => self.resolve_output_dir(input_root).join(DEFAULT_MANIFEST_NAME),
        }
    }

    /// Find the override for a table. Keys compare case-insensitively.
    pub fn table_override(&self, table: &QualifiedName) -> Option<&TableOverride> {
        self.tables
            .iter()
            .find(|(key, _)| QualifiedName::parse(key, &self.default_schema) == *table)
            .map(|(_, value)| value)
    }

    /// Soft-delete column names for a table, overrides applied.
    pub fn soft_delete_for(&self, table: &QualifiedName) -> SoftDeleteColumns {
        let mut columns = self.soft_delete.clone();
        if let Some(over) = self.table_override(table) {
            if let Some(c) = &over.active_column {
                columns.active_column = c.clone();
            }
            if let Some(c) = &over.created_by_column {
                columns.created_by_column = c.clone();
            }
            if let Some(c) = &over.updated_by_column {
                columns.updated_by_column = c.clone();
            }
            if let Some(c) = &over.updated_at_column {
                columns.updated_at_column = c.clone();
            }
        }
        columns
    }

    /// Check whether a table is a restrict table, by override or by category.
    pub fn is_restrict(&self, table: &QualifiedName, category: Option<&str>) -> bool {
        if self.table_override(table).is_some_and(|o| o.restrict) {
            return true;
        }
        category.is_some_and(|cat| {
            self.restrict_categories
                .iter()
                .any(|c| c.eq_ignore_ascii_case(cat))
        })
    }

    /// Check whether a table is excluded from generation.
    pub fn is_excluded(&self, table: &QualifiedName) -> bool {
        self.table_override(table).is_some_and(|o| o.exclude)
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            default_schema: DEFAULT_SCHEMA.to_string(),
            grammar: Grammar::default(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            manifest_path: None,
            purge_schema: DEFAULT_SCHEMA.to_string(),
            retention_days: DEFAULT_RETENTION_DAYS,
            soft_delete: SoftDeleteColumns::default(),
            restrict_categories: Vec::new(),
            tables: BTreeMap::new(),
        }
    }
}
