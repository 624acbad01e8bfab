//! Core error types.
//!
//! Problems found in the analysed DDL are [`Diagnostic`](crate::Diagnostic)s,
//! not errors. This type covers the failures that stop a run outright.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a tombstone run.
#[derive(Debug, Error)]
pub enum Error {
    /// Reading or writing a file failed.
    #[error("i/o error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Walking the input tree failed.
    #[error("directory walk error: {0}")]
    Walk(#[from] walkdir::Error),

    /// The configuration file could not be parsed.
    #[error("invalid configuration in {}: {source}", path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// The configuration parsed but holds an unusable value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Manifest serialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A generated file would overwrite a hand-written one.
    #[error("refusing to overwrite {} (no generated-file marker)", .0.display())]
    WouldOverwrite(PathBuf),
}

impl Error {
    /// Wrap an I/O error with the path it concerns.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
