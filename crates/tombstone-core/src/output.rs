//! Writing generated files.
//!
//! Every generated file starts with [`GENERATED_MARKER`]. Only files carrying
//! the marker are ever rewritten or removed; a hand-written file in the way is
//! an error.

use crate::error::{Error, Result};
use crate::generate::GeneratedObject;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// First line of every generated file.
pub const GENERATED_MARKER: &str =
    "-- <auto-generated> tombstone: do not edit. Changes will be overwritten.";

const MARKER_PREFIX: &str = "-- <auto-generated> tombstone";

/// Check whether a file was written by tombstone.
pub fn is_generated(source: &str) -> bool {
    source
        .trim_start_matches('\u{feff}')
        .lines()
        .next()
        .is_some_and(|first| first.trim_start().starts_with(MARKER_PREFIX))
}

/// What happens to one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileChange {
    Create,
    Update,
    Unchanged,
    /// A generated file nothing produces any more.
    Remove,
}

/// Pending changes to the output directory.
#[derive(Debug, Clone, Default)]
pub struct OutputPlan {
    dir: PathBuf,
    /// File name to change and new contents (empty for removals).
    changes: BTreeMap<String, (FileChange, String)>,
}

impl OutputPlan {
    /// Compare generated objects against the output directory.
    ///
    /// Fails when a generated file would replace a file without the marker.
    pub fn new(dir: &Path, objects: &[GeneratedObject]) -> Result<Self> {
        let existing = existing_files(dir)?;
        let mut changes = BTreeMap::new();

        for object in objects {
            let path = dir.join(&object.file_name);
            let change = match existing.get(&object.file_name) {
                None => FileChange::Create,
                Some(current) if !is_generated(current) => {
                    return Err(Error::WouldOverwrite(path));
                }
                Some(current) if *current == object.sql => FileChange::Unchanged,
                Some(_) => FileChange::Update,
            };
            changes.insert(object.file_name.clone(), (change, object.sql.clone()));
        }

        for (name, current) in &existing {
            if !changes.contains_key(name) && is_generated(current) {
                changes.insert(name.clone(), (FileChange::Remove, String::new()));
            }
        }

        Ok(Self {
            dir: dir.to_path_buf(),
            changes,
        })
    }

    /// Files that differ from what is on disk, in name order.
    pub fn pending(&self) -> impl Iterator<Item = (&str, FileChange)> {
        self.changes
            .iter()
            .filter(|(_, (change, _))| *change != FileChange::Unchanged)
            .map(|(name, (change, _))| (name.as_str(), *change))
    }

    pub fn is_up_to_date(&self) -> bool {
        self.pending().next().is_none()
    }

    /// Apply the plan. Returns the number of files touched.
    pub fn apply(&self) -> Result<usize> {
        fs::create_dir_all(&self.dir).map_err(|e| Error::io(&self.dir, e))?;
        let mut touched = 0;
        for (name, (change, contents)) in &self.changes {
            let path = self.dir.join(name);
            match change {
                FileChange::Create | FileChange::Update => {
                    fs::write(&path, contents).map_err(|e| Error::io(&path, e))?;
                    tracing::debug!(file = %path.display(), ?change, "wrote generated file");
                }
                FileChange::Remove => {
                    fs::remove_file(&path).map_err(|e| Error::io(&path, e))?;
                    tracing::info!(file = %path.display(), "removed stale generated file");
                }
                FileChange::Unchanged => continue,
            }
            touched += 1;
        }
        Ok(touched)
    }
}

/// `*.sql` files directly in the output directory, with their contents.
fn existing_files(dir: &Path) -> Result<BTreeMap<String, String>> {
    let mut files = BTreeMap::new();
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(files),
        Err(e) => return Err(Error::io(dir, e)),
    };

    for entry in entries {
        let entry = entry.map_err(|e| Error::io(dir, e))?;
        let path = entry.path();
        if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("sql") {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let contents = fs::read_to_string(&path).map_err(|e| Error::io(&path, e))?;
        files.insert(name.to_string(), contents);
    }
    Ok(files)
}

/// Write a file unless it already holds `contents`. Returns whether it changed.
pub fn write_if_changed(path: &Path, contents: &str) -> Result<bool> {
    match fs::read_to_string(path) {
        Ok(current) if current == contents => return Ok(false),
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(Error::io(path, e)),
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }
    fs::write(path, contents).map_err(|e| Error::io(path, e))?;
    Ok(true)
}

/// Check whether a file already holds `contents`.
pub fn is_current(path: &Path, contents: &str) -> Result<bool> {
    match fs::read_to_string(path) {
        Ok(current) => Ok(current == contents),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(Error::io(path, e)),
    }
}
