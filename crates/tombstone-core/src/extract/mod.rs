//! Extraction of table metadata and programmable objects from parsed files.
//!
//! Each file is analysed on its own into a [`FileAnalysis`]; the pipeline then
//! feeds the results, in path order, into the catalog's registry builder.

mod adapter;
mod file;
mod table;

pub use adapter::{adapter_for, GrammarAdapter, Sql130, Sql160, TemporalShape};
pub use file::{analyze, ExtractedItem, FileAnalysis, SourceRole};
pub use table::{standalone_index, table_constraint, table_draft, ExtractContext};
