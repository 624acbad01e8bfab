//! The end-to-end run.
//!
//! Files are analysed in parallel, then merged in path order into the table
//! registry. Discovery, the relationship graph and generation all work on the
//! merged state.

use crate::catalog::{RegistryBuilder, TableRegistry};
use crate::config::GeneratorConfig;
use crate::diagnostics::{self, Diagnostic};
use crate::discovery::DiscoveryRegistry;
use crate::error::{Error, Result};
use crate::extract::{adapter_for, analyze, ExtractedItem, FileAnalysis, SourceRole};
use crate::generate::{GenerationResult, Generator};
use crate::graph::RelationshipGraph;
use crate::manifest::Manifest;
use crate::output::{is_current, write_if_changed, FileChange, OutputPlan};
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// One file handed to the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Path relative to the input root, `/`-separated.
    pub path: String,
    pub contents: String,
    pub role: SourceRole,
}

impl SourceFile {
    pub fn input(path: impl Into<String>, contents: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            contents: contents.into(),
            role: SourceRole::Input,
        }
    }

    pub fn output_area(path: impl Into<String>, contents: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            contents: contents.into(),
            role: SourceRole::OutputArea,
        }
    }
}

/// Everything one run computes.
#[derive(Debug)]
pub struct Analysis {
    pub registry: TableRegistry,
    pub graph: RelationshipGraph,
    pub discovery: DiscoveryRegistry,
    pub generation: GenerationResult,
    /// All diagnostics, sorted by location.
    pub diagnostics: Vec<Diagnostic>,
    pub manifest: Manifest,
}

impl Analysis {
    pub fn has_errors(&self) -> bool {
        diagnostics::has_errors(&self.diagnostics)
    }
}

/// Run the pipeline over in-memory files.
///
/// Input files are merged in path order whatever order they are given in.
pub fn analyze_sources(sources: &[SourceFile], config: &GeneratorConfig) -> Analysis {
    let adapter = adapter_for(config.grammar);

    let mut ordered: Vec<&SourceFile> = sources.iter().collect();
    ordered.sort_by(|a, b| a.role.cmp(&b.role).then_with(|| a.path.cmp(&b.path)));

    let analyses: Vec<FileAnalysis> = ordered
        .par_iter()
        .map(|source| analyze(&source.path, &source.contents, source.role, config, adapter))
        .collect();
    tracing::info!(files = analyses.len(), "files analysed");

    let mut builder = RegistryBuilder::new();
    let mut diagnostics = Vec::new();
    let mut objects = Vec::new();
    for analysis in analyses {
        diagnostics.extend(analysis.diagnostics);
        objects.extend(analysis.objects);
        for item in analysis.items {
            match item {
                ExtractedItem::Table(draft) => builder.add_table(draft),
                ExtractedItem::Constraint { table, constraint } => {
                    builder.add_constraint(table, constraint)
                }
                ExtractedItem::Index {
                    table,
                    index,
                    location,
                } => builder.add_index(table, index, location),
            }
        }
    }

    let (registry, registry_diagnostics) = builder.finish(config, adapter.index_sources());
    diagnostics.extend(registry_diagnostics);
    tracing::info!(
        tables = registry.len(),
        participating = registry.iter().filter(|t| t.participates()).count(),
        "table registry built"
    );

    let discovery = DiscoveryRegistry::new(objects);

    let (graph, graph_diagnostics) = RelationshipGraph::build(&registry);
    diagnostics.extend(graph_diagnostics);
    tracing::info!(
        relationships = graph.edges().len(),
        cyclic = graph.cyclic_tables().count(),
        "relationship graph built"
    );

    let generation = Generator::new(&registry, &graph, &discovery, config).generate();
    diagnostics.extend(generation.diagnostics.iter().cloned());
    tracing::info!(
        generated = generation.objects.len(),
        suppressed = generation.suppressed.len(),
        "objects generated"
    );

    diagnostics::sort(&mut diagnostics);
    let manifest = Manifest::build(&registry, &graph, &discovery, &generation, &diagnostics);

    Analysis {
        registry,
        graph,
        discovery,
        generation,
        diagnostics,
        manifest,
    }
}

/// Read every `*.sql` file under `input_root`, plus the files directly in
/// `output_dir`.
///
/// The output directory is never read as input, even when it sits inside the
/// input root.
pub fn collect_sources(input_root: &Path, output_dir: &Path) -> Result<Vec<SourceFile>> {
    let output_canonical = fs::canonicalize(output_dir).ok();
    let mut sources = Vec::new();

    let walker = WalkDir::new(input_root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            !(entry.file_type().is_dir()
                && entry.depth() > 0
                && output_canonical.is_some()
                && fs::canonicalize(entry.path()).ok() == output_canonical)
        });

    for entry in walker {
        let entry = entry?;
        if entry.file_type().is_file() && is_sql(entry.path()) {
            sources.push(SourceFile::input(
                relative_path(input_root, entry.path()),
                read_source(entry.path())?,
            ));
        }
    }

    if output_dir.is_dir() {
        for entry in WalkDir::new(output_dir).max_depth(1).sort_by_file_name() {
            let entry = entry?;
            if entry.file_type().is_file() && is_sql(entry.path()) {
                sources.push(SourceFile::output_area(
                    relative_path(input_root, entry.path()),
                    read_source(entry.path())?,
                ));
            }
        }
    }

    sources.sort_by(|a, b| a.role.cmp(&b.role).then_with(|| a.path.cmp(&b.path)));
    tracing::debug!(files = sources.len(), root = %input_root.display(), "sources collected");
    Ok(sources)
}

fn is_sql(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("sql"))
}

/// Read a file as text. Invalid UTF-8 is replaced rather than rejected.
fn read_source(path: &Path) -> Result<String> {
    let bytes = fs::read(path).map_err(|e| Error::io(path, e))?;
    let text = String::from_utf8_lossy(&bytes);
    Ok(text.trim_start_matches('\u{feff}').to_string())
}

/// `/`-separated path relative to `root`, or the full path when outside it.
fn relative_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Outcome of a directory run.
#[derive(Debug)]
pub struct RunReport {
    pub analysis: Analysis,
    pub output_dir: PathBuf,
    /// Generated files that differ from the output directory.
    pub changes: Vec<(String, FileChange)>,
    pub manifest_path: PathBuf,
    /// The manifest differs from the one on disk.
    pub manifest_changed: bool,
}

impl RunReport {
    pub fn is_up_to_date(&self) -> bool {
        self.changes.is_empty() && !self.manifest_changed
    }
}

/// Analyse a directory without touching the output.
pub fn analyze_dir(input_root: &Path, config: &GeneratorConfig) -> Result<Analysis> {
    let output_dir = config.resolve_output_dir(input_root);
    let sources = collect_sources(input_root, &output_dir)?;
    Ok(analyze_sources(&sources, config))
}

/// Analyse a directory and write generated files and the manifest.
///
/// Files are written even when error diagnostics exist; tables the errors do not
/// touch still generate.
pub fn generate(input_root: &Path, config: &GeneratorConfig) -> Result<RunReport> {
    let (report, plan, manifest) = prepare(input_root, config)?;

    let touched = plan.apply()?;
    let manifest_written = write_if_changed(&report.manifest_path, &manifest)?;
    tracing::info!(
        files = touched,
        manifest = manifest_written,
        output = %report.output_dir.display(),
        "output written"
    );
    Ok(report)
}

/// Analyse a directory and report out-of-date output without writing.
pub fn check(input_root: &Path, config: &GeneratorConfig) -> Result<RunReport> {
    let (report, _, _) = prepare(input_root, config)?;
    tracing::info!(
        out_of_date = report.changes.len() + usize::from(report.manifest_changed),
        "output checked"
    );
    Ok(report)
}

fn prepare(input_root: &Path, config: &GeneratorConfig) -> Result<(RunReport, OutputPlan, String)> {
    let output_dir = config.resolve_output_dir(input_root);
    let manifest_path = config.resolve_manifest_path(input_root);
    let analysis = analyze_dir(input_root, config)?;

    let plan = OutputPlan::new(&output_dir, &analysis.generation.objects)?;
    let manifest = analysis.manifest.to_json()?;
    let manifest_changed = !is_current(&manifest_path, &manifest)?;
    let changes = plan
        .pending()
        .map(|(name, change)| (name.to_string(), change))
        .collect();

    let report = RunReport {
        analysis,
        output_dir,
        changes,
        manifest_path,
        manifest_changed,
    };
    Ok((report, plan, manifest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::QualifiedName;
    use crate::output::GENERATED_MARKER;
    use tempfile::TempDir;

    const USERS: &str =
        "CREATE TABLE dbo.users (id INT PRIMARY KEY, is_active BIT NOT NULL, updated_by INT, updated_at DATETIME2)";
    const ORDERS: &str = "CREATE TABLE dbo.orders (id INT PRIMARY KEY, user_id INT NOT NULL, is_active BIT NOT NULL, updated_by INT, updated_at DATETIME2)";
    const ORDERS_FK: &str = "ALTER TABLE dbo.orders ADD CONSTRAINT fk_orders_users FOREIGN KEY (user_id) REFERENCES dbo.users (id);";

    #[test]
    fn test_input_order_does_not_matter() {
        let config = GeneratorConfig::default();
        let forward = analyze_sources(
            &[
                SourceFile::input("a/users.sql", USERS),
                SourceFile::input("b/orders.sql", ORDERS),
                SourceFile::input("c/fk.sql", ORDERS_FK),
            ],
            &config,
        );
        let reversed = analyze_sources(
            &[
                SourceFile::input("c/fk.sql", ORDERS_FK),
                SourceFile::input("b/orders.sql", ORDERS),
                SourceFile::input("a/users.sql", USERS),
            ],
            &config,
        );
        assert_eq!(
            forward.manifest.to_json().unwrap(),
            reversed.manifest.to_json().unwrap()
        );
        assert_eq!(forward.graph.edges().len(), 1);
        assert!(!forward.has_errors());
    }

    #[test]
    fn test_output_area_only_contributes_objects() {
        let config = GeneratorConfig::default();
        let analysis = analyze_sources(
            &[
                SourceFile::input("users.sql", USERS),
                SourceFile::input("orders.sql", ORDERS),
                SourceFile::input("fk.sql", ORDERS_FK),
                SourceFile::output_area(
                    "generated/custom.sql",
                    "CREATE TABLE dbo.ignored (id INT PRIMARY KEY)\nGO\nCREATE VIEW dbo.vw_orders AS SELECT 1 AS one",
                ),
            ],
            &config,
        );
        assert!(!analysis.registry.contains(&QualifiedName::new("dbo", "ignored")));
        assert!(analysis
            .discovery
            .is_user_owned(&QualifiedName::new("dbo", "vw_orders")));
        assert_eq!(analysis.generation.suppressed.len(), 1);
    }

    #[test]
    fn test_generated_output_is_ignored_by_discovery() {
        let config = GeneratorConfig::default();
        let marked = format!("{}\nCREATE OR ALTER VIEW dbo.vw_users AS SELECT 1 AS one", GENERATED_MARKER);
        let analysis = analyze_sources(
            &[
                SourceFile::input("users.sql", USERS),
                SourceFile::output_area("generated/vw_users.sql", marked),
            ],
            &config,
        );
        assert!(analysis.discovery.is_empty());
        assert!(analysis.generation.suppressed.is_empty());
    }

    #[test]
    fn test_collect_sources_skips_output_dir() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("tables")).unwrap();
        fs::create_dir_all(root.join("generated")).unwrap();
        fs::write(root.join("tables").join("users.sql"), USERS).unwrap();
        fs::write(root.join("README.md"), "not sql").unwrap();
        fs::write(root.join("generated").join("hand.sql"), "CREATE VIEW v AS SELECT 1 AS one").unwrap();

        let sources = collect_sources(root, &root.join("generated")).unwrap();
        let seen: Vec<_> = sources.iter().map(|s| (s.path.as_str(), s.role)).collect();
        assert_eq!(
            seen,
            vec![
                ("tables/users.sql", SourceRole::Input),
                ("generated/hand.sql", SourceRole::OutputArea),
            ]
        );
    }

    #[test]
    fn test_generate_then_check() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::write(root.join("users.sql"), USERS).unwrap();
        let config = GeneratorConfig::default();

        let before = check(root, &config).unwrap();
        assert!(!before.is_up_to_date());
        assert!(!root.join("generated").exists());

        let report = generate(root, &config).unwrap();
        assert!(root.join("generated").join("vw_users.sql").is_file());
        assert!(report.manifest_path.is_file());

        let after = check(root, &config).unwrap();
        assert!(after.is_up_to_date(), "{:?}", after.changes);
    }
}
