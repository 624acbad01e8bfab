//! Integration tests for the generation pipeline.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tombstone_core::{
    analyze_sources, check, generate, DiagnosticCode, FileChange, GeneratorConfig, QualifiedName,
    SourceFile, TableOverride, GENERATED_MARKER,
};

struct Corpus {
    dir: tempfile::TempDir,
    config: GeneratorConfig,
}

impl Corpus {
    fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
            config: GeneratorConfig::default(),
        }
    }

    fn root(&self) -> &Path {
        self.dir.path()
    }

    fn write(&self, path: &str, contents: &str) {
        let full = self.root().join(path);
        fs::create_dir_all(full.parent().unwrap()).unwrap();
        fs::write(full, contents).unwrap();
    }

    fn generated(&self, file: &str) -> String {
        fs::read_to_string(self.root().join("generated").join(file)).unwrap()
    }

    fn has_generated(&self, file: &str) -> bool {
        self.root().join("generated").join(file).is_file()
    }

    /// Every file in the output directory with its contents.
    fn snapshot(&self) -> BTreeMap<String, String> {
        fs::read_dir(self.root().join("generated"))
            .unwrap()
            .map(|entry| {
                let entry = entry.unwrap();
                (
                    entry.file_name().to_string_lossy().into_owned(),
                    fs::read_to_string(entry.path()).unwrap(),
                )
            })
            .collect()
    }
}

const USERS: &str = "\
-- @description People who can sign in.
CREATE TABLE dbo.users (
    id INT NOT NULL PRIMARY KEY,
    email NVARCHAR(320) NOT NULL,
    is_active BIT NOT NULL,
    updated_by NVARCHAR(100) NULL,
    updated_at DATETIME2 NULL
)
";

const ORDERS: &str = "\
CREATE TABLE dbo.orders (
    id INT NOT NULL PRIMARY KEY,
    user_id INT NOT NULL,
    is_active BIT NOT NULL,
    updated_by NVARCHAR(100) NULL,
    updated_at DATETIME2 NULL,
    CONSTRAINT fk_orders_users FOREIGN KEY (user_id) REFERENCES dbo.users (id)
)
";

fn setup_shop(corpus: &Corpus) {
    corpus.write("tables/users.sql", USERS);
    corpus.write("tables/orders.sql", ORDERS);
}

#[test]
fn test_generates_shop_objects() {
    let corpus = Corpus::new();
    setup_shop(&corpus);

    let report = generate(corpus.root(), &corpus.config).unwrap();
    assert!(!report.analysis.has_errors());

    let files: Vec<_> = corpus.snapshot().into_keys().collect();
    assert_eq!(
        files,
        vec![
            "tombstone.manifest.json",
            "trg_orders_reactivation_guard.sql",
            "trg_users_cascade_soft_delete.sql",
            "usp_purge_soft_deleted.sql",
            "vw_orders.sql",
            "vw_users.sql",
        ]
    );

    for file in files.iter().filter(|f| f.ends_with(".sql")) {
        assert!(corpus.generated(file).starts_with(GENERATED_MARKER));
    }

    let cascade = corpus.generated("trg_users_cascade_soft_delete.sql");
    assert!(cascade.contains("ON dbo.users\nAFTER UPDATE\n"));
    assert!(cascade.contains("INNER JOIN inserted AS i ON c.user_id = i.id\n"));
    assert!(cascade.contains("c.updated_by = i.updated_by"));

    let guard = corpus.generated("trg_orders_reactivation_guard.sql");
    assert!(guard.contains("INNER JOIN dbo.users AS p ON p.id = i.user_id\n"));
    assert!(guard.contains("THROW 50001, N'Cannot reactivate a row of dbo.orders"));
}

#[test]
fn test_alter_table_composite_key_drives_every_join() {
    let corpus = Corpus::new();
    corpus.write(
        "sales/orders.sql",
        "\
CREATE TABLE sales.orders (
    tenant_id INT NOT NULL,
    order_no INT NOT NULL,
    is_active BIT NOT NULL,
    updated_by NVARCHAR(100) NULL,
    updated_at DATETIME2 NULL
)
GO
ALTER TABLE sales.orders ADD CONSTRAINT pk_orders PRIMARY KEY (tenant_id, order_no);
",
    );
    corpus.write(
        "sales/order_lines.sql",
        "\
CREATE TABLE sales.order_lines (
    tenant_id INT NOT NULL,
    order_no INT NOT NULL,
    line_no INT NOT NULL,
    is_active BIT NOT NULL,
    updated_by NVARCHAR(100) NULL,
    updated_at DATETIME2 NULL,
    CONSTRAINT fk_order_lines_orders FOREIGN KEY (tenant_id, order_no)
        REFERENCES sales.orders (tenant_id, order_no)
)
GO
ALTER TABLE sales.order_lines
    ADD CONSTRAINT pk_order_lines PRIMARY KEY (tenant_id, order_no, line_no);
",
    );

    let report = generate(corpus.root(), &corpus.config).unwrap();
    assert!(report.analysis.diagnostics.is_empty(), "{:?}", report.analysis.diagnostics);

    let cascade = corpus.generated("sales.trg_orders_cascade_soft_delete.sql");
    assert!(cascade.contains(
        "INNER JOIN inserted AS i ON c.tenant_id = i.tenant_id AND c.order_no = i.order_no\n"
    ));
    assert!(cascade.contains(
        "INNER JOIN deleted AS d ON d.tenant_id = i.tenant_id AND d.order_no = i.order_no\n"
    ));

    let guard = corpus.generated("sales.trg_order_lines_reactivation_guard.sql");
    assert!(guard.contains(
        "INNER JOIN deleted AS d ON d.tenant_id = i.tenant_id AND d.order_no = i.order_no AND d.line_no = i.line_no\n"
    ));

    let purge = corpus.generated("usp_purge_soft_deleted.sql");
    assert!(purge.contains(
        "INNER JOIN #purge_sales_order_lines AS h ON t.tenant_id = h.tenant_id AND t.order_no = h.order_no AND t.line_no = h.line_no;"
    ));
    let lines_at = purge.find("-- sales.order_lines").unwrap();
    let orders_at = purge.find("-- sales.orders").unwrap();
    assert!(lines_at < orders_at);

    for (file, contents) in corpus.snapshot() {
        if file.ends_with(".sql") {
            assert!(!contents.contains(".id "), "{file} falls back to an id column");
            assert!(!contents.contains(".id\n"), "{file} falls back to an id column");
        }
    }
}

#[test]
fn test_composite_child_key_purge() {
    let corpus = Corpus::new();
    corpus.write(
        "countries.sql",
        "CREATE TABLE dbo.countries (\n    iso_alpha2 CHAR(2) NOT NULL PRIMARY KEY,\n    is_active BIT NOT NULL,\n    updated_at DATETIME2 NOT NULL\n)\n",
    );
    corpus.write(
        "dialling_codes.sql",
        "\
CREATE TABLE dbo.dialling_codes (
    country_code CHAR(2) NOT NULL,
    dialling_code VARCHAR(8) NOT NULL,
    is_active BIT NOT NULL,
    updated_at DATETIME2 NOT NULL,
    CONSTRAINT fk_dialling_codes_countries FOREIGN KEY (country_code)
        REFERENCES dbo.countries (iso_alpha2)
)
GO
ALTER TABLE dbo.dialling_codes
    ADD CONSTRAINT pk_dialling_codes PRIMARY KEY (country_code, dialling_code);
",
    );

    generate(corpus.root(), &corpus.config).unwrap();
    let purge = corpus.generated("usp_purge_soft_deleted.sql");
    assert!(purge.contains(
        "ON t.country_code = h.country_code AND t.dialling_code = h.dialling_code;"
    ));
    assert!(!purge.contains("t.id"));
}

#[test]
fn test_reruns_are_byte_identical() {
    let corpus = Corpus::new();
    setup_shop(&corpus);

    generate(corpus.root(), &corpus.config).unwrap();
    let first = corpus.snapshot();

    let second_report = generate(corpus.root(), &corpus.config).unwrap();
    assert!(second_report.changes.is_empty());
    assert!(!second_report.manifest_changed);
    assert_eq!(corpus.snapshot(), first);

    let checked = check(corpus.root(), &corpus.config).unwrap();
    assert!(checked.is_up_to_date());
}

#[test]
fn test_check_reports_drift_without_writing() {
    let corpus = Corpus::new();
    setup_shop(&corpus);
    generate(corpus.root(), &corpus.config).unwrap();

    fs::write(
        corpus.root().join("generated").join("vw_users.sql"),
        format!("{}\n-- edited", GENERATED_MARKER),
    )
    .unwrap();
    fs::remove_file(corpus.root().join("tables").join("orders.sql")).unwrap();

    let report = check(corpus.root(), &corpus.config).unwrap();
    assert!(!report.is_up_to_date());
    assert!(report
        .changes
        .contains(&("vw_users.sql".to_string(), FileChange::Update)));
    assert!(report
        .changes
        .contains(&("vw_orders.sql".to_string(), FileChange::Remove)));
    assert!(corpus.has_generated("vw_orders.sql"));
}

#[test]
fn test_stale_generated_files_are_removed() {
    let corpus = Corpus::new();
    setup_shop(&corpus);
    generate(corpus.root(), &corpus.config).unwrap();
    assert!(corpus.has_generated("trg_users_cascade_soft_delete.sql"));

    fs::remove_file(corpus.root().join("tables").join("orders.sql")).unwrap();
    generate(corpus.root(), &corpus.config).unwrap();

    assert!(!corpus.has_generated("trg_users_cascade_soft_delete.sql"));
    assert!(!corpus.has_generated("vw_orders.sql"));
    assert!(corpus.has_generated("vw_users.sql"));
}

#[test]
fn test_leading_block_stops_at_code() {
    let source = "\
-- @description Countries we ship to.

/* @category reference */
CREATE TABLE dbo.countries (
    iso_alpha2 CHAR(2) NOT NULL PRIMARY KEY,
    is_active BIT NOT NULL,
    updated_at DATETIME2 NULL
)
GO
-- @category ignored
-- @description Not part of the leading block.
";
    let analysis = analyze_sources(
        &[SourceFile::input("countries.sql", source)],
        &GeneratorConfig::default(),
    );
    let table = analysis
        .registry
        .get(&QualifiedName::new("dbo", "countries"))
        .unwrap();
    assert_eq!(
        table.annotations.description.as_deref(),
        Some("Countries we ship to.")
    );
    assert_eq!(table.annotations.category.as_deref(), Some("reference"));
    assert!(analysis.diagnostics.is_empty(), "{:?}", analysis.diagnostics);
}

#[test]
fn test_identity_not_for_replication_keeps_table() {
    let parent = "\
CREATE TABLE dbo.accounts (
    Id INT IDENTITY(1,1) NOT FOR REPLICATION NOT NULL PRIMARY KEY,
    is_active BIT NOT NULL,
    updated_at DATETIME2 NULL
)
";
    let child = "\
CREATE TABLE dbo.invoices (
    Id INT IDENTITY NOT FOR REPLICATION NOT NULL PRIMARY KEY,
    AccountId INT NOT NULL REFERENCES dbo.accounts (Id),
    is_active BIT NOT NULL,
    updated_at DATETIME2 NULL
)
";
    let analysis = analyze_sources(
        &[
            SourceFile::input("accounts.sql", parent),
            SourceFile::input("invoices.sql", child),
        ],
        &GeneratorConfig::default(),
    );

    assert!(analysis.diagnostics.is_empty(), "{:?}", analysis.diagnostics);
    assert_eq!(analysis.registry.len(), 2);
    let edges = analysis.graph.edges();
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].parent, QualifiedName::new("dbo", "accounts"));
    assert!(!edges[0].rejected);
}

#[test]
fn test_description_concatenation_and_duplicate() {
    let concatenated = "\
-- @description Customer accounts,
-- @description one per billing relationship.
CREATE TABLE dbo.customers (id INT PRIMARY KEY, is_active BIT NOT NULL, updated_at DATETIME2 NULL)
";
    let duplicated = "\
-- @description Old text.
--
-- @description New text.
CREATE TABLE dbo.vendors (id INT PRIMARY KEY, is_active BIT NOT NULL, updated_at DATETIME2 NULL)
";
    let analysis = analyze_sources(
        &[
            SourceFile::input("customers.sql", concatenated),
            SourceFile::input("vendors.sql", duplicated),
        ],
        &GeneratorConfig::default(),
    );

    let customers = analysis
        .registry
        .get(&QualifiedName::new("dbo", "customers"))
        .unwrap();
    assert_eq!(
        customers.annotations.description.as_deref(),
        Some("Customer accounts, one per billing relationship.")
    );

    let vendors = analysis
        .registry
        .get(&QualifiedName::new("dbo", "vendors"))
        .unwrap();
    assert_eq!(vendors.annotations.description.as_deref(), Some("New text."));

    let codes: Vec<_> = analysis
        .diagnostics
        .iter()
        .map(|d| (d.code, d.location.as_ref().map(|l| (l.file.as_str(), l.line))))
        .collect();
    assert_eq!(
        codes,
        vec![(DiagnosticCode::DuplicateAnnotation, Some(("vendors.sql", 3)))]
    );
}

#[test]
fn test_user_trigger_wins() {
    let corpus = Corpus::new();
    setup_shop(&corpus);
    corpus.write(
        "triggers/trg_users_cascade_soft_delete.sql",
        "\
CREATE TRIGGER dbo.trg_users_cascade_soft_delete ON dbo.users
AFTER UPDATE
AS
BEGIN
    SET NOCOUNT ON;
END
",
    );

    let report = generate(corpus.root(), &corpus.config).unwrap();
    let name = QualifiedName::new("dbo", "trg_users_cascade_soft_delete");

    assert!(!corpus.has_generated("trg_users_cascade_soft_delete.sql"));
    assert!(corpus.has_generated("trg_orders_reactivation_guard.sql"));
    assert!(report.analysis.discovery.is_user_owned(&name));
    assert!(report.analysis.diagnostics.is_empty(), "{:?}", report.analysis.diagnostics);

    let manifest: serde_json::Value =
        serde_json::from_str(&corpus.generated("tombstone.manifest.json")).unwrap();
    assert_eq!(
        manifest["userOwnedObjects"][0]["name"]["name"],
        "trg_users_cascade_soft_delete"
    );
    let users = manifest["tables"]
        .as_array()
        .unwrap()
        .iter()
        .find(|t| t["name"] == "users")
        .unwrap();
    assert_eq!(users["suppressed"][0], "dbo.trg_users_cascade_soft_delete");
    assert_eq!(manifest["statistics"]["suppressedObjects"], 1);
}

#[test]
fn test_hand_written_output_is_never_overwritten() {
    let corpus = Corpus::new();
    setup_shop(&corpus);
    corpus.write(
        "generated/vw_users.sql",
        "CREATE VIEW dbo.vw_users AS SELECT id, email FROM dbo.users WHERE is_active = 1\n",
    );

    let report = generate(corpus.root(), &corpus.config).unwrap();
    assert!(report
        .analysis
        .generation
        .suppressed
        .iter()
        .any(|s| s.name == QualifiedName::new("dbo", "vw_users")));
    assert!(!corpus.generated("vw_users.sql").starts_with(GENERATED_MARKER));
}

#[test]
fn test_cascade_cycle_is_isolated() {
    let corpus = Corpus::new();
    setup_shop(&corpus);
    corpus.write(
        "org/departments.sql",
        "CREATE TABLE dbo.departments (id INT PRIMARY KEY, head_id INT NULL REFERENCES dbo.employees (id), is_active BIT NOT NULL, updated_at DATETIME2 NULL)\n",
    );
    corpus.write(
        "org/employees.sql",
        "CREATE TABLE dbo.employees (id INT PRIMARY KEY, department_id INT NOT NULL REFERENCES dbo.departments (id), is_active BIT NOT NULL, updated_at DATETIME2 NULL)\n",
    );

    let report = generate(corpus.root(), &corpus.config).unwrap();
    assert!(report.analysis.has_errors());
    let cycles: Vec<_> = report
        .analysis
        .diagnostics
        .iter()
        .filter(|d| d.code == DiagnosticCode::CascadeCycle)
        .collect();
    assert_eq!(cycles.len(), 1);

    for table in ["departments", "employees"] {
        assert!(!corpus.has_generated(&format!("trg_{table}_cascade_soft_delete.sql")));
        assert!(!corpus.has_generated(&format!("trg_{table}_reactivation_guard.sql")));
        assert!(corpus.has_generated(&format!("vw_{table}.sql")));
    }
    assert!(corpus.has_generated("trg_users_cascade_soft_delete.sql"));

    let purge = corpus.generated("usp_purge_soft_deleted.sql");
    assert!(purge.contains("-- dbo.users"));
    assert!(!purge.contains("-- dbo.employees"));
}

#[test]
fn test_restrict_table_override() {
    let mut corpus = Corpus::new();
    setup_shop(&corpus);
    corpus.config = GeneratorConfig::default().with_table(
        "dbo.users",
        TableOverride {
            restrict: true,
            ..TableOverride::default()
        },
    );

    generate(corpus.root(), &corpus.config).unwrap();
    assert!(!corpus.has_generated("trg_users_cascade_soft_delete.sql"));
    let restrict = corpus.generated("trg_users_restrict_soft_delete.sql");
    assert!(restrict.contains("THROW 50002, N'Cannot deactivate a row of dbo.users"));
    assert!(corpus.has_generated("trg_orders_reactivation_guard.sql"));
}
