// End-to-end tests for `holdings import` and `holdings dupes`.
// Run with: cargo test -p holdings-cli --test dupes_cli -- --nocapture

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn holdings() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_holdings"));
    cmd.current_dir(env!("CARGO_MANIFEST_DIR"));
    cmd.env_remove("RUST_LOG");
    cmd
}

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
}

fn run(args: &[&str]) -> Output {
    holdings().args(args).output().expect("run holdings")
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn code(output: &Output) -> i32 {
    output.status.code().expect("exit code")
}

/// Fresh database loaded with the household fixtures.
fn household_db(dir: &Path) -> String {
    let db = dir.join("holdings.db");
    let db = db.to_str().unwrap().to_string();

    let categories = fixture("categories.csv");
    let out = run(&[
        "import", "records", &db, categories.to_str().unwrap(),
        "--kind", "category", "--created-at-column", "added",
    ]);
    assert_eq!(code(&out), 0, "{}", stderr(&out));
    assert!(stderr(&out).contains("imported 3 'category' record(s)"));

    let tags = fixture("tags.csv");
    let out = run(&["import", "records", &db, tags.to_str().unwrap(), "--kind", "tag"]);
    assert_eq!(code(&out), 0, "{}", stderr(&out));

    let products = fixture("products.csv");
    let out = run(&[
        "import", "records", &db, products.to_str().unwrap(),
        "--kind", "product", "--id-column", "sku",
    ]);
    assert_eq!(code(&out), 0, "{}", stderr(&out));

    let edges = fixture("edges.csv");
    let out = run(&["import", "edges", &db, edges.to_str().unwrap()]);
    assert_eq!(code(&out), 0, "{}", stderr(&out));
    assert!(stderr(&out).contains("imported 6 edge(s)"));

    db
}

// ===========================================================================
// dupes scan
// ===========================================================================

#[test]
fn scan_reports_duplicates_with_exit_3() {
    let dir = tempfile::tempdir().unwrap();
    let db = household_db(dir.path());
    let config = fixture("household.dedup.toml");

    let out = run(&["dupes", "scan", &db, config.to_str().unwrap()]);
    assert_eq!(code(&out), 3, "{}", stderr(&out));
    let err = stderr(&out);
    assert!(err.contains("category: Found 2 duplicates across 1 group"), "{err}");
    assert!(err.contains("product: Found 2 duplicates across 1 group (of 3 record(s))"), "{err}");
    assert!(err.contains("tag: Found 3 duplicates across 1 group"), "{err}");
    assert!(err.contains("Found 7 duplicates across 3 groups"), "{err}");
    assert!(err.contains("hint:  merge them with `holdings dupes clean"), "{err}");
    assert!(out.stdout.is_empty());
}

#[test]
fn scan_json_is_single_document() {
    let dir = tempfile::tempdir().unwrap();
    let db = household_db(dir.path());
    let config = fixture("household.dedup.toml");

    let out = run(&["dupes", "scan", &db, config.to_str().unwrap(), "--json"]);
    assert_eq!(code(&out), 3, "{}", stderr(&out));

    let stdout = String::from_utf8_lossy(&out.stdout);
    let val: serde_json::Value = serde_json::from_str(stdout.trim())
        .unwrap_or_else(|e| panic!("stdout must be JSON: {e}\n{stdout}"));

    assert_eq!(val["meta"]["config_name"], "Household cleanup");
    let kinds = val["kinds"].as_array().unwrap();
    let names: Vec<&str> = kinds.iter().map(|k| k["kind"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["category", "product", "tag"]);

    let tag = &kinds[2]["result"];
    assert_eq!(tag["duplicate_count"], 3);
    assert_eq!(tag["duplicates"][0]["key"], "gift");
    let members: Vec<&str> = tag["duplicates"][0]["members"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["id"].as_str().unwrap())
        .collect();
    assert_eq!(members, vec!["t1", "t2", "t4"]);
}

#[test]
fn scan_output_file_and_single_kind() {
    let dir = tempfile::tempdir().unwrap();
    let db = household_db(dir.path());
    let config = fixture("household.dedup.toml");
    let report = dir.path().join("report.json");

    let out = run(&[
        "dupes", "scan", &db, config.to_str().unwrap(),
        "--kind", "category", "--output", report.to_str().unwrap(),
    ]);
    assert_eq!(code(&out), 3, "{}", stderr(&out));
    assert!(out.stdout.is_empty());

    let val: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&report).unwrap()).unwrap();
    assert_eq!(val["kinds"].as_array().unwrap().len(), 1);
    assert_eq!(val["kinds"][0]["kind"], "category");
}

#[test]
fn scan_unknown_kind_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let db = household_db(dir.path());
    let config = fixture("household.dedup.toml");

    let out = run(&["dupes", "scan", &db, config.to_str().unwrap(), "--kind", "manual"]);
    assert_eq!(code(&out), 2);
    assert!(stderr(&out).contains("error: unknown kind: manual"), "{}", stderr(&out));
}

#[test]
fn scan_missing_db_is_usage_error() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("nope.db");
    let config = fixture("household.dedup.toml");

    let out = run(&["dupes", "scan", db.to_str().unwrap(), config.to_str().unwrap()]);
    assert_eq!(code(&out), 2);
    assert!(stderr(&out).contains("database not found"));
    assert!(!db.exists(), "scan must not create the database");
}

// ===========================================================================
// dupes clean
// ===========================================================================

#[test]
fn clean_merges_then_scan_is_clean() {
    let dir = tempfile::tempdir().unwrap();
    let db = household_db(dir.path());
    let config = fixture("household.dedup.toml");

    let out = run(&["dupes", "clean", &db, config.to_str().unwrap(), "--json"]);
    assert_eq!(code(&out), 0, "{}", stderr(&out));

    let val: serde_json::Value =
        serde_json::from_str(String::from_utf8_lossy(&out.stdout).trim()).unwrap();
    let cleaned: u64 = val["kinds"]
        .as_array()
        .unwrap()
        .iter()
        .map(|k| k["outcome"]["cleaned"].as_u64().unwrap())
        .sum();
    assert_eq!(cleaned, 4);

    let out = run(&["dupes", "scan", &db, config.to_str().unwrap()]);
    assert_eq!(code(&out), 0, "{}", stderr(&out));
    assert!(stderr(&out).contains("No duplicates found"));

    let out = run(&["status", &db, "--json"]);
    assert_eq!(code(&out), 0, "{}", stderr(&out));
    let val: serde_json::Value =
        serde_json::from_str(String::from_utf8_lossy(&out.stdout).trim()).unwrap();
    assert_eq!(val["kinds"]["category"], 2);
    assert_eq!(val["kinds"]["product"], 3);
    assert_eq!(val["kinds"]["tag"], 2);
}

#[test]
fn clean_twice_is_a_no_op() {
    let dir = tempfile::tempdir().unwrap();
    let db = household_db(dir.path());
    let config = fixture("household.dedup.toml");

    let first = run(&["dupes", "clean", &db, config.to_str().unwrap()]);
    assert_eq!(code(&first), 0, "{}", stderr(&first));
    let second = run(&["dupes", "clean", &db, config.to_str().unwrap()]);
    assert_eq!(code(&second), 0, "{}", stderr(&second));
    assert!(stderr(&second).contains("tag: Removed 0 records from 0 group(s)"), "{}", stderr(&second));
}

#[test]
fn clean_with_locked_record_exit_5() {
    let dir = tempfile::tempdir().unwrap();
    let db = household_db(dir.path());
    let config = fixture("household.dedup.toml");
    rusqlite::Connection::open(&db)
        .unwrap()
        .execute_batch(
            "CREATE TRIGGER lock_t2 BEFORE DELETE ON records WHEN OLD.id = 't2' \
             BEGIN SELECT RAISE(ABORT, 'locked'); END;",
        )
        .unwrap();

    let out = run(&["dupes", "clean", &db, config.to_str().unwrap()]);
    assert_eq!(code(&out), 5, "{}", stderr(&out));
    let err = stderr(&out);
    assert!(err.contains("failed to clean up duplicates of 'gift': constraint violation: locked"), "{err}");
    assert!(err.contains("cleanup finished with 1 error(s)"), "{err}");
    assert!(err.contains("hint:  groups that failed were left unchanged"), "{err}");

    // the other kinds were still merged
    let out = run(&["status", &db, "--json"]);
    assert_eq!(code(&out), 0, "{}", stderr(&out));
    let val: serde_json::Value =
        serde_json::from_str(String::from_utf8_lossy(&out.stdout).trim()).unwrap();
    assert_eq!(val["kinds"]["category"], 2);
    assert_eq!(val["kinds"]["tag"], 4);
}

// ===========================================================================
// dupes validate
// ===========================================================================

#[test]
fn validate_good_config() {
    let config = fixture("household.dedup.toml");
    let out = run(&["dupes", "validate", config.to_str().unwrap()]);
    assert_eq!(code(&out), 0, "{}", stderr(&out));
    assert!(stderr(&out).contains("valid: dedup 'Household cleanup' with 3 kind(s)"));
}

#[test]
fn validate_broken_config_exit_2() {
    let config = fixture("broken.dedup.toml");
    let out = run(&["dupes", "validate", config.to_str().unwrap()]);
    assert_eq!(code(&out), 2);
    assert!(stderr(&out).contains("kind 'tag': key_field must not be empty"), "{}", stderr(&out));
}

// ===========================================================================
// import errors
// ===========================================================================

#[test]
fn import_missing_id_column_exit_10() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("holdings.db");
    let products = fixture("products.csv");

    let out = run(&[
        "import", "records", db.to_str().unwrap(), products.to_str().unwrap(), "--kind", "product",
    ]);
    assert_eq!(code(&out), 10);
    assert!(stderr(&out).contains("missing column 'id'"), "{}", stderr(&out));
}

#[test]
fn import_same_records_twice_exit_11() {
    let dir = tempfile::tempdir().unwrap();
    let db = household_db(dir.path());
    let tags = fixture("tags.csv");

    let out = run(&["import", "records", &db, tags.to_str().unwrap(), "--kind", "tag"]);
    assert_eq!(code(&out), 11, "{}", stderr(&out));
    assert!(stderr(&out).contains("hint:  record ids must be unique"));
}

#[test]
fn import_edge_to_unknown_record_exit_11() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("holdings.db");
    let tags = fixture("tags.csv");
    let out = run(&["import", "records", db.to_str().unwrap(), tags.to_str().unwrap(), "--kind", "tag"]);
    assert_eq!(code(&out), 0, "{}", stderr(&out));

    // products were never imported
    let edges = fixture("edges.csv");
    let out = run(&["import", "edges", db.to_str().unwrap(), edges.to_str().unwrap()]);
    assert_eq!(code(&out), 11, "{}", stderr(&out));

    let out = run(&["status", db.to_str().unwrap()]);
    assert_eq!(code(&out), 0);
    assert_eq!(String::from_utf8_lossy(&out.stdout).trim(), "tag  4");
}
