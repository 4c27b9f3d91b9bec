use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn taxograph_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_taxograph"))
}

fn run(args: &[&str]) -> Output {
    Command::new(taxograph_bin())
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .expect("run taxograph")
}

fn run_ok(args: &[&str]) -> String {
    let out = run(args);
    assert!(
        out.status.success(),
        "taxograph {:?} failed:\n{}",
        args,
        String::from_utf8_lossy(&out.stderr)
    );
    String::from_utf8(out.stdout).expect("utf8 stdout")
}

fn run_json(args: &[&str]) -> serde_json::Value {
    let mut all = args.to_vec();
    all.push("--json");
    serde_json::from_str(&run_ok(&all)).expect("json stdout")
}

fn write(dir: &Path, name: &str, text: &str) -> String {
    let path = dir.join(name);
    fs::write(&path, text).expect("write fixture");
    path.display().to_string()
}

#[test]
fn init_then_preorder_merge_then_lookup() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let db = tmp.path().join("db").display().to_string();
    let a = write(tmp.path(), "a.tsv", "1\t|\t\t|\tPlantae\n2\t|\t1\t|\tRosa\n");
    let b = write(
        tmp.path(),
        "b.tsv",
        "10\t|\t\t|\tPlantae\n11\t|\t10\t|\tRosa\n12\t|\t11\t|\tCanina\n",
    );
    let syn = write(tmp.path(), "b_syn.tsv", "12\t|\tRosa canina\t|\tsynonym\n");

    let report = run_json(&["init-tax", "--source", "A", &a, "--db", &db]);
    assert_eq!(report["nodes_created"], 2);
    assert_eq!(report["mode"], "initial");

    let plantae = run_json(&["lookup", "Plantae", "--db", &db]);
    let plantae_id = plantae[0]["accepted"].as_u64().expect("node id").to_string();

    let report = run_json(&[
        "add-tax", "--source", "B", &b, "--synonyms", &syn, "--root", &plantae_id, "--db", &db,
    ]);
    assert_eq!(report["mode"], "preorder");
    assert_eq!(report["nodes_created"], 1);
    assert_eq!(report["synonyms_attached"], 1);

    let canina = run_json(&["lookup", "Rosa canina", "--db", &db]);
    assert_eq!(canina.as_array().map(Vec::len), Some(1));
    assert_eq!(canina[0]["is_synonym"], true);
    assert_eq!(canina[0]["accepted_name"], "Canina");
    assert_eq!(canina[0]["source"], "B");

    let rosa = run_json(&["lookup", "Rosa", "--db", &db]);
    assert_eq!(rosa.as_array().map(Vec::len), Some(1));
}

#[test]
fn flat_merge_with_descriptor_and_checkpoint() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let db = tmp.path().join("db").display().to_string();
    let a = write(
        tmp.path(),
        "a.tsv",
        "1\t|\t\t|\tlife\n2\t|\t1\t|\tPlantae\n3\t|\t2\t|\tRosa\n",
    );
    let b = write(
        tmp.path(),
        "b.tsv",
        "a\t|\t\t|\tlife\nb\t|\ta\t|\tPlantae\nc\t|\tb\t|\tRosa\nd\t|\tc\t|\tcanina\n",
    );
    let descriptor = write(
        tmp.path(),
        "b.json",
        r#"{"name": "bsource", "author": "someone", "version": "2"}"#,
    );

    run_ok(&["init-tax", "--source", "A", &a, "--db", &db]);
    let report = run_json(&["add-tax", "--source", &descriptor, &b, "--flat", "--db", &db]);
    assert_eq!(report["source"], "bsource");
    assert_eq!(report["mode"], "path_scoring");
    assert_eq!(report["nodes_created"], 1);
    assert_eq!(report["duplicates_created"], 0);

    let out = run_ok(&["checkpoint", "--db", &db]);
    assert!(out.contains("wrote"));

    let stats = run_json(&["stats", "--db", &db]);
    assert_eq!(stats["taxa"], 4);
    assert_eq!(stats["sources"], 2);
    assert_eq!(stats["snapshot_loaded"], true);
    assert_eq!(stats["wal_frames_replayed"], 0);
}

#[test]
fn add_tax_requires_root_or_flat() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let db = tmp.path().join("db").display().to_string();
    let a = write(tmp.path(), "a.tsv", "1\t|\t\t|\tlife\n");

    let out = run(&["add-tax", "--source", "A", &a, "--db", &db]);
    assert!(!out.status.success());
}

#[test]
fn malformed_input_fails_without_partial_load() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let db = tmp.path().join("db").display().to_string();
    let bad = write(tmp.path(), "bad.tsv", "1\t|\t\t|\tlife\njust-one-field\n");

    let out = run(&["init-tax", "--source", "A", &bad, "--db", &db]);
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("line 2"), "stderr: {stderr}");

    let stats = run_json(&["stats", "--db", &db]);
    assert_eq!(stats["nodes"], 0);
}
