//! Tests that run the compiled `fretwise` binary against a temporary
//! config. Everything here runs offline: the hashing embedder and the
//! disabled completion provider.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;

fn setup_test_env(catalog_toml: Option<&str>) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();

    let catalog_section = match catalog_toml {
        Some(content) => {
            let catalog_path = root.join("catalog.toml");
            fs::write(&catalog_path, content).unwrap();
            format!("[catalog]\npath = \"{}\"\n", catalog_path.display())
        }
        None => String::new(),
    };

    let config_content = format!(
        r#"
[server]
bind = "127.0.0.1:0"

{}
[embedding]
provider = "hash"
dims = 512

[completion]
provider = "disabled"
"#,
        catalog_section
    );

    let config_path = root.join("fretwise.toml");
    fs::write(&config_path, config_content).unwrap();
    (tmp, config_path)
}

fn run_fretwise(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = env!("CARGO_BIN_EXE_fretwise");
    let output = Command::new(binary)
        .arg("--config")
        .arg(config_path)
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run fretwise binary at {}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_catalog_lists_builtin_products() {
    let (_tmp, config_path) = setup_test_env(None);
    let (stdout, stderr, success) = run_fretwise(&config_path, &["catalog"]);
    assert!(success, "catalog failed: stderr={}", stderr);
    assert!(stdout.contains("[GTR001] Fender Stratocaster"));
    assert!(stdout.contains("[GTR002] Gibson Les Paul"));
    assert!(stdout.contains("2 product(s)"));
}

#[test]
fn test_catalog_from_file() {
    let (_tmp, config_path) = setup_test_env(Some(
        r#"
[[products]]
id = "ACU001"
name = "Taylor 214ce"
brand = "Taylor"
price = 1199.0
type = "Acoustic"
features = ["Cutaway", "Onboard electronics"]
description = "Grand auditorium acoustic with a bright, balanced voice."
"#,
    ));
    let (stdout, stderr, success) = run_fretwise(&config_path, &["catalog"]);
    assert!(success, "catalog failed: stderr={}", stderr);
    assert!(stdout.contains("[ACU001] Taylor 214ce (Taylor, Acoustic) $1199.00"));
    assert!(!stdout.contains("GTR001"));
}

#[test]
fn test_catalog_rejects_duplicate_ids() {
    let product = r#"
[[products]]
id = "DUP"
name = "One"
brand = "B"
price = 1.0
type = "Electric"
description = "d"
"#;
    let (_tmp, config_path) = setup_test_env(Some(&format!("{}{}", product, product)));
    let (_, stderr, success) = run_fretwise(&config_path, &["catalog"]);
    assert!(!success);
    assert!(stderr.contains("duplicate product id"));
}

#[test]
fn test_search_free_text() {
    let (_tmp, config_path) = setup_test_env(None);
    let (stdout, stderr, success) =
        run_fretwise(&config_path, &["search", "warm tone with sustain"]);
    assert!(success, "search failed: stderr={}", stderr);
    assert!(stdout.contains("1. [GTR002]"), "stdout={}", stdout);
    assert!(stdout.contains("2. [GTR001]"), "stdout={}", stdout);
}

#[test]
fn test_search_json_filter() {
    let (_tmp, config_path) = setup_test_env(None);
    let (stdout, stderr, success) =
        run_fretwise(&config_path, &["search", r#"{"brand": "Gibson"}"#]);
    assert!(success, "search failed: stderr={}", stderr);
    assert!(stdout.contains("Gibson Les Paul"));
}

#[test]
fn test_recommend_without_model_fails() {
    let (_tmp, config_path) = setup_test_env(None);
    let (_, stderr, success) = run_fretwise(
        &config_path,
        &["recommend", "--budget", "1500", "--style", "Electric"],
    );
    assert!(!success);
    assert!(stderr.contains("disabled"), "stderr={}", stderr);
}

#[test]
fn test_invalid_config_is_reported() {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("bad.toml");
    fs::write(&config_path, "[embedding]\nprovider = \"magic\"\n").unwrap();
    let (_, stderr, success) = run_fretwise(&config_path, &["catalog"]);
    assert!(!success);
    assert!(stderr.contains("Unknown embedding provider"));
}

#[test]
fn test_missing_config_uses_defaults() {
    let tmp = TempDir::new().unwrap();
    let (stdout, stderr, success) =
        run_fretwise(&tmp.path().join("absent.toml"), &["catalog"]);
    assert!(success, "catalog failed: stderr={}", stderr);
    assert!(stdout.contains("GTR001"));
}

#[test]
fn test_completions() {
    let (_tmp, config_path) = setup_test_env(None);
    let (stdout, _, success) = run_fretwise(&config_path, &["completions", "bash"]);
    assert!(success);
    assert!(stdout.contains("fretwise"));
}
