//! End-to-end tests for the `symnmf` binary.

#![cfg(feature = "cli")]

use std::io::Write;
use std::path::Path;
use std::process::{Command, Output};

use tempfile::NamedTempFile;

const FATAL: &str = "An Error Has Occurred\n";

fn points_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

fn symnmf(args: &[&str], input: &Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_symnmf"))
        .args(args)
        .arg(input)
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

fn stdout(output: &Output) -> String {
    String::from_utf8(output.stdout.clone()).unwrap()
}

// ─── goals ───────────────────────────────────────────────────────────────────

#[test]
fn test_sym_two_points() {
    let input = points_file("0,0\n1,0\n");
    let out = symnmf(&["sym"], input.path());
    assert!(out.status.success());
    assert_eq!(stdout(&out), "0.0000,0.6065\n0.6065,0.0000\n");
}

#[test]
fn test_ddg_prints_full_diagonal_matrix() {
    let input = points_file("0,0\n1,0\n");
    let out = symnmf(&["ddg"], input.path());
    assert!(out.status.success());
    assert_eq!(stdout(&out), "0.6065,0.0000\n0.0000,0.6065\n");
}

#[test]
fn test_norm_two_points_is_one() {
    let input = points_file("0,0\n1,0\n");
    let out = symnmf(&["norm"], input.path());
    assert!(out.status.success());
    assert_eq!(stdout(&out), "0.0000,1.0000\n1.0000,0.0000\n");
}

#[test]
fn test_symnmf_prints_n_by_k() {
    let input = points_file("0,0\n0.2,0.1\n6,6\n6.1,5.9\n5.9,6.2\n");
    let out = symnmf(&["symnmf", "-k", "2"], input.path());
    assert!(out.status.success());
    let text = stdout(&out);
    let rows: Vec<&str> = text.lines().collect();
    assert_eq!(rows.len(), 5);
    for row in rows {
        let values: Vec<&str> = row.split(',').collect();
        assert_eq!(values.len(), 2);
        for v in values {
            let (_, decimals) = v.split_once('.').unwrap();
            assert_eq!(decimals.len(), 4, "{v}");
        }
    }
}

#[test]
fn test_symnmf_is_deterministic_for_a_seed() {
    let input = points_file("0,0\n0.2,0.1\n6,6\n6.1,5.9\n");
    let a = symnmf(&["symnmf", "-k", "2", "--seed", "7"], input.path());
    let b = symnmf(&["symnmf", "-k", "2", "--seed", "7"], input.path());
    assert!(a.status.success());
    assert_eq!(a.stdout, b.stdout);
}

// ─── failures ────────────────────────────────────────────────────────────────

#[test]
fn test_unknown_goal_is_fatal() {
    let input = points_file("0,0\n1,0\n");
    let out = symnmf(&["cluster"], input.path());
    assert!(!out.status.success());
    assert_eq!(stdout(&out), FATAL);
}

#[test]
fn test_missing_file_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let out = symnmf(&["sym"], &dir.path().join("nope.txt"));
    assert!(!out.status.success());
    assert_eq!(stdout(&out), FATAL);
}

#[test]
fn test_ragged_input_is_fatal() {
    let input = points_file("0,0\n1\n");
    let out = symnmf(&["sym"], input.path());
    assert!(!out.status.success());
    assert_eq!(stdout(&out), FATAL);
}

#[test]
fn test_symnmf_without_clusters_is_fatal() {
    let input = points_file("0,0\n1,0\n");
    let out = symnmf(&["symnmf"], input.path());
    assert!(!out.status.success());
    assert_eq!(stdout(&out), FATAL);
}

#[test]
fn test_memory_limit_is_fatal_and_prints_nothing_else() {
    let input = points_file("0,0\n1,0\n2,2\n");
    let out = symnmf(&["norm", "--memory-limit", "64"], input.path());
    assert!(!out.status.success());
    assert_eq!(stdout(&out), FATAL);
}

#[test]
fn test_missing_arguments_is_fatal() {
    let out = Command::new(env!("CARGO_BIN_EXE_symnmf"))
        .arg("sym")
        .output()
        .unwrap();
    assert!(!out.status.success());
    assert_eq!(stdout(&out), FATAL);
}

#[test]
fn test_help_describes_the_tool() {
    let out = Command::new(env!("CARGO_BIN_EXE_symnmf"))
        .arg("--help")
        .output()
        .unwrap();
    assert!(out.status.success());
    let help = stdout(&out);
    assert!(help.contains("Symmetric NMF clustering"), "{help}");
    assert!(help.contains("--clusters"), "{help}");
}
