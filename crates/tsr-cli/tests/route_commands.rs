use std::fs;
use std::path::PathBuf;

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../../docs/fixtures")
        .join(name)
        .canonicalize()
        .expect("fixture present")
}

fn cli() -> Command {
    let mut cmd = cargo_bin_cmd!("tsr-cli");
    cmd.env("RUST_LOG", "error");
    cmd
}

fn route_command(from: &str, to: &str) -> Command {
    let mut cmd = cli();
    cmd.arg("route")
        .arg("--mesh")
        .arg(fixture("ridge_mesh.json"))
        .arg("--from")
        .arg(from)
        .arg("--to")
        .arg(to);
    cmd
}

#[test]
fn plain_route_lists_steps_and_warnings() {
    route_command("0", "8")
        .assert()
        .success()
        .stdout(predicate::str::contains("Route: 0 -> 8 (3 hops"))
        .stdout(predicate::str::contains("  2: 5 (20.0, 10.0, 0.0) flat"))
        .stdout(predicate::str::contains("warning [30] face 2: rockfall"))
        .stdout(predicate::str::contains("loose gravel").not());
}

#[test]
fn json_format_serialises_the_summary() {
    let output = route_command("0", "8")
        .arg("--format")
        .arg("json")
        .output()
        .expect("run cli");
    assert!(output.status.success());

    let summary: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout is json");
    let vertices: Vec<u64> = summary["steps"]
        .as_array()
        .expect("steps array")
        .iter()
        .map(|step| step["vertex"].as_u64().expect("vertex id"))
        .collect();
    assert_eq!(vertices, vec![0, 1, 5, 8]);
    assert_eq!(summary["hops"], 3);
    assert_eq!(summary["warnings"][0]["message"], "rockfall");
    assert!(summary["estimated_seconds"].as_f64().expect("estimate") > 0.0);
}

#[test]
fn rich_format_uses_markdown() {
    route_command("0", "8")
        .arg("--format")
        .arg("rich")
        .assert()
        .success()
        .stdout(predicate::str::contains("**Route** _0 to 8_"))
        .stdout(predicate::str::contains("**Warnings**"));
}

#[test]
fn blocked_pass_reports_no_route() {
    route_command("0", "8")
        .arg("--features")
        .arg(fixture("hazard_features.json"))
        .assert()
        .code(2)
        .stdout(predicate::str::contains("No route: 0 -> 8"))
        .stdout(predicate::str::contains(
            "warning [30] face 2 at (15.0, 5.0, 0.0): rockfall",
        ))
        .stdout(predicate::str::contains("warning [5] face 6"))
        .stdout(predicate::str::contains("loose gravel"))
        .stderr(predicate::str::contains(
            "no route found between vertex 0 and vertex 8",
        ));
}

#[test]
fn blocked_pass_exports_every_warning_as_json() {
    let output = route_command("0", "8")
        .arg("--features")
        .arg(fixture("hazard_features.json"))
        .arg("--format")
        .arg("json")
        .output()
        .expect("run cli");
    assert_eq!(output.status.code(), Some(2));

    let report: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout is json");
    assert_eq!(report["goal"], 8);
    let warnings = report["warnings"].as_array().expect("warnings array");
    assert_eq!(warnings.len(), 2);
    assert_eq!(warnings[0]["message"], "rockfall");
    assert_eq!(warnings[0]["location"]["x"], 15.0);
    assert_eq!(warnings[1]["message"], "loose gravel");
    assert_eq!(warnings[1]["severity"], 5);
}

#[test]
fn blocked_pass_rich_report_lists_warnings() {
    route_command("0", "8")
        .arg("--features")
        .arg(fixture("hazard_features.json"))
        .arg("--format")
        .arg("rich")
        .assert()
        .code(2)
        .stdout(predicate::str::contains("**No route** _0 to 8_"))
        .stdout(predicate::str::contains("`5` loose gravel (face 6 at"));
}

#[test]
fn unknown_vertex_is_a_failure() {
    route_command("0", "42")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("unknown vertex: 42"));
}

#[test]
fn check_reports_the_default_graph() {
    cli()
        .arg("check")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Feature graph OK: 6 features, root cost (real)",
        ));
}

#[test]
fn check_rejects_a_broken_graph() {
    let dir = tempdir().expect("create temp dir");
    let path = dir.path().join("broken.json");
    fs::write(
        &path,
        r#"{ "root": "cost", "features": [
            { "id": "cost", "type": "reciprocal", "input": "missing" }
        ] }"#,
    )
    .expect("write features");

    cli()
        .arg("check")
        .arg("--features")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to build feature graph"))
        .stderr(predicate::str::contains("unknown feature: missing"));
}
