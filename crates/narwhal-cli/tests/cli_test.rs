use assert_cmd::prelude::*;
use serde_json::Value;
use std::fs;
use std::process::Command;

const PATH_GRAPH: &str = r#"{
  "nodes": [{"width": 10, "height": 10}, {"width": 10, "height": 10}, {"width": 10, "height": 10}],
  "links": [{"source": 0, "target": 1}, {"source": 1, "target": 2}],
  "constraints": [{"axis": "x", "left": 0, "right": 2, "gap": 40}],
  "options": {"canvasSize": [300, 300], "linkDistance": 30},
  "start": {"unconstrainedIterations": 10, "userConstraintIterations": 10, "allConstraintsIterations": 10}
}"#;

fn run_ok(args: &[&str], stdin: Option<&str>) -> Value {
    let exe = assert_cmd::cargo_bin!("narwhal-cli");
    let mut cmd = assert_cmd::Command::new(exe);
    cmd.args(args);
    if let Some(input) = stdin {
        cmd.write_stdin(input);
    }
    let out = cmd.assert().success().get_output().stdout.clone();
    serde_json::from_slice(&out).expect("stdout is JSON")
}

#[test]
fn cli_lays_out_a_graph_file() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let input = tmp.path().join("graph.json");
    fs::write(&input, PATH_GRAPH).expect("write input");

    let v = run_ok(&["layout", input.to_string_lossy().as_ref()], None);
    let nodes = v["nodes"].as_array().expect("nodes");
    assert_eq!(nodes.len(), 3);
    let x0 = nodes[0]["x"].as_f64().expect("x0");
    let x2 = nodes[2]["x"].as_f64().expect("x2");
    assert!(x2 - x0 >= 39.0, "x0={x0} x2={x2}");
    assert!(v["stress"].is_number());
}

#[test]
fn cli_writes_to_out_path() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let input = tmp.path().join("graph.json");
    let out = tmp.path().join("positions.json");
    fs::write(&input, PATH_GRAPH).expect("write input");

    let exe = assert_cmd::cargo_bin!("narwhal-cli");
    Command::new(exe)
        .args([
            "layout",
            "--pretty",
            "--avoid-overlaps",
            "--iterations",
            "5,5,5",
            "--out",
            out.to_string_lossy().as_ref(),
            input.to_string_lossy().as_ref(),
        ])
        .assert()
        .success();

    let text = fs::read_to_string(&out).expect("read output");
    let v: Value = serde_json::from_str(&text).expect("output is JSON");
    assert_eq!(v["nodes"].as_array().map(Vec::len), Some(3));
}

#[test]
fn cli_removes_overlaps_from_stdin() {
    let v = run_ok(
        &["overlaps"],
        Some(r#"[{"minX":0,"maxX":10,"minY":0,"maxY":10},{"minX":0,"maxX":10,"minY":0,"maxY":10}]"#),
    );
    let rs = v["rectangles"].as_array().expect("rectangles");
    assert_eq!(rs.len(), 2);
    let a = rs[0]["minX"].as_f64().expect("a");
    let b = rs[1]["minX"].as_f64().expect("b");
    assert!((a - b).abs() >= 10.0 - 1e-6);
}

#[test]
fn cli_prints_power_graph_groups() {
    let v = run_ok(
        &["power-graph", "-"],
        Some(
            r#"{"links":[{"source":0,"target":2},{"source":0,"target":3},{"source":1,"target":2},{"source":1,"target":3}]}"#,
        ),
    );
    assert_eq!(v["groups"].as_array().map(Vec::len), Some(2));
    assert_eq!(v["powerEdges"].as_array().map(Vec::len), Some(1));
}

#[test]
fn cli_rejects_unknown_flags_with_usage() {
    let exe = assert_cmd::cargo_bin!("narwhal-cli");
    Command::new(exe)
        .arg("--no-such-flag")
        .assert()
        .code(2);
}

#[test]
fn cli_reports_layout_errors() {
    let exe = assert_cmd::cargo_bin!("narwhal-cli");
    let mut cmd = assert_cmd::Command::new(exe);
    cmd.arg("layout")
        .write_stdin(r#"{"nodes":[{}],"links":[{"source":0,"target":4}]}"#)
        .assert()
        .code(1);
}
