use std::fs;
use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/input")
        .join(name)
}

#[test]
fn generates_svg_from_schema_file() -> Result<(), Box<dyn std::error::Error>> {
    let fixture = fixture("person.json");
    assert!(fixture.exists(), "fixture schema should exist");

    let tmp = tempdir()?;
    let output_path = tmp.path().join("diagram.svg");

    let mut cmd = Command::cargo_bin("schemaflow")?;
    cmd.arg("--input")
        .arg(&fixture)
        .arg("--output")
        .arg(&output_path)
        .arg("--output-format")
        .arg("svg");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("diagram"));

    let svg_contents = fs::read_to_string(&output_path)?;
    assert!(
        svg_contents.contains("<svg"),
        "output should contain an <svg> element"
    );
    assert!(svg_contents.contains("Root Object"));

    Ok(())
}

#[test]
fn writes_node_document_to_stdout() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("schemaflow")?;
    cmd.args(["-o", "-", "-e", "json", "--direction", "LR", "-i"])
        .arg(fixture("person.json"));

    let output = cmd.assert().success().get_output().stdout.clone();
    let document: serde_json::Value = serde_json::from_slice(&output)?;

    assert_eq!(document["nodes"].as_array().map(Vec::len), Some(4));
    assert_eq!(document["edges"].as_array().map(Vec::len), Some(3));
    assert_eq!(document["nodes"][0]["sourcePosition"], "right");
    assert_eq!(document["nodes"][1]["targetPosition"], "left");

    Ok(())
}

#[test]
fn reads_schema_from_stdin() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("schemaflow")?;
    cmd.args(["render", "-i", "-", "-o", "-"])
        .write_stdin(r#"{"properties":{"flag":{"type":"boolean"}}}"#);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("flag (boolean)"));

    Ok(())
}

#[test]
fn malformed_schema_fails() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = tempdir()?;
    let output_path = tmp.path().join("broken.svg");

    let mut cmd = Command::cargo_bin("schemaflow")?;
    cmd.arg("-i")
        .arg(fixture("malformed.json"))
        .arg("-o")
        .arg(&output_path);

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("failed to parse schema"));
    assert!(!output_path.exists());

    Ok(())
}

#[test]
fn rejects_unknown_direction() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("schemaflow")?;
    cmd.args(["-o", "-", "--direction", "diagonal", "-i"])
        .arg(fixture("person.json"));

    cmd.assert().failure();

    Ok(())
}
