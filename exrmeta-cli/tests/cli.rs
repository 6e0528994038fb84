use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;

use exrmeta::types::Rational;
use exrmeta::{Attribute, Header, OpaqueAttribute, EXR_MAGIC, MULTI_PART_FLAG};

fn exrmeta() -> Command {
    let mut cmd = Command::cargo_bin("exrmeta").unwrap();
    cmd.arg("--quiet");
    cmd
}

fn path(p: &Path) -> &str {
    p.to_str().unwrap()
}

fn sample_header() -> Header {
    let mut header = Header::new();
    header.insert("captureRate", Rational::new(24, 1)).unwrap();
    header.insert("owner", "alice".to_string()).unwrap();
    header
        .insert_attribute(
            "vendor:blob",
            Box::new(OpaqueAttribute::new("futureType99", vec![1, 2, 3, 4])),
        )
        .unwrap();
    header
}

fn inspect_json(file: &Path) -> serde_json::Value {
    let output = exrmeta()
        .args(["inspect", path(file), "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    serde_json::from_slice(&output.stdout).unwrap()
}

#[test]
fn test_build_then_inspect() {
    let temp_dir = tempfile::tempdir().unwrap();
    let spec = temp_dir.path().join("header.json");
    let blob = temp_dir.path().join("header.bin");
    fs::write(
        &spec,
        r#"{ "attributes": [
            { "name": "captureRate", "type": "rational", "value": { "numerator": 24, "denominator": 1 } },
            { "name": "owner", "type": "string", "value": "alice" }
        ] }"#,
    )
    .unwrap();

    exrmeta()
        .args(["build", path(&spec), "-o", path(&blob)])
        .assert()
        .success();

    let report = inspect_json(&blob);
    let attributes = &report["parts"][0]["attributes"];
    assert_eq!(attributes[0]["name"], "captureRate");
    assert_eq!(attributes[0]["value"]["numerator"], 24);
    assert_eq!(attributes[1]["name"], "owner");
    assert_eq!(attributes[1]["value"], "alice");
}

#[test]
fn test_build_from_yaml() {
    let temp_dir = tempfile::tempdir().unwrap();
    let spec = temp_dir.path().join("header.yaml");
    let blob = temp_dir.path().join("header.bin");
    fs::write(
        &spec,
        "attributes:\n  - name: xDensity\n    type: float\n    value: 72.0\n",
    )
    .unwrap();

    exrmeta()
        .args(["build", path(&spec), "-o", path(&blob)])
        .assert()
        .success();
    assert_eq!(inspect_json(&blob)["parts"][0]["attributes"][0]["value"], 72.0);
}

#[test]
fn test_inspect_reports_opaque_checksum() {
    let temp_dir = tempfile::tempdir().unwrap();
    let blob = temp_dir.path().join("header.bin");
    fs::write(&blob, sample_header().to_bytes().unwrap()).unwrap();

    let report = inspect_json(&blob);
    let opaque = &report["parts"][0]["attributes"][2];
    assert_eq!(opaque["type"], "futureType99");
    assert!(opaque.get("value").is_none());
    assert_eq!(opaque["opaque"]["size"], 4);
    let checksum = OpaqueAttribute::new("futureType99", vec![1, 2, 3, 4]).checksum();
    assert_eq!(opaque["opaque"]["crc32"], format!("{:08x}", checksum));

    exrmeta()
        .args(["inspect", path(&blob), "--format", "yaml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("captureRate"));
}

#[test]
fn test_rewrite_preserves_bytes() {
    let temp_dir = tempfile::tempdir().unwrap();
    let input = temp_dir.path().join("in.bin");
    let output = temp_dir.path().join("out.bin");
    let original = sample_header().to_bytes().unwrap();
    fs::write(&input, &original).unwrap();

    exrmeta()
        .args(["rewrite", path(&input), "-o", path(&output)])
        .assert()
        .success();
    assert_eq!(fs::read(&output).unwrap(), original);
}

#[test]
fn test_validate_exit_codes() {
    let temp_dir = tempfile::tempdir().unwrap();
    let good = temp_dir.path().join("good.bin");
    let bad = temp_dir.path().join("bad.bin");
    fs::write(&good, sample_header().to_bytes().unwrap()).unwrap();

    let mut header = sample_header();
    header.insert("captureRate", Rational::new(24, 0)).unwrap();
    fs::write(&bad, header.to_bytes().unwrap()).unwrap();

    exrmeta()
        .args(["validate", path(&good), "--strict"])
        .assert()
        .success();

    // Advisories alone pass unless strict
    exrmeta()
        .args(["validate", path(&bad)])
        .assert()
        .success()
        .stdout(predicate::str::contains("captureRate"));
    exrmeta()
        .args(["validate", path(&bad), "--strict"])
        .assert()
        .failure()
        .code(3);

    let mut header = Header::new();
    header
        .insert_attribute("owner", Box::new(OpaqueAttribute::new("rational", vec![0; 3])))
        .unwrap();
    fs::write(&bad, header.to_bytes().unwrap()).unwrap();
    exrmeta()
        .args(["validate", path(&bad)])
        .assert()
        .failure()
        .code(3)
        .stdout(predicate::str::contains("error").and(predicate::str::contains("rational")));
}

#[test]
fn test_extract_part_from_exr() {
    let temp_dir = tempfile::tempdir().unwrap();
    let exr = temp_dir.path().join("image.exr");
    let blob = temp_dir.path().join("part1.bin");

    let mut left = Header::new();
    left.insert("name", "left".to_string()).unwrap();
    let mut right = Header::new();
    right.insert("name", "right".to_string()).unwrap();

    let mut bytes = EXR_MAGIC.to_vec();
    bytes.extend_from_slice(&(2 | MULTI_PART_FLAG).to_le_bytes());
    left.write_to(&mut bytes).unwrap();
    right.write_to(&mut bytes).unwrap();
    bytes.push(0);
    fs::write(&exr, &bytes).unwrap();

    exrmeta()
        .args(["extract", path(&exr), "-o", path(&blob), "--part", "1"])
        .assert()
        .success();
    assert_eq!(fs::read(&blob).unwrap(), right.to_bytes().unwrap());

    let report = inspect_json(&exr);
    assert_eq!(report["version"], "2, multi-part");
    assert_eq!(report["parts"].as_array().unwrap().len(), 2);

    exrmeta()
        .args(["extract", path(&exr), "-o", path(&blob), "--part", "5"])
        .assert()
        .failure()
        .code(2);
    exrmeta()
        .args(["rewrite", path(&exr), "-o", path(&blob)])
        .assert()
        .failure();
}

#[test]
fn test_types_lists_catalogue() {
    exrmeta()
        .arg("types")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("  rational")
                .and(predicate::str::contains("captureRate (rational)"))
                .and(predicate::str::contains("dwaCompressionLevel (float, deprecated")),
        );
}

#[test]
fn test_malformed_blob_exit_code() {
    let temp_dir = tempfile::tempdir().unwrap();
    let junk = temp_dir.path().join("junk.bin");
    fs::write(&junk, b"owner\0string\0\xff\xff\xff\xff").unwrap();

    exrmeta()
        .args(["inspect", path(&junk)])
        .assert()
        .failure()
        .code(1);
}

#[test]
fn test_missing_file_exit_code() {
    let temp_dir = tempfile::tempdir().unwrap();
    let missing = temp_dir.path().join("missing.bin");

    exrmeta()
        .args(["inspect", path(&missing)])
        .assert()
        .failure()
        .code(1);
    exrmeta()
        .args(["rewrite", path(&missing), "-o", path(&temp_dir.path().join("out.bin"))])
        .assert()
        .failure()
        .code(1);
}

#[test]
fn test_pedantic_decode_failure_exit_code() {
    let temp_dir = tempfile::tempdir().unwrap();
    let bad = temp_dir.path().join("bad.bin");
    let mut header = Header::new();
    header
        .insert_attribute("captureRate", Box::new(OpaqueAttribute::new("rational", vec![0; 3])))
        .unwrap();
    fs::write(&bad, header.to_bytes().unwrap()).unwrap();

    exrmeta()
        .args(["validate", path(&bad), "--pedantic"])
        .assert()
        .failure()
        .code(3);
}

#[test]
fn test_inspect_non_finite_float() {
    let temp_dir = tempfile::tempdir().unwrap();
    let blob = temp_dir.path().join("header.bin");
    let mut header = Header::new();
    header.insert("xDensity", f32::NAN).unwrap();
    header.insert("owner", "alice".to_string()).unwrap();
    fs::write(&blob, header.to_bytes().unwrap()).unwrap();

    let report = inspect_json(&blob);
    let attributes = &report["parts"][0]["attributes"];
    assert!(attributes[0].get("value").is_none());
    assert!(attributes[0]["error"].as_str().unwrap().contains("non-finite"));
    assert_eq!(attributes[1]["value"], "alice");

    exrmeta()
        .args(["inspect", path(&blob), "--format", "toml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("non-finite").and(predicate::str::contains("alice")));
}
