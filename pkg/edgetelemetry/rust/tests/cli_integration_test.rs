// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]
#![allow(clippy::indexing_slicing)]

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};

use dd_edge_telemetry::Snapshot;
use tempfile::{NamedTempFile, TempDir};

const EDGE_SNAPSHOT_BIN: &str = env!("CARGO_BIN_EXE_edge-snapshot");
const EDGE_AGENT_BIN: &str = env!("CARGO_BIN_EXE_edge-agent");

const ENV_OVERRIDES: [&str; 9] = [
    "DD_EDGE_TELEMETRY_AGENT_ID",
    "DD_EDGE_TELEMETRY_MAX_PARAMETERS",
    "DD_EDGE_TELEMETRY_MAX_DIMENSION_COMBOS",
    "DD_EDGE_TELEMETRY_MAX_SAMPLE_VALUES",
    "DD_EDGE_TELEMETRY_MAX_WALK_DEPTH",
    "DD_EDGE_TELEMETRY_FLUSH_INTERVAL_SECONDS",
    "DD_EDGE_TELEMETRY_SAMPLING_RATE",
    "DD_LOG_LEVEL",
    "LOG_LEVEL",
];

fn testdata(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("testdata")
        .join(name)
}

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn command(bin: &str) -> Command {
    let mut cmd = Command::new(bin);
    for key in ENV_OVERRIDES {
        cmd.env_remove(key);
    }
    cmd
}

/// Every stdout line must be a snapshot; logs belong on stderr.
fn parse_snapshot_lines(output: &Output) -> Vec<Snapshot> {
    let stdout = String::from_utf8(output.stdout.clone()).unwrap();
    stdout
        .lines()
        .map(|line| {
            serde_json::from_str(line)
                .unwrap_or_else(|e| panic!("stdout line is not a snapshot ({e}): {line}"))
        })
        .collect()
}

fn parse_snapshot(output: &Output) -> Snapshot {
    let stdout = String::from_utf8(output.stdout.clone()).unwrap();
    serde_json::from_str(&stdout)
        .unwrap_or_else(|e| panic!("stdout is not a snapshot ({e}): {stdout}"))
}

#[test]
fn test_edge_snapshot_over_ndjson() {
    let config = write_config("agent_id: cli-test\nmax_sample_values: 2\n");
    let output = command(EDGE_SNAPSHOT_BIN)
        .arg("--config")
        .arg(config.path())
        .arg(testdata("openrtb.ndjson"))
        .output()
        .expect("Failed to execute edge-snapshot");
    assert!(output.status.success(), "{output:?}");

    let snapshot = parse_snapshot(&output);
    assert_eq!(snapshot.agent_id, "cli-test");
    assert_eq!(snapshot.total_documents, 6);
    assert_eq!(snapshot.processed_documents, 6);
    let id = snapshot.parameter("id").unwrap();
    assert_eq!(id.presence_count, 6);
    assert_eq!(id.sample_values.len(), 2);
    assert_eq!(snapshot.metadata.config.max_sample_values, 2);
}

#[test]
fn test_edge_snapshot_reports_rejected_lines() {
    let dir = TempDir::new().unwrap();
    let output = command(EDGE_SNAPSHOT_BIN)
        .arg("--config")
        .arg(dir.path().join("absent.yaml"))
        .arg(testdata("mixed.ndjson"))
        .output()
        .expect("Failed to execute edge-snapshot");
    assert!(output.status.success(), "{output:?}");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("2 documents could not be parsed"), "{stderr}");

    let snapshot = parse_snapshot(&output);
    assert_eq!(snapshot.total_documents, 4);
    assert_eq!(snapshot.processed_documents, 2);
    assert_eq!(snapshot.parameter("id").unwrap().presence_count, 2);
}

#[test]
fn test_edge_snapshot_whole_file_document() {
    let dir = TempDir::new().unwrap();
    let output = command(EDGE_SNAPSHOT_BIN)
        .arg("--config")
        .arg(dir.path().join("absent.yaml"))
        .arg("--whole-file")
        .arg(testdata("roku_ctv.json"))
        .output()
        .expect("Failed to execute edge-snapshot");
    assert!(output.status.success(), "{output:?}");

    let snapshot = parse_snapshot(&output);
    assert_eq!(snapshot.processed_documents, 1);
    let ifa = snapshot.parameter("device.ifa").unwrap();
    assert!(ifa.dimension("device_type:3").is_some());
    assert!(ifa.dimension("device_type:3|device_make:roku|has_ifa:true").is_some());
}

#[test]
fn test_edge_snapshot_env_override() {
    let dir = TempDir::new().unwrap();
    let output = command(EDGE_SNAPSHOT_BIN)
        .arg("--config")
        .arg(dir.path().join("absent.yaml"))
        .arg(testdata("openrtb.ndjson"))
        .env("DD_EDGE_TELEMETRY_MAX_PARAMETERS", "10")
        .output()
        .expect("Failed to execute edge-snapshot");
    assert!(output.status.success(), "{output:?}");
    assert_eq!(parse_snapshot(&output).parameters.len(), 10);
}

#[test]
fn test_edge_snapshot_fails_on_missing_input() {
    let dir = TempDir::new().unwrap();
    let output = command(EDGE_SNAPSHOT_BIN)
        .arg("--config")
        .arg(dir.path().join("absent.yaml"))
        .arg(dir.path().join("absent.ndjson"))
        .output()
        .expect("Failed to execute edge-snapshot");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("absent.ndjson"));
}

#[test]
fn test_edge_snapshot_rejects_invalid_config() {
    let config = write_config("primary_dimensions: [device_type, browser]\n");
    let output = command(EDGE_SNAPSHOT_BIN)
        .arg("--config")
        .arg(config.path())
        .arg(testdata("openrtb.ndjson"))
        .output()
        .expect("Failed to execute edge-snapshot");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("browser"));
}

#[test]
fn test_edge_agent_flushes_at_end_of_input() {
    let dir = TempDir::new().unwrap();
    let output = command(EDGE_AGENT_BIN)
        .arg("--config")
        .arg(dir.path().join("absent.yaml"))
        .arg("--output")
        .arg("json")
        .arg("--input")
        .arg(testdata("openrtb.ndjson"))
        .stdin(Stdio::null())
        .output()
        .expect("Failed to execute edge-agent");
    assert!(output.status.success(), "{output:?}");

    let snapshots = parse_snapshot_lines(&output);
    assert_eq!(snapshots.len(), 1, "{output:?}");
    assert_eq!(snapshots[0].processed_documents, 6);
    assert!(snapshots[0].agent_id.starts_with("agent-"));

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Input exhausted: 6 documents read"), "{stderr}");
}

#[test]
fn test_edge_agent_logs_unparsable_env_override() {
    let dir = TempDir::new().unwrap();
    let output = command(EDGE_AGENT_BIN)
        .arg("--config")
        .arg(dir.path().join("absent.yaml"))
        .arg("--output=json")
        .arg("--input")
        .arg(testdata("openrtb.ndjson"))
        .env("DD_EDGE_TELEMETRY_MAX_PARAMETERS", "lots")
        .stdin(Stdio::null())
        .output()
        .expect("Failed to execute edge-agent");
    assert!(output.status.success(), "{output:?}");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("Ignoring DD_EDGE_TELEMETRY_MAX_PARAMETERS"),
        "{stderr}"
    );
    assert!(stderr.contains("Config file not found"), "{stderr}");
    let snapshots = parse_snapshot_lines(&output);
    assert_eq!(snapshots[0].metadata.config.max_parameters, 1000);
}

#[test]
fn test_edge_agent_reads_stdin() {
    let dir = TempDir::new().unwrap();
    let mut child = command(EDGE_AGENT_BIN)
        .arg("--config")
        .arg(dir.path().join("absent.yaml"))
        .arg("--output=json")
        .env("DD_EDGE_TELEMETRY_SAMPLING_RATE", "0.5")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to spawn edge-agent");

    let input = std::fs::read(testdata("openrtb.ndjson")).unwrap();
    child.stdin.take().unwrap().write_all(&input).unwrap();
    let output = child.wait_with_output().unwrap();
    assert!(output.status.success(), "{output:?}");

    let snapshots = parse_snapshot_lines(&output);
    assert_eq!(snapshots.len(), 1, "{output:?}");
    assert_eq!(snapshots[0].total_documents, 3);
    assert_eq!(snapshots[0].metadata.config.sampling_rate, 0.5);
}
