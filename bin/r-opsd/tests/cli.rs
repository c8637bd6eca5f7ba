//! ---
//! ops_section: "04-runtime"
//! ops_subsection: "integration-tests"
//! ops_type: "source"
//! ops_scope: "code"
//! ops_description: "Command-line behaviour of the failover daemon in simulation mode."
//! ops_version: "v0.0.0-prealpha"
//! ops_owner: "tbd"
//! ---
use std::fs;
use std::path::Path;

use assert_cmd::Command;
use serde_json::Value;
use tempfile::tempdir;

fn write_config(dir: &Path, simulation: &str) -> std::path::PathBuf {
    let path = dir.join("drill.toml");
    let contents = format!(
        r#"
mode = "simulation"

[failover]
environment = "drill"
primary_database = "orders-primary"
standby_database = "orders-standby"
standby_compute = "orders-api-standby"

[failover.dns]
zone_id = "Z0DRILL"

[logging]
directory = "{}"

[simulation]
{}
"#,
        dir.join("logs").display(),
        simulation
    );
    fs::write(&path, contents).unwrap();
    path
}

fn envelope(output: &[u8]) -> Value {
    serde_json::from_slice(output).expect("stdout carries the envelope JSON")
}

#[test]
fn invoke_reports_successful_failover() {
    let dir = tempdir().unwrap();
    let config = write_config(dir.path(), "");

    let assert = Command::cargo_bin("r-opsd")
        .unwrap()
        .env_remove("R_OPS_CONFIG")
        .args(["--config", config.to_str().unwrap(), "invoke", "--event", "-"])
        .write_stdin(r#"{"action": "initiate_failover", "source": "alarm"}"#)
        .assert()
        .success();

    let body = envelope(&assert.get_output().stdout);
    assert_eq!(body["statusCode"], 200);
    assert_eq!(body["environment"], "drill");
    assert_eq!(body["new_active_region"], "us-west-2");
    assert_eq!(
        body["failover_results"]["steps"]["dns_update"]["action"],
        "dns_updated"
    );
}

#[test]
fn invoke_exits_non_zero_when_standby_not_ready() {
    let dir = tempdir().unwrap();
    let config = write_config(dir.path(), r#"standby_database_state = "creating""#);
    let event = dir.path().join("event.json");
    fs::write(&event, "{}").unwrap();

    let assert = Command::cargo_bin("r-opsd")
        .unwrap()
        .env_remove("R_OPS_CONFIG")
        .args([
            "--config",
            config.to_str().unwrap(),
            "invoke",
            "--event",
            event.to_str().unwrap(),
        ])
        .assert()
        .code(1);

    let body = envelope(&assert.get_output().stdout);
    assert_eq!(body["statusCode"], 500);
    assert_eq!(body["standby_readiness"]["issues"][0], "RDS status: creating");
}

#[test]
fn invoke_aborts_when_primary_is_healthy() {
    let dir = tempdir().unwrap();
    let config = write_config(dir.path(), r#"primary_database_state = "available""#);

    let assert = Command::cargo_bin("r-opsd")
        .unwrap()
        .env_remove("R_OPS_CONFIG")
        .args(["--config", config.to_str().unwrap(), "invoke"])
        .write_stdin("")
        .assert()
        .success();

    let body = envelope(&assert.get_output().stdout);
    assert_eq!(body["message"], "Primary region healthy, no failover needed");
    assert!(body.get("failover_results").is_none());
}

#[test]
fn environment_overrides_apply_to_invocations() {
    let dir = tempdir().unwrap();
    let config = write_config(dir.path(), "");

    let assert = Command::cargo_bin("r-opsd")
        .unwrap()
        .env("R_OPS_CONFIG", &config)
        .env("R_OPS_ENVIRONMENT", "prod-drill")
        .env("R_OPS_DNS_ZONE_ID", "")
        .args(["invoke"])
        .write_stdin("{}")
        .assert()
        .success();

    let body = envelope(&assert.get_output().stdout);
    assert_eq!(body["environment"], "prod-drill");
    assert!(body["failover_results"]["steps"].get("dns_update").is_none());
}

#[test]
fn assess_prints_both_regions() {
    let dir = tempdir().unwrap();
    let config = write_config(dir.path(), r#"standby_compute_state = "Pending""#);

    let assert = Command::cargo_bin("r-opsd")
        .unwrap()
        .env_remove("R_OPS_CONFIG")
        .args(["--config", config.to_str().unwrap(), "assess"])
        .assert()
        .code(1);

    let body = envelope(&assert.get_output().stdout);
    assert_eq!(body["primary"]["healthy"], false);
    assert_eq!(body["standby"]["ready"], false);
    assert_eq!(body["standby"]["issues"][0], "Lambda not active: Pending");
}

#[test]
fn malformed_event_is_rejected() {
    let dir = tempdir().unwrap();
    let config = write_config(dir.path(), "");

    Command::cargo_bin("r-opsd")
        .unwrap()
        .env_remove("R_OPS_CONFIG")
        .args(["--config", config.to_str().unwrap(), "invoke"])
        .write_stdin("{ not json")
        .assert()
        .failure();
}
