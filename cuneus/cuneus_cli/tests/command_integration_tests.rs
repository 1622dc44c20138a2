use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn cuneus() -> Command {
    let mut cmd = Command::cargo_bin("cuneus").unwrap();
    cmd.env("CUNEUS_LOG_LEVEL", "error");
    cmd
}

fn settings_file(content: &str) -> (TempDir, String) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cuneus.toml");
    fs::write(&path, content).unwrap();
    let path = path.to_string_lossy().to_string();
    (dir, path)
}

#[test]
fn test_without_command_prints_help() {
    cuneus()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_unknown_argument_is_a_usage_error() {
    cuneus()
        .args(["routes", "--bogus"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("unexpected argument '--bogus'"))
        .stderr(predicate::str::contains("Error:").not());
}

#[test]
fn test_help_lists_builtin_commands() {
    cuneus()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("routes"))
        .stdout(predicate::str::contains("--config"));
}

#[test]
fn test_version_flag() {
    cuneus()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("cuneus"));
}

#[test]
fn test_settings_command_reads_config_file() {
    let (_dir, path) = settings_file("app_name = \"inventory\"\nversion = \"3.1.0\"\n");

    cuneus()
        .args(["--config", &path, "settings"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"app_name\": \"inventory\""))
        .stdout(predicate::str::contains("\"version\": \"3.1.0\""));
}

#[test]
fn test_settings_from_tool_table() {
    let (_dir, path) = settings_file("[project]\nname = \"shop\"\n\n[tool.cuneus]\napp_name = \"shop-api\"\n");

    cuneus()
        .args(["settings", "--config", &path])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"app_name\": \"shop-api\""));
}

#[test]
fn test_invalid_settings_fail_before_anything_starts() {
    let (_dir, path) = settings_file("log_level = \"LOUD\"\n");

    cuneus()
        .env_remove("CUNEUS_LOG_LEVEL")
        .args(["--config", &path, "check"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown log level 'LOUD'"));
}

#[test]
fn test_check_starts_and_stops_default_extensions() {
    cuneus()
        .arg("check")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Started 3 extension(s): LoggingExtension, HealthExtension, ExceptionExtension",
        ))
        .stdout(predicate::str::contains("Stopped 3 extension(s)"));
}

#[test]
fn test_routes_lists_health_routes() {
    cuneus()
        .arg("routes")
        .assert()
        .success()
        .stdout(predicate::str::contains("GET /healthz\n"))
        .stdout(predicate::str::contains("GET /healthz/live"))
        .stdout(predicate::str::contains("GET /healthz/ready"));
}

#[test]
fn test_routes_follow_configured_prefix() {
    let (_dir, path) = settings_file("health_prefix = \"/status\"\n");

    cuneus()
        .args(["--config", &path, "routes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("GET /status/live"))
        .stdout(predicate::str::contains("/healthz").not());
}

#[test]
fn test_call_health_echoes_request_id() {
    cuneus()
        .args(["call", "/healthz", "-H", "X-Request-ID=abc123"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("200\n"))
        .stdout(predicate::str::contains("x-request-id: abc123"))
        .stdout(predicate::str::contains("\"status\": \"healthy\""));
}

#[test]
fn test_call_unknown_route() {
    cuneus()
        .args(["call", "/nowhere"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("404\n"))
        .stdout(predicate::str::contains("\"not_found\""));
}

#[test]
fn test_call_rejects_malformed_header() {
    cuneus()
        .args(["call", "/healthz", "-H", "broken"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("is not NAME=VALUE"));
}
