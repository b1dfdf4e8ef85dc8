//! Runs the `obs-bootstrap` binary end to end.

use std::process::{Command, Output};

use tempfile::TempDir;

fn run(args: &[&str], envs: &[(&str, String)], dir: &TempDir) -> Output {
    let bin_path = assert_cmd::cargo::cargo_bin!("obs-bootstrap");
    Command::new(bin_path)
        .args(args)
        .env_clear()
        .envs(envs.iter().map(|(k, v)| (*k, v.as_str())))
        .current_dir(dir.path())
        .output()
        .expect("spawn obs-bootstrap")
}

#[test]
fn no_action_prints_usage_and_succeeds() {
    let dir = TempDir::new().unwrap();
    let output = run(&[], &[], &dir);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Usage"), "stdout was: {stdout}");
    assert!(stdout.contains("--bootstrap-orgs"));
    assert!(stdout.contains("--import-dashboards"));
}

#[test]
fn unknown_argument_is_not_a_failure() {
    let dir = TempDir::new().unwrap();
    let output = run(&["--frobnicate"], &[], &dir);

    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("--frobnicate"), "stderr was: {stderr}");
}

#[test]
fn unreachable_grafana_exits_non_zero_without_results() {
    let dir = TempDir::new().unwrap();
    let port = portpicker::pick_unused_port().expect("free port");
    let envs = [
        ("OBS_GRAFANA_URL", format!("http://127.0.0.1:{port}")),
        ("OBS_ADMIN_PASSWORD", "admin".to_string()),
        ("OBS_LOG_LEVEL", "error".to_string()),
    ];

    let output = run(&["--bootstrap-orgs"], &envs, &dir);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Error:"), "stderr was: {stderr}");
    assert!(!dir.path().join("bootstrap-results.json").exists());
}

#[test]
fn invalid_configuration_fails_before_any_request() {
    let dir = TempDir::new().unwrap();
    let envs = [("OBS_TENANTS", "a:b:c:d".to_string())];

    let output = run(&["--bootstrap-orgs"], &envs, &dir);

    assert!(!output.status.success());
    assert!(!dir.path().join("bootstrap-results.json").exists());
}
