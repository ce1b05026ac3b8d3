//! CLI tests for the `tq` binary

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// `tq` pointed at an isolated config file
fn tq(config: &str) -> (Command, TempDir) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("config.yml");
    std::fs::write(&path, config).expect("Failed to write config");

    let mut cmd = Command::cargo_bin("tq").expect("tq binary");
    cmd.arg("--config").arg(path).env("NO_COLOR", "1");
    (cmd, dir)
}

#[test]
fn test_run_settles_every_task() {
    let (mut cmd, _dir) = tq("scheduler:\n  max_concurrency: 2\n");
    cmd.args(["run", "--tasks", "3", "--delay-ms", "10", "--step-ms", "5"])
        .assert()
        .success()
        .stdout(predicate::str::contains("done: [task_1, task_2, task_3]"))
        .stdout(predicate::str::contains("3 done, 0 failed"))
        .stdout(predicate::str::contains("peak concurrent: 2"));
}

#[test]
fn test_run_reports_failures() {
    let (mut cmd, _dir) = tq("log_level: warn\n");
    cmd.args(["run", "-t", "3", "-d", "10", "-s", "0", "--fail", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("simulated failure in task_2"))
        .stdout(predicate::str::contains("2 done, 1 failed"))
        .stdout(predicate::str::contains("error: [task_2]"));
}

#[test]
fn test_run_prints_events() {
    let (mut cmd, _dir) = tq("log_level: warn\n");
    cmd.args(["run", "-t", "2", "-d", "10", "--events"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"type\":\"TaskQueued\""));
}

#[test]
fn test_zero_concurrency_is_rejected() {
    let (mut cmd, _dir) = tq("log_level: warn\n");
    cmd.args(["run", "-m", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("max_concurrency must be a positive number"));
}

#[test]
fn test_invalid_config_file_is_rejected() {
    let (mut cmd, _dir) = tq("scheduler:\n  max_concurrency: 0\n");
    cmd.arg("config")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load configuration"));
}

#[test]
fn test_config_prints_effective_settings() {
    let (mut cmd, _dir) = tq("log_level: warn\nscheduler:\n  max_concurrency: 4\n");
    cmd.arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("max_concurrency: 4"))
        .stdout(predicate::str::contains("event_capacity: 1024"));
}
