use assert_cmd::Command;
use predicates::str::contains;
use std::fs;
use tempfile::TempDir;

fn tally(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("tally").unwrap();
    cmd.current_dir(dir.path())
        .env_remove("TALLY_CREDENTIALS")
        .env("HOME", dir.path())
        .arg("--log-file")
        .arg(dir.path().join("tally.log"));
    cmd
}

#[test]
fn test_help_lists_subcommands() {
    let dir = TempDir::new().unwrap();
    tally(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("sync-cases"))
        .stdout(contains("reconcile"));
}

#[test]
fn test_reconcile_help_lists_flags() {
    let dir = TempDir::new().unwrap();
    tally(&dir)
        .args(["reconcile", "--help"])
        .assert()
        .success()
        .stdout(contains("--nbuild"))
        .stdout(contains("--backlog"));
}

#[test]
fn test_missing_credentials_is_config_error() {
    let dir = TempDir::new().unwrap();
    tally(&dir)
        .arg("--credentials")
        .arg(dir.path().join("nope.yaml"))
        .arg("reconcile")
        .assert()
        .code(2)
        .stderr(contains("credential file not found"));
}

#[test]
fn test_default_credentials_under_home() {
    let dir = TempDir::new().unwrap();
    tally(&dir)
        .args(["sync-cases", "--date", "2024-05-20"])
        .assert()
        .code(2)
        .stderr(contains(".tally"));
}

#[test]
fn test_invalid_date_rejected() {
    let dir = TempDir::new().unwrap();
    tally(&dir)
        .args(["sync-cases", "--date", "20/05/2024"])
        .assert()
        .failure()
        .stderr(contains("YYYY-MM-DD"));
}

#[test]
fn test_unknown_job_is_config_error() {
    let dir = TempDir::new().unwrap();
    tally(&dir)
        .args(["reconcile", "--job", "Nightly_Nope"])
        .assert()
        .code(2)
        .stderr(contains("unknown job"));
}

#[test]
fn test_bad_config_version_is_config_error() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("tally.yaml"), "configVersion: 7\n").unwrap();
    tally(&dir)
        .arg("reconcile")
        .assert()
        .code(2)
        .stderr(contains("unsupported config version"));
}

#[test]
fn test_logs_are_appended_as_json() {
    let dir = TempDir::new().unwrap();
    tally(&dir).arg("reconcile").assert().code(2);
    tally(&dir).arg("reconcile").assert().code(2);
    let log = fs::read_to_string(dir.path().join("tally.log")).unwrap();
    let lines: Vec<_> = log.lines().filter(|l| l.contains("config_error")).collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with('{'));
}
