//! End-to-end tests for the mrkit binary

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn mrkit(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("mrkit").unwrap();
    cmd.current_dir(dir)
        .env_remove("MRKIT_CONFIG")
        .env_remove("MRKIT_INVOCATION")
        .env_remove("MRKIT_TIMEOUT")
        .env_remove("MRKIT_MAX_OUTPUT")
        .env_remove("MRKIT_AUDIT_LOG")
        .env_remove("RUST_LOG");
    cmd
}

#[cfg(unix)]
fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Config pointing each named tool at a script in `dir`
fn write_config(dir: &Path, invocation: &str, tools: &[(&str, &Path)]) -> PathBuf {
    let mut toml = format!("[tools]\ninvocation = \"{}\"\ntimeout = 30\n", invocation);
    for (tool, script) in tools {
        toml.push_str(&format!(
            "\n[tools.overrides.{}]\ncommand = \"{}\"\n",
            tool,
            script.display()
        ));
    }
    let path = dir.join("mrkit.toml");
    fs::write(&path, toml).unwrap();
    path
}

#[test]
fn test_list_shows_all_tools() {
    let temp_dir = TempDir::new().unwrap();
    mrkit(temp_dir.path())
        .arg("list")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("getDiff")
                .and(predicate::str::contains("getJiraTicket"))
                .and(predicate::str::contains("getMR "))
                .and(predicate::str::contains("getMRDiff"))
                .and(predicate::str::contains("updateMR")),
        );
}

#[test]
fn test_manifest_is_json() {
    let temp_dir = TempDir::new().unwrap();
    let output = mrkit(temp_dir.path()).arg("manifest").output().unwrap();
    assert!(output.status.success());

    let manifest: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(manifest["name"], "mrkit");
    assert_eq!(manifest["tools"].as_array().unwrap().len(), 5);
}

#[test]
fn test_dry_run_escapes_summary() {
    let temp_dir = TempDir::new().unwrap();
    mrkit(temp_dir.path())
        .args(["call", "updateMR", "--arg", "summary=fix bug's edge case", "--dry-run"])
        .assert()
        .success()
        .stdout("updateMR 'fix bug'\\''s edge case'\n");
}

#[test]
fn test_dry_run_zero_arg_form() {
    let temp_dir = TempDir::new().unwrap();
    mrkit(temp_dir.path())
        .args(["call", "getMRDiff", "--dry-run"])
        .assert()
        .success()
        .stdout("getMRDiff\n");
}

#[test]
fn test_missing_required_parameter() {
    let temp_dir = TempDir::new().unwrap();
    mrkit(temp_dir.path())
        .args(["call", "updateMR"])
        .assert()
        .code(1)
        .stdout("Error running updateMR: Missing required parameter: summary\n");
}

#[test]
fn test_unknown_tool() {
    let temp_dir = TempDir::new().unwrap();
    mrkit(temp_dir.path())
        .args(["call", "deleteMR"])
        .assert()
        .code(1)
        .stdout("Unknown tool: deleteMR\n");
}

#[cfg(unix)]
#[test]
fn test_get_mr_output_is_trimmed() {
    let temp_dir = TempDir::new().unwrap();
    let script = write_script(temp_dir.path(), "getMR", "printf '  MR-42\\n\\n'");
    let config = write_config(temp_dir.path(), "argv", &[("getMR", &script)]);

    mrkit(temp_dir.path())
        .arg("--config")
        .arg(&config)
        .args(["call", "getMR"])
        .assert()
        .success()
        .stdout("MR-42\n");
}

#[cfg(unix)]
#[test]
fn test_failing_command_reports_stderr() {
    let temp_dir = TempDir::new().unwrap();
    let script = write_script(
        temp_dir.path(),
        "getJiraTicket",
        "echo 'command not found' >&2\nexit 127",
    );
    let config = write_config(temp_dir.path(), "argv", &[("getJiraTicket", &script)]);

    mrkit(temp_dir.path())
        .arg("--config")
        .arg(&config)
        .args(["call", "getJiraTicket", "--arg", "ticketId=ME-123"])
        .assert()
        .code(1)
        .stdout("Error running getJiraTicket: command not found\n");
}

#[cfg(unix)]
#[test]
fn test_update_mr_arguments_arrive_intact() {
    let summary = "fix bug's edge case; $(echo pwned) `id`";
    let title = "fix(api): ME-1 don't 'quote'";

    for mode in ["argv", "shell"] {
        let temp_dir = TempDir::new().unwrap();
        let script = write_script(temp_dir.path(), "updateMR", "printf '%s|%s|%s' \"$#\" \"$1\" \"$2\"");
        let config = write_config(temp_dir.path(), mode, &[("updateMR", &script)]);

        mrkit(temp_dir.path())
            .arg("--config")
            .arg(&config)
            .args(["call", "updateMR"])
            .arg("--arg")
            .arg(format!("summary={}", summary))
            .arg("--arg")
            .arg(format!("title={}", title))
            .assert()
            .success()
            .stdout(format!("2|{}|{}\n", summary, title));
    }
}

#[cfg(unix)]
#[test]
fn test_update_mr_without_title_passes_one_argument() {
    let temp_dir = TempDir::new().unwrap();
    let script = write_script(temp_dir.path(), "updateMR", "printf '%s' \"$#\"");
    let config = write_config(temp_dir.path(), "shell", &[("updateMR", &script)]);

    mrkit(temp_dir.path())
        .arg("--config")
        .arg(&config)
        .args(["call", "updateMR", "--json", r#"{"summary": "only summary"}"#])
        .assert()
        .success()
        .stdout("1\n");
}

#[cfg(unix)]
#[test]
fn test_serve_round_trip() {
    let temp_dir = TempDir::new().unwrap();
    let script = write_script(temp_dir.path(), "getMRDiff", "printf 'diff for %s' \"${1:-current}\"");
    let config = write_config(temp_dir.path(), "argv", &[("getMRDiff", &script)]);

    let input = concat!(
        r#"{"id": "1", "tool": "getMRDiff"}"#,
        "\n",
        r#"{"id": "2", "tool": "getMRDiff", "params": {"mrNumber": "42"}}"#,
        "\n",
    );

    let output = mrkit(temp_dir.path())
        .arg("--config")
        .arg(&config)
        .arg("serve")
        .write_stdin(input)
        .output()
        .unwrap();
    assert!(output.status.success());

    let mut responses: Vec<serde_json::Value> = String::from_utf8(output.stdout)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    responses.sort_by_key(|r| r["id"].as_str().unwrap_or_default().to_string());

    assert_eq!(responses.len(), 2);
    assert_eq!(responses[0]["output"], "diff for current");
    assert_eq!(responses[1]["output"], "diff for 42");
    assert!(responses.iter().all(|r| r["success"] == true));
}
