use assert_cmd::Command;
use predicates::prelude::*;

fn shade() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_shade"));
    for key in [
        "SHADE_NUMGROUPS",
        "SHADE_SHAREDLIBC",
        "SHADE_NOGLOBALS",
        "SHADE_TRACEGLOBALS",
        "SHADE_ABORTSEGV",
    ] {
        cmd.env_remove(key);
    }
    cmd
}

#[test]
fn test_help_command() {
    shade()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Shadow namespace diagnostics"))
        .stdout(predicate::str::contains("Commands:"))
        .stdout(predicate::str::contains("config"))
        .stdout(predicate::str::contains("probe"))
        .stdout(predicate::str::contains("host"));
}

#[test]
fn test_version_command() {
    shade()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("shade"));
}

#[test]
fn test_invalid_command() {
    shade()
        .arg("invalid")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized subcommand"));
}

#[test]
fn test_config_defaults() {
    shade()
        .args(["config", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"num_groups\": 15"))
        .stdout(predicate::str::contains("\"shared_libc\": false"))
        .stderr(predicate::str::is_empty());
}

#[test]
fn test_config_valid_group_count_is_silent() {
    shade()
        .args(["config", "--json"])
        .env("SHADE_NUMGROUPS", "3")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"num_groups\": 3"))
        .stderr(predicate::str::is_empty());
}

#[test]
fn test_config_zero_group_count_warns() {
    shade()
        .args(["config", "--json"])
        .env("SHADE_NUMGROUPS", "0")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"num_groups\": 15"))
        .stderr(predicate::str::contains("outside the supported range"));
}

#[test]
fn test_config_group_count_warning_is_emitted_once() {
    let output = shade()
        .args(["config", "--json"])
        .env("SHADE_NUMGROUPS", "0")
        .assert()
        .success()
        .get_output()
        .clone();

    let stderr = String::from_utf8(output.stderr).unwrap();
    assert_eq!(stderr.lines().count(), 1, "{stderr}");
    assert!(stderr.contains("outside the supported range"));
}

#[test]
fn test_config_non_numeric_group_count_warns() {
    shade()
        .args(["config", "--json"])
        .env("SHADE_NUMGROUPS", "abc")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"num_groups\": 15"))
        .stderr(predicate::str::contains("non-numeric"));
}

#[test]
fn test_config_flags_emit_notices() {
    shade()
        .arg("config")
        .env("SHADE_SHAREDLIBC", "")
        .env("SHADE_TRACEGLOBALS", "1")
        .assert()
        .success()
        .stdout(predicate::str::contains("shared libc:    true"))
        .stdout(predicate::str::contains("trace globals:  true"))
        .stderr(predicate::str::contains("Treating entirety of libc as shared code"))
        .stderr(predicate::str::contains("Global variable access tracing has been enabled"));
}

#[test]
fn test_probe_loaded_libc() {
    shade()
        .args(["probe", "--namespace", "0", "libc.so.6"])
        .assert()
        .success()
        .stdout(predicate::str::diff("loaded\n"));
}

#[test]
fn test_probe_missing_module() {
    shade()
        .args(["probe", "libshade-never-installed.so.0"])
        .assert()
        .success()
        .stdout(predicate::str::diff("not loaded\n"));
}

#[test]
fn test_probe_rejects_invalid_namespace() {
    shade()
        .args(["probe", "--namespace", "99", "libc.so.6"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid namespace id"));
}

#[test]
fn test_host_command() {
    shade()
        .arg("host")
        .assert()
        .success()
        .stdout(predicate::str::contains("main program").or(predicate::str::contains("unknown")));
}
