// Drives the compiled binary end to end. HOME and XDG_CONFIG_HOME point at a
// temp dir so config, history and results never touch the real user dirs.

use assert_cmd::Command;
use tempfile::TempDir;

fn maplocator(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("maplocator").unwrap();
    cmd.env("HOME", home.path())
        .env("XDG_CONFIG_HOME", home.path().join(".config"))
        .env_remove("RUST_LOG");
    cmd
}

fn stdout_of(cmd: &mut Command) -> String {
    let output = cmd.assert().success().get_output().stdout.clone();
    String::from_utf8(output).unwrap()
}

#[test]
fn states_lists_bundled_regions() {
    let home = TempDir::new().unwrap();
    let out = stdout_of(maplocator(&home).arg("states"));
    for region in ["uttarakhand", "himachal_pradesh", "delhi", "haryana", "punjab"] {
        assert!(out.contains(region), "missing {region} in:\n{out}");
    }
}

#[test]
fn skipped_session_prints_empty_summary() {
    let home = TempDir::new().unwrap();
    let out = stdout_of(
        maplocator(&home)
            .args(["play", "--rounds", "2", "--seed", "1", "--no-record"])
            .write_stdin("s\nskip\n"),
    );
    assert!(out.contains("round 1/2"), "{out}");
    assert!(out.contains("round 2/2"), "{out}");
    assert!(out.contains("score 0/20 (0%) over 2 rounds, 2 skipped"), "{out}");
    assert!(!home.path().join(".local/state/maplocator/results.csv").exists());
}

#[test]
fn finished_session_is_logged() {
    let home = TempDir::new().unwrap();
    let out = stdout_of(
        maplocator(&home)
            .args(["play", "--state", "delhi", "--rounds", "1", "--seed", "7"])
            .write_stdin("77.2,28.6\n"),
    );
    assert!(out.contains("away"), "{out}");
    assert!(out.contains("over 1 rounds, 0 skipped"), "{out}");

    let state_dir = home.path().join(".local/state/maplocator");
    let log = std::fs::read_to_string(state_dir.join("results.csv")).unwrap();
    let lines: Vec<&str> = log.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("date,region,scope,mode"));
    assert!(lines[1].contains(",delhi,mixed,threshold,1,"));
    assert!(state_dir.join("history.db").exists());

    let stats = stdout_of(maplocator(&home).args(["stats", "--state", "delhi"]));
    assert!(stats.contains("attempts"), "{stats}");
    assert!(stats.contains("1 guesses recorded"), "{stats}");

    stdout_of(maplocator(&home).args(["stats", "--clear"]));
    let stats = stdout_of(maplocator(&home).args(["stats", "--state", "delhi"]));
    assert!(stats.contains("no guesses recorded for"), "{stats}");
}

#[test]
fn reveal_names_the_district() {
    let home = TempDir::new().unwrap();
    let out = stdout_of(
        maplocator(&home)
            .args([
                "play",
                "--state",
                "uttarakhand",
                "--scope",
                "district-hqs",
                "--rounds",
                "1",
                "--seed",
                "3",
            ])
            .write_stdin("78.0,30.0\n"),
    );
    assert!(out.contains(" district) was "), "{out}");
}

#[test]
fn saved_options_become_defaults() {
    let home = TempDir::new().unwrap();
    maplocator(&home)
        .args([
            "play", "--mode", "hybrid", "--rounds", "3", "--save", "--no-record",
        ])
        .write_stdin("q\n")
        .assert()
        .success();

    let cfg: serde_json::Value =
        serde_json::from_str(&stdout_of(maplocator(&home).arg("config"))).unwrap();
    assert_eq!(cfg["scoring_mode"], "hybrid");
    assert_eq!(cfg["rounds"], 3);
    assert_eq!(cfg["target_scope"], "mixed");
}

#[test]
fn unknown_state_is_rejected() {
    let home = TempDir::new().unwrap();
    maplocator(&home)
        .args(["play", "--state", "atlantis", "--no-record"])
        .write_stdin("q\n")
        .assert()
        .failure();
}
