//! End-to-end runs of the sketch-matrix binary against a stub builder

#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use serial_test::serial;
use tempfile::TempDir;

/// Fails with exit 1 for F411RE, crashes with exit 42 for BROKEN, else writes the binary
const STUB_BUILDER: &str = r#"#!/bin/sh
build_path=""
fqbn=""
while [ $# -gt 1 ]; do
  case "$1" in
    -build-path) build_path="$2"; shift 2 ;;
    -fqbn) fqbn="$2"; shift 2 ;;
    *) shift ;;
  esac
done
sketch="$1"
case "$fqbn" in
  *F411RE*) echo "error: F411RE is not supported" >&2; exit 1 ;;
  *BROKEN*) echo "segmentation fault" >&2; exit 42 ;;
esac
mkdir -p "$build_path"
echo "Sketch uses 1024 bytes for $fqbn"
touch "$build_path/$(basename "$sketch").bin"
"#;

struct Workspace {
    temp: TempDir,
}

impl Workspace {
    fn new(pnums: &[&str]) -> Self {
        let temp = tempfile::tempdir().unwrap();
        let base = temp.path();

        let ide = base.join("ide");
        for sketch in ["Blink", "Fade"] {
            let dir = ide.join("examples/01.Basics").join(sketch);
            fs::create_dir_all(&dir).unwrap();
            fs::write(dir.join(format!("{}.ino", sketch)), "void setup() {}\nvoid loop() {}\n")
                .unwrap();
        }
        fs::create_dir_all(ide.join("hardware")).unwrap();
        let builder = ide.join("arduino-builder");
        fs::write(&builder, STUB_BUILDER).unwrap();
        fs::set_permissions(&builder, fs::Permissions::from_mode(0o755)).unwrap();

        let mut boards = String::from("Nucleo_64.name=Nucleo-64\n");
        for pnum in pnums {
            boards.push_str(&format!("Nucleo_64.menu.pnum.{}={} board\n", pnum, pnum));
        }
        let board_dir = base.join("packages/STM32/hardware/stm32/1.0.0");
        fs::create_dir_all(&board_dir).unwrap();
        fs::write(board_dir.join("boards.txt"), boards).unwrap();
        fs::create_dir_all(base.join("sketchbook/libraries")).unwrap();

        let config = format!(
            r#"[toolchain]
root = "{base}/ide"
packages = "{base}/packages"
sketchbook = "{base}/sketchbook"

[output]
root = "{base}/out"
scratch = "{base}/scratch"

[sketches]
exclude_file = "{base}/no_default_exclusions.txt"
"#,
            base = base.display()
        );
        fs::write(base.join("SketchMatrix.toml"), config).unwrap();

        Self { temp }
    }

    fn path(&self) -> &Path {
        self.temp.path()
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("sketch-matrix").unwrap();
        cmd.current_dir(self.path())
            .env_remove("SKETCH_MATRIX_CONFIG")
            .env_remove("GITHUB_ACTIONS")
            .env_remove("GITLAB_CI")
            .env_remove("TF_BUILD")
            .arg("--no-color");
        cmd
    }

    /// The single `build_<timestamp>` directory of this workspace
    fn run_dir(&self) -> PathBuf {
        let mut runs: Vec<PathBuf> = fs::read_dir(self.path().join("out"))
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with("build_"))
            })
            .collect();
        assert_eq!(runs.len(), 1, "expected one run directory: {:?}", runs);
        runs.remove(0)
    }

    fn report(&self) -> serde_json::Value {
        let json = fs::read_to_string(self.run_dir().join("build_result.json")).unwrap();
        serde_json::from_str(&json).unwrap()
    }

    fn scratch_dirs_left(&self) -> usize {
        fs::read_dir(self.path())
            .unwrap()
            .filter(|e| {
                e.as_ref()
                    .unwrap()
                    .file_name()
                    .to_string_lossy()
                    .starts_with("scratch_")
            })
            .count()
    }
}

#[test]
#[serial]
fn all_builds_pass_under_strict_mode() {
    let ws = Workspace::new(&["NUCLEO_L476RG", "NUCLEO_G071RB"]);

    ws.cmd()
        .args(["build", "--all", "--strict"])
        .assert()
        .success()
        .stdout(predicate::str::contains("PASSED = 4/4 (100%)"))
        .stdout(predicate::str::contains("FAILED = 0/4 (0%)"));

    let report = ws.report();
    assert_eq!(report["passed"], 4);
    assert_eq!(report["total"], 4);

    let log = fs::read_to_string(ws.run_dir().join("build_result.log")).unwrap();
    assert!(log.contains("Total build PASSED for this sketch : 2 / 2"));
    assert!(log.contains("TOTAL PASSED : 100 %"));
    assert!(ws
        .run_dir()
        .join("NUCLEO_G071RB/std_folder/Fade_stdout.txt")
        .is_file());
    assert_eq!(ws.scratch_dirs_left(), 0);
}

#[test]
#[serial]
fn failing_board_trips_strict_mode() {
    let ws = Workspace::new(&["NUCLEO_F401RE", "NUCLEO_F411RE"]);

    ws.cmd()
        .args(["build", "--ino", "examples/01.Basics/Blink/Blink.ino", "--strict"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("PASSED = 1/2 (50%)"))
        .stdout(predicate::str::contains("FAILED = 1/2 (50%)"))
        .stderr(predicate::str::contains("1 build(s) failed and 0 errored out of 2"));

    let report = ws.report();
    assert_eq!(report["sketches"].as_array().unwrap().len(), 1);
    assert_eq!(report["sketches"][0]["failed"], serde_json::json!(["NUCLEO_F411RE"]));
    assert_eq!(report["sketches"][0]["passed"], serde_json::json!(["NUCLEO_F401RE"]));

    let stderr_log = ws
        .run_dir()
        .join("NUCLEO_F411RE/std_folder/Blink_stderr.txt");
    assert!(fs::read_to_string(stderr_log)
        .unwrap()
        .contains("F411RE is not supported"));
}

#[test]
#[serial]
fn failing_board_without_strict_mode_exits_zero() {
    let ws = Workspace::new(&["NUCLEO_F411RE", "NUCLEO_L476RG"]);

    ws.cmd()
        .args(["build", "--all"])
        .assert()
        .success()
        .stdout(predicate::str::contains("FAILED = 2/4 (50%)"));
}

#[test]
#[serial]
fn ci_mode_echoes_failure_logs() {
    let ws = Workspace::new(&["NUCLEO_F411RE"]);

    ws.cmd()
        .args(["build", "--ino", "examples/01.Basics/Blink/Blink.ino", "--ci"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("F411RE is not supported"));
}

#[test]
#[serial]
fn everything_excluded_is_empty_selection() {
    let ws = Workspace::new(&["NUCLEO_L476RG"]);
    fs::write(ws.path().join("exclude.txt"), "basics\n").unwrap();

    ws.cmd()
        .args(["build", "--all", "--exclude", "exclude.txt"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No sketch to build!"));

    assert!(!ws.path().join("out").exists());
}

#[test]
#[serial]
fn unexpected_exit_code_is_counted_as_error() {
    let ws = Workspace::new(&["BROKEN", "NUCLEO_F411RE", "NUCLEO_L476RG"]);

    ws.cmd()
        .args(["build", "--ino", "examples/01.Basics/Blink/Blink.ino"])
        .assert()
        .success()
        .stdout(predicate::str::contains("PASSED = 1/3 (50%)"))
        .stdout(predicate::str::contains("FAILED = 1/3 (50%)"))
        .stdout(predicate::str::contains("ERROR = 1/3 "))
        .stderr(predicate::str::contains("builder exited with code 42"));

    let report = ws.report();
    assert_eq!(report["errors"], 1);
    assert_eq!(report["total"], 3);
    assert_eq!(report["sketches"][0]["errors"][0], "BROKEN");

    let log = fs::read_to_string(ws.run_dir().join("build_result.log")).unwrap();
    assert!(log.contains("TOTAL PASSED : 50 %"));
    assert!(log.contains("TOTAL FAILED : 50 %"));
    assert!(log.contains("TOTAL ERROR : 1 / 3"));

    ws.cmd()
        .args(["build", "--ino", "examples/01.Basics/Blink/Blink.ino", "--strict", "--clean"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("1 build(s) failed and 1 errored out of 3"));
}

#[test]
#[serial]
fn every_build_errored_still_completes() {
    let ws = Workspace::new(&["BROKEN"]);

    ws.cmd()
        .args(["build", "--ino", "examples/01.Basics/Blink/Blink.ino"])
        .assert()
        .success()
        .stdout(predicate::str::contains("PASSED = 0/1 \n"))
        .stdout(predicate::str::contains("ERROR = 1/1 "));

    assert_eq!(ws.report()["errors"], 1);
}

#[test]
#[serial]
fn bin_stages_artifacts() {
    let ws = Workspace::new(&["NUCLEO_F411RE", "NUCLEO_L476RG"]);

    ws.cmd()
        .args(["build", "--sketches", "fade", "--bin"])
        .assert()
        .success();

    let run = ws.run_dir();
    assert!(run.join("NUCLEO_L476RG/binaries/Fade.ino.bin").is_file());
    assert!(!run.join("NUCLEO_F411RE/binaries").exists());
}

#[test]
#[serial]
fn parallel_run_writes_combined_logs_and_junit() {
    let ws = Workspace::new(&["NUCLEO_F411RE", "NUCLEO_L476RG", "NUCLEO_G071RB"]);

    ws.cmd()
        .args(["build", "--all", "--parallel", "--jobs", "2", "--junit", "reports/junit.xml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("PASSED = 4/6 (67%)"));

    let run = ws.run_dir();
    assert!(run.join("NUCLEO_G071RB/std_folder/Blink.log").is_file());
    assert!(!run.join("NUCLEO_G071RB/std_folder/Blink_stdout.txt").exists());

    let junit = fs::read_to_string(ws.path().join("reports/junit.xml")).unwrap();
    assert!(junit.contains("tests=\"6\" failures=\"2\" errors=\"0\""));
    assert_eq!(ws.scratch_dirs_left(), 0);
}

#[test]
#[serial]
fn board_filter_and_listing() {
    let ws = Workspace::new(&["NUCLEO_F411RE", "NUCLEO_L476RG", "NUCLEO_G071RB"]);

    ws.cmd()
        .arg("boards")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("3 board(s) available"))
        .stdout(predicate::str::contains("NUCLEO_F411RE\nNUCLEO_G071RB\nNUCLEO_L476RG"));

    ws.cmd()
        .args(["boards", "--board", "l4"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 board(s) available\nNUCLEO_L476RG"));

    ws.cmd()
        .args(["build", "--board", "no-such-board"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No board found!"));
}

#[test]
#[serial]
fn missing_configuration_suggests_init() {
    let temp = tempfile::tempdir().unwrap();

    Command::cargo_bin("sketch-matrix")
        .unwrap()
        .current_dir(temp.path())
        .env_remove("SKETCH_MATRIX_CONFIG")
        .args(["--no-color", "build"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("SketchMatrix.toml not found"))
        .stderr(predicate::str::contains("sketch-matrix init"));

    Command::cargo_bin("sketch-matrix")
        .unwrap()
        .current_dir(temp.path())
        .env_remove("SKETCH_MATRIX_CONFIG")
        .arg("init")
        .assert()
        .success();
    assert!(temp.path().join("SketchMatrix.toml").is_file());
}

#[test]
#[serial]
fn missing_toolchain_root_is_reported() {
    let ws = Workspace::new(&["NUCLEO_L476RG"]);
    fs::remove_dir_all(ws.path().join("ide")).unwrap();

    ws.cmd()
        .arg("build")
        .assert()
        .failure()
        .stderr(predicate::str::contains("toolchain.root"));
}
