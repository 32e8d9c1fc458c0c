// Integration tests for the gcalc binary: stdout contract and exit codes.
//
// Run with: cargo test -p gridcalc-cli --test cli_tests

use std::io::Write;
use std::process::{Command, Output, Stdio};

use tempfile::TempDir;

/// A `gcalc` command isolated from the user's settings file.
fn gcalc(dir: &TempDir) -> Command {
    let settings = dir.path().join("settings.json");
    if !settings.exists() {
        std::fs::write(&settings, "{}").unwrap();
    }
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_gcalc"));
    cmd.env("GRIDCALC_CONFIG", &settings);
    cmd
}

fn run_with_stdin(mut cmd: Command, input: &str) -> Output {
    let mut child = cmd
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn gcalc");
    child.stdin.take().unwrap().write_all(input.as_bytes()).unwrap();
    child.wait_with_output().expect("wait for gcalc")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

// ===========================================================================
// calc
// ===========================================================================

#[test]
fn calc_plain_formula() {
    let dir = TempDir::new().unwrap();
    let output = gcalc(&dir).args(["calc", "=1+2*3"]).output().unwrap();
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(stdout(&output), "7\n");
}

#[test]
fn calc_with_seeded_cells() {
    let dir = TempDir::new().unwrap();
    let output = gcalc(&dir)
        .args(["calc", "SUM(A1:A3)", "--cell", "A1=1", "--cell", "A2=2", "--cell", "A3==A1+A2"])
        .output()
        .unwrap();
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(stdout(&output), "6\n");
}

#[test]
fn calc_json_shape() {
    let dir = TempDir::new().unwrap();
    let output = gcalc(&dir)
        .args(["calc", "=\"a\"&\"b\"", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let val: serde_json::Value = serde_json::from_str(stdout(&output).trim()).unwrap();
    assert_eq!(val["formula"], "=\"a\"&\"b\"");
    assert_eq!(val["value"]["type"], "Text");
    assert_eq!(val["value"]["value"], "ab");
}

#[test]
fn calc_error_value_exits_1() {
    let dir = TempDir::new().unwrap();
    let output = gcalc(&dir).args(["calc", "=1/0"]).output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert_eq!(stdout(&output), "#DIV/0!\n");
    assert!(stderr(&output).contains("hint:"));
}

#[test]
fn calc_syntax_error_exits_1() {
    let dir = TempDir::new().unwrap();
    let output = gcalc(&dir).args(["calc", "=1+"]).output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("Syntax error"));
}

#[test]
fn calc_bad_cell_seed_exits_2() {
    let dir = TempDir::new().unwrap();
    let output = gcalc(&dir)
        .args(["calc", "=A1", "--cell", "nonsense"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
}

// ===========================================================================
// run
// ===========================================================================

#[test]
fn run_script_from_stdin() {
    let dir = TempDir::new().unwrap();
    let mut cmd = gcalc(&dir);
    cmd.arg("run");
    let output = run_with_stdin(cmd, "set A1 10\nset B1 =A1+5\nset A1 20\n");
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(stdout(&output), "A1 = 10\nB1 = 15\nA1 = 20\nB1 = 25\n");
}

#[test]
fn run_script_file_json() {
    let dir = TempDir::new().unwrap();
    let script = dir.path().join("totals.calc");
    std::fs::write(&script, "# totals\nset A1 1\nset A2 2\nset C1 =SUM(A1:A2)\nget C1\n").unwrap();

    let output = gcalc(&dir)
        .args(["run", script.to_str().unwrap(), "--json"])
        .output()
        .unwrap();
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let lines: Vec<serde_json::Value> = stdout(&output)
        .lines()
        .map(|l| serde_json::from_str(l).expect("each line is one JSON object"))
        .collect();
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[3]["op"], "get");
    assert_eq!(lines[3]["address"], "C1");
    assert_eq!(lines[3]["value"]["value"], 3.0);
}

#[test]
fn run_cycle_exits_1() {
    let dir = TempDir::new().unwrap();
    let mut cmd = gcalc(&dir);
    cmd.arg("run");
    let output = run_with_stdin(cmd, "set A1 =B1+1\nset B1 =A1+1\n");
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("line 2: Circular reference"), "{}", stderr(&output));
}

#[test]
fn run_missing_script_exits_3() {
    let dir = TempDir::new().unwrap();
    let output = gcalc(&dir)
        .args(["run", dir.path().join("missing.calc").to_str().unwrap()])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(3));
}

#[test]
fn history_limit_from_settings() {
    let dir = TempDir::new().unwrap();
    let settings = dir.path().join("limits.toml");
    std::fs::write(&settings, "[engine]\nhistory_limit = 1\n").unwrap();

    let mut cmd = gcalc(&dir);
    cmd.args(["--config", settings.to_str().unwrap(), "run"]);
    let output = run_with_stdin(cmd, "set A1 1\nset A1 2\nundo\nundo\n");
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("line 4: Nothing to undo"), "{}", stderr(&output));
}

#[test]
fn invalid_settings_exit_2() {
    let dir = TempDir::new().unwrap();
    let settings = dir.path().join("broken.json");
    std::fs::write(&settings, "{ not json").unwrap();
    let output = gcalc(&dir)
        .args(["--config", settings.to_str().unwrap(), "calc", "=1"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
}

// ===========================================================================
// list-functions
// ===========================================================================

#[test]
fn list_functions_is_sorted() {
    let dir = TempDir::new().unwrap();
    let output = gcalc(&dir).arg("list-functions").output().unwrap();
    assert!(output.status.success());
    let names: Vec<String> = stdout(&output).lines().map(str::to_string).collect();
    assert!(names.contains(&"SUM".to_string()));
    assert!(names.contains(&"IFERROR".to_string()));
    let mut sorted = names.clone();
    sorted.sort();
    assert_eq!(names, sorted);
}
