use assert_cmd::Command;

#[test]
fn cli_help_runs() {
    let mut cmd = Command::cargo_bin("patent-harvest").expect("binary exists");
    cmd.arg("--help").assert().success();
}

#[test]
fn urls_subcommand_prints_both_pages() {
    let dir = tempfile::tempdir().unwrap();
    let mut cmd = Command::cargo_bin("patent-harvest").expect("binary exists");
    let output = cmd
        .current_dir(dir.path())
        .env("DATA_DIR", dir.path().join("data"))
        .env("OUTPUTS_DIR", dir.path().join("output"))
        .args(["urls", "WO-2024184281-A1"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("https://patents.google.com/patent/WO2024184281A1/en"));
    assert!(stdout.contains("https://pubchem.ncbi.nlm.nih.gov/patent/WO-2024184281-A1"));
}
