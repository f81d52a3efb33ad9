use std::process::Command;

#[test]
fn headless_run_prints_a_summary() {
    let output = Command::new(env!("CARGO_BIN_EXE_outpost"))
        .args(["--difficulty", "hard", "--seed", "7", "--minutes", "1"])
        .env("RUST_LOG", "warn")
        .output()
        .expect("failed to launch the outpost binary");

    assert!(output.status.success(), "headless run should succeed");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("difficulty: hard"));
    assert!(stdout.contains("seed: 7"));
    assert!(stdout.contains("ticks simulated: 1500"));
    assert!(stdout.contains("outcome: undecided"));
}

#[test]
fn unknown_difficulty_is_rejected() {
    let status = Command::new(env!("CARGO_BIN_EXE_outpost"))
        .args(["--difficulty", "brutal"])
        .status()
        .expect("failed to launch the outpost binary");

    assert!(!status.success());
}

#[test]
fn missing_config_file_is_reported() {
    let output = Command::new(env!("CARGO_BIN_EXE_outpost"))
        .args(["--config", "does/not/exist.toml", "--minutes", "1"])
        .output()
        .expect("failed to launch the outpost binary");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to read scenario config"));
}
