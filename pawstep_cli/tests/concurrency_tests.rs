//! Concurrency tests for pawstep.
//!
//! Multiple processes must be able to append walks and update the
//! profile without corrupting each other's writes.

use assert_cmd::Command;
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

fn cli() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("pawstep"))
}

fn setup_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

#[test]
fn test_no_wal_corruption_under_load() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();

    let handles: Vec<_> = (0..8u64)
        .map(|i| {
            let data_dir = data_dir.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(i * 5));
                cli()
                    .arg("log-walk")
                    .arg("--steps")
                    .arg((1000 + i * 100).to_string())
                    .arg("--minutes")
                    .arg("15")
                    .arg("--data-dir")
                    .arg(&data_dir)
                    .timeout(Duration::from_secs(10))
                    .assert()
                    .success();
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    let wal_path = data_dir.join("wal/walks.wal");
    let wal_content = std::fs::read_to_string(&wal_path).expect("Failed to read WAL");

    let mut valid_count = 0;
    for line in wal_content.lines().filter(|l| !l.is_empty()) {
        let parsed: Result<serde_json::Value, _> = serde_json::from_str(line);
        assert!(parsed.is_ok(), "WAL contains invalid JSON line: {}", line);
        valid_count += 1;
    }

    assert_eq!(valid_count, 8, "Expected 8 valid walks in WAL");
}

#[test]
fn test_concurrent_estimates_keep_state_readable() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();

    let handles: Vec<_> = (0..5u64)
        .map(|i| {
            let data_dir = data_dir.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(i * 5));
                cli()
                    .arg("estimate")
                    .arg("--steps")
                    .arg("4000")
                    .arg("--breed")
                    .arg("Beagle")
                    .arg("--data-dir")
                    .arg(&data_dir)
                    .timeout(Duration::from_secs(10))
                    .assert()
                    .success();
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    // Last writer wins, but the file is always a complete document
    let contents =
        std::fs::read_to_string(data_dir.join("state.json")).expect("Failed to read state");
    let state: serde_json::Value =
        serde_json::from_str(&contents).expect("State file is not valid JSON");
    assert!(!state["recent_estimations"].as_array().unwrap().is_empty());
}
