//! Write-ahead log of finished walks.
//!
//! Walks are appended to a JSONL (JSON Lines) file with file locking
//! so several processes can log safely.

use crate::{Result, WalkSession};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// Destination for finished walks
pub trait WalkSink {
    fn append(&mut self, walk: &WalkSession) -> Result<()>;
}

/// JSONL-based walk sink with file locking
pub struct JsonlSink {
    path: PathBuf,
}

impl JsonlSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn ensure_parent_dir(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

impl WalkSink for JsonlSink {
    fn append(&mut self, walk: &WalkSession) -> Result<()> {
        self.ensure_parent_dir()?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        file.lock_exclusive()?;

        let mut writer = std::io::BufWriter::new(&file);
        let line = serde_json::to_string(walk)?;
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        drop(writer);

        file.unlock()?;

        tracing::debug!("Appended walk {} to WAL", walk.id());
        Ok(())
    }
}

/// Read all walks from a WAL file, skipping lines that fail to parse
pub fn read_walks(path: &Path) -> Result<Vec<WalkSession>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(path)?;
    file.lock_shared()?;

    let reader = BufReader::new(&file);
    let mut walks = Vec::new();

    for (line_num, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<WalkSession>(&line) {
            Ok(walk) => walks.push(walk),
            Err(e) => {
                tracing::warn!("Failed to parse walk at line {}: {}", line_num + 1, e);
            }
        }
    }

    file.unlock()?;
    tracing::debug!("Read {} walks from WAL", walks.len());
    Ok(walks)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::walk::DataSource;
    use crate::ActiveSessionTotals;
    use chrono::{Duration, Utc};

    pub(crate) fn create_test_walk(days_ago: i64, steps: u64) -> WalkSession {
        let start = Utc::now() - Duration::days(days_ago);
        let totals = ActiveSessionTotals {
            start_timestamp: start,
            steps,
            distance_meters: steps as f64 * 0.7,
            duration_seconds: 0.0,
        };
        WalkSession::finalize(&totals, start + Duration::minutes(30), None, DataSource::Manual)
    }

    #[test]
    fn test_append_and_read_single_walk() {
        let temp_dir = tempfile::tempdir().unwrap();
        let wal_path = temp_dir.path().join("walks.wal");

        let walk = create_test_walk(0, 4000);
        let walk_id = walk.id();

        let mut sink = JsonlSink::new(&wal_path);
        sink.append(&walk).unwrap();

        let walks = read_walks(&wal_path).unwrap();
        assert_eq!(walks.len(), 1);
        assert_eq!(walks[0].id(), walk_id);
        assert_eq!(walks[0].estimated_dog_steps(), 6000);
    }

    #[test]
    fn test_append_multiple_walks() {
        let temp_dir = tempfile::tempdir().unwrap();
        let wal_path = temp_dir.path().join("nested/walks.wal");

        let mut sink = JsonlSink::new(&wal_path);
        for i in 0..5 {
            sink.append(&create_test_walk(0, 1000 * (i + 1))).unwrap();
        }

        let walks = read_walks(&wal_path).unwrap();
        assert_eq!(walks.len(), 5);
    }

    #[test]
    fn test_read_empty_wal() {
        let temp_dir = tempfile::tempdir().unwrap();
        let wal_path = temp_dir.path().join("nonexistent.wal");

        let walks = read_walks(&wal_path).unwrap();
        assert!(walks.is_empty());
    }

    #[test]
    fn test_corrupt_lines_skipped() {
        let temp_dir = tempfile::tempdir().unwrap();
        let wal_path = temp_dir.path().join("walks.wal");

        let mut sink = JsonlSink::new(&wal_path);
        sink.append(&create_test_walk(0, 1000)).unwrap();
        {
            let mut file = OpenOptions::new().append(true).open(&wal_path).unwrap();
            writeln!(file, "{{ not a walk").unwrap();
        }
        sink.append(&create_test_walk(0, 2000)).unwrap();

        let walks = read_walks(&wal_path).unwrap();
        assert_eq!(walks.len(), 2);
    }
}
