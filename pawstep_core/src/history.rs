//! Walk history loading over a rolling window.
//!
//! Recent walks live in the WAL, older ones in the CSV archive; both are
//! merged here.

use crate::{Result, WalkSession};
use chrono::{DateTime, Duration, Utc};
use csv::ReaderBuilder;
use std::collections::HashSet;
use std::path::Path;

/// Load walks started in the last `days` days from both WAL and CSV
///
/// Returns walks sorted by start time (newest first), each id at most once.
pub fn load_recent_walks(
    wal_path: &Path,
    csv_path: &Path,
    days: i64,
) -> Result<Vec<WalkSession>> {
    // Windows reaching past the representable range include everything
    let cutoff = Duration::try_days(days)
        .and_then(|window| Utc::now().checked_sub_signed(window))
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    let mut walks = Vec::new();
    let mut seen_ids = HashSet::new();

    if wal_path.exists() {
        for walk in crate::wal::read_walks(wal_path)? {
            if walk.start_time() >= cutoff && seen_ids.insert(walk.id()) {
                walks.push(walk);
            }
        }
        tracing::debug!("Loaded {} walks from WAL", walks.len());
    }

    if csv_path.exists() {
        let mut csv_count = 0;
        for walk in load_walks_from_csv(csv_path)? {
            if walk.start_time() >= cutoff && seen_ids.insert(walk.id()) {
                walks.push(walk);
                csv_count += 1;
            }
        }
        tracing::debug!("Loaded {} walks from CSV", csv_count);
    }

    walks.sort_by(|a, b| b.start_time().cmp(&a.start_time()));

    tracing::info!("Loaded {} walks from last {} days", walks.len(), days);

    Ok(walks)
}

fn load_walks_from_csv(path: &Path) -> Result<Vec<WalkSession>> {
    let mut reader = ReaderBuilder::new().has_headers(true).from_path(path)?;

    let mut walks = Vec::new();
    for result in reader.deserialize::<WalkSession>() {
        match result {
            Ok(walk) => walks.push(walk),
            Err(e) => tracing::warn!("Failed to deserialize CSV row: {}", e),
        }
    }

    Ok(walks)
}

/// Aggregate totals over a list of walks
#[derive(Clone, Debug, PartialEq)]
pub struct WalkTotals {
    pub walks: usize,
    pub human_steps: u64,
    pub dog_steps: u64,
    pub distance_meters: f64,
    pub duration_seconds: f64,
}

pub fn summarize(walks: &[WalkSession]) -> WalkTotals {
    WalkTotals {
        walks: walks.len(),
        human_steps: walks.iter().map(|w| w.human_steps()).sum(),
        dog_steps: walks.iter().map(|w| w.estimated_dog_steps()).sum(),
        distance_meters: walks.iter().map(|w| w.distance_meters()).sum(),
        duration_seconds: walks.iter().map(|w| w.duration_seconds()).sum(),
    }
}

/// Walks that started on or after `since`
pub fn walks_since(walks: &[WalkSession], since: DateTime<Utc>) -> Vec<WalkSession> {
    walks
        .iter()
        .filter(|w| w.start_time() >= since)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wal::tests::create_test_walk;
    use crate::wal::{JsonlSink, WalkSink};

    #[test]
    fn test_load_recent_walks_from_wal() {
        let temp_dir = tempfile::tempdir().unwrap();
        let wal_path = temp_dir.path().join("walks.wal");
        let csv_path = temp_dir.path().join("walks.csv");

        let mut sink = JsonlSink::new(&wal_path);
        sink.append(&create_test_walk(1, 1000)).unwrap();
        sink.append(&create_test_walk(3, 2000)).unwrap();
        sink.append(&create_test_walk(10, 3000)).unwrap(); // Too old

        let walks = load_recent_walks(&wal_path, &csv_path, 7).unwrap();
        assert_eq!(walks.len(), 2);
    }

    #[test]
    fn test_deduplication_across_wal_and_csv() {
        let temp_dir = tempfile::tempdir().unwrap();
        let wal_path = temp_dir.path().join("walks.wal");
        let csv_path = temp_dir.path().join("walks.csv");

        let walk = create_test_walk(1, 4000);
        let walk_id = walk.id();
        let mut sink = JsonlSink::new(&wal_path);
        sink.append(&walk).unwrap();

        crate::csv_rollup::wal_to_csv_and_archive(&wal_path, &csv_path).unwrap();

        // Same walk logged again after the rollup
        let mut sink = JsonlSink::new(&wal_path);
        sink.append(&walk).unwrap();

        let walks = load_recent_walks(&wal_path, &csv_path, 7).unwrap();
        assert_eq!(walks.iter().filter(|w| w.id() == walk_id).count(), 1);
    }

    #[test]
    fn test_csv_rows_roundtrip() {
        let temp_dir = tempfile::tempdir().unwrap();
        let wal_path = temp_dir.path().join("walks.wal");
        let csv_path = temp_dir.path().join("walks.csv");

        let walk = create_test_walk(2, 5000);
        let mut sink = JsonlSink::new(&wal_path);
        sink.append(&walk).unwrap();
        crate::csv_rollup::wal_to_csv_and_archive(&wal_path, &csv_path).unwrap();

        let walks = load_recent_walks(&wal_path, &csv_path, 7).unwrap();
        assert_eq!(walks.len(), 1);
        assert_eq!(walks[0].id(), walk.id());
        assert_eq!(walks[0].start_time(), walk.start_time());
        assert_eq!(walks[0].human_steps(), 5000);
        assert_eq!(walks[0].data_source(), walk.data_source());
    }

    #[test]
    fn test_walks_sorted_newest_first() {
        let temp_dir = tempfile::tempdir().unwrap();
        let wal_path = temp_dir.path().join("walks.wal");
        let csv_path = temp_dir.path().join("walks.csv");

        let mut sink = JsonlSink::new(&wal_path);
        sink.append(&create_test_walk(5, 1111)).unwrap();
        sink.append(&create_test_walk(1, 2222)).unwrap();

        let walks = load_recent_walks(&wal_path, &csv_path, 7).unwrap();
        assert_eq!(walks[0].human_steps(), 2222);
        assert_eq!(walks[1].human_steps(), 1111);
    }

    #[test]
    fn test_summarize() {
        let walks = vec![create_test_walk(0, 1000), create_test_walk(0, 3000)];
        let totals = summarize(&walks);
        assert_eq!(totals.walks, 2);
        assert_eq!(totals.human_steps, 4000);
        assert_eq!(totals.dog_steps, 6000);
        assert_eq!(totals.duration_seconds, 3600.0);
    }

    #[test]
    fn test_huge_window_includes_everything() {
        let temp_dir = tempfile::tempdir().unwrap();
        let wal_path = temp_dir.path().join("walks.wal");
        let csv_path = temp_dir.path().join("walks.csv");

        let mut sink = JsonlSink::new(&wal_path);
        sink.append(&create_test_walk(400, 1000)).unwrap();

        let walks = load_recent_walks(&wal_path, &csv_path, i64::MAX).unwrap();
        assert_eq!(walks.len(), 1);
    }

    #[test]
    fn test_walks_since() {
        let walks = vec![create_test_walk(4, 1000), create_test_walk(0, 3000)];
        let recent = walks_since(&walks, Utc::now() - Duration::days(1));
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].human_steps(), 3000);
    }
}
