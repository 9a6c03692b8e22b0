//! Finalized walk sessions.
//!
//! A [`WalkSession`] is only built from the final totals of a stopped
//! session. Its fields are read-only; display values are derived on read.

use crate::estimation::{multiplier_for, UNKNOWN_BREED_NAME};
use crate::{ActiveSessionTotals, BreedProfile};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Where a walk's step data came from
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    Pedometer,
    Manual,
    Simulated,
}

/// Pace shown when no distance was recorded
pub const NO_PACE: &str = "--'--\"";

/// A completed walk
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct WalkSession {
    id: Uuid,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    duration_seconds: f64,
    human_steps: u64,
    estimated_dog_steps: u64,
    distance_meters: f64,
    breed_name: String,
    breed_multiplier: f64,
    data_source: DataSource,
}

impl WalkSession {
    /// Freeze the totals of a session that ended at `end_time`
    pub fn finalize(
        totals: &ActiveSessionTotals,
        end_time: DateTime<Utc>,
        breed: Option<&BreedProfile>,
        data_source: DataSource,
    ) -> Self {
        let elapsed = end_time - totals.start_timestamp;
        let duration_seconds = (elapsed.num_milliseconds().max(0) as f64) / 1000.0;
        let breed_multiplier = multiplier_for(breed);

        Self {
            id: Uuid::new_v4(),
            start_time: totals.start_timestamp,
            end_time,
            duration_seconds,
            human_steps: totals.steps,
            estimated_dog_steps: (totals.steps as f64 * breed_multiplier).round() as u64,
            distance_meters: totals.distance_meters.max(0.0),
            breed_name: breed
                .map(|b| b.name.clone())
                .unwrap_or_else(|| UNKNOWN_BREED_NAME.to_string()),
            breed_multiplier,
            data_source,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn end_time(&self) -> DateTime<Utc> {
        self.end_time
    }

    pub fn duration_seconds(&self) -> f64 {
        self.duration_seconds
    }

    pub fn human_steps(&self) -> u64 {
        self.human_steps
    }

    pub fn estimated_dog_steps(&self) -> u64 {
        self.estimated_dog_steps
    }

    pub fn distance_meters(&self) -> f64 {
        self.distance_meters
    }

    pub fn breed_name(&self) -> &str {
        &self.breed_name
    }

    pub fn breed_multiplier(&self) -> f64 {
        self.breed_multiplier
    }

    pub fn data_source(&self) -> DataSource {
        self.data_source
    }

    /// `H:MM:SS` for walks of an hour or more, otherwise `MM:SS`
    pub fn formatted_duration(&self) -> String {
        let total = self.duration_seconds.max(0.0) as u64;
        let hours = total / 3600;
        let minutes = (total % 3600) / 60;
        let seconds = total % 60;

        if hours > 0 {
            format!("{}:{:02}:{:02}", hours, minutes, seconds)
        } else {
            format!("{:02}:{:02}", minutes, seconds)
        }
    }

    pub fn distance_kilometers(&self) -> f64 {
        self.distance_meters / 1000.0
    }

    /// Minutes and seconds per kilometre, e.g. `12'30"`
    pub fn average_pace(&self) -> String {
        let km = self.distance_kilometers();
        if km <= 0.0 {
            return NO_PACE.to_string();
        }

        let seconds_per_km = (self.duration_seconds / km).round() as u64;
        format!("{:02}'{:02}\"", seconds_per_km / 60, seconds_per_km % 60)
    }

    pub fn summary(&self) -> String {
        format!(
            "{} paw steps ({} human steps, {}) over {:.2} km in {}, pace {}",
            self.estimated_dog_steps,
            self.human_steps,
            self.breed_name,
            self.distance_kilometers(),
            self.formatted_duration(),
            self.average_pace()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EnergyLevel, SizeClass};
    use chrono::Duration;

    fn labrador() -> BreedProfile {
        BreedProfile {
            name: "Labrador Retriever".into(),
            size_class: SizeClass::Large,
            energy_level: EnergyLevel::High,
            step_multiplier: 1.4,
            description: "Friendly retriever".into(),
        }
    }

    fn walk(duration: Duration, steps: u64, distance_meters: f64) -> WalkSession {
        let start = Utc::now();
        let totals = ActiveSessionTotals {
            start_timestamp: start,
            steps,
            distance_meters,
            duration_seconds: 0.0,
        };
        WalkSession::finalize(&totals, start + duration, Some(&labrador()), DataSource::Pedometer)
    }

    #[test]
    fn test_finalize_applies_multiplier() {
        let session = walk(Duration::minutes(30), 5000, 3500.0);
        assert_eq!(session.human_steps(), 5000);
        assert_eq!(session.estimated_dog_steps(), 7000);
        assert_eq!(session.breed_name(), "Labrador Retriever");
        assert_eq!(session.breed_multiplier(), 1.4);
        assert_eq!(session.duration_seconds(), 1800.0);
        assert!(session.end_time() > session.start_time());
    }

    #[test]
    fn test_finalize_unknown_breed() {
        let start = Utc::now();
        let totals = ActiveSessionTotals {
            start_timestamp: start,
            steps: 2000,
            distance_meters: 0.0,
            duration_seconds: 0.0,
        };
        let session =
            WalkSession::finalize(&totals, start + Duration::minutes(5), None, DataSource::Manual);
        assert_eq!(session.estimated_dog_steps(), 3000);
        assert_eq!(session.breed_name(), "Unknown");
        assert_eq!(session.data_source(), DataSource::Manual);
    }

    #[test]
    fn test_formatted_duration() {
        assert_eq!(walk(Duration::seconds(59), 0, 0.0).formatted_duration(), "00:59");
        assert_eq!(walk(Duration::seconds(754), 0, 0.0).formatted_duration(), "12:34");
        assert_eq!(walk(Duration::seconds(3725), 0, 0.0).formatted_duration(), "1:02:05");
    }

    #[test]
    fn test_average_pace() {
        // 45 minutes over 3.6 km = 750 s/km
        let session = walk(Duration::minutes(45), 4800, 3600.0);
        assert_eq!(session.distance_kilometers(), 3.6);
        assert_eq!(session.average_pace(), "12'30\"");
    }

    #[test]
    fn test_average_pace_without_distance() {
        let session = walk(Duration::minutes(10), 1000, 0.0);
        assert_eq!(session.average_pace(), NO_PACE);
    }

    #[test]
    fn test_summary_mentions_totals() {
        let session = walk(Duration::minutes(30), 5000, 3500.0);
        let summary = session.summary();
        assert!(summary.contains("7000 paw steps"));
        assert!(summary.contains("3.50 km"));
        assert!(summary.contains("30:00"));
    }

    #[test]
    fn test_json_roundtrip() {
        let session = walk(Duration::minutes(20), 2500, 1800.0);
        let json = serde_json::to_string(&session).unwrap();
        let parsed: WalkSession = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.id(), session.id());
        assert_eq!(parsed.start_time(), session.start_time());
        assert_eq!(parsed.end_time(), session.end_time());
        assert_eq!(parsed.estimated_dog_steps(), session.estimated_dog_steps());
        assert_eq!(parsed.formatted_duration(), session.formatted_duration());
    }
}
