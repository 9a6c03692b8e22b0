//! Dog step estimation engine.
//!
//! Converts human pedometer readings into estimated dog steps using the
//! breed's step multiplier, then rates the estimate:
//! - Confidence from step plausibility and breed data completeness
//! - Activity level against the ideal-condition daily goal
//! - Recommended goal for the dog's body condition
//!
//! Unknown breeds never fail; they fall back to fixed defaults. The
//! estimator keeps a bounded window of recent estimations for trend and
//! insight summaries.

use crate::breeds::BreedCatalog;
use crate::goal::{analyze_activity_level, calculate_daily_goal, DEFAULT_DAILY_GOAL};
use crate::motion::{Clock, SystemClock};
use crate::{
    ActivityLevel, ActivityTrend, BodyCondition, BreedProfile, Confidence, DogStepEstimation,
    HumanActivitySample, Insight,
};
use chrono::{DateTime, Duration, Utc};
use std::collections::VecDeque;
use std::sync::Arc;

/// Multiplier applied when the breed is not in the catalog
pub const DEFAULT_MULTIPLIER: f64 = 1.5;

/// Breed name recorded when no breed profile is available
pub const UNKNOWN_BREED_NAME: &str = "Unknown";

pub const DEFAULT_RECENT_CAPACITY: usize = 10;

/// Assumed human stride when there are no steps to divide by
pub const DEFAULT_STEP_LENGTH_METERS: f64 = 0.65;

/// Plausible average human stride, in metres
const STEP_LENGTH_RANGE: std::ops::RangeInclusive<f64> = 0.5..=1.0;

const TREND_WINDOW: usize = 3;
const TREND_THRESHOLD_PERCENT: f64 = 10.0;

/// Multiplier for a breed, or the default for unknown breeds
pub fn multiplier_for(breed: Option<&BreedProfile>) -> f64 {
    breed.map_or(DEFAULT_MULTIPLIER, |b| b.step_multiplier)
}

/// How believable a day's human step count is
pub fn step_plausibility_score(human_steps: u64) -> f64 {
    match human_steps {
        1000..=20000 => 1.0,
        500..=999 | 20001..=30000 => 0.7,
        _ => 0.3,
    }
}

pub fn breed_completeness_score(breed: &BreedProfile) -> f64 {
    if breed.has_description() {
        1.0
    } else {
        0.7
    }
}

/// Confidence for an estimation; always low for unknown breeds
pub fn confidence_for(human_steps: u64, breed: Option<&BreedProfile>) -> Confidence {
    let Some(breed) = breed else {
        return Confidence::Low;
    };

    let score = (step_plausibility_score(human_steps) + breed_completeness_score(breed)) / 2.0;
    if score >= 0.8 {
        Confidence::High
    } else if score >= 0.5 {
        Confidence::Medium
    } else {
        Confidence::Low
    }
}

/// Build an estimation without touching any retained history
pub fn build_estimation(
    human_steps: u64,
    breed: Option<&BreedProfile>,
    condition: BodyCondition,
    timestamp: DateTime<Utc>,
) -> DogStepEstimation {
    let breed_multiplier = multiplier_for(breed);
    let estimated_dog_steps = (human_steps as f64 * breed_multiplier).round() as u64;

    let (activity_level, recommended_goal) = match breed {
        Some(_) => (
            analyze_activity_level(estimated_dog_steps, breed),
            calculate_daily_goal(breed, condition),
        ),
        None => (ActivityLevel::Moderate, DEFAULT_DAILY_GOAL),
    };

    DogStepEstimation {
        human_steps,
        estimated_dog_steps,
        breed_multiplier,
        breed_name: breed
            .map(|b| b.name.clone())
            .unwrap_or_else(|| UNKNOWN_BREED_NAME.to_string()),
        confidence: confidence_for(human_steps, breed),
        activity_level,
        recommended_goal,
        timestamp,
    }
}

/// Downgrade High confidence to Medium when the stride implied by the
/// sample's distance is implausible. Medium and Low are left alone.
fn cross_validate_distance(estimation: &mut DogStepEstimation, sample: &HumanActivitySample) {
    let distance = match sample.distance_meters {
        Some(d) if d > 0.0 => d,
        _ => return,
    };

    let step_length = if sample.human_steps == 0 {
        DEFAULT_STEP_LENGTH_METERS
    } else {
        distance / sample.human_steps as f64
    };

    if !STEP_LENGTH_RANGE.contains(&step_length) && estimation.confidence == Confidence::High {
        tracing::debug!(
            "Average step length {:.2} m outside plausible range, lowering confidence",
            step_length
        );
        estimation.confidence = Confidence::Medium;
    }
}

/// Compare the oldest and newest of the last three estimations
pub fn activity_trend(recent: &[DogStepEstimation]) -> ActivityTrend {
    if recent.len() < TREND_WINDOW {
        return ActivityTrend::Stable;
    }

    let window = &recent[recent.len() - TREND_WINDOW..];
    let oldest = window[0].estimated_dog_steps as f64;
    let newest = window[TREND_WINDOW - 1].estimated_dog_steps as f64;

    if oldest == 0.0 {
        return if newest > 0.0 {
            ActivityTrend::Increasing
        } else {
            ActivityTrend::Stable
        };
    }

    let change = (newest - oldest) / oldest * 100.0;
    if change >= TREND_THRESHOLD_PERCENT {
        ActivityTrend::Increasing
    } else if change <= -TREND_THRESHOLD_PERCENT {
        ActivityTrend::Decreasing
    } else {
        ActivityTrend::Stable
    }
}

/// Estimation engine with a bounded window of recent results
pub struct StepEstimator {
    recent: VecDeque<DogStepEstimation>,
    capacity: usize,
    clock: Arc<dyn Clock>,
}

impl Default for StepEstimator {
    fn default() -> Self {
        Self::new(DEFAULT_RECENT_CAPACITY)
    }
}

impl StepEstimator {
    pub fn new(capacity: usize) -> Self {
        Self::with_clock(capacity, Arc::new(SystemClock))
    }

    pub fn with_clock(capacity: usize, clock: Arc<dyn Clock>) -> Self {
        let capacity = capacity.max(1);
        Self {
            recent: VecDeque::with_capacity(capacity),
            capacity,
            clock,
        }
    }

    /// Seed the window from persisted estimations (oldest first)
    pub fn restore(&mut self, estimations: impl IntoIterator<Item = DogStepEstimation>) {
        for estimation in estimations {
            self.record(estimation);
        }
    }

    /// Estimate for an ideal-condition dog
    pub fn estimate(
        &mut self,
        human_steps: u64,
        breed: Option<&BreedProfile>,
    ) -> DogStepEstimation {
        self.estimate_with_condition(human_steps, breed, BodyCondition::Ideal)
    }

    /// Estimate with an explicit body condition for the recommended goal
    pub fn estimate_with_condition(
        &mut self,
        human_steps: u64,
        breed: Option<&BreedProfile>,
        condition: BodyCondition,
    ) -> DogStepEstimation {
        let estimation = build_estimation(human_steps, breed, condition, self.clock.now());
        self.record(estimation.clone());
        estimation
    }

    /// Estimate from a sample, cross-checking steps against distance
    pub fn estimate_sample(
        &mut self,
        sample: &HumanActivitySample,
        breed: Option<&BreedProfile>,
        condition: BodyCondition,
    ) -> DogStepEstimation {
        let mut estimation =
            build_estimation(sample.human_steps, breed, condition, self.clock.now());
        cross_validate_distance(&mut estimation, sample);
        self.record(estimation.clone());
        estimation
    }

    /// Estimate by breed name, keeping the requested name for unknown breeds
    pub fn estimate_by_name(
        &mut self,
        catalog: &dyn BreedCatalog,
        breed_name: &str,
        human_steps: u64,
        condition: BodyCondition,
    ) -> DogStepEstimation {
        let breed = catalog.lookup(breed_name);
        if breed.is_none() {
            tracing::info!("Breed '{}' not in catalog, using defaults", breed_name);
        }

        let mut estimation = build_estimation(human_steps, breed, condition, self.clock.now());
        if breed.is_none() && !breed_name.trim().is_empty() {
            estimation.breed_name = breed_name.trim().to_string();
        }
        self.record(estimation.clone());
        estimation
    }

    fn record(&mut self, estimation: DogStepEstimation) {
        while self.recent.len() >= self.capacity {
            self.recent.pop_front();
        }
        self.recent.push_back(estimation);
    }

    /// Retained estimations, oldest first
    pub fn recent(&self) -> Vec<DogStepEstimation> {
        self.recent.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.recent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recent.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn activity_trend(&self) -> ActivityTrend {
        let recent: Vec<_> = self.recent.iter().cloned().collect();
        activity_trend(&recent)
    }

    /// Mean estimated dog steps over retained estimations from the last 7 days
    pub fn weekly_average(&self) -> f64 {
        let cutoff = self.clock.now() - Duration::days(7);
        let week: Vec<u64> = self
            .recent
            .iter()
            .filter(|e| e.timestamp >= cutoff)
            .map(|e| e.estimated_dog_steps)
            .collect();

        if week.is_empty() {
            return 0.0;
        }
        week.iter().sum::<u64>() as f64 / week.len() as f64
    }

    /// One goal-tier insight followed by one trend insight
    pub fn insights(&self, breed: Option<&BreedProfile>) -> Vec<Insight> {
        let goal = calculate_daily_goal(breed, BodyCondition::Ideal);
        let average = self.weekly_average();
        let ratio = if goal == 0 {
            0.0
        } else {
            average / f64::from(goal)
        };
        let percent = (ratio * 100.0).round();

        let goal_insight = if ratio >= 0.8 {
            Insight::GoalAchievement(format!(
                "Averaging {:.0} paw steps a day, {}% of the {} step goal. Great work!",
                average, percent, goal
            ))
        } else if ratio >= 0.5 {
            Insight::ImprovementNeeded(format!(
                "Averaging {:.0} paw steps a day, {}% of the {} step goal. A few longer walks will close the gap.",
                average, percent, goal
            ))
        } else {
            Insight::LowActivity(format!(
                "Averaging {:.0} paw steps a day, only {}% of the {} step goal.",
                average, percent, goal
            ))
        };

        let trend_insight = match self.activity_trend() {
            ActivityTrend::Increasing => {
                Insight::TrendPositive("Activity is trending up compared to recent days.".into())
            }
            ActivityTrend::Decreasing => {
                Insight::TrendNegative("Activity is trending down compared to recent days.".into())
            }
            ActivityTrend::Stable => {
                Insight::TrendStable("Activity has been steady recently.".into())
            }
        };

        vec![goal_insight, trend_insight]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breeds::get_default_breed_catalog;
    use crate::motion::ManualClock;
    use crate::{EnergyLevel, SizeClass};

    fn labrador() -> BreedProfile {
        get_default_breed_catalog()
            .lookup("Labrador Retriever")
            .cloned()
            .unwrap()
    }

    fn estimator_at(now: DateTime<Utc>) -> (StepEstimator, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(now));
        (StepEstimator::with_clock(10, clock.clone()), clock)
    }

    #[test]
    fn test_labrador_scenario() {
        let mut estimator = StepEstimator::default();
        let lab = labrador();
        let e = estimator.estimate(5000, Some(&lab));
        assert_eq!(e.estimated_dog_steps, 7000);
        assert_eq!(e.breed_multiplier, 1.4);
        assert_eq!(e.confidence, Confidence::High);
        // Large, high energy: 12000 * 1.3
        assert_eq!(e.recommended_goal, 15600);
        assert_eq!(e.activity_level, ActivityLevel::Low);
    }

    #[test]
    fn test_chihuahua_scenario() {
        let mut estimator = StepEstimator::default();
        let chi = get_default_breed_catalog().lookup("Chihuahua").cloned();
        let e = estimator.estimate(1000, chi.as_ref());
        assert_eq!(e.estimated_dog_steps, 4000);
    }

    #[test]
    fn test_unknown_breed_defaults() {
        let mut estimator = StepEstimator::default();
        let e = estimator.estimate_by_name(
            get_default_breed_catalog(),
            "Unicorn",
            2000,
            BodyCondition::Chubby,
        );
        assert_eq!(e.estimated_dog_steps, 3000);
        assert_eq!(e.breed_multiplier, DEFAULT_MULTIPLIER);
        assert_eq!(e.confidence, Confidence::Low);
        assert_eq!(e.activity_level, ActivityLevel::Moderate);
        assert_eq!(e.recommended_goal, 6000);
        assert_eq!(e.breed_name, "Unicorn");
    }

    #[test]
    fn test_estimate_matches_rounded_product() {
        let mut estimator = StepEstimator::default();
        for breed in get_default_breed_catalog().all() {
            for steps in [0u64, 1, 333, 999, 5000, 12345, 40000] {
                let e = estimator.estimate(steps, Some(breed));
                assert_eq!(
                    e.estimated_dog_steps,
                    (steps as f64 * breed.step_multiplier).round() as u64
                );
            }
        }
    }

    #[test]
    fn test_estimate_is_deterministic() {
        let mut estimator = StepEstimator::default();
        let lab = labrador();
        let a = estimator.estimate_with_condition(8000, Some(&lab), BodyCondition::Skinny);
        let b = estimator.estimate_with_condition(8000, Some(&lab), BodyCondition::Skinny);
        assert_eq!(a.estimated_dog_steps, b.estimated_dog_steps);
        assert_eq!(a.confidence, b.confidence);
        assert_eq!(a.activity_level, b.activity_level);
        assert_eq!(a.recommended_goal, b.recommended_goal);
    }

    #[test]
    fn test_confidence_buckets() {
        let mut breed = labrador();
        assert_eq!(confidence_for(5000, Some(&breed)), Confidence::High);
        assert_eq!(confidence_for(700, Some(&breed)), Confidence::High); // (0.7 + 1.0) / 2
        assert_eq!(confidence_for(100, Some(&breed)), Confidence::Medium); // (0.3 + 1.0) / 2

        breed.description.clear();
        assert_eq!(confidence_for(5000, Some(&breed)), Confidence::High); // 0.85
        assert_eq!(confidence_for(25000, Some(&breed)), Confidence::Medium); // 0.7
        assert_eq!(confidence_for(50000, Some(&breed)), Confidence::Medium); // 0.5

        assert_eq!(confidence_for(5000, None), Confidence::Low);
    }

    #[test]
    fn test_plausibility_edges() {
        assert_eq!(step_plausibility_score(1000), 1.0);
        assert_eq!(step_plausibility_score(20000), 1.0);
        assert_eq!(step_plausibility_score(500), 0.7);
        assert_eq!(step_plausibility_score(20001), 0.7);
        assert_eq!(step_plausibility_score(30000), 0.7);
        assert_eq!(step_plausibility_score(499), 0.3);
        assert_eq!(step_plausibility_score(30001), 0.3);
    }

    #[test]
    fn test_sample_with_implausible_stride_downgrades_high() {
        let mut estimator = StepEstimator::default();
        let lab = labrador();
        let sample = HumanActivitySample {
            timestamp: Utc::now(),
            human_steps: 5000,
            // 2 m per step
            distance_meters: Some(10000.0),
        };
        let e = estimator.estimate_sample(&sample, Some(&lab), BodyCondition::Ideal);
        assert_eq!(e.confidence, Confidence::Medium);
        assert_eq!(estimator.recent().last().unwrap().confidence, Confidence::Medium);
    }

    #[test]
    fn test_sample_with_plausible_stride_keeps_high() {
        let mut estimator = StepEstimator::default();
        let lab = labrador();
        let sample = HumanActivitySample {
            timestamp: Utc::now(),
            human_steps: 5000,
            distance_meters: Some(3500.0),
        };
        let e = estimator.estimate_sample(&sample, Some(&lab), BodyCondition::Ideal);
        assert_eq!(e.confidence, Confidence::High);
    }

    #[test]
    fn test_sample_never_downgrades_medium() {
        let mut estimator = StepEstimator::default();
        let lab = labrador();
        let sample = HumanActivitySample {
            timestamp: Utc::now(),
            human_steps: 100,
            distance_meters: Some(1000.0),
        };
        let e = estimator.estimate_sample(&sample, Some(&lab), BodyCondition::Ideal);
        assert_eq!(e.confidence, Confidence::Medium);
    }

    #[test]
    fn test_sample_without_distance_skips_check() {
        let mut estimator = StepEstimator::default();
        let lab = labrador();
        let sample = HumanActivitySample {
            timestamp: Utc::now(),
            human_steps: 5000,
            distance_meters: None,
        };
        let e = estimator.estimate_sample(&sample, Some(&lab), BodyCondition::Ideal);
        assert_eq!(e.confidence, Confidence::High);
    }

    #[test]
    fn test_window_evicts_oldest() {
        let mut estimator = StepEstimator::new(3);
        let lab = labrador();
        for steps in [100, 200, 300, 400] {
            estimator.estimate(steps, Some(&lab));
        }
        let steps: Vec<_> = estimator.recent().iter().map(|e| e.human_steps).collect();
        assert_eq!(steps, vec![200, 300, 400]);
        assert_eq!(estimator.len(), 3);
    }

    #[test]
    fn test_restore_respects_capacity() {
        let mut source = StepEstimator::new(10);
        let lab = labrador();
        for steps in 1..=6 {
            source.estimate(steps * 1000, Some(&lab));
        }

        let mut restored = StepEstimator::new(4);
        restored.restore(source.recent());
        let steps: Vec<_> = restored.recent().iter().map(|e| e.human_steps).collect();
        assert_eq!(steps, vec![3000, 4000, 5000, 6000]);
    }

    #[test]
    fn test_trend_increasing() {
        // Multiplier 1.0 so dog steps equal human steps
        let breed = BreedProfile {
            name: "Even".into(),
            size_class: SizeClass::Medium,
            energy_level: EnergyLevel::Moderate,
            step_multiplier: 1.0,
            description: "Walks in lockstep".into(),
        };
        let mut estimator = StepEstimator::default();
        for steps in [1000, 1000, 1300] {
            estimator.estimate(steps, Some(&breed));
        }
        assert_eq!(estimator.activity_trend(), ActivityTrend::Increasing);
    }

    #[test]
    fn test_trend_decreasing_and_stable() {
        let lab = labrador();
        let mut estimator = StepEstimator::default();
        for steps in [5000, 5000, 4000] {
            estimator.estimate(steps, Some(&lab));
        }
        assert_eq!(estimator.activity_trend(), ActivityTrend::Decreasing);

        let mut estimator = StepEstimator::default();
        for steps in [5000, 9000, 5200] {
            estimator.estimate(steps, Some(&lab));
        }
        assert_eq!(estimator.activity_trend(), ActivityTrend::Stable);
    }

    #[test]
    fn test_trend_needs_three_samples() {
        let lab = labrador();
        let mut estimator = StepEstimator::default();
        estimator.estimate(1000, Some(&lab));
        estimator.estimate(9000, Some(&lab));
        assert_eq!(estimator.activity_trend(), ActivityTrend::Stable);
    }

    #[test]
    fn test_trend_uses_last_three_only() {
        let lab = labrador();
        let mut estimator = StepEstimator::default();
        for steps in [100, 5000, 5000, 5000] {
            estimator.estimate(steps, Some(&lab));
        }
        assert_eq!(estimator.activity_trend(), ActivityTrend::Stable);
    }

    #[test]
    fn test_insights_goal_achievement_and_trend() {
        let (mut estimator, _clock) = estimator_at(Utc::now());
        let lab = labrador();
        // Ideal goal 15600; 10000 human steps -> 14000 dog steps (~90%)
        for _ in 0..3 {
            estimator.estimate(10000, Some(&lab));
        }
        let insights = estimator.insights(Some(&lab));
        assert_eq!(insights.len(), 2);
        assert!(matches!(insights[0], Insight::GoalAchievement(_)));
        assert!(matches!(insights[1], Insight::TrendStable(_)));
        assert!(insights[0].message().contains("15600"));
    }

    #[test]
    fn test_insights_improvement_needed() {
        let (mut estimator, _clock) = estimator_at(Utc::now());
        let lab = labrador();
        // 8400, 9100, 9800 dog steps: average ~58% of 15600
        for steps in [6000, 6500, 7000] {
            estimator.estimate(steps, Some(&lab));
        }
        let insights = estimator.insights(Some(&lab));
        assert!(matches!(insights[0], Insight::ImprovementNeeded(_)));
        assert!(matches!(insights[1], Insight::TrendPositive(_)));
    }

    #[test]
    fn test_insights_low_activity_without_history() {
        let estimator = StepEstimator::default();
        let insights = estimator.insights(None);
        assert!(matches!(insights[0], Insight::LowActivity(_)));
        assert!(matches!(insights[1], Insight::TrendStable(_)));
    }

    #[test]
    fn test_weekly_average_ignores_old_estimations() {
        let start = Utc::now();
        let (mut estimator, clock) = estimator_at(start);
        let lab = labrador();

        estimator.estimate(10000, Some(&lab)); // 14000, will age out
        clock.advance(Duration::days(8));
        estimator.estimate(1000, Some(&lab)); // 1400
        estimator.estimate(2000, Some(&lab)); // 2800

        assert_eq!(estimator.weekly_average(), 2100.0);
        let insights = estimator.insights(Some(&lab));
        assert!(matches!(insights[0], Insight::LowActivity(_)));
        assert!(matches!(insights[1], Insight::TrendNegative(_)));
    }
}
