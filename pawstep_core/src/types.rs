//! Core domain types for the Pawstep system.
//!
//! This module defines the fundamental types used throughout the system:
//! - Breed profiles and their classifications
//! - Human activity samples and dog step estimations
//! - Confidence, activity level, trend and insight value types
//! - Tracking modes and the live totals owned by the session machine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Breed Types
// ============================================================================

/// Size class of a breed; drives the base daily goal
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SizeClass {
    Toy,
    Small,
    Medium,
    Large,
    ExtraLarge,
}

/// Typical energy level of a breed
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EnergyLevel {
    Low,
    Moderate,
    High,
    VeryHigh,
}

/// Body condition of the individual dog
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BodyCondition {
    Skinny,
    #[default]
    Ideal,
    Chubby,
}

/// A breed definition (e.g., "Labrador Retriever")
///
/// `step_multiplier` is dog steps per human step and is always positive for
/// catalog entries that pass validation.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct BreedProfile {
    pub name: String,
    pub size_class: SizeClass,
    pub energy_level: EnergyLevel,
    pub step_multiplier: f64,
    pub description: String,
}

impl BreedProfile {
    /// Whether the catalog entry carries a usable description
    pub fn has_description(&self) -> bool {
        !self.description.trim().is_empty()
    }
}

// ============================================================================
// Estimation Types
// ============================================================================

/// Human pedometer reading for a day or a range
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct HumanActivitySample {
    pub timestamp: DateTime<Utc>,
    pub human_steps: u64,
    /// `None` (or zero) when the pedometer could not estimate distance
    pub distance_meters: Option<f64>,
}

/// Coarse reliability rating of an estimation
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

/// How a step count compares to the daily goal
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ActivityLevel {
    VeryLow,
    Low,
    Moderate,
    High,
    VeryHigh,
}

/// A single dog step estimation
///
/// Superseded by newer estimations, never edited.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DogStepEstimation {
    pub human_steps: u64,
    pub estimated_dog_steps: u64,
    pub breed_multiplier: f64,
    pub breed_name: String,
    pub confidence: Confidence,
    pub activity_level: ActivityLevel,
    pub recommended_goal: u32,
    pub timestamp: DateTime<Utc>,
}

/// Direction of recent activity
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActivityTrend {
    Increasing,
    Stable,
    Decreasing,
}

/// Plain-data insight a notification collaborator may surface
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum Insight {
    GoalAchievement(String),
    ImprovementNeeded(String),
    LowActivity(String),
    TrendPositive(String),
    TrendNegative(String),
    TrendStable(String),
}

impl Insight {
    pub fn message(&self) -> &str {
        match self {
            Insight::GoalAchievement(msg)
            | Insight::ImprovementNeeded(msg)
            | Insight::LowActivity(msg)
            | Insight::TrendPositive(msg)
            | Insight::TrendNegative(msg)
            | Insight::TrendStable(msg) => msg,
        }
    }
}

// ============================================================================
// Tracking Types
// ============================================================================

/// Which feed the session machine is currently running
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TrackingMode {
    #[default]
    Inactive,
    Daily,
    Session,
}

/// Running totals since the start of the current day
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DailyTotals {
    pub start_of_day: DateTime<Utc>,
    pub steps: u64,
    pub distance_meters: f64,
    pub last_update: DateTime<Utc>,
}

/// Running totals of the walk currently in progress
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ActiveSessionTotals {
    pub start_timestamp: DateTime<Utc>,
    pub steps: u64,
    pub distance_meters: f64,
    pub duration_seconds: f64,
}

/// Platform motion permission state
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationStatus {
    NotDetermined,
    Authorized,
    Denied,
    Restricted,
}

/// One cumulative pedometer reading since the subscription start
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct MotionReading {
    pub steps: u64,
    pub distance_meters: f64,
}
