//! Daily goal and activity level calculations.
//!
//! Goal = base goal for the size class, scaled by body condition and energy
//! level, rounded to the nearest step.

use crate::{ActivityLevel, BodyCondition, BreedProfile, EnergyLevel, SizeClass};

/// Goal used when the breed is not in the catalog
pub const DEFAULT_DAILY_GOAL: u32 = 6000;

/// Base daily goal in dog steps for a size class
pub fn base_goal_for_size(size: SizeClass) -> u32 {
    match size {
        SizeClass::Toy => 3000,
        SizeClass::Small => 5000,
        SizeClass::Medium => 8000,
        SizeClass::Large => 12000,
        SizeClass::ExtraLarge => 10000,
    }
}

/// Skinny dogs get less exercise emphasis, chubby dogs more
pub fn body_condition_factor(condition: BodyCondition) -> f64 {
    match condition {
        BodyCondition::Skinny => 0.8,
        BodyCondition::Ideal => 1.0,
        BodyCondition::Chubby => 1.2,
    }
}

pub fn energy_factor(energy: EnergyLevel) -> f64 {
    match energy {
        EnergyLevel::Low => 0.7,
        EnergyLevel::Moderate => 1.0,
        EnergyLevel::High => 1.3,
        EnergyLevel::VeryHigh => 1.5,
    }
}

/// Recommended dog steps per day
pub fn calculate_daily_goal(breed: Option<&BreedProfile>, condition: BodyCondition) -> u32 {
    let (base, energy) = match breed {
        Some(b) => (base_goal_for_size(b.size_class), energy_factor(b.energy_level)),
        None => (DEFAULT_DAILY_GOAL, 1.0),
    };

    let goal = f64::from(base) * body_condition_factor(condition) * energy;
    goal.round() as u32
}

/// Classify a ratio of steps to goal
pub fn activity_level_for_ratio(ratio: f64) -> ActivityLevel {
    if ratio < 0.3 {
        ActivityLevel::VeryLow
    } else if ratio < 0.6 {
        ActivityLevel::Low
    } else if ratio < 1.2 {
        ActivityLevel::Moderate
    } else if ratio < 1.8 {
        ActivityLevel::High
    } else {
        ActivityLevel::VeryHigh
    }
}

/// Classify dog steps against the ideal-condition goal for the breed
pub fn analyze_activity_level(dog_steps: u64, breed: Option<&BreedProfile>) -> ActivityLevel {
    let goal = calculate_daily_goal(breed, BodyCondition::Ideal);
    if goal == 0 {
        return ActivityLevel::Moderate;
    }
    activity_level_for_ratio(dog_steps as f64 / f64::from(goal))
}
