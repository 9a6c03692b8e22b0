#![forbid(unsafe_code)]

//! Core domain model and business logic for Pawstep.
//!
//! This crate provides:
//! - Domain types (breeds, estimations, tracking modes, totals)
//! - Breed catalog
//! - Dog step estimation engine and daily goals
//! - Motion session state machine
//! - Walk sessions and their persistence (WAL, CSV, pet state)

pub mod types;
pub mod error;
pub mod breeds;
pub mod config;
pub mod logging;
pub mod goal;
pub mod estimation;
pub mod motion;
pub mod walk;
pub mod tracker;
pub mod wal;
pub mod csv_rollup;
pub mod history;
pub mod state;

// Re-export commonly used types
pub use error::{Error, Result, TrackingError, TrackingResult};
pub use types::*;
pub use breeds::{get_default_breed_catalog, BreedCatalog, StaticBreedCatalog};
pub use config::Config;
pub use goal::{analyze_activity_level, calculate_daily_goal};
pub use estimation::{activity_trend, StepEstimator};
pub use motion::{Clock, MotionProvider, SystemClock};
pub use walk::{DataSource, WalkSession};
pub use tracker::{SessionTracker, TrackerEvent};
pub use wal::{JsonlSink, WalkSink};
pub use history::load_recent_walks;
pub use state::PetState;
