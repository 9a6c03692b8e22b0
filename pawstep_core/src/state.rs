//! Pet state persistence with file locking.
//!
//! Stores the selected breed, body condition and the retained window of
//! recent estimations so trends survive restarts.

use crate::breeds::BreedCatalog;
use crate::estimation::StepEstimator;
use crate::{BodyCondition, BreedProfile, DogStepEstimation, Error, Result};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Everything remembered about the user's dog between runs
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PetState {
    #[serde(default)]
    pub breed_name: Option<String>,

    #[serde(default)]
    pub body_condition: BodyCondition,

    /// Oldest first
    #[serde(default)]
    pub recent_estimations: Vec<DogStepEstimation>,
}

impl PetState {
    /// Resolve the stored breed name against a catalog
    pub fn breed<'a>(&self, catalog: &'a dyn BreedCatalog) -> Option<&'a BreedProfile> {
        self.breed_name
            .as_deref()
            .and_then(|name| catalog.lookup(name))
    }

    /// Keep the estimator's window for the next run
    pub fn remember(&mut self, estimator: &StepEstimator) {
        self.recent_estimations = estimator.recent();
    }

    /// Load pet state from a file with shared locking
    ///
    /// Returns default state if file doesn't exist.
    /// If file is corrupted, logs a warning and returns default state.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!("No state file found, using default state");
            return Ok(Self::default());
        }

        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) => {
                tracing::warn!(
                    "Unable to open state file {:?}: {}. Using defaults.",
                    path,
                    e
                );
                return Ok(Self::default());
            }
        };

        if let Err(e) = file.lock_shared() {
            tracing::warn!(
                "Unable to lock state file {:?}: {}. Using defaults.",
                path,
                e
            );
            return Ok(Self::default());
        }

        let mut contents = String::new();
        let mut reader = std::io::BufReader::new(&file);
        if let Err(e) = reader.read_to_string(&mut contents) {
            let _ = file.unlock();
            tracing::warn!(
                "Failed to read state file {:?}: {}. Using defaults.",
                path,
                e
            );
            return Ok(Self::default());
        }

        file.unlock()?;

        match serde_json::from_str::<PetState>(&contents) {
            Ok(state) => {
                tracing::debug!("Loaded pet state from {:?}", path);
                Ok(state)
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to parse state file {:?}: {}. Using defaults.",
                    path,
                    e
                );
                Ok(Self::default())
            }
        }
    }

    /// Save pet state atomically (temp file, fsync, rename)
    pub fn save(&self, path: &Path) -> Result<()> {
        let parent = path
            .parent()
            .ok_or_else(|| Error::State(format!("state path {:?} has no parent", path)))?;
        std::fs::create_dir_all(parent)?;

        let temp = NamedTempFile::new_in(parent)?;
        temp.as_file().lock_exclusive()?;

        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            let contents = serde_json::to_string(self)?;
            writer.write_all(contents.as_bytes())?;
            writer.flush()?;
        }

        temp.as_file().sync_all()?;
        temp.as_file().unlock()?;

        temp.persist(path).map_err(|e| Error::Io(e.error))?;

        tracing::debug!("Saved pet state to {:?}", path);
        Ok(())
    }

    /// Load state, modify it, and save it back
    pub fn update<F>(path: &Path, f: F) -> Result<Self>
    where
        F: FnOnce(&mut PetState) -> Result<()>,
    {
        let mut state = Self::load(path)?;
        f(&mut state)?;
        state.save(path)?;
        Ok(state)
    }
}
