//! Breed catalog: lookup of breed profiles by name.
//!
//! The built-in catalog covers common breeds across every size class. A
//! catalog can also be loaded from a JSON file of breed records.

use crate::types::*;
use crate::{Error, Result};
use once_cell::sync::Lazy;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// Read-only source of breed profiles, shared across estimation calls
pub trait BreedCatalog: Send + Sync {
    /// Find a breed by exact name (case-insensitive)
    fn lookup(&self, name: &str) -> Option<&BreedProfile>;

    /// All breeds, sorted by name
    fn all(&self) -> Vec<&BreedProfile>;

    /// Breeds whose name contains `query` (case-insensitive), sorted by name
    fn search(&self, query: &str) -> Vec<&BreedProfile>;
}

/// In-memory catalog keyed by lowercased breed name
#[derive(Clone, Debug, Default)]
pub struct StaticBreedCatalog {
    breeds: HashMap<String, BreedProfile>,
}

/// Cached built-in catalog
static DEFAULT_BREEDS: Lazy<StaticBreedCatalog> = Lazy::new(build_default_breed_catalog);

/// Get a reference to the cached built-in catalog
pub fn get_default_breed_catalog() -> &'static StaticBreedCatalog {
    &DEFAULT_BREEDS
}

/// Breed record as stored in a catalog file
#[derive(Debug, Deserialize)]
struct BreedRecord {
    name: String,
    size_class: String,
    energy_level: String,
    step_multiplier: f64,
    #[serde(default)]
    description: String,
}

impl StaticBreedCatalog {
    pub fn new(breeds: impl IntoIterator<Item = BreedProfile>) -> Self {
        let breeds = breeds
            .into_iter()
            .map(|b| (normalize(&b.name), b))
            .collect();
        Self { breeds }
    }

    /// Load a catalog from a JSON array of breed records
    ///
    /// Unknown energy levels fall back to moderate. Unknown size classes and
    /// non-positive multipliers are rejected.
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let records: Vec<BreedRecord> = serde_json::from_str(&contents)?;

        let mut breeds = Vec::with_capacity(records.len());
        for record in records {
            let size_class = parse_size_class(&record.size_class).ok_or_else(|| {
                Error::CatalogValidation(format!(
                    "Breed '{}' has unknown size class '{}'",
                    record.name, record.size_class
                ))
            })?;
            breeds.push(BreedProfile {
                energy_level: parse_energy_level(&record.energy_level),
                name: record.name,
                size_class,
                step_multiplier: record.step_multiplier,
                description: record.description,
            });
        }

        let catalog = Self::new(breeds);
        let errors = catalog.validate();
        if !errors.is_empty() {
            return Err(Error::CatalogValidation(errors.join("; ")));
        }

        tracing::info!("Loaded {} breeds from {:?}", catalog.len(), path);
        Ok(catalog)
    }

    pub fn len(&self) -> usize {
        self.breeds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breeds.is_empty()
    }

    /// Validate the catalog for consistency
    ///
    /// Returns a list of validation errors, or empty Vec if valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        for breed in self.breeds.values() {
            if breed.name.trim().is_empty() {
                errors.push("Breed has empty name".to_string());
            }
            if !(breed.step_multiplier.is_finite() && breed.step_multiplier > 0.0) {
                errors.push(format!(
                    "Breed '{}' has non-positive step multiplier {}",
                    breed.name, breed.step_multiplier
                ));
            }
        }

        errors
    }
}

impl BreedCatalog for StaticBreedCatalog {
    fn lookup(&self, name: &str) -> Option<&BreedProfile> {
        self.breeds.get(&normalize(name))
    }

    fn all(&self) -> Vec<&BreedProfile> {
        let mut breeds: Vec<_> = self.breeds.values().collect();
        breeds.sort_by(|a, b| a.name.cmp(&b.name));
        breeds
    }

    fn search(&self, query: &str) -> Vec<&BreedProfile> {
        let needle = normalize(query);
        let mut breeds: Vec<_> = self
            .breeds
            .values()
            .filter(|b| normalize(&b.name).contains(&needle))
            .collect();
        breeds.sort_by(|a, b| a.name.cmp(&b.name));
        breeds
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

fn parse_size_class(s: &str) -> Option<SizeClass> {
    match s.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
        "toy" => Some(SizeClass::Toy),
        "small" => Some(SizeClass::Small),
        "medium" => Some(SizeClass::Medium),
        "large" => Some(SizeClass::Large),
        "extra_large" | "extralarge" | "xl" => Some(SizeClass::ExtraLarge),
        _ => None,
    }
}

fn parse_energy_level(s: &str) -> EnergyLevel {
    match s.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
        "low" => EnergyLevel::Low,
        "moderate" | "medium" => EnergyLevel::Moderate,
        "high" => EnergyLevel::High,
        "very_high" | "veryhigh" => EnergyLevel::VeryHigh,
        other => {
            tracing::warn!("Unknown energy level '{}', treating as moderate", other);
            EnergyLevel::Moderate
        }
    }
}

/// Builds the built-in breed catalog
#[rustfmt::skip]
pub fn build_default_breed_catalog() -> StaticBreedCatalog {
    let breed = |name: &str, size_class, energy_level, step_multiplier, description: &str| {
        BreedProfile {
            name: name.into(),
            size_class,
            energy_level,
            step_multiplier,
            description: description.into(),
        }
    };

    use EnergyLevel::*;
    use SizeClass::*;

    StaticBreedCatalog::new(vec![
        // Toy
        breed("Chihuahua", Toy, Moderate, 4.0,
            "Tiny companion with a quick, short stride."),
        breed("Yorkshire Terrier", Toy, High, 3.8,
            "Spirited terrier that covers ground in rapid little steps."),
        breed("Pomeranian", Toy, Moderate, 3.7,
            "Fluffy toy spitz, lively on short walks."),
        breed("Maltese", Toy, Moderate, 3.6,
            "Gentle toy breed suited to relaxed strolls."),
        breed("Toy Poodle", Toy, High, 3.5,
            "Smart and agile, enjoys brisk outings."),
        // Small
        breed("Shih Tzu", Small, Low, 3.2,
            "Calm lap dog with short legs and a modest exercise need."),
        breed("Dachshund", Small, Moderate, 3.0,
            "Long-bodied scent hound with very short legs."),
        breed("French Bulldog", Small, Low, 2.8,
            "Compact, brachycephalic companion; keep walks moderate."),
        breed("Miniature Schnauzer", Small, High, 2.8,
            "Alert terrier type that likes regular activity."),
        breed("Jack Russell Terrier", Small, VeryHigh, 2.7,
            "Tireless small terrier bred for work."),
        breed("Beagle", Small, High, 2.6,
            "Curious scent hound that loves long sniffing walks."),
        // Medium
        breed("Bulldog", Medium, Low, 2.4,
            "Stocky and low-energy; short walks in cool weather."),
        breed("Cocker Spaniel", Medium, High, 2.3,
            "Cheerful gundog with steady stamina."),
        breed("Border Collie", Medium, VeryHigh, 2.0,
            "Herding dog with exceptional endurance."),
        breed("Australian Shepherd", Medium, VeryHigh, 2.0,
            "Energetic herder that needs plenty of daily exercise."),
        breed("Siberian Husky", Medium, VeryHigh, 1.8,
            "Sled dog with an efficient, ground-covering gait."),
        // Large
        breed("Boxer", Large, High, 1.5,
            "Playful, muscular breed with lots of energy."),
        breed("Standard Poodle", Large, High, 1.5,
            "Athletic and elegant with a long, springy stride."),
        breed("Labrador Retriever", Large, High, 1.4,
            "Friendly retriever that thrives on daily walks and play."),
        breed("Golden Retriever", Large, High, 1.4,
            "Devoted retriever with a smooth, easy stride."),
        breed("German Shepherd", Large, High, 1.3,
            "Versatile working dog with a long trotting gait."),
        // Extra large
        breed("Bernese Mountain Dog", ExtraLarge, Moderate, 1.2,
            "Big, gentle draft dog; steady walks over speed."),
        breed("Newfoundland", ExtraLarge, Low, 1.2,
            "Massive, calm water dog."),
        breed("Saint Bernard", ExtraLarge, Low, 1.2,
            "Giant mountain rescue breed with modest exercise needs."),
        breed("Great Dane", ExtraLarge, Moderate, 1.1,
            "Very tall breed with a long stride; avoid strenuous exercise when young."),
        breed("Mastiff", ExtraLarge, Low, 1.1,
            "Heavy guardian breed that prefers leisurely walks."),
    ])
}
