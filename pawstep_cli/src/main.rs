use chrono::{Duration, Local, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use pawstep_core::config::TrackingConfig;
use pawstep_core::motion::{ManualClock, NoBackgroundHost, ScriptedMotion};
use pawstep_core::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "pawstep")]
#[command(about = "Dog step estimation from human pedometer data", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Estimate dog steps from a human step count
    Estimate {
        /// Human steps reported by the pedometer
        #[arg(long)]
        steps: u64,

        /// Distance walked in metres, used to sanity-check the step count
        #[arg(long)]
        distance: Option<f64>,

        /// Breed name (defaults to the saved profile)
        #[arg(long)]
        breed: Option<String>,

        /// Body condition: skinny, ideal, chubby (defaults to the saved profile)
        #[arg(long)]
        condition: Option<String>,

        /// Show the estimate without remembering it
        #[arg(long)]
        dry_run: bool,
    },

    /// Show the recommended daily goal
    Goal {
        #[arg(long)]
        breed: Option<String>,

        #[arg(long)]
        condition: Option<String>,
    },

    /// List or search known breeds
    Breeds {
        #[arg(long)]
        search: Option<String>,
    },

    /// Show or update the saved dog profile
    Profile {
        #[arg(long)]
        breed: Option<String>,

        #[arg(long)]
        condition: Option<String>,
    },

    /// Record a finished walk from manually entered totals
    LogWalk {
        #[arg(long)]
        steps: u64,

        /// Distance in metres
        #[arg(long, default_value_t = 0.0)]
        distance: f64,

        /// Walk duration in minutes
        #[arg(long)]
        minutes: i64,

        #[arg(long)]
        breed: Option<String>,
    },

    /// List walks from the last few days
    Walks {
        #[arg(long, default_value_t = 7)]
        days: i64,

        /// Only walks started on or after this local date (YYYY-MM-DD)
        #[arg(long, conflicts_with = "days")]
        since: Option<NaiveDate>,
    },

    /// Roll up logged walks to CSV
    Rollup {
        /// Clean up processed WAL files after rollup
        #[arg(long)]
        cleanup: bool,
    },
}

struct Paths {
    state: PathBuf,
    wal_dir: PathBuf,
    wal: PathBuf,
    csv: PathBuf,
}

impl Paths {
    fn new(data_dir: &Path) -> Self {
        let wal_dir = data_dir.join("wal");
        Self {
            state: data_dir.join("state.json"),
            wal: wal_dir.join("walks.wal"),
            wal_dir,
            csv: data_dir.join("walks.csv"),
        }
    }
}

fn main() -> Result<()> {
    pawstep_core::logging::init_with_level("warn");

    let cli = Cli::parse();

    let config = Config::load()?;
    let data_dir = cli.data_dir.unwrap_or_else(|| config.data.data_dir.clone());
    let paths = Paths::new(&data_dir);
    let catalog = load_catalog(&config)?;

    match cli.command {
        Commands::Estimate {
            steps,
            distance,
            breed,
            condition,
            dry_run,
        } => cmd_estimate(
            &paths, &catalog, &config, steps, distance, breed, condition, dry_run,
        ),
        Commands::Goal { breed, condition } => cmd_goal(&paths, &catalog, breed, condition),
        Commands::Breeds { search } => cmd_breeds(&catalog, search),
        Commands::Profile { breed, condition } => cmd_profile(&paths, &catalog, breed, condition),
        Commands::LogWalk {
            steps,
            distance,
            minutes,
            breed,
        } => cmd_log_walk(&paths, &catalog, &config, steps, distance, minutes, breed),
        Commands::Walks { days, since } => cmd_walks(&paths, days, since),
        Commands::Rollup { cleanup } => cmd_rollup(&paths, cleanup),
    }
}

fn load_catalog(config: &Config) -> Result<StaticBreedCatalog> {
    let catalog = match &config.estimation.catalog_path {
        Some(path) => StaticBreedCatalog::load_from(path)?,
        None => get_default_breed_catalog().clone(),
    };

    let errors = catalog.validate();
    if !errors.is_empty() {
        eprintln!("Breed catalog validation errors:");
        for error in errors {
            eprintln!("  - {}", error);
        }
        return Err(Error::CatalogValidation("Invalid breed catalog".into()));
    }
    Ok(catalog)
}

fn parse_condition(value: Option<&str>, fallback: BodyCondition) -> Result<BodyCondition> {
    match value.map(|v| v.trim().to_lowercase()) {
        None => Ok(fallback),
        Some(v) => match v.as_str() {
            "skinny" | "thin" => Ok(BodyCondition::Skinny),
            "ideal" | "just_right" | "just-right" => Ok(BodyCondition::Ideal),
            "chubby" | "overweight" => Ok(BodyCondition::Chubby),
            other => Err(Error::Other(format!(
                "Unknown body condition '{}'. Use skinny, ideal or chubby.",
                other
            ))),
        },
    }
}

#[allow(clippy::too_many_arguments)]
fn cmd_estimate(
    paths: &Paths,
    catalog: &StaticBreedCatalog,
    config: &Config,
    steps: u64,
    distance: Option<f64>,
    breed: Option<String>,
    condition: Option<String>,
    dry_run: bool,
) -> Result<()> {
    let mut state = PetState::load(&paths.state)?;
    let condition = parse_condition(condition.as_deref(), state.body_condition)?;
    let breed_name = breed.or_else(|| state.breed_name.clone());

    let mut estimator = StepEstimator::new(config.estimation.recent_capacity);
    estimator.restore(state.recent_estimations.clone());

    let profile = breed_name.as_deref().and_then(|name| catalog.lookup(name));
    let estimation = match (distance, breed_name.as_deref()) {
        (Some(distance), _) => {
            let sample = HumanActivitySample {
                timestamp: Utc::now(),
                human_steps: steps,
                distance_meters: Some(distance),
            };
            estimator.estimate_sample(&sample, profile, condition)
        }
        (None, Some(name)) => estimator.estimate_by_name(catalog, name, steps, condition),
        (None, None) => estimator.estimate_with_condition(steps, None, condition),
    };

    display_estimation(&estimation);

    println!();
    println!("Insights:");
    for insight in estimator.insights(profile) {
        println!("  - {}", insight.message());
    }

    if dry_run {
        println!("\n[Dry run - estimate not saved]");
        return Ok(());
    }

    state.remember(&estimator);
    state.save(&paths.state)?;
    Ok(())
}

fn cmd_goal(
    paths: &Paths,
    catalog: &StaticBreedCatalog,
    breed: Option<String>,
    condition: Option<String>,
) -> Result<()> {
    let state = PetState::load(&paths.state)?;
    let condition = parse_condition(condition.as_deref(), state.body_condition)?;
    let breed_name = breed.or_else(|| state.breed_name.clone());
    let profile = breed_name.as_deref().and_then(|name| catalog.lookup(name));

    let goal = calculate_daily_goal(profile, condition);
    match profile {
        Some(p) => println!(
            "Daily goal for {} ({:?}, {:?} energy, {:?}): {} paw steps",
            p.name, p.size_class, p.energy_level, condition, goal
        ),
        None => println!("Daily goal (unknown breed, {:?}): {} paw steps", condition, goal),
    }
    Ok(())
}

fn cmd_breeds(catalog: &StaticBreedCatalog, search: Option<String>) -> Result<()> {
    let breeds = match search.as_deref() {
        Some(query) => catalog.search(query),
        None => catalog.all(),
    };

    if breeds.is_empty() {
        println!("No breeds found.");
        return Ok(());
    }

    for breed in breeds {
        println!(
            "{:<24} {:<11} {:<9} x{:.1}  {}",
            breed.name,
            format!("{:?}", breed.size_class),
            format!("{:?}", breed.energy_level),
            breed.step_multiplier,
            breed.description
        );
    }
    Ok(())
}

fn cmd_profile(
    paths: &Paths,
    catalog: &StaticBreedCatalog,
    breed: Option<String>,
    condition: Option<String>,
) -> Result<()> {
    let updating = breed.is_some() || condition.is_some();

    let state = if updating {
        let resolved = match breed.as_deref() {
            Some(name) => match catalog.lookup(name) {
                Some(profile) => Some(profile.name.clone()),
                None => {
                    eprintln!("Breed '{}' not in catalog; estimates will use defaults.", name);
                    Some(name.trim().to_string())
                }
            },
            None => None,
        };

        PetState::update(&paths.state, |state| {
            if let Some(name) = resolved {
                state.breed_name = Some(name);
            }
            state.body_condition = parse_condition(condition.as_deref(), state.body_condition)?;
            Ok(())
        })?
    } else {
        PetState::load(&paths.state)?
    };

    let goal = calculate_daily_goal(state.breed(catalog), state.body_condition);
    println!("Breed: {}", state.breed_name.as_deref().unwrap_or("(not set)"));
    println!("Body condition: {:?}", state.body_condition);
    println!("Daily goal: {}", goal);
    if updating {
        println!("\n✓ Profile saved");
    }
    Ok(())
}

fn cmd_log_walk(
    paths: &Paths,
    catalog: &StaticBreedCatalog,
    config: &Config,
    steps: u64,
    distance: f64,
    minutes: i64,
    breed: Option<String>,
) -> Result<()> {
    if minutes <= 0 {
        return Err(Error::Other("Walk duration must be at least one minute".into()));
    }

    let state = PetState::load(&paths.state)?;
    let breed_name = breed.or_else(|| state.breed_name.clone());
    let profile = breed_name
        .as_deref()
        .and_then(|name| catalog.lookup(name))
        .cloned();

    // Replay the walk through the session machine with manual totals
    let out_of_range = || {
        Error::Other(format!(
            "Walk duration of {} minutes is out of range",
            minutes
        ))
    };
    let duration = Duration::try_minutes(minutes).ok_or_else(out_of_range)?;
    let start = Utc::now().checked_sub_signed(duration).ok_or_else(out_of_range)?;
    let clock = Arc::new(ManualClock::new(start));
    let motion = Arc::new(ScriptedMotion::new().with_data_source(DataSource::Manual));
    let settings = TrackingConfig {
        resume_daily_after_session: false,
        ..config.tracking.clone()
    };
    let tracker = SessionTracker::new(
        motion.clone(),
        Arc::new(NoBackgroundHost),
        clock.clone(),
        settings,
    )
    .with_breed(profile);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()?;

    let walk = runtime.block_on(async {
        tracker.start_session().await?;
        clock.advance(duration);
        motion.emit(steps, distance);
        tracker.stop_session().await
    })?;

    let mut sink = JsonlSink::new(&paths.wal);
    sink.append(&walk)?;
    tracing::info!("Logged walk {} to {:?}", walk.id(), sink.path());

    println!("✓ Walk logged");
    println!("  {}", walk.summary());
    Ok(())
}

fn cmd_walks(paths: &Paths, days: i64, since: Option<NaiveDate>) -> Result<()> {
    let walks = match since {
        Some(date) => {
            let since = local_midnight(date)?;
            let window = (Utc::now() - since).num_days() + 1;
            let walks = load_recent_walks(&paths.wal, &paths.csv, window)?;
            pawstep_core::history::walks_since(&walks, since)
        }
        None => load_recent_walks(&paths.wal, &paths.csv, days)?,
    };

    if walks.is_empty() {
        match since {
            Some(date) => println!("No walks since {}.", date),
            None => println!("No walks in the last {} days.", days),
        }
        return Ok(());
    }

    for walk in &walks {
        println!(
            "{}  {}",
            walk.start_time()
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M"),
            walk.summary()
        );
    }

    let totals = pawstep_core::history::summarize(&walks);
    println!();
    println!(
        "{} walks, {} paw steps, {:.2} km",
        totals.walks,
        totals.dog_steps,
        totals.distance_meters / 1000.0
    );
    Ok(())
}

fn local_midnight(date: NaiveDate) -> Result<chrono::DateTime<Utc>> {
    date.and_hms_opt(0, 0, 0)
        .and_then(|midnight| midnight.and_local_timezone(Local).earliest())
        .map(|midnight| midnight.with_timezone(&Utc))
        .ok_or_else(|| Error::Other(format!("No local midnight on {}", date)))
}

fn cmd_rollup(paths: &Paths, cleanup: bool) -> Result<()> {
    if !paths.wal.exists() {
        println!("No WAL file found - nothing to roll up.");
        return Ok(());
    }

    let count = pawstep_core::csv_rollup::wal_to_csv_and_archive(&paths.wal, &paths.csv)?;

    println!("✓ Rolled up {} walks to CSV", count);
    println!("  CSV: {}", paths.csv.display());

    if cleanup {
        let cleaned = pawstep_core::csv_rollup::cleanup_processed_wals(&paths.wal_dir)?;
        if cleaned > 0 {
            println!("✓ Cleaned up {} processed WAL files", cleaned);
        }
    }

    Ok(())
}

fn display_estimation(estimation: &DogStepEstimation) {
    println!("\n╭─────────────────────────────────────────╮");
    println!("│  PAW STEP ESTIMATE");
    println!("╰─────────────────────────────────────────╯");
    println!();
    println!("  Breed: {} (x{:.1})", estimation.breed_name, estimation.breed_multiplier);
    println!("  Human steps: {}", estimation.human_steps);
    println!("  Paw steps: {}", estimation.estimated_dog_steps);
    println!("  Confidence: {:?}", estimation.confidence);
    println!("  Activity: {:?}", estimation.activity_level);
    println!("  Daily goal: {}", estimation.recommended_goal);
}
