//! Motion session state machine.
//!
//! Tracks one of three modes on top of the pedometer feed:
//! - `Inactive`: no subscription
//! - `Daily`: cumulative totals since local midnight
//! - `Session`: totals of one walk, finalized into a [`WalkSession`] on stop
//!
//! All totals live behind a single mutex. Every subscription is tagged with
//! a generation number; updates carrying an old generation are dropped, so
//! callbacks that arrive after a mode switch never touch the new totals.
//! Transitions are serialized as a whole, so a mode change and the feed
//! (un)subscription that goes with it are never interleaved with another
//! transition.

use crate::config::TrackingConfig;
use crate::motion::{BackgroundHost, BackgroundTaskId, Clock, MotionProvider, MotionUpdate};
use crate::walk::WalkSession;
use crate::{
    ActiveSessionTotals, AuthorizationStatus, BreedProfile, DailyTotals, HumanActivitySample,
    MotionReading, TrackingError, TrackingMode, TrackingResult,
};
use chrono::{DateTime, Local, Utc};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::broadcast;

const EVENT_CAPACITY: usize = 64;

/// State change notifications for observers such as a UI shell
#[derive(Clone, Debug, PartialEq)]
pub enum TrackerEvent {
    ModeChanged {
        from: TrackingMode,
        to: TrackingMode,
    },
    DailyUpdated(DailyTotals),
    SessionStarted {
        start_time: DateTime<Utc>,
    },
    SessionUpdated(ActiveSessionTotals),
    SessionStopped(WalkSession),
    /// Daily tracking restarted after a walk session stopped
    DailyResumed,
}

/// Local midnight of the day containing `now`
pub fn start_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    now.with_timezone(&Local)
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .and_then(|midnight| midnight.and_local_timezone(Local).earliest())
        .map(|midnight| midnight.with_timezone(&Utc))
        .unwrap_or(now)
}

struct TrackerState {
    mode: TrackingMode,
    generation: u64,
    daily: Option<DailyTotals>,
    session: Option<ActiveSessionTotals>,
    breed: Option<BreedProfile>,
    background_task: Option<BackgroundTaskId>,
}

impl TrackerState {
    fn switch_mode(&mut self, to: TrackingMode) -> (TrackingMode, u64) {
        let from = self.mode;
        self.mode = to;
        self.generation += 1;
        (from, self.generation)
    }
}

/// Shared pieces a feed callback needs
struct Shared {
    state: Mutex<TrackerState>,
    events: broadcast::Sender<TrackerEvent>,
    clock: Arc<dyn Clock>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: TrackerEvent) {
        // No receivers is fine
        let _ = self.events.send(event);
    }

    /// Apply one feed update if it belongs to the live subscription
    fn apply_update(&self, generation: u64, mode: TrackingMode, update: MotionUpdate) {
        let reading = match update {
            Ok(reading) => reading,
            Err(e) => {
                tracing::warn!("Pedometer update error: {}", e);
                return;
            }
        };

        let now = self.clock.now();
        let event = {
            let mut state = self.lock();
            if state.generation != generation || state.mode != mode {
                tracing::debug!(
                    "Dropping stale {:?} update ({} steps) after mode switch",
                    mode,
                    reading.steps
                );
                return;
            }

            match mode {
                TrackingMode::Daily => state.daily.as_mut().map(|daily| {
                    apply_daily(daily, reading, now);
                    TrackerEvent::DailyUpdated(daily.clone())
                }),
                TrackingMode::Session => state.session.as_mut().map(|session| {
                    apply_session(session, reading, now);
                    TrackerEvent::SessionUpdated(session.clone())
                }),
                TrackingMode::Inactive => None,
            }
        };

        if let Some(event) = event {
            self.emit(event);
        }
    }
}

fn apply_daily(daily: &mut DailyTotals, reading: MotionReading, now: DateTime<Utc>) {
    // Daily steps never go backwards while the day is being tracked
    daily.steps = daily.steps.max(reading.steps);
    daily.distance_meters = daily.distance_meters.max(reading.distance_meters);
    daily.last_update = now;
}

fn apply_session(session: &mut ActiveSessionTotals, reading: MotionReading, now: DateTime<Utc>) {
    session.steps = session.steps.max(reading.steps);
    session.distance_meters = session.distance_meters.max(reading.distance_meters);
    session.duration_seconds = elapsed_seconds(session.start_timestamp, now);
}

fn elapsed_seconds(start: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    ((now - start).num_milliseconds().max(0) as f64) / 1000.0
}

/// Mode-tracking state machine over a [`MotionProvider`]
pub struct SessionTracker {
    shared: Arc<Shared>,
    motion: Arc<dyn MotionProvider>,
    background: Arc<dyn BackgroundHost>,
    settings: TrackingConfig,
    /// Held from the mode switch until the feed matches the new mode
    transitions: Mutex<()>,
}

impl SessionTracker {
    pub fn new(
        motion: Arc<dyn MotionProvider>,
        background: Arc<dyn BackgroundHost>,
        clock: Arc<dyn Clock>,
        settings: TrackingConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(TrackerState {
                    mode: TrackingMode::Inactive,
                    generation: 0,
                    daily: None,
                    session: None,
                    breed: None,
                    background_task: None,
                }),
                events,
                clock,
            }),
            motion,
            background,
            settings,
            transitions: Mutex::new(()),
        }
    }

    pub fn with_breed(self, breed: Option<BreedProfile>) -> Self {
        self.set_breed(breed);
        self
    }

    /// Breed applied to walks finalized from now on
    pub fn set_breed(&self, breed: Option<BreedProfile>) {
        self.shared.lock().breed = breed;
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<TrackerEvent> {
        self.shared.events.subscribe()
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn current_mode(&self) -> TrackingMode {
        self.shared.lock().mode
    }

    pub fn is_session_active(&self) -> bool {
        self.current_mode() == TrackingMode::Session
    }

    /// Snapshot of the running walk with its duration brought up to now
    pub fn current_session_data(&self) -> Option<ActiveSessionTotals> {
        let now = self.shared.clock.now();
        let state = self.shared.lock();
        if state.mode != TrackingMode::Session {
            return None;
        }
        state.session.clone().map(|mut session| {
            session.duration_seconds = elapsed_seconds(session.start_timestamp, now);
            session
        })
    }

    pub fn todays_totals(&self) -> Option<DailyTotals> {
        let state = self.shared.lock();
        if state.mode != TrackingMode::Daily {
            return None;
        }
        state.daily.clone()
    }

    // ------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------

    /// Start (or restart) daily tracking from local midnight
    ///
    /// Deferred while a walk session is running: returns `Ok` without
    /// touching the session.
    pub async fn start_daily(&self) -> TrackingResult<()> {
        if self.is_session_active() {
            tracing::debug!("Walk session active, deferring daily tracking");
            return Ok(());
        }

        self.ensure_authorized().await?;

        let now = self.shared.clock.now();
        let day_start = start_of_day(now);
        let from = {
            let _transition = self.begin_transition();
            let (from, generation) = {
                let mut state = self.shared.lock();
                // A session may have started while we waited on permission
                if state.mode == TrackingMode::Session {
                    tracing::debug!("Walk session started meanwhile, deferring daily");
                    return Ok(());
                }
                state.daily = Some(DailyTotals {
                    start_of_day: day_start,
                    steps: 0,
                    distance_meters: 0.0,
                    last_update: now,
                });
                state.switch_mode(TrackingMode::Daily)
            };
            self.resubscribe(from, day_start, TrackingMode::Daily, generation);
            from
        };

        tracing::info!("Daily tracking started from {}", day_start);
        self.emit_mode_change(from, TrackingMode::Daily);
        Ok(())
    }

    /// Stop daily tracking; a no-op outside daily mode
    pub fn stop_daily(&self) -> TrackingResult<()> {
        {
            let _transition = self.begin_transition();
            {
                let mut state = self.shared.lock();
                if state.mode != TrackingMode::Daily {
                    tracing::debug!("stop_daily called in {:?} mode, ignoring", state.mode);
                    return Ok(());
                }
                state.daily = None;
                state.switch_mode(TrackingMode::Inactive);
            }
            self.motion.unsubscribe();
        }

        tracing::info!("Daily tracking stopped");
        self.emit_mode_change(TrackingMode::Daily, TrackingMode::Inactive);
        Ok(())
    }

    /// Begin a walk session, suspending daily tracking
    pub async fn start_session(&self) -> TrackingResult<()> {
        if self.is_session_active() {
            return Err(TrackingError::SessionAlreadyActive);
        }

        self.ensure_authorized().await?;

        let now = self.shared.clock.now();
        let from = {
            let _transition = self.begin_transition();
            let (from, generation) = {
                let mut state = self.shared.lock();
                if state.mode == TrackingMode::Session {
                    return Err(TrackingError::SessionAlreadyActive);
                }
                state.daily = None;
                state.session = Some(ActiveSessionTotals {
                    start_timestamp: now,
                    steps: 0,
                    distance_meters: 0.0,
                    duration_seconds: 0.0,
                });
                state.switch_mode(TrackingMode::Session)
            };
            self.resubscribe(from, now, TrackingMode::Session, generation);
            from
        };

        tracing::info!("Walk session started at {}", now);
        self.emit_mode_change(from, TrackingMode::Session);
        self.shared.emit(TrackerEvent::SessionStarted { start_time: now });
        Ok(())
    }

    /// Finalize the running walk
    ///
    /// Afterwards daily tracking is restarted on a best-effort basis (unless
    /// disabled in config); its failure does not affect the returned walk.
    pub async fn stop_session(&self) -> TrackingResult<WalkSession> {
        let now = self.shared.clock.now();
        let (walk, background_task) = {
            let _transition = self.begin_transition();
            let finished = {
                let mut state = self.shared.lock();
                if state.mode != TrackingMode::Session {
                    return Err(TrackingError::NoActiveSession);
                }
                let totals = state.session.take().ok_or(TrackingError::NoActiveSession)?;
                let walk = WalkSession::finalize(
                    &totals,
                    now,
                    state.breed.as_ref(),
                    self.motion.data_source(),
                );
                state.switch_mode(TrackingMode::Inactive);
                (walk, state.background_task.take())
            };
            self.motion.unsubscribe();
            finished
        };

        if let Some(task) = background_task {
            self.background.end_extended_execution(task);
        }

        tracing::info!(
            "Walk session stopped: {} steps over {}",
            walk.human_steps(),
            walk.formatted_duration()
        );
        self.emit_mode_change(TrackingMode::Session, TrackingMode::Inactive);
        self.shared.emit(TrackerEvent::SessionStopped(walk.clone()));

        if self.settings.resume_daily_after_session {
            match self.start_daily().await {
                Ok(()) if self.current_mode() == TrackingMode::Daily => {
                    self.shared.emit(TrackerEvent::DailyResumed);
                }
                Ok(()) => {}
                Err(e) => tracing::warn!("Could not resume daily tracking: {}", e),
            }
        }

        Ok(walk)
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// App moved to the background; keep a running walk alive
    pub fn enter_background(&self) {
        let mut state = self.shared.lock();
        if state.mode != TrackingMode::Session || state.background_task.is_some() {
            return;
        }

        match self.background.begin_extended_execution("walk session") {
            Some(task) => {
                tracing::debug!("Extended background execution granted ({:?})", task);
                state.background_task = Some(task);
            }
            None => tracing::warn!("Host refused extended background execution"),
        }
    }

    /// App returned to the foreground; release the allowance and refresh totals once
    pub async fn enter_foreground(&self) {
        let task = self.shared.lock().background_task.take();
        if let Some(task) = task {
            self.background.end_extended_execution(task);
        }

        let now = self.shared.clock.now();
        let (mode, generation, since) = {
            let state = self.shared.lock();
            let since = match state.mode {
                TrackingMode::Daily => state.daily.as_ref().map(|d| d.start_of_day),
                TrackingMode::Session => state.session.as_ref().map(|s| s.start_timestamp),
                TrackingMode::Inactive => None,
            };
            (state.mode, state.generation, since)
        };

        let Some(since) = since else {
            return;
        };

        match self.query_with_timeout(since, now).await {
            Ok(reading) => self.shared.apply_update(generation, mode, Ok(reading)),
            Err(e) => tracing::debug!("Foreground refresh skipped: {}", e),
        }
    }

    // ------------------------------------------------------------------
    // Historical queries
    // ------------------------------------------------------------------

    /// Human steps between `start` and `end`, straight from the platform
    pub async fn steps_for_date_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> TrackingResult<HumanActivitySample> {
        if !self.motion.is_available() {
            return Err(TrackingError::NotAvailable);
        }

        let reading = self.query_with_timeout(start, end).await?;
        Ok(HumanActivitySample {
            timestamp: start,
            human_steps: reading.steps,
            distance_meters: (reading.distance_meters > 0.0).then_some(reading.distance_meters),
        })
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn begin_transition(&self) -> MutexGuard<'_, ()> {
        self.transitions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    async fn ensure_authorized(&self) -> TrackingResult<()> {
        if !self.motion.is_available() {
            return Err(TrackingError::NotAvailable);
        }

        if self.motion.authorization_status() == AuthorizationStatus::Authorized {
            return Ok(());
        }

        let request = self.motion.request_authorization();
        match tokio::time::timeout(self.settings.permission_timeout(), request).await {
            Ok(Ok(true)) => Ok(()),
            Ok(Ok(false)) => Err(TrackingError::PermissionDenied),
            Ok(Err(_)) => {
                tracing::warn!("Permission request dropped without an answer");
                Err(TrackingError::PermissionDenied)
            }
            Err(_) => {
                tracing::warn!(
                    "Permission request timed out after {:?}",
                    self.settings.permission_timeout()
                );
                Err(TrackingError::PermissionDenied)
            }
        }
    }

    async fn query_with_timeout(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> TrackingResult<MotionReading> {
        let request = self.motion.query(start, end);
        match tokio::time::timeout(self.settings.query_timeout(), request).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(TrackingError::DataNotAvailable),
            Err(_) => {
                tracing::warn!("Step query timed out after {:?}", self.settings.query_timeout());
                Err(TrackingError::DataNotAvailable)
            }
        }
    }

    /// Tear down the previous feed and subscribe for `mode`
    ///
    /// Callers hold the transition lock.
    fn resubscribe(
        &self,
        from: TrackingMode,
        start: DateTime<Utc>,
        mode: TrackingMode,
        generation: u64,
    ) {
        if from != TrackingMode::Inactive {
            self.motion.unsubscribe();
        }

        let shared: Weak<Shared> = Arc::downgrade(&self.shared);
        self.motion.subscribe_from(
            start,
            Arc::new(move |update: MotionUpdate| {
                if let Some(shared) = shared.upgrade() {
                    shared.apply_update(generation, mode, update);
                }
            }),
        );
    }

    fn emit_mode_change(&self, from: TrackingMode, to: TrackingMode) {
        if from != to {
            self.shared.emit(TrackerEvent::ModeChanged { from, to });
        }
    }
}

impl Drop for SessionTracker {
    fn drop(&mut self) {
        if self.shared.lock().mode != TrackingMode::Inactive {
            self.motion.unsubscribe();
        }
    }
}
