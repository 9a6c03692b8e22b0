//! Boundary to the platform motion and lifecycle services.
//!
//! The session machine consumes these through narrow traits so it can be
//! driven by a real pedometer bridge or by [`ScriptedMotion`] in tests and
//! the CLI.

use crate::walk::DataSource;
use crate::{AuthorizationStatus, MotionReading, TrackingError, TrackingResult};
use chrono::{DateTime, Duration, Utc};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;

/// Pedometer update delivered to a feed subscriber
pub type MotionUpdate = TrackingResult<MotionReading>;

/// Callback invoked by the provider for every feed update
///
/// Providers may call it from any thread.
pub type UpdateHandler = Arc<dyn Fn(MotionUpdate) + Send + Sync>;

/// Platform pedometer
///
/// Async results are returned as oneshot receivers. A provider that never
/// answers simply never sends; callers bound the wait with a timeout.
pub trait MotionProvider: Send + Sync {
    fn is_available(&self) -> bool;

    fn authorization_status(&self) -> AuthorizationStatus;

    /// Ask the user for motion permission; resolves to whether it was granted
    fn request_authorization(&self) -> oneshot::Receiver<bool>;

    /// Start delivering cumulative readings counted from `start`
    ///
    /// Replaces any existing subscription.
    fn subscribe_from(&self, start: DateTime<Utc>, handler: UpdateHandler);

    fn unsubscribe(&self);

    /// One-shot historical query for `[start, end)`
    fn query(&self, start: DateTime<Utc>, end: DateTime<Utc>)
        -> oneshot::Receiver<MotionUpdate>;

    /// Tag recorded on walks produced from this provider's data
    fn data_source(&self) -> DataSource {
        DataSource::Pedometer
    }
}

/// Token for an extended background execution grant
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BackgroundTaskId(pub u64);

/// Host platform capability to keep running while backgrounded
pub trait BackgroundHost: Send + Sync {
    /// Returns `None` when the platform refuses the request
    fn begin_extended_execution(&self, reason: &str) -> Option<BackgroundTaskId>;

    fn end_extended_execution(&self, id: BackgroundTaskId);
}

/// Host without background execution support
#[derive(Clone, Copy, Debug, Default)]
pub struct NoBackgroundHost;

impl BackgroundHost for NoBackgroundHost {
    fn begin_extended_execution(&self, _reason: &str) -> Option<BackgroundTaskId> {
        None
    }

    fn end_extended_execution(&self, _id: BackgroundTaskId) {}
}

// ============================================================================
// Clock
// ============================================================================

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ============================================================================
// Single resolution
// ============================================================================

/// Resolves a oneshot at most once, however many times a platform callback fires
///
/// Clones share the same underlying sender.
pub struct OnceResolver<T> {
    sender: Arc<Mutex<Option<oneshot::Sender<T>>>>,
}

impl<T> Clone for OnceResolver<T> {
    fn clone(&self) -> Self {
        Self {
            sender: Arc::clone(&self.sender),
        }
    }
}

impl<T> OnceResolver<T> {
    pub fn channel() -> (Self, oneshot::Receiver<T>) {
        let (tx, rx) = oneshot::channel();
        let resolver = Self {
            sender: Arc::new(Mutex::new(Some(tx))),
        };
        (resolver, rx)
    }

    /// Deliver `value`; returns false if already resolved or nobody is waiting
    pub fn resolve(&self, value: T) -> bool {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match sender {
            Some(tx) => tx.send(value).is_ok(),
            None => {
                tracing::debug!("Ignoring second resolution of a one-shot result");
                false
            }
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

// ============================================================================
// Scripted provider
// ============================================================================

/// In-memory motion provider driven by explicit calls
///
/// Readings pushed with [`ScriptedMotion::emit`] go to the current subscriber.
pub struct ScriptedMotion {
    state: Mutex<ScriptedState>,
    source: DataSource,
}

struct ScriptedState {
    available: bool,
    status: AuthorizationStatus,
    /// `None` leaves permission requests pending forever
    grant_on_request: Option<bool>,
    pending_requests: Vec<OnceResolver<bool>>,
    handler: Option<UpdateHandler>,
    subscribed_from: Option<DateTime<Utc>>,
    subscribe_count: usize,
    query_result: Option<MotionUpdate>,
    /// Queries issued while pending are held here and never answered
    pending_queries: Option<Vec<oneshot::Sender<MotionUpdate>>>,
}

impl Default for ScriptedMotion {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedMotion {
    /// Available, already authorized provider
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ScriptedState {
                available: true,
                status: AuthorizationStatus::Authorized,
                grant_on_request: Some(true),
                pending_requests: Vec::new(),
                handler: None,
                subscribed_from: None,
                subscribe_count: 0,
                query_result: None,
                pending_queries: None,
            }),
            source: DataSource::Simulated,
        }
    }

    pub fn with_data_source(mut self, source: DataSource) -> Self {
        self.source = source;
        self
    }

    fn lock(&self) -> MutexGuard<'_, ScriptedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_available(&self, available: bool) {
        self.lock().available = available;
    }

    pub fn set_authorization(&self, status: AuthorizationStatus) {
        self.lock().status = status;
    }

    /// How the next permission request resolves; `None` never resolves
    pub fn set_grant_on_request(&self, grant: Option<bool>) {
        self.lock().grant_on_request = grant;
    }

    pub fn set_query_result(&self, result: MotionUpdate) {
        let mut state = self.lock();
        state.query_result = Some(result);
        state.pending_queries = None;
    }

    /// Leave historical queries unanswered until a result is set
    pub fn set_query_pending(&self) {
        let mut state = self.lock();
        if state.pending_queries.is_none() {
            state.pending_queries = Some(Vec::new());
        }
    }

    /// Deliver a cumulative reading to the current subscriber
    ///
    /// Returns false if nothing is subscribed.
    pub fn emit(&self, steps: u64, distance_meters: f64) -> bool {
        self.emit_update(Ok(MotionReading {
            steps,
            distance_meters,
        }))
    }

    pub fn emit_update(&self, update: MotionUpdate) -> bool {
        // Clone out so the handler runs without our lock held
        let handler = self.lock().handler.clone();
        match handler {
            Some(handler) => {
                handler(update);
                true
            }
            None => false,
        }
    }

    /// Handler of the current subscription, if any
    pub fn current_handler(&self) -> Option<UpdateHandler> {
        self.lock().handler.clone()
    }

    pub fn is_subscribed(&self) -> bool {
        self.lock().handler.is_some()
    }

    pub fn subscribed_from(&self) -> Option<DateTime<Utc>> {
        self.lock().subscribed_from
    }

    /// Total number of subscriptions ever made
    pub fn subscribe_count(&self) -> usize {
        self.lock().subscribe_count
    }
}

impl MotionProvider for ScriptedMotion {
    fn is_available(&self) -> bool {
        self.lock().available
    }

    fn authorization_status(&self) -> AuthorizationStatus {
        self.lock().status
    }

    fn request_authorization(&self) -> oneshot::Receiver<bool> {
        let (resolver, rx) = OnceResolver::channel();
        let mut state = self.lock();
        match state.grant_on_request {
            Some(granted) => {
                state.status = if granted {
                    AuthorizationStatus::Authorized
                } else {
                    AuthorizationStatus::Denied
                };
                resolver.resolve(granted);
            }
            None => state.pending_requests.push(resolver),
        }
        rx
    }

    fn subscribe_from(&self, start: DateTime<Utc>, handler: UpdateHandler) {
        let mut state = self.lock();
        state.handler = Some(handler);
        state.subscribed_from = Some(start);
        state.subscribe_count += 1;
    }

    fn unsubscribe(&self) {
        let mut state = self.lock();
        state.handler = None;
        state.subscribed_from = None;
    }

    fn query(
        &self,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> oneshot::Receiver<MotionUpdate> {
        let (tx, rx) = oneshot::channel();
        let mut state = self.lock();
        if let Some(pending) = state.pending_queries.as_mut() {
            pending.push(tx);
            return rx;
        }

        let result = state
            .query_result
            .clone()
            .unwrap_or(Err(TrackingError::DataNotAvailable));
        let _ = tx.send(result);
        rx
    }

    fn data_source(&self) -> DataSource {
        self.source
    }
}
