/// Refresh coordination for one configured station.
///
/// Owns the polling life cycle: runs the blocking fetch, converts fields,
/// and holds the one shared snapshot all entity views read. At most one
/// fetch is in flight per coordinator; a refresh requested while one is
/// outstanding waits for and shares that result instead of issuing a second
/// network call. On failure the previous snapshot is kept, re-marked stale,
/// so entities keep their last good values through provider outages. Only
/// the very first refresh surfaces its error to the caller.

use std::sync::{Arc, Condvar, Mutex, MutexGuard};

use chrono::Utc;

use crate::convert;
use crate::logging::{self, DataSource};
use crate::model::{FetchError, Freshness, Observation, Phase, Snapshot};

// ---------------------------------------------------------------------------
// Source seam
// ---------------------------------------------------------------------------

/// Where observations come from. Production uses `ingest::dpobs::DpObsSource`;
/// tests inject counting or scripted sources.
pub trait ObservationSource: Send + Sync {
    /// One blocking fetch of the station's most recent observation record.
    fn fetch(&self) -> Result<Observation, FetchError>;
}

/// Callback invoked after each completed refresh that left a snapshot in
/// place, with the state lock released. The snapshot's freshness flag tells
/// listeners whether this was a success or a degraded retention.
pub type RefreshListener = Box<dyn Fn(&Snapshot) + Send + Sync>;

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

struct CoordinatorInner {
    phase: Phase,
    snapshot: Option<Arc<Snapshot>>,
    /// Bumped once per completed refresh; joiners wait for it to advance.
    generation: u64,
    /// Error of the most recently completed refresh, `None` after success.
    last_failure: Option<FetchError>,
}

/// Serializes refreshes for one station and holds its shared snapshot.
///
/// All interior locking is private; callers see blocking `request_refresh`
/// and non-blocking `current_snapshot` only.
pub struct RefreshCoordinator {
    station_id: String,
    source: Box<dyn ObservationSource>,
    state: Mutex<CoordinatorInner>,
    refresh_done: Condvar,
    listeners: Mutex<Vec<RefreshListener>>,
}

impl RefreshCoordinator {
    pub fn new(station_id: &str, source: Box<dyn ObservationSource>) -> RefreshCoordinator {
        RefreshCoordinator {
            station_id: station_id.to_string(),
            source,
            state: Mutex::new(CoordinatorInner {
                phase: Phase::Uninitialized,
                snapshot: None,
                generation: 0,
                last_failure: None,
            }),
            refresh_done: Condvar::new(),
            listeners: Mutex::new(Vec::new()),
        }
    }

    pub fn station_id(&self) -> &str {
        &self.station_id
    }

    /// Current life-cycle phase. `Refreshing` while a fetch is in flight.
    pub fn phase(&self) -> Phase {
        self.state.lock().unwrap().phase
    }

    /// Non-blocking read of the latest snapshot. `None` only before the
    /// first successful refresh.
    pub fn current_snapshot(&self) -> Option<Arc<Snapshot>> {
        self.state.lock().unwrap().snapshot.clone()
    }

    /// Registers a callback run after every completed refresh that left a
    /// snapshot in place (success or degraded retention).
    pub fn add_listener(&self, listener: impl Fn(&Snapshot) + Send + Sync + 'static) {
        self.listeners.lock().unwrap().push(Box::new(listener));
    }

    /// Runs one refresh, or joins the refresh already in flight.
    ///
    /// Returns the snapshot the cycle produced: the fresh one on success,
    /// the retained stale one when the fetch failed but earlier values
    /// exist. Only when there is nothing to retain (the very first refresh)
    /// does the fetch error propagate to the caller.
    pub fn request_refresh(&self) -> Result<Arc<Snapshot>, FetchError> {
        {
            let mut state = self.state.lock().unwrap();
            if state.phase == Phase::Refreshing {
                return self.join_in_flight(state);
            }
            state.phase = Phase::Refreshing;
        }

        // Network call runs with the state lock released; concurrent
        // callers see `Refreshing` and join instead of fetching again.
        let outcome = self.source.fetch();
        self.complete_refresh(outcome)
    }

    /// Waits for the in-flight refresh to complete and shares its result.
    fn join_in_flight(
        &self,
        mut state: MutexGuard<'_, CoordinatorInner>,
    ) -> Result<Arc<Snapshot>, FetchError> {
        let joined_generation = state.generation;
        while state.generation == joined_generation {
            state = self.refresh_done.wait(state).unwrap();
        }

        // A completed refresh either left a snapshot in place or recorded
        // why it could not.
        match &state.snapshot {
            Some(snapshot) => Ok(Arc::clone(snapshot)),
            None => Err(state
                .last_failure
                .clone()
                .unwrap_or_else(|| FetchError::Transport("refresh produced no snapshot".to_string()))),
        }
    }

    /// Installs the outcome of a fetch, wakes joiners, then logs and
    /// notifies listeners outside the lock.
    fn complete_refresh(
        &self,
        outcome: Result<Observation, FetchError>,
    ) -> Result<Arc<Snapshot>, FetchError> {
        let mut warnings = Vec::new();
        let mut failure = None;
        let notify_snapshot;
        let result;

        {
            let mut state = self.state.lock().unwrap();
            match outcome {
                Ok(observation) => {
                    let (converted, observation_warnings) =
                        convert::convert_observation(&observation);
                    warnings = observation_warnings;
                    let snapshot = Arc::new(Snapshot {
                        observation,
                        converted,
                        fetched_at: Utc::now(),
                        freshness: Freshness::Fresh,
                    });
                    state.snapshot = Some(Arc::clone(&snapshot));
                    state.phase = Phase::Ready;
                    state.last_failure = None;
                    result = Ok(Arc::clone(&snapshot));
                    notify_snapshot = Some(snapshot);
                }
                Err(err) => {
                    failure = Some(err.clone());
                    match state.snapshot.take() {
                        Some(previous) => {
                            // Keep the last good values, re-marked stale.
                            let retained = Arc::new(previous.retained_stale());
                            state.snapshot = Some(Arc::clone(&retained));
                            state.phase = Phase::Degraded;
                            state.last_failure = Some(err);
                            result = Ok(Arc::clone(&retained));
                            notify_snapshot = Some(retained);
                        }
                        None => {
                            // Nothing to fall back on: the first refresh
                            // failed, and the caller handles it.
                            state.phase = Phase::Uninitialized;
                            state.last_failure = Some(err.clone());
                            result = Err(err);
                            notify_snapshot = None;
                        }
                    }
                }
            }
            state.generation += 1;
            self.refresh_done.notify_all();
        }

        for warning in &warnings {
            logging::log_conversion_warning(&self.station_id, warning);
        }
        if let Some(err) = &failure {
            logging::log_fetch_failure(&self.station_id, "observation refresh", err);
        } else if let Some(snapshot) = &notify_snapshot {
            logging::debug(
                DataSource::Coordinator,
                Some(&self.station_id),
                &format!("refresh complete: {} fields", snapshot.observation.fields.len()),
            );
        }
        if let Some(snapshot) = notify_snapshot {
            self.notify_listeners(&snapshot);
        }

        result
    }

    fn notify_listeners(&self, snapshot: &Snapshot) {
        let listeners = self.listeners.lock().unwrap();
        for listener in listeners.iter() {
            listener(snapshot);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
