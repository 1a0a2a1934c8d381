/// Observation, Snapshot, Freshness, Phase, FetchError
/// core data structures and error handling
///
/// Core data types for the Météo-France station polling service.
///
/// This module defines the shared domain model imported by all other modules.
/// It contains no I/O and no provider-specific logic, only types and the
/// small helpers that read them.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Well-known field keys
// ---------------------------------------------------------------------------

/// Field carrying the observation's own validity timestamp (RFC 3339).
pub const FIELD_REFERENCE_TIME: &str = "reference_time";

/// Field for the 2 m air temperature, the aggregate view's primary value.
pub const FIELD_TEMPERATURE: &str = "t";

// ---------------------------------------------------------------------------
// Observation
// ---------------------------------------------------------------------------

/// A single raw observation record from the DPObs API.
///
/// One record per fetch. Field keys map to whatever JSON value the provider
/// sent (numbers, coded integers, occasionally strings); absent fields are
/// simply missing from the map. Values stay raw here; unit conversion
/// happens downstream and never writes back.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub fields: Map<String, Value>,
}

impl Observation {
    pub fn new(fields: Map<String, Value>) -> Self {
        Observation { fields }
    }

    /// Raw value for a field key, if the provider reported it.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// The record's validity timestamp (`reference_time`), if present and
    /// parseable. The API reports it as RFC 3339 with a `Z` suffix.
    pub fn reference_time(&self) -> Option<DateTime<Utc>> {
        self.fields
            .get(FIELD_REFERENCE_TIME)
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Whether a snapshot's values come from the most recent refresh attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// The last refresh succeeded; values are current.
    Fresh,
    /// The last refresh failed; values are retained from an earlier success.
    Stale,
}

/// The coordinator's current best-known state for one station.
///
/// Holds the raw observation as received, the per-field converted values
/// built once at refresh time, and when the data was fetched. Replaced
/// wholesale behind an `Arc` on every successful refresh; views only read.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub observation: Observation,
    pub converted: Map<String, Value>,
    pub fetched_at: DateTime<Utc>,
    pub freshness: Freshness,
}

impl Snapshot {
    pub fn is_stale(&self) -> bool {
        self.freshness == Freshness::Stale
    }

    /// Converted display value for a field key, if the observation had it.
    pub fn converted_value(&self, key: &str) -> Option<&Value> {
        self.converted.get(key)
    }

    /// Age of the snapshot in whole minutes relative to `now`.
    ///
    /// Takes `now` as a parameter rather than reading the clock internally
    /// so callers and tests stay deterministic.
    pub fn age_minutes_at(&self, now: DateTime<Utc>) -> i64 {
        (now - self.fetched_at).num_minutes()
    }

    /// A copy of this snapshot re-marked stale, for retention after a
    /// failed refresh. Values and timestamps are untouched.
    pub fn retained_stale(&self) -> Snapshot {
        Snapshot {
            freshness: Freshness::Stale,
            ..self.clone()
        }
    }
}

// ---------------------------------------------------------------------------
// Coordinator phase
// ---------------------------------------------------------------------------

/// Refresh life-cycle phase of a coordinator.
///
/// `Uninitialized → Refreshing → Ready` on the first successful refresh,
/// then `Ready → Refreshing → Ready` per cycle. `Degraded` takes the place
/// of `Ready` when a refresh fails while a previous snapshot exists; the
/// next success returns to `Ready`. A first refresh that fails leaves the
/// coordinator `Uninitialized` so setup can fail fast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Uninitialized,
    Refreshing,
    Ready,
    Degraded,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can arise when fetching an observation from the DPObs API.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchError {
    /// Network failure, timeout, or a non-2xx response other than an
    /// authorization rejection.
    Transport(String),
    /// The API rejected the credential (HTTP 401 or 403).
    Auth(u16),
    /// The response body was not the expected shape: not JSON, or not a
    /// non-empty list of observation records.
    Format(String),
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchError::Transport(msg) => write!(f, "Transport error: {}", msg),
            FetchError::Auth(code) => write!(f, "Auth error: API key rejected (HTTP {})", code),
            FetchError::Format(msg) => write!(f, "Format error: {}", msg),
        }
    }
}

impl std::error::Error for FetchError {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
