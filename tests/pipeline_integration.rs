/// Integration tests for the refresh pipeline with injected sources
///
/// Tests verify:
/// 1. End-to-end conversion from a raw observation to entity values
/// 2. At-most-one in-flight fetch, shared by concurrent requesters
/// 3. Degradation and recovery across failing refresh cycles
/// 4. Startup failure propagation out of instance setup
///
/// All tests run against in-process sources; no network access needed.
///
/// Run with: cargo test --test pipeline_integration

use meteomon_service::catalog;
use meteomon_service::config::{Mode, StationConfig};
use meteomon_service::coordinator::{ObservationSource, RefreshCoordinator};
use meteomon_service::entity::{self, AggregateView, Entities, SplitView};
use meteomon_service::model::{FetchError, Freshness, Observation, Phase, Snapshot};
use serde_json::{json, Map, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => panic!("fixture must be a JSON object"),
    }
}

/// A realistic DPObs record for the Lyon-Bron reference station, including
/// provider bookkeeping fields the catalog does not know.
fn reference_fields() -> Map<String, Value> {
    object(json!({
        "t": 290.0,
        "ff": 5.0,
        "pres": 100500,
        "ray_glo01": 1800,
        "vv": 500,
        "u": 55,
        "etat_sol": 1,
        "geo_id_insee": "69029001",
        "lat": 45.721,
        "lon": 4.938,
        "reference_time": "2024-01-01T06:00:00Z",
        "validity_time": "2024-01-01T06:06:00Z",
    }))
}

fn station_config(mode: Mode) -> StationConfig {
    StationConfig {
        api_key: "test-key".to_string(),
        station_id: "69029001".to_string(),
        entity_name: "MaMeteo".to_string(),
        mode,
        update_minutes: 6,
    }
}

/// Hands out queued outcomes in order, counting calls; an optional hold
/// keeps each fetch open so concurrent requesters can pile up.
struct ScriptSource {
    outcomes: Mutex<VecDeque<Result<Observation, FetchError>>>,
    calls: Arc<AtomicUsize>,
    hold_ms: u64,
}

impl ScriptSource {
    fn new(outcomes: Vec<Result<Observation, FetchError>>) -> ScriptSource {
        ScriptSource {
            outcomes: Mutex::new(outcomes.into()),
            calls: Arc::new(AtomicUsize::new(0)),
            hold_ms: 0,
        }
    }

    fn with_hold(outcomes: Vec<Result<Observation, FetchError>>, hold_ms: u64) -> ScriptSource {
        ScriptSource {
            hold_ms,
            ..Self::new(outcomes)
        }
    }

    fn call_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

impl ObservationSource for ScriptSource {
    fn fetch(&self) -> Result<Observation, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.hold_ms > 0 {
            thread::sleep(Duration::from_millis(self.hold_ms));
        }
        self.outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(FetchError::Transport("script exhausted".to_string())))
    }
}

fn aggregate_view(entities: &Entities) -> &AggregateView {
    match entities {
        Entities::Aggregate(view) => view,
        Entities::Split(_) => panic!("expected aggregate mode"),
    }
}

fn split_views(entities: &Entities) -> &[SplitView] {
    match entities {
        Entities::Split(views) => views,
        Entities::Aggregate(_) => panic!("expected split mode"),
    }
}

// ---------------------------------------------------------------------------
// End-to-end conversion
// ---------------------------------------------------------------------------

#[test]
fn test_reference_station_aggregate_end_to_end() {
    // One observation through the whole pipeline: kelvin in, °C out, with
    // every other field converted or passed through in the attribute map.
    let source = ScriptSource::new(vec![Ok(Observation::new(reference_fields()))]);
    let instance = entity::setup_instance(&station_config(Mode::Aggregate), Box::new(source))
        .expect("setup should succeed");
    let view = aggregate_view(&instance.entities);

    assert_eq!(view.primary_value(), Some(16.85));
    assert_eq!(view.unit(), Some("°C"));

    let attrs = view.attributes();
    assert_eq!(attrs.get("ff"), Some(&json!(18.0)), "m/s must become km/h");
    assert_eq!(attrs.get("pres"), Some(&json!(1005.0)), "Pa must become hPa");
    assert_eq!(attrs.get("ray_glo01"), Some(&json!(5.0)), "J/m² must become W/m²");
    assert_eq!(attrs.get("vv"), Some(&json!(500)), "visibility passes through");
    assert_eq!(attrs.get("u"), Some(&json!(55)), "humidity passes through");
    assert_eq!(attrs.get("etat_sol"), Some(&json!(1)), "coded values pass through");
    assert_eq!(attrs.get("reference_time"), Some(&json!("2024-01-01T06:00:00Z")));
    assert_eq!(attrs.get("stale"), Some(&json!(false)));

    // Provider bookkeeping fields stay inside the raw bucket.
    assert!(attrs.get("geo_id_insee").is_none());
    assert!(attrs.get("lat").is_none());
    let raw = attrs
        .get("raw")
        .and_then(Value::as_object)
        .expect("raw bucket must be present");
    assert_eq!(raw.get("t"), Some(&json!(290.0)));
    assert_eq!(raw.get("pres"), Some(&json!(100500)));
    assert_eq!(raw.get("geo_id_insee"), Some(&json!("69029001")));
    assert_eq!(raw.get("validity_time"), Some(&json!("2024-01-01T06:06:00Z")));
}

#[test]
fn test_reference_station_split_end_to_end() {
    // Same observation, split mode: each field view must agree with the
    // aggregate conversions and carry its own raw value.
    let source = ScriptSource::new(vec![Ok(Observation::new(reference_fields()))]);
    let instance = entity::setup_instance(&station_config(Mode::Split), Box::new(source))
        .expect("setup should succeed");
    let views = split_views(&instance.entities);

    let value_of = |key: &str| -> Option<Value> {
        views
            .iter()
            .find(|view| view.key() == key)
            .unwrap_or_else(|| panic!("view for '{}' must exist", key))
            .value()
    };

    assert_eq!(value_of("t"), Some(json!(16.85)));
    assert_eq!(value_of("ff"), Some(json!(18.0)));
    assert_eq!(value_of("pres"), Some(json!(1005.0)));
    assert_eq!(value_of("ray_glo01"), Some(json!(5.0)));
    assert_eq!(value_of("vv"), Some(json!(500)));
    assert_eq!(value_of("etat_sol"), Some(json!(1)));
    assert_eq!(value_of("sss"), None, "absent fields read as absent");

    let pressure = views
        .iter()
        .find(|view| view.key() == "pres")
        .expect("pres view must exist");
    let attrs = pressure.attributes();
    assert_eq!(attrs.get("raw_value"), Some(&json!(100500)));
    assert_eq!(attrs.get("reference_time"), Some(&json!("2024-01-01T06:00:00Z")));
}

#[test]
fn test_split_views_keep_catalog_order() {
    // Entity fan-out order is the catalog's and does not vary between
    // instances or depend on which fields the observation carries.
    let sparse = object(json!({ "t": 290.0, "reference_time": "2024-01-01T06:00:00Z" }));

    let full_instance = entity::setup_instance(
        &station_config(Mode::Split),
        Box::new(ScriptSource::new(vec![Ok(Observation::new(reference_fields()))])),
    )
    .expect("setup should succeed");
    let sparse_instance = entity::setup_instance(
        &station_config(Mode::Split),
        Box::new(ScriptSource::new(vec![Ok(Observation::new(sparse))])),
    )
    .expect("setup should succeed");

    let full_keys: Vec<&str> = split_views(&full_instance.entities)
        .iter()
        .map(|view| view.key())
        .collect();
    let sparse_keys: Vec<&str> = split_views(&sparse_instance.entities)
        .iter()
        .map(|view| view.key())
        .collect();

    assert_eq!(full_keys, catalog::all_keys());
    assert_eq!(sparse_keys, catalog::all_keys());
}

// ---------------------------------------------------------------------------
// Concurrency
// ---------------------------------------------------------------------------

#[test]
fn test_concurrent_requests_share_one_network_fetch() {
    // Three overlapping refresh requests while the fetch is held open must
    // produce exactly one source call, with all callers seeing its result.
    let source = ScriptSource::with_hold(
        vec![Ok(Observation::new(reference_fields()))],
        400,
    );
    let calls = source.call_counter();
    let coordinator = Arc::new(RefreshCoordinator::new("69029001", Box::new(source)));

    let mut handles = Vec::new();
    for _ in 0..3 {
        let coordinator = Arc::clone(&coordinator);
        handles.push(thread::spawn(move || coordinator.request_refresh()));
        thread::sleep(Duration::from_millis(60));
    }

    let snapshots: Vec<_> = handles
        .into_iter()
        .map(|handle| handle.join().expect("thread").expect("refresh should succeed"))
        .collect();

    assert_eq!(
        calls.load(Ordering::SeqCst),
        1,
        "overlapping requests must collapse into one fetch"
    );
    for snapshot in &snapshots {
        assert_eq!(snapshot.observation, snapshots[0].observation);
        assert_eq!(snapshot.freshness, Freshness::Fresh);
    }
    assert_eq!(coordinator.phase(), Phase::Ready);
}

// ---------------------------------------------------------------------------
// Failure resilience
// ---------------------------------------------------------------------------

#[test]
fn test_outage_keeps_last_values_until_recovery() {
    // Ok, Err, Err, Ok: values from the first fetch must stay readable
    // (marked stale) through the outage, then be replaced on recovery.
    let recovered = object(json!({ "t": 291.0, "reference_time": "2024-01-01T07:00:00Z" }));
    let source = ScriptSource::new(vec![
        Ok(Observation::new(reference_fields())),
        Err(FetchError::Transport("connection refused".to_string())),
        Err(FetchError::Format("response is not JSON".to_string())),
        Ok(Observation::new(recovered)),
    ]);
    let instance = entity::setup_instance(&station_config(Mode::Aggregate), Box::new(source))
        .expect("setup should succeed");
    let view = aggregate_view(&instance.entities);
    let coordinator = &instance.coordinator;

    assert_eq!(coordinator.phase(), Phase::Ready);
    assert_eq!(view.primary_value(), Some(16.85));

    // First failure: degraded, values retained.
    let retained = coordinator.request_refresh().expect("retention, not an error");
    assert_eq!(coordinator.phase(), Phase::Degraded);
    assert!(retained.is_stale());
    assert_eq!(view.primary_value(), Some(16.85));
    assert_eq!(view.attributes().get("stale"), Some(&json!(true)));

    // Second failure in a row changes nothing.
    coordinator.request_refresh().expect("retention, not an error");
    assert_eq!(coordinator.phase(), Phase::Degraded);
    assert_eq!(view.primary_value(), Some(16.85));

    // Recovery replaces the snapshot and clears staleness.
    let fresh = coordinator.request_refresh().expect("recovery");
    assert_eq!(coordinator.phase(), Phase::Ready);
    assert_eq!(fresh.freshness, Freshness::Fresh);
    assert_eq!(view.primary_value(), Some(17.85));
    assert_eq!(view.attributes().get("stale"), Some(&json!(false)));
}

#[test]
fn test_startup_auth_failure_propagates() {
    // A rejected API key on the first refresh must fail setup with the
    // auth error, not produce entities over an empty snapshot.
    let source = ScriptSource::new(vec![Err(FetchError::Auth(401))]);
    let err = entity::setup_instance(&station_config(Mode::Aggregate), Box::new(source))
        .expect_err("setup must fail fast");

    assert_eq!(err, FetchError::Auth(401));
    assert_eq!(err.to_string(), "Auth error: API key rejected (HTTP 401)");
}

#[test]
fn test_listeners_fire_once_per_completed_cycle() {
    // Success, degraded retention, recovery: three cycles, three listener
    // calls, freshness telling them apart.
    let source = ScriptSource::new(vec![
        Ok(Observation::new(reference_fields())),
        Err(FetchError::Transport("connection refused".to_string())),
        Ok(Observation::new(reference_fields())),
    ]);
    let coordinator = RefreshCoordinator::new("69029001", Box::new(source));

    let seen: Arc<Mutex<Vec<Freshness>>> = Arc::new(Mutex::new(Vec::new()));
    {
        let seen = Arc::clone(&seen);
        coordinator.add_listener(move |snapshot: &Snapshot| {
            seen.lock().unwrap().push(snapshot.freshness);
        });
    }

    coordinator.request_refresh().expect("first refresh");
    coordinator.request_refresh().expect("degraded refresh");
    coordinator.request_refresh().expect("recovery refresh");

    assert_eq!(
        *seen.lock().unwrap(),
        vec![Freshness::Fresh, Freshness::Stale, Freshness::Fresh]
    );
}
