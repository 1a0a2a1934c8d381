/// Polling daemon for one configured station.
///
/// Loads `meteomon.toml`, performs the synchronous first refresh (exiting
/// non-zero when it fails, so a bad API key is caught at startup rather
/// than after an hour of silence), then refreshes on the configured period
/// forever. Beyond the first refresh, failures degrade the snapshot instead
/// of stopping the loop.

use std::env;
use std::process;
use std::thread;
use std::time::Duration;

use chrono::Utc;
use dotenv::dotenv;
use serde_json::Value;

use meteomon_service::config::{self, StationConfig};
use meteomon_service::entity::{self, StationInstance};
use meteomon_service::ingest::dpobs::{self, DpObsSource};
use meteomon_service::logging::{self, DataSource, LogLevel};
use meteomon_service::model::{Snapshot, FIELD_TEMPERATURE};

const CONFIG_PATH: &str = "./meteomon.toml";

fn main() {
    dotenv().ok();
    logging::init_logger(log_level_from_env(), None, true);

    let config = match config::load_config(CONFIG_PATH) {
        Ok(config) => config,
        Err(err) => {
            logging::error(DataSource::Config, None, &err.to_string());
            process::exit(2);
        }
    };

    let client = match dpobs::build_client() {
        Ok(client) => client,
        Err(err) => {
            logging::error(
                DataSource::DpObs,
                Some(&config.station_id),
                &format!("HTTP client init failed: {}", err),
            );
            process::exit(1);
        }
    };

    let source = DpObsSource::new(client, &config.station_id, &config.api_key);
    let instance = match entity::setup_instance(&config, Box::new(source)) {
        Ok(instance) => instance,
        Err(err) => {
            logging::error(
                DataSource::Coordinator,
                Some(&config.station_id),
                &format!("startup refresh failed: {}", err),
            );
            process::exit(1);
        }
    };

    if let Some(snapshot) = instance.coordinator.current_snapshot() {
        log_tick(&config.station_id, &snapshot);
    }

    run_loop(&config, &instance);
}

/// Log level from `METEOMON_LOG`, defaulting to Info.
fn log_level_from_env() -> LogLevel {
    match env::var("METEOMON_LOG").map(|v| v.to_lowercase()).ok().as_deref() {
        Some("debug") => LogLevel::Debug,
        Some("warning") => LogLevel::Warning,
        Some("error") => LogLevel::Error,
        _ => LogLevel::Info,
    }
}

fn run_loop(config: &StationConfig, instance: &StationInstance) -> ! {
    let period = Duration::from_secs(u64::from(config.update_minutes) * 60);
    loop {
        thread::sleep(period);
        // Failures past the first refresh are absorbed by the coordinator
        // (retained snapshot, one log line); Err here would mean no
        // snapshot was ever built, which setup already ruled out.
        if let Ok(snapshot) = instance.coordinator.request_refresh() {
            log_tick(&config.station_id, &snapshot);
        }
    }
}

fn log_tick(station_id: &str, snapshot: &Snapshot) {
    let temperature = snapshot
        .converted_value(FIELD_TEMPERATURE)
        .and_then(Value::as_f64)
        .map(|t| format!("{} °C", t))
        .unwrap_or_else(|| "no temperature".to_string());
    let staleness = if snapshot.is_stale() { ", stale" } else { "" };
    logging::info(
        DataSource::Coordinator,
        Some(station_id),
        &format!(
            "tick: {} ({} fields{}), snapshot age {} min",
            temperature,
            snapshot.observation.fields.len(),
            staleness,
            snapshot.age_minutes_at(Utc::now())
        ),
    );
}
