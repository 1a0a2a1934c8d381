/// Station configuration.
///
/// Loaded once at startup from a small TOML file, with the API key resolved
/// from the environment first so the secret can stay out of the file (a
/// `.env` entry for `METEOFRANCE_API_KEY` is the usual setup). Everything
/// except the key has a default aimed at the Lyon-Bron reference station.

use std::env;
use std::fmt;
use std::fs;
use std::str::FromStr;

use serde::Deserialize;

use crate::logging::{self, DataSource};

pub const DEFAULT_STATION_ID: &str = "69029001";
pub const DEFAULT_ENTITY_NAME: &str = "MaMeteo";
pub const DEFAULT_UPDATE_MINUTES: u32 = 6;

/// Environment variable the API key is read from; wins over the file value.
pub const API_KEY_ENV: &str = "METEOFRANCE_API_KEY";

// ---------------------------------------------------------------------------
// Mode
// ---------------------------------------------------------------------------

/// How the station's fields are presented: one entity carrying everything,
/// or one entity per cataloged field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Aggregate,
    Split,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Aggregate => "aggregate",
            Mode::Split => "split",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Mode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "aggregate" => Ok(Mode::Aggregate),
            "split" => Ok(Mode::Split),
            other => Err(ConfigError::UnknownMode(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The config file could not be read.
    Read(String),
    /// The config file is not valid TOML, or a field has the wrong type.
    Parse(String),
    /// No API key in the environment and none in the file.
    MissingApiKey,
    /// `mode` is neither `aggregate` nor `split`.
    UnknownMode(String),
    /// `update_minutes` is outside 1..=60.
    BadUpdateMinutes(u32),
    /// `station_id` is present but blank.
    EmptyStationId,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Read(msg) => write!(f, "Config read error: {}", msg),
            ConfigError::Parse(msg) => write!(f, "Config parse error: {}", msg),
            ConfigError::MissingApiKey => write!(
                f,
                "Missing API key: set {} or api_key in the config file",
                API_KEY_ENV
            ),
            ConfigError::UnknownMode(mode) => write!(
                f,
                "Unknown mode '{}': expected \"aggregate\" or \"split\"",
                mode
            ),
            ConfigError::BadUpdateMinutes(minutes) => write!(
                f,
                "update_minutes must be between 1 and 60, got {}",
                minutes
            ),
            ConfigError::EmptyStationId => write!(f, "station_id must not be empty"),
        }
    }
}

impl std::error::Error for ConfigError {}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Validated configuration for one station instance. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StationConfig {
    pub api_key: String,
    pub station_id: String,
    pub entity_name: String,
    pub mode: Mode,
    pub update_minutes: u32,
}

/// File shape before validation. Unknown keys are tolerated.
#[derive(Debug, Deserialize)]
struct RawConfig {
    api_key: Option<String>,
    #[serde(default = "default_station_id")]
    station_id: String,
    #[serde(default = "default_entity_name")]
    entity_name: String,
    #[serde(default = "default_mode")]
    mode: String,
    #[serde(default = "default_update_minutes")]
    update_minutes: u32,
}

fn default_station_id() -> String {
    DEFAULT_STATION_ID.to_string()
}

fn default_entity_name() -> String {
    DEFAULT_ENTITY_NAME.to_string()
}

fn default_mode() -> String {
    Mode::Aggregate.as_str().to_string()
}

fn default_update_minutes() -> u32 {
    DEFAULT_UPDATE_MINUTES
}

/// Reads and validates the config file, taking the API key from the
/// environment when present.
pub fn load_config(path: &str) -> Result<StationConfig, ConfigError> {
    let text = fs::read_to_string(path)
        .map_err(|err| ConfigError::Read(format!("{}: {}", path, err)))?;
    let config = parse_config(&text, env::var(API_KEY_ENV).ok())?;
    logging::info(
        DataSource::Config,
        Some(&config.station_id),
        &format!(
            "configuration loaded: '{}', mode {}, refresh every {} min",
            config.entity_name, config.mode, config.update_minutes
        ),
    );
    Ok(config)
}

/// Parses and validates config text. The environment's API key is passed in
/// explicitly so tests stay free of process-global state.
pub fn parse_config(
    text: &str,
    env_api_key: Option<String>,
) -> Result<StationConfig, ConfigError> {
    let raw: RawConfig =
        toml::from_str(text).map_err(|err| ConfigError::Parse(err.to_string()))?;

    let api_key = resolve_api_key(raw.api_key, env_api_key)?;
    if raw.station_id.trim().is_empty() {
        return Err(ConfigError::EmptyStationId);
    }
    if !(1..=60).contains(&raw.update_minutes) {
        return Err(ConfigError::BadUpdateMinutes(raw.update_minutes));
    }
    let mode = raw.mode.parse::<Mode>()?;

    Ok(StationConfig {
        api_key,
        station_id: raw.station_id,
        entity_name: raw.entity_name,
        mode,
        update_minutes: raw.update_minutes,
    })
}

/// Environment first, file second; blank values count as absent.
fn resolve_api_key(
    file_key: Option<String>,
    env_key: Option<String>,
) -> Result<String, ConfigError> {
    env_key
        .filter(|key| !key.trim().is_empty())
        .or(file_key.filter(|key| !key.trim().is_empty()))
        .ok_or(ConfigError::MissingApiKey)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
