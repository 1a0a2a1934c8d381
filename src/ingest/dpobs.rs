/// Météo-France DPObs API Client
///
/// Retrieves one "infrahoraire" 6-minute observation record for a single
/// station from the Météo-France public API. One blocking call per refresh,
/// no retries here; the next scheduled refresh is the retry.
///
/// API portal: https://portail-api.meteofrance.fr (DonneesPubliquesObservation)
/// Endpoint: /public/DPObs/v1/station/infrahoraire-6m

use serde_json::Value;

use crate::coordinator::ObservationSource;
use crate::model::{FetchError, Observation};

/// Production endpoint for station observations. Tests point the fetcher at
/// a local mock server instead.
pub const API_URL: &str =
    "https://public-api.meteofrance.fr/public/DPObs/v1/station/infrahoraire-6m";

/// Bounded wait for one observation call. The provider normally answers in
/// well under a second; past this the refresh fails as a transport error.
pub const REQUEST_TIMEOUT_SECS: u64 = 15;

// ============================================================================
// HTTP Client
// ============================================================================

/// Builds the blocking HTTP client used for all DPObs calls, with the
/// request timeout baked in.
pub fn build_client() -> Result<reqwest::blocking::Client, reqwest::Error> {
    reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()
}

/// Builds the observation request URL for one station.
///
/// The API takes the credential as an `apikey` query parameter alongside
/// the station identifier and response format.
pub fn build_observation_url(base_url: &str, station_id: &str, api_key: &str) -> String {
    format!(
        "{}?id_station={}&format=json&apikey={}",
        base_url, station_id, api_key
    )
}

// ============================================================================
// Fetch
// ============================================================================

/// Fetch the most recent observation record for a station.
///
/// # Parameters
/// - `client`: HTTP client (see `build_client`)
/// - `base_url`: endpoint to call, normally `API_URL`
/// - `station_id`: Météo-France station identifier (e.g. "69029001")
/// - `api_key`: DPObs application API key
///
/// # Returns
/// The last record of the returned sequence (the most recent 6-minute
/// slot). Fails with `Auth` on 401/403, `Transport` on network errors,
/// timeouts and other non-2xx statuses, and `Format` when the body is not
/// a non-empty list of records (bare array or `{"obs": [...]}` envelope).
pub fn fetch_observation(
    client: &reqwest::blocking::Client,
    base_url: &str,
    station_id: &str,
    api_key: &str,
) -> Result<Observation, FetchError> {
    let url = build_observation_url(base_url, station_id, api_key);

    let response = client
        .get(&url)
        .header("Accept", "application/json")
        .send()
        .map_err(|e| FetchError::Transport(e.to_string()))?;

    let status = response.status().as_u16();
    if status == 401 || status == 403 {
        return Err(FetchError::Auth(status));
    }
    if !response.status().is_success() {
        return Err(FetchError::Transport(format!("HTTP status {}", status)));
    }

    let body = response
        .text()
        .map_err(|e| FetchError::Transport(e.to_string()))?;

    parse_observation_body(&body)
}

/// Parse a DPObs response body into the most recent observation record.
///
/// The API returns either a bare JSON array of records or an object with
/// an `obs` array; both are accepted. Records are ordered oldest first, so
/// the last one is the freshest slot.
pub fn parse_observation_body(body: &str) -> Result<Observation, FetchError> {
    let payload: Value = serde_json::from_str(body)
        .map_err(|e| FetchError::Format(format!("response is not JSON: {}", e)))?;

    let mut records = match payload {
        Value::Array(records) => records,
        Value::Object(mut envelope) => match envelope.remove("obs") {
            Some(Value::Array(records)) => records,
            Some(_) => {
                return Err(FetchError::Format(
                    "'obs' is not a list of records".to_string(),
                ));
            }
            None => return Err(FetchError::Format("missing 'obs' envelope".to_string())),
        },
        _ => return Err(FetchError::Format("expected a list of records".to_string())),
    };

    let record = records
        .pop()
        .ok_or_else(|| FetchError::Format("empty observation list".to_string()))?;

    match record {
        Value::Object(fields) => Ok(Observation::new(fields)),
        other => Err(FetchError::Format(format!(
            "record is not an object: {}",
            other
        ))),
    }
}

// ============================================================================
// Coordinator Source
// ============================================================================

/// Binds an HTTP client, station and credential behind the coordinator's
/// `ObservationSource` seam.
pub struct DpObsSource {
    client: reqwest::blocking::Client,
    base_url: String,
    station_id: String,
    api_key: String,
}

impl DpObsSource {
    pub fn new(client: reqwest::blocking::Client, station_id: &str, api_key: &str) -> Self {
        DpObsSource {
            client,
            base_url: API_URL.to_string(),
            station_id: station_id.to_string(),
            api_key: api_key.to_string(),
        }
    }

    /// Point the source at a different endpoint; tests use a local mock
    /// server here.
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.to_string();
        self
    }
}

impl ObservationSource for DpObsSource {
    fn fetch(&self) -> Result<Observation, FetchError> {
        fetch_observation(&self.client, &self.base_url, &self.station_id, &self.api_key)
    }
}

// ============================================================================
// Tests
// ============================================================================
