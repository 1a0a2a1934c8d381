/// Entity views over a station's snapshot.
///
/// Two presentation modes for the same data. Aggregate mode exposes one
/// entity whose primary value is the converted temperature and whose
/// attribute map carries every other converted field plus the raw record.
/// Split mode exposes one entity per cataloged field key, each with its own
/// unit and device class. Views are pure readers over the coordinator's
/// snapshot and hold no per-view measurement state.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::catalog::{self, Category, FieldSpec, StateClass};
use crate::config::{Mode, StationConfig};
use crate::coordinator::{ObservationSource, RefreshCoordinator};
use crate::logging::{self, DataSource};
use crate::model::{FetchError, FIELD_REFERENCE_TIME, FIELD_TEMPERATURE};

// ---------------------------------------------------------------------------
// Device metadata
// ---------------------------------------------------------------------------

pub const MANUFACTURER: &str = "Météo-France";
pub const MODEL: &str = "DPObs 6min";

/// Attribute keys shared by both view kinds.
pub const ATTR_RAW: &str = "raw";
pub const ATTR_RAW_VALUE: &str = "raw_value";
pub const ATTR_STALE: &str = "stale";

/// Grouping metadata handed to the host platform so all entities of one
/// station land under a single device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// `(entity_name, station_id)` pair identifying the device.
    pub identifiers: (String, String),
    pub name: String,
    pub manufacturer: &'static str,
    pub model: &'static str,
}

impl DeviceInfo {
    pub fn for_station(entity_name: &str, station_id: &str) -> DeviceInfo {
        DeviceInfo {
            identifiers: (entity_name.to_string(), station_id.to_string()),
            name: entity_name.to_string(),
            manufacturer: MANUFACTURER,
            model: MODEL,
        }
    }
}

/// Lowercased unique-id stem: alphanumerics kept, everything else `_`.
fn slugify(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect()
}

// ---------------------------------------------------------------------------
// Aggregate view
// ---------------------------------------------------------------------------

/// One entity for the whole station: converted temperature as the primary
/// value, everything else in the attribute map.
pub struct AggregateView {
    coordinator: Arc<RefreshCoordinator>,
    entity_name: String,
    device: DeviceInfo,
}

impl AggregateView {
    pub fn new(
        coordinator: Arc<RefreshCoordinator>,
        entity_name: &str,
        device: DeviceInfo,
    ) -> AggregateView {
        AggregateView {
            coordinator,
            entity_name: entity_name.to_string(),
            device,
        }
    }

    pub fn name(&self) -> &str {
        &self.entity_name
    }

    pub fn unique_id(&self) -> String {
        format!("{}_{}", slugify(&self.entity_name), self.coordinator.station_id())
    }

    /// Converted station temperature in °C, absent when the current
    /// observation carries no `t` field.
    pub fn primary_value(&self) -> Option<f64> {
        let snapshot = self.coordinator.current_snapshot()?;
        snapshot
            .converted_value(FIELD_TEMPERATURE)
            .and_then(Value::as_f64)
    }

    pub fn unit(&self) -> Option<&'static str> {
        catalog::lookup(FIELD_TEMPERATURE).and_then(|spec| spec.unit)
    }

    pub fn device_class(&self) -> Option<&'static str> {
        catalog::lookup(FIELD_TEMPERATURE).and_then(|spec| spec.device_class)
    }

    pub fn state_class(&self) -> Option<StateClass> {
        catalog::lookup(FIELD_TEMPERATURE).and_then(|spec| spec.state_class)
    }

    pub fn device_info(&self) -> &DeviceInfo {
        &self.device
    }

    /// Every converted field of the current observation, the observation's
    /// reference time, a staleness flag, and the untouched raw record under
    /// `raw`. Unknown provider fields appear inside `raw` only.
    pub fn attributes(&self) -> Map<String, Value> {
        let mut attrs = Map::new();
        let snapshot = match self.coordinator.current_snapshot() {
            Some(snapshot) => snapshot,
            None => return attrs,
        };

        for (key, value) in &snapshot.converted {
            attrs.insert(key.clone(), value.clone());
        }
        if let Some(reference) = snapshot.observation.get(FIELD_REFERENCE_TIME) {
            attrs.insert(FIELD_REFERENCE_TIME.to_string(), reference.clone());
        }
        attrs.insert(ATTR_STALE.to_string(), Value::Bool(snapshot.is_stale()));
        attrs.insert(
            ATTR_RAW.to_string(),
            Value::Object(snapshot.observation.fields.clone()),
        );
        attrs
    }
}

// ---------------------------------------------------------------------------
// Split view
// ---------------------------------------------------------------------------

/// One entity for a single cataloged field key.
pub struct SplitView {
    coordinator: Arc<RefreshCoordinator>,
    spec: &'static FieldSpec,
    entity_name: String,
    device: DeviceInfo,
}

impl SplitView {
    pub fn new(
        coordinator: Arc<RefreshCoordinator>,
        spec: &'static FieldSpec,
        entity_name: &str,
        device: DeviceInfo,
    ) -> SplitView {
        SplitView {
            coordinator,
            spec,
            entity_name: entity_name.to_string(),
            device,
        }
    }

    pub fn key(&self) -> &'static str {
        self.spec.key
    }

    pub fn name(&self) -> String {
        format!("{} {}", self.entity_name, self.spec.name)
    }

    pub fn unique_id(&self) -> String {
        format!("{}_{}", slugify(&self.entity_name), self.spec.key)
    }

    /// Converted value for this view's field, absent when the current
    /// observation does not carry it.
    pub fn value(&self) -> Option<Value> {
        let snapshot = self.coordinator.current_snapshot()?;
        snapshot.converted_value(self.spec.key).cloned()
    }

    pub fn unit(&self) -> Option<&'static str> {
        self.spec.unit
    }

    pub fn category(&self) -> Category {
        self.spec.category
    }

    pub fn device_class(&self) -> Option<&'static str> {
        self.spec.device_class
    }

    pub fn state_class(&self) -> Option<StateClass> {
        self.spec.state_class
    }

    pub fn device_info(&self) -> &DeviceInfo {
        &self.device
    }

    /// Diagnostics only: the raw unconverted value, the observation's
    /// reference time, and the staleness flag.
    pub fn attributes(&self) -> Map<String, Value> {
        let mut attrs = Map::new();
        let snapshot = match self.coordinator.current_snapshot() {
            Some(snapshot) => snapshot,
            None => return attrs,
        };

        if let Some(raw) = snapshot.observation.get(self.spec.key) {
            attrs.insert(ATTR_RAW_VALUE.to_string(), raw.clone());
        }
        if let Some(reference) = snapshot.observation.get(FIELD_REFERENCE_TIME) {
            attrs.insert(FIELD_REFERENCE_TIME.to_string(), reference.clone());
        }
        attrs.insert(ATTR_STALE.to_string(), Value::Bool(snapshot.is_stale()));
        attrs
    }
}

// ---------------------------------------------------------------------------
// Instance setup
// ---------------------------------------------------------------------------

/// The views one configured station exposes, per its mode.
pub enum Entities {
    Aggregate(AggregateView),
    Split(Vec<SplitView>),
}

impl Entities {
    pub fn count(&self) -> usize {
        match self {
            Entities::Aggregate(_) => 1,
            Entities::Split(views) => views.len(),
        }
    }
}

/// A fully set-up station: its coordinator plus the entity views built for
/// the configured mode.
pub struct StationInstance {
    pub coordinator: Arc<RefreshCoordinator>,
    pub entities: Entities,
}

impl std::fmt::Debug for StationInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StationInstance")
            .field("entity_count", &self.entities.count())
            .finish_non_exhaustive()
    }
}

/// Builds the coordinator, runs the synchronous first refresh, and fans out
/// the entity views. The first refresh's error propagates so a bad API key
/// or unreachable provider fails setup instead of producing empty entities.
pub fn setup_instance(
    config: &StationConfig,
    source: Box<dyn ObservationSource>,
) -> Result<StationInstance, FetchError> {
    let coordinator = Arc::new(RefreshCoordinator::new(&config.station_id, source));
    coordinator.request_refresh()?;

    let device = DeviceInfo::for_station(&config.entity_name, &config.station_id);
    let entities = match config.mode {
        Mode::Aggregate => Entities::Aggregate(AggregateView::new(
            Arc::clone(&coordinator),
            &config.entity_name,
            device,
        )),
        Mode::Split => Entities::Split(
            catalog::FIELD_CATALOG
                .iter()
                .map(|spec| {
                    SplitView::new(
                        Arc::clone(&coordinator),
                        spec,
                        &config.entity_name,
                        device.clone(),
                    )
                })
                .collect(),
        ),
    };

    logging::info(
        DataSource::Coordinator,
        Some(&config.station_id),
        &format!(
            "instance ready: {} {} entit{}",
            entities.count(),
            config.mode,
            if entities.count() == 1 { "y" } else { "ies" }
        ),
    );

    Ok(StationInstance {
        coordinator,
        entities,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
