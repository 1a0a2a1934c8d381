/// field catalog, the display metadata table lives here
/// one row per DPObs measurement key: label, unit, category, host metadata.
/// Field catalog for the Météo-France station polling service.
///
/// Defines the canonical list of measurement keys the 6-minute observation
/// product can report, along with their display metadata. This is the single
/// source of truth for field keys: the converter keys its rules off the
/// categories here, and split-mode entity fan-out walks this table in
/// declaration order, so all other modules should reference fields from here
/// rather than hardcoding keys.

use std::fmt;

// ---------------------------------------------------------------------------
// Categories and state classes
// ---------------------------------------------------------------------------

/// Measurement category, the handle the unit converter keys its rules off.
///
/// Wind *directions* are `Other`, not `Wind`: only wind speeds are unit
/// converted, and putting directions in `Wind` would multiply degrees
/// by 3.6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Temperature,
    Humidity,
    Wind,
    Pressure,
    Precipitation,
    Irradiance,
    Other,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Temperature => "temperature",
            Category::Humidity => "humidity",
            Category::Wind => "wind",
            Category::Pressure => "pressure",
            Category::Precipitation => "precipitation",
            Category::Irradiance => "irradiance",
            Category::Other => "other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Host-platform statistics class for a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateClass {
    /// An instantaneous reading.
    Measurement,
    /// A running total that only grows between resets.
    TotalIncreasing,
}

impl StateClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            StateClass::Measurement => "measurement",
            StateClass::TotalIncreasing => "total_increasing",
        }
    }
}

impl fmt::Display for StateClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Field metadata
// ---------------------------------------------------------------------------

/// Display metadata for a single measurement key.
pub struct FieldSpec {
    /// DPObs field key as it appears in the JSON record.
    pub key: &'static str,
    /// Display name, in the provider's own French labels.
    pub name: &'static str,
    /// Display unit *after* conversion; `None` for coded values.
    pub unit: Option<&'static str>,
    /// Conversion/grouping category.
    pub category: Category,
    /// Host-platform device class, where one applies.
    pub device_class: Option<&'static str>,
    /// Host-platform statistics class; `None` for coded values.
    pub state_class: Option<StateClass>,
}

impl FieldSpec {
    /// Whether this field is a running total rather than an instantaneous
    /// reading.
    pub fn is_cumulative(&self) -> bool {
        matches!(self.state_class, Some(StateClass::TotalIncreasing))
    }
}

/// Every measurement key the 6-minute product can report, in the order
/// split-mode entities are created.
///
/// Sources:
///   - Keys and labels: Météo-France DPObs "infrahoraire-6m" records
///   - Units shown are the post-conversion display units (K → °C,
///     m/s → km/h, Pa → hPa, J/m² per 6 min → W/m²)
pub static FIELD_CATALOG: &[FieldSpec] = &[
    // Air and soil temperatures (converted from K)
    FieldSpec {
        key: "t",
        name: "Température 2m",
        unit: Some("°C"),
        category: Category::Temperature,
        device_class: Some("temperature"),
        state_class: Some(StateClass::Measurement),
    },
    FieldSpec {
        key: "td",
        name: "Point de rosée",
        unit: Some("°C"),
        category: Category::Temperature,
        device_class: Some("temperature"),
        state_class: Some(StateClass::Measurement),
    },
    FieldSpec {
        key: "t_10",
        name: "Température -10 cm",
        unit: Some("°C"),
        category: Category::Temperature,
        device_class: Some("temperature"),
        state_class: Some(StateClass::Measurement),
    },
    FieldSpec {
        key: "t_20",
        name: "Température -20 cm",
        unit: Some("°C"),
        category: Category::Temperature,
        device_class: Some("temperature"),
        state_class: Some(StateClass::Measurement),
    },
    FieldSpec {
        key: "t_50",
        name: "Température -50 cm",
        unit: Some("°C"),
        category: Category::Temperature,
        device_class: Some("temperature"),
        state_class: Some(StateClass::Measurement),
    },
    FieldSpec {
        key: "t_100",
        name: "Température -100 cm",
        unit: Some("°C"),
        category: Category::Temperature,
        device_class: Some("temperature"),
        state_class: Some(StateClass::Measurement),
    },
    FieldSpec {
        key: "tx",
        name: "Température max",
        unit: Some("°C"),
        category: Category::Temperature,
        device_class: Some("temperature"),
        state_class: Some(StateClass::Measurement),
    },
    FieldSpec {
        key: "tn",
        name: "Température min",
        unit: Some("°C"),
        category: Category::Temperature,
        device_class: Some("temperature"),
        state_class: Some(StateClass::Measurement),
    },
    // Relative humidity (%)
    FieldSpec {
        key: "u",
        name: "Humidité",
        unit: Some("%"),
        category: Category::Humidity,
        device_class: Some("humidity"),
        state_class: Some(StateClass::Measurement),
    },
    FieldSpec {
        key: "ux",
        name: "Humidité max",
        unit: Some("%"),
        category: Category::Humidity,
        device_class: Some("humidity"),
        state_class: Some(StateClass::Measurement),
    },
    FieldSpec {
        key: "un",
        name: "Humidité min",
        unit: Some("%"),
        category: Category::Humidity,
        device_class: Some("humidity"),
        state_class: Some(StateClass::Measurement),
    },
    // Wind speeds (converted from m/s) and directions (degrees, untouched)
    FieldSpec {
        key: "ff",
        name: "Vent moyen 10m",
        unit: Some("km/h"),
        category: Category::Wind,
        device_class: Some("wind_speed"),
        state_class: Some(StateClass::Measurement),
    },
    FieldSpec {
        key: "fxi",
        name: "Rafale instantanée",
        unit: Some("km/h"),
        category: Category::Wind,
        device_class: Some("wind_speed"),
        state_class: Some(StateClass::Measurement),
    },
    FieldSpec {
        key: "fxy",
        name: "Vent max 10 min",
        unit: Some("km/h"),
        category: Category::Wind,
        device_class: Some("wind_speed"),
        state_class: Some(StateClass::Measurement),
    },
    FieldSpec {
        key: "dd",
        name: "Direction vent",
        unit: Some("°"),
        category: Category::Other,
        device_class: None,
        state_class: Some(StateClass::Measurement),
    },
    FieldSpec {
        key: "dxi",
        name: "Direction rafale inst.",
        unit: Some("°"),
        category: Category::Other,
        device_class: None,
        state_class: Some(StateClass::Measurement),
    },
    FieldSpec {
        key: "dxy",
        name: "Direction vent max 10m",
        unit: Some("°"),
        category: Category::Other,
        device_class: None,
        state_class: Some(StateClass::Measurement),
    },
    // Visibility (meters, untouched)
    FieldSpec {
        key: "vv",
        name: "Visibilité",
        unit: Some("m"),
        category: Category::Other,
        device_class: Some("distance"),
        state_class: Some(StateClass::Measurement),
    },
    // Precipitation (mm, untouched)
    FieldSpec {
        key: "rr_per",
        name: "Précipitations 6 min",
        unit: Some("mm"),
        category: Category::Precipitation,
        device_class: Some("precipitation"),
        state_class: Some(StateClass::Measurement),
    },
    FieldSpec {
        key: "rr1",
        name: "Précipitations 1h",
        unit: Some("mm"),
        category: Category::Precipitation,
        device_class: Some("precipitation"),
        state_class: Some(StateClass::Measurement),
    },
    FieldSpec {
        key: "rr",
        name: "Précipitations",
        unit: Some("mm"),
        category: Category::Precipitation,
        device_class: Some("precipitation"),
        state_class: Some(StateClass::Measurement),
    },
    FieldSpec {
        key: "rr24",
        name: "Précipitations 24h",
        unit: Some("mm"),
        category: Category::Precipitation,
        device_class: Some("precipitation"),
        state_class: Some(StateClass::Measurement),
    },
    // Global radiation (J/m² over 6 min, converted to W/m²) and sunshine
    FieldSpec {
        key: "ray_glo01",
        name: "Rayonnement global",
        unit: Some("W/m²"),
        category: Category::Irradiance,
        device_class: Some("irradiance"),
        state_class: Some(StateClass::Measurement),
    },
    FieldSpec {
        key: "insolh",
        name: "Ensoleillement 1h",
        unit: Some("min"),
        category: Category::Other,
        device_class: None,
        state_class: Some(StateClass::Measurement),
    },
    // Pressure (converted from Pa)
    FieldSpec {
        key: "pres",
        name: "Pression station",
        unit: Some("hPa"),
        category: Category::Pressure,
        device_class: Some("pressure"),
        state_class: Some(StateClass::Measurement),
    },
    FieldSpec {
        key: "pmer",
        name: "Pression mer",
        unit: Some("hPa"),
        category: Category::Pressure,
        device_class: Some("pressure"),
        state_class: Some(StateClass::Measurement),
    },
    // Miscellaneous: coded soil state, snow depth, cloud cover
    FieldSpec {
        key: "etat_sol",
        name: "État du sol",
        unit: None,
        category: Category::Other,
        device_class: None,
        state_class: None,
    },
    FieldSpec {
        key: "sss",
        name: "Neige au sol",
        unit: Some("cm"),
        category: Category::Other,
        device_class: None,
        state_class: Some(StateClass::Measurement),
    },
    FieldSpec {
        key: "n",
        name: "Nébulosité",
        unit: Some("%"),
        category: Category::Other,
        device_class: None,
        state_class: Some(StateClass::Measurement),
    },
];

/// Returns every known field key in catalog (declaration) order.
///
/// The order is stable across calls within a process run, which keeps
/// split-mode entity creation order deterministic.
pub fn all_keys() -> Vec<&'static str> {
    FIELD_CATALOG.iter().map(|f| f.key).collect()
}

/// Returns the keys belonging to one category, in catalog order.
/// Useful for exercising every key a conversion rule applies to.
pub fn keys_in_category(category: Category) -> Vec<&'static str> {
    FIELD_CATALOG
        .iter()
        .filter(|f| f.category == category)
        .map(|f| f.key)
        .collect()
}

/// Looks up a field by key. Returns `None` for keys the catalog does not
/// know, which the pipeline surfaces raw-only.
pub fn lookup(key: &str) -> Option<&'static FieldSpec> {
    FIELD_CATALOG.iter().find(|f| f.key == key)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
