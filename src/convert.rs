/// Unit conversion, raw provider values to display values.
///
/// The DPObs API reports SI units; displays want everyday ones. K to °C,
/// m/s to km/h, Pa to hPa, six-minute J/m² to W/m², everything else
/// untouched. Every rule keys off the field's catalog category, so a key is
/// converted by exactly one rule or passed through. These are pure
/// functions; the only side channel is the returned warning list, which the
/// coordinator hands to logging once per refresh.

use serde_json::{Map, Number, Value};

use crate::catalog::{self, Category};
use crate::model::Observation;

// ---------------------------------------------------------------------------
// Conversion warnings
// ---------------------------------------------------------------------------

/// Non-fatal signal that a value a rule applies to could not be converted
/// (non-numeric, or a non-finite result) and was passed through raw.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionWarning {
    pub key: String,
    pub raw: Value,
}

impl std::fmt::Display for ConversionWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "value for '{}' not convertible, passed through raw: {}",
            self.key, self.raw
        )
    }
}

// ---------------------------------------------------------------------------
// Conversion rules
// ---------------------------------------------------------------------------

type Rule = fn(f64) -> f64;

/// The display conversion for a category, if one applies.
///
/// Humidity, precipitation and everything in `Other` (directions,
/// visibility, sunshine duration, snow depth, cloud cover, soil state
/// codes) already arrive in display units.
fn conversion_rule(category: Category) -> Option<Rule> {
    match category {
        Category::Temperature => Some(|raw| round_to(raw - 273.15, 2)),
        Category::Wind => Some(|raw| round_to(raw * 3.6, 1)),
        Category::Pressure => Some(|raw| round_to(raw / 100.0, 1)),
        Category::Irradiance => Some(|raw| round_to(raw / 360.0, 2)),
        Category::Humidity | Category::Precipitation | Category::Other => None,
    }
}

/// Rounds to `decimals` places, half away from zero (`f64::round`
/// semantics): 1013.25 at one decimal displays as 1013.3.
fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

// ---------------------------------------------------------------------------
// Conversion entry points
// ---------------------------------------------------------------------------

/// Converts one raw field value to its display value.
///
/// Absent input yields absent output. Keys without a conversion rule, and
/// keys the catalog does not know, pass through unchanged. A non-numeric
/// value where a rule applies also passes through rather than erroring;
/// use `convert_checked` to observe that case.
pub fn convert(key: &str, raw: Option<&Value>) -> Option<Value> {
    convert_checked(key, raw).0
}

/// Like `convert`, but also reports the warning when a value a rule
/// applies to had to be passed through raw.
pub fn convert_checked(
    key: &str,
    raw: Option<&Value>,
) -> (Option<Value>, Option<ConversionWarning>) {
    let Some(raw) = raw else {
        return (None, None);
    };
    let category = match catalog::lookup(key) {
        Some(field) => field.category,
        // Unknown keys surface raw-only by contract; not a warning.
        None => return (Some(raw.clone()), None),
    };
    let rule = match conversion_rule(category) {
        Some(rule) => rule,
        None => return (Some(raw.clone()), None),
    };
    let converted = raw.as_f64().map(rule).and_then(Number::from_f64);
    match converted {
        Some(number) => (Some(Value::Number(number)), None),
        None => {
            let warning = ConversionWarning {
                key: key.to_string(),
                raw: raw.clone(),
            };
            (Some(raw.clone()), Some(warning))
        }
    }
}

/// Builds the converted-value map for a whole observation.
///
/// Walks the catalog keys present in the record, converting each through
/// its one rule, and collects the non-fatal warnings for the caller to log
/// once per refresh (never once per view read). Fields the catalog does
/// not know are left to the raw attribute bucket and do not appear here.
pub fn convert_observation(observation: &Observation) -> (Map<String, Value>, Vec<ConversionWarning>) {
    let mut converted = Map::new();
    let mut warnings = Vec::new();
    for key in catalog::all_keys() {
        let (value, warning) = convert_checked(key, observation.get(key));
        if let Some(value) = value {
            converted.insert(key.to_string(), value);
        }
        if let Some(warning) = warning {
            warnings.push(warning);
        }
    }
    (converted, warnings)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_all_temperature_keys_convert_kelvin_to_celsius() {
        for key in catalog::keys_in_category(Category::Temperature) {
            assert_eq!(
                convert(key, Some(&json!(290.0))),
                Some(json!(16.85)),
                "290 K should display as 16.85 °C for key '{}'",
                key
            );
            assert_eq!(
                convert(key, Some(&json!(273.15))),
                Some(json!(0.0)),
                "273.15 K is exactly 0 °C for key '{}'",
                key
            );
            assert_eq!(
                convert(key, None),
                None,
                "absent input must stay absent for key '{}'",
                key
            );
        }
    }

    #[test]
    fn test_all_wind_speed_keys_convert_to_kmh() {
        for key in catalog::keys_in_category(Category::Wind) {
            assert_eq!(
                convert(key, Some(&json!(5.0))),
                Some(json!(18.0)),
                "5 m/s should display as 18 km/h for key '{}'",
                key
            );
            assert_eq!(
                convert(key, Some(&json!(4.87))),
                Some(json!(17.5)),
                "wind speed rounds to one decimal for key '{}'",
                key
            );
        }
    }

    #[test]
    fn test_pressure_converts_and_rounds_half_away_from_zero() {
        // 101325 Pa is 1013.25 hPa; at one decimal the half rounds up.
        assert_eq!(convert("pres", Some(&json!(101325))), Some(json!(1013.3)));
        assert_eq!(convert("pmer", Some(&json!(100500))), Some(json!(1005.0)));
    }

    #[test]
    fn test_irradiance_converts_six_minute_joules_to_watts() {
        assert_eq!(convert("ray_glo01", Some(&json!(3600))), Some(json!(10.0)));
        assert_eq!(convert("ray_glo01", Some(&json!(1800))), Some(json!(5.0)));
        // 100 / 360 = 0.2777..., rounded to two decimals
        assert_eq!(convert("ray_glo01", Some(&json!(100))), Some(json!(0.28)));
    }

    #[test]
    fn test_uncovered_categories_pass_through_unchanged() {
        assert_eq!(convert("vv", Some(&json!(500))), Some(json!(500)));
        assert_eq!(convert("u", Some(&json!(55))), Some(json!(55)));
        assert_eq!(convert("rr1", Some(&json!(0.4))), Some(json!(0.4)));
        assert_eq!(convert("dd", Some(&json!(270))), Some(json!(270)));
        assert_eq!(convert("etat_sol", Some(&json!(1))), Some(json!(1)));
    }

    #[test]
    fn test_zero_is_a_valid_reading_not_an_absence() {
        // A humidity or rainfall of exactly zero must never be dropped.
        assert_eq!(convert("u", Some(&json!(0))), Some(json!(0)));
        assert_eq!(convert("rr", Some(&json!(0.0))), Some(json!(0.0)));
    }

    #[test]
    fn test_unknown_key_passes_through_without_warning() {
        let (value, warning) = convert_checked("geo_id_insee", Some(&json!(69029001)));
        assert_eq!(value, Some(json!(69029001)));
        assert!(
            warning.is_none(),
            "keys outside the catalog are raw-only by contract, not warnings"
        );
    }

    #[test]
    fn test_non_numeric_value_passes_through_with_warning() {
        // "mq" is the provider's occasional missing-quality marker.
        let (value, warning) = convert_checked("t", Some(&json!("mq")));
        assert_eq!(value, Some(json!("mq")), "raw value must survive unchanged");
        let warning = warning.expect("a temperature that is not a number should warn");
        assert_eq!(warning.key, "t");
        assert_eq!(warning.raw, json!("mq"));
        assert!(warning.to_string().contains("'t'"));
    }

    #[test]
    fn test_absent_value_yields_no_output_and_no_warning() {
        let (value, warning) = convert_checked("t", None);
        assert_eq!(value, None);
        assert!(warning.is_none());
    }

    #[test]
    fn test_convert_observation_builds_known_field_map() {
        let obs = Observation::new(
            json!({
                "t": 290.0,
                "ff": 5.0,
                "vv": 500,
                "etat_sol": 1,
                "geo_id_insee": 69029001,
                "reference_time": "2024-01-01T00:00:00Z",
            })
            .as_object()
            .cloned()
            .unwrap(),
        );

        let (converted, warnings) = convert_observation(&obs);

        assert_eq!(converted.get("t"), Some(&json!(16.85)));
        assert_eq!(converted.get("ff"), Some(&json!(18.0)));
        assert_eq!(converted.get("vv"), Some(&json!(500)));
        assert_eq!(converted.get("etat_sol"), Some(&json!(1)));
        assert!(
            !converted.contains_key("geo_id_insee"),
            "fields outside the catalog belong to the raw bucket only"
        );
        assert!(
            !converted.contains_key("tx"),
            "fields absent from the record must stay absent"
        );
        assert!(warnings.is_empty(), "all values here are numeric");
    }

    #[test]
    fn test_convert_observation_collects_warnings_once_each() {
        let obs = Observation::new(
            json!({
                "t": "mq",
                "pres": "indisponible",
                "u": 40,
            })
            .as_object()
            .cloned()
            .unwrap(),
        );

        let (converted, warnings) = convert_observation(&obs);

        assert_eq!(converted.get("t"), Some(&json!("mq")));
        assert_eq!(converted.get("pres"), Some(&json!("indisponible")));
        assert_eq!(converted.get("u"), Some(&json!(40)));
        let mut keys: Vec<&str> = warnings.iter().map(|w| w.key.as_str()).collect();
        keys.sort();
        assert_eq!(keys, vec!["pres", "t"]);
    }
}
