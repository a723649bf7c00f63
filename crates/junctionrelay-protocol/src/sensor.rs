//! Sensor records: the canonical value a collector reports for one
//! measurement.
//!
//! `value` is always a string; numeric values are rendered by the plugin
//! with explicit decimal precision. Within one `fetchSensors` reply,
//! `uniqueSensorKey` values must be unique.

use serde::{Deserialize, Deserializer, Serialize};

/// Upper bound for `decimalPlaces`; values outside [0, 15] are clamped.
pub const MAX_DECIMAL_PLACES: u8 = 15;

/// One sensor measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorReading {
    /// Stable identity within a plugin; persisted downstream as an
    /// external id.
    pub unique_sensor_key: String,
    pub name: String,
    /// Rendered value. Always a string, never null.
    pub value: String,
    pub unit: String,
    pub category: String,
    /// Decimal precision used to render numeric values.
    #[serde(deserialize_with = "de_clamped_decimal")]
    pub decimal_places: u8,
    /// Free-form kind tag; common values are `Numeric`, `Text`,
    /// `DateTime`, `API`, and `Boolean`.
    pub sensor_type: String,
    pub component_name: String,
    pub sensor_tag: String,
}

impl SensorReading {
    /// Clamp `decimal_places` into the valid range.
    pub fn sanitized(mut self) -> Self {
        self.decimal_places = self.decimal_places.min(MAX_DECIMAL_PLACES);
        self
    }
}

/// Clamp an arbitrary integer into the valid `decimalPlaces` range.
pub fn clamp_decimal_places(n: i64) -> u8 {
    n.clamp(0, i64::from(MAX_DECIMAL_PLACES)) as u8
}

fn de_clamped_decimal<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let n = i64::deserialize(deserializer)?;
    Ok(clamp_decimal_places(n))
}

/// Number of fractional digits in the canonical rendering of a numeric
/// string, trailing zeros collapsed. Non-numeric input (including the
/// empty string) yields 0.
pub fn decimal_places_of(s: &str) -> u8 {
    let Ok(n) = s.trim().parse::<f64>() else {
        return 0;
    };
    if !n.is_finite() {
        return 0;
    }
    // f64 Display is the shortest round-trip form: trailing zeros are
    // already collapsed and scientific notation is never used.
    let canonical = n.to_string();
    match canonical.split_once('.') {
        Some((_, fraction)) => clamp_decimal_places(fraction.len() as i64),
        None => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample(key: &str) -> SensorReading {
        SensorReading {
            unique_sensor_key: key.into(),
            name: "Outdoor temperature".into(),
            value: "21.50".into(),
            unit: "°C".into(),
            category: "Weather".into(),
            decimal_places: 2,
            sensor_type: "Numeric".into(),
            component_name: "acme-weather".into(),
            sensor_tag: "outdoor-temp".into(),
        }
    }

    #[test]
    fn reading_roundtrip() {
        let reading = sample("acme.weather/outdoor-temp");
        let text = serde_json::to_string(&reading).unwrap();
        let restored: SensorReading = serde_json::from_str(&text).unwrap();
        assert_eq!(restored, reading);
    }

    #[test]
    fn reading_wire_names() {
        let value = serde_json::to_value(sample("k")).unwrap();
        assert_eq!(value["uniqueSensorKey"], "k");
        assert_eq!(value["decimalPlaces"], 2);
        assert_eq!(value["sensorType"], "Numeric");
        assert_eq!(value["componentName"], "acme-weather");
        assert_eq!(value["sensorTag"], "outdoor-temp");
    }

    #[test]
    fn out_of_range_decimal_places_is_clamped_on_decode() {
        let reading: SensorReading = serde_json::from_value(json!({
            "uniqueSensorKey": "k",
            "name": "n",
            "value": "1",
            "unit": "",
            "category": "",
            "decimalPlaces": 99,
            "sensorType": "Numeric",
            "componentName": "c",
            "sensorTag": "t",
        }))
        .unwrap();
        assert_eq!(reading.decimal_places, 15);
    }

    #[test]
    fn clamp_properties() {
        assert_eq!(clamp_decimal_places(-3), 0);
        assert_eq!(clamp_decimal_places(0), 0);
        assert_eq!(clamp_decimal_places(7), 7);
        assert_eq!(clamp_decimal_places(15), 15);
        assert_eq!(clamp_decimal_places(16), 15);
        assert_eq!(clamp_decimal_places(i64::MAX), 15);
        assert_eq!(clamp_decimal_places(i64::MIN), 0);
    }

    #[test]
    fn decimal_places_of_numeric_strings() {
        assert_eq!(decimal_places_of("21.5"), 1);
        assert_eq!(decimal_places_of("21.50"), 1); // trailing zero collapses
        assert_eq!(decimal_places_of("21"), 0);
        assert_eq!(decimal_places_of("21.0"), 0);
        assert_eq!(decimal_places_of("-3.125"), 3);
        assert_eq!(decimal_places_of("0.000000001"), 9);
        assert_eq!(decimal_places_of(" 2.25 "), 2);
    }

    #[test]
    fn decimal_places_of_non_numeric() {
        assert_eq!(decimal_places_of(""), 0);
        assert_eq!(decimal_places_of("abc"), 0);
        assert_eq!(decimal_places_of("1.2.3"), 0);
        assert_eq!(decimal_places_of("NaN"), 0);
        assert_eq!(decimal_places_of("inf"), 0);
    }
}
