// Telemetry domain models
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("message is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("telemetry record is missing or has a mistyped `{0}`")]
    MissingField(&'static str),
    #[error("telemetry payload is not a JSON object")]
    NotAnObject,
}

/// Coerce any JSON value into a finite number.
///
/// Numbers pass through, numeric strings are parsed, everything else
/// (null, booleans, garbage strings, "NaN", infinities) becomes 0.0.
pub fn coerce_number(value: &Value) -> f64 {
    let parsed = match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    if parsed.is_finite() { parsed } else { 0.0 }
}

fn lenient_number<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(coerce_number(&value))
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    })
}

fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Bool(b) => b,
        Value::String(s) => s.eq_ignore_ascii_case("true"),
        Value::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
        _ => false,
    })
}

/// Nested objects of the wrong shape collapse to their default instead of
/// failing the whole record.
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

fn lenient_messages<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s),
                Value::Null => None,
                other => Some(other.to_string()),
            })
            .collect(),
        _ => Vec::new(),
    })
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct PressureReading {
    #[serde(deserialize_with = "lenient_number")]
    pub mean_value: f64,
    #[serde(deserialize_with = "lenient_number")]
    pub min_value: f64,
    #[serde(deserialize_with = "lenient_number")]
    pub max_value: f64,
    #[serde(deserialize_with = "lenient_string")]
    pub back_color: String,
}

impl PressureReading {
    #[cfg(test)]
    pub fn new(mean_value: f64, min_value: f64, max_value: f64) -> Self {
        Self {
            mean_value,
            min_value,
            max_value,
            back_color: String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct StatusIndicator {
    #[serde(deserialize_with = "lenient_string")]
    pub text: String,
    #[serde(deserialize_with = "lenient_string")]
    pub color: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SystemStatus {
    #[serde(deserialize_with = "lenient")]
    pub ext_left: StatusIndicator,
    #[serde(deserialize_with = "lenient")]
    pub ext_right: StatusIndicator,
    #[serde(rename = "CANStatus", deserialize_with = "lenient")]
    pub can_status: StatusIndicator,
    #[serde(deserialize_with = "lenient")]
    pub bytes_sent: StatusIndicator,
    #[serde(deserialize_with = "lenient")]
    pub bytes_recd: StatusIndicator,
    #[serde(deserialize_with = "lenient")]
    pub strokes: StatusIndicator,
    #[serde(deserialize_with = "lenient")]
    pub int_left: StatusIndicator,
    #[serde(deserialize_with = "lenient")]
    pub int_right: StatusIndicator,
    #[serde(deserialize_with = "lenient")]
    pub bus_load: StatusIndicator,
}

/// Per-pump metrics for one side of the heart.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct HeartData {
    #[serde(deserialize_with = "lenient_number")]
    pub stroke_volume: f64,
    #[serde(deserialize_with = "lenient")]
    pub power_consumption: PressureReading,
    #[serde(deserialize_with = "lenient")]
    pub int_pressure: PressureReading,
    #[serde(deserialize_with = "lenient")]
    pub medical_pressure: PressureReading,
    #[serde(deserialize_with = "lenient_number")]
    pub int_pressure_min: f64,
    #[serde(deserialize_with = "lenient_number")]
    pub int_pressure_max: f64,
    #[serde(deserialize_with = "lenient")]
    pub cardiac_output: PressureReading,
    #[serde(deserialize_with = "lenient_number")]
    pub actual_stroke_len: f64,
    #[serde(deserialize_with = "lenient_number")]
    pub target_stroke_len: f64,
    #[serde(deserialize_with = "lenient_number")]
    pub sensor_temperature: f64,
    #[serde(deserialize_with = "lenient_number")]
    pub thermistor_temperature: f64,
    #[serde(deserialize_with = "lenient_number")]
    pub cpu_load: f64,
    #[serde(deserialize_with = "lenient_number")]
    pub outflow_pressure: f64,
}

/// Canonical snapshot of device state, replaced wholesale on every update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct TelemetryRecord {
    #[serde(deserialize_with = "lenient_string")]
    pub timestamp: String,
    #[serde(deserialize_with = "lenient_string")]
    pub system_id: String,
    #[serde(deserialize_with = "lenient")]
    pub status_data: SystemStatus,
    #[serde(deserialize_with = "lenient")]
    pub left_heart: HeartData,
    #[serde(deserialize_with = "lenient")]
    pub right_heart: HeartData,
    #[serde(deserialize_with = "lenient_number")]
    pub heart_rate: f64,
    #[serde(deserialize_with = "lenient_string")]
    pub operation_state: String,
    #[serde(deserialize_with = "lenient_string")]
    pub heart_status: String,
    #[serde(deserialize_with = "lenient_string")]
    pub flow_limit_state: String,
    #[serde(deserialize_with = "lenient_number")]
    pub flow_limit: f64,
    #[serde(deserialize_with = "lenient_number")]
    pub atmos_pressure: f64,
    #[serde(deserialize_with = "lenient_bool")]
    pub use_medical_sensor: bool,
    #[serde(rename = "AoPSensor", deserialize_with = "lenient")]
    pub aop_sensor: PressureReading,
    #[serde(rename = "CVPSensor", deserialize_with = "lenient")]
    pub cvp_sensor: PressureReading,
    #[serde(rename = "PAPSensor", deserialize_with = "lenient")]
    pub pap_sensor: PressureReading,
    #[serde(deserialize_with = "lenient")]
    pub art_press_sensor: PressureReading,
    #[serde(rename = "IVCSensorVal", deserialize_with = "lenient")]
    pub ivc_sensor: PressureReading,
    #[serde(deserialize_with = "lenient_string")]
    pub local_clock: String,
    #[serde(deserialize_with = "lenient_messages")]
    pub messages: Vec<String>,
}

impl TelemetryRecord {
    /// Validate the required shape and coerce a parsed payload into a record.
    pub fn from_value(value: Value) -> Result<Self, TelemetryError> {
        let object = value.as_object().ok_or(TelemetryError::NotAnObject)?;

        let require_string = |key: &'static str| match object.get(key) {
            Some(Value::String(_)) => Ok(()),
            _ => Err(TelemetryError::MissingField(key)),
        };
        let require_object = |key: &'static str| match object.get(key) {
            Some(Value::Object(_)) => Ok(()),
            _ => Err(TelemetryError::MissingField(key)),
        };

        require_string("SystemId")?;
        require_string("HeartStatus")?;
        require_object("LeftHeart")?;
        require_object("RightHeart")?;
        require_object("StatusData")?;

        Ok(serde_json::from_value(value)?)
    }

    pub fn from_json(raw: &str) -> Result<Self, TelemetryError> {
        let value: Value = serde_json::from_str(raw)?;
        Self::from_value(value)
    }

    pub fn heart(&self, side: HeartSide) -> &HeartData {
        match side {
            HeartSide::Left => &self.left_heart,
            HeartSide::Right => &self.right_heart,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeartSide {
    Left,
    Right,
}

impl HeartSide {
    pub const ALL: [HeartSide; 2] = [HeartSide::Left, HeartSide::Right];

    pub fn as_str(&self) -> &'static str {
        match self {
            HeartSide::Left => "left",
            HeartSide::Right => "right",
        }
    }
}

impl std::str::FromStr for HeartSide {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "left" => Ok(HeartSide::Left),
            "right" => Ok(HeartSide::Right),
            other => Err(format!("unknown heart side: {}", other)),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;

    pub(crate) fn sample_payload() -> Value {
        json!({
            "Timestamp": "2024-05-01T10:00:00Z",
            "SystemId": "TAH-01",
            "HeartStatus": "Running",
            "HeartRate": "72",
            "OperationState": "Auto",
            "StatusData": { "CANStatus": { "Text": "OK", "Color": "green" } },
            "LeftHeart": {
                "IntPressure": { "MeanValue": "12.5", "MinValue": "4", "MaxValue": "20" },
                "OutflowPressure": "12.5",
                "CardiacOutput": { "MeanValue": "5.1" }
            },
            "RightHeart": {
                "IntPressure": { "MeanValue": "8", "MinValue": "2", "MaxValue": "14" },
                "OutflowPressure": "25"
            },
            "ArtPressSensor": { "MeanValue": 90, "MinValue": 70, "MaxValue": 120 }
        })
    }

    #[test]
    fn test_coerce_number() {
        assert_eq!(coerce_number(&json!("12.5")), 12.5);
        assert_eq!(coerce_number(&json!(7)), 7.0);
        assert_eq!(coerce_number(&json!(" 3 ")), 3.0);
        assert_eq!(coerce_number(&Value::Null), 0.0);
        assert_eq!(coerce_number(&json!("NaN")), 0.0);
        assert_eq!(coerce_number(&json!("inf")), 0.0);
        assert_eq!(coerce_number(&json!("pump")), 0.0);
        assert_eq!(coerce_number(&json!({ "a": 1 })), 0.0);
    }

    #[test]
    fn test_from_value_coerces_strings() {
        let record = TelemetryRecord::from_value(sample_payload()).unwrap();
        assert_eq!(record.system_id, "TAH-01");
        assert_eq!(record.heart_rate, 72.0);
        assert_eq!(record.left_heart.int_pressure.mean_value, 12.5);
        assert_eq!(record.left_heart.outflow_pressure, 12.5);
        assert_eq!(record.art_press_sensor.max_value, 120.0);
        assert_eq!(record.status_data.can_status.text, "OK");
        // absent numeric fields default to zero
        assert_eq!(record.right_heart.cpu_load, 0.0);
    }

    #[test]
    fn test_invalid_fields_fall_back_per_field() {
        let mut payload = sample_payload();
        payload["HeartRate"] = json!(null);
        payload["LeftHeart"]["IntPressure"] = json!("broken");
        payload["LeftHeart"]["StrokeVolume"] = json!("NaN");
        payload["Messages"] = json!(["a", null, 3]);

        let record = TelemetryRecord::from_value(payload).unwrap();
        assert_eq!(record.heart_rate, 0.0);
        assert_eq!(record.left_heart.int_pressure, PressureReading::default());
        assert_eq!(record.left_heart.stroke_volume, 0.0);
        assert_eq!(record.left_heart.outflow_pressure, 12.5);
        assert_eq!(record.messages, vec!["a".to_string(), "3".to_string()]);
    }

    #[test]
    fn test_required_shape() {
        for key in ["SystemId", "HeartStatus", "LeftHeart", "RightHeart", "StatusData"] {
            let mut payload = sample_payload();
            payload.as_object_mut().unwrap().remove(key);
            assert!(matches!(
                TelemetryRecord::from_value(payload),
                Err(TelemetryError::MissingField(k)) if k == key
            ));
        }

        let mut payload = sample_payload();
        payload["LeftHeart"] = json!(null);
        assert!(TelemetryRecord::from_value(payload).is_err());

        assert!(matches!(
            TelemetryRecord::from_value(json!([1, 2])),
            Err(TelemetryError::NotAnObject)
        ));
        assert!(matches!(
            TelemetryRecord::from_json("{not json"),
            Err(TelemetryError::InvalidJson(_))
        ));
    }

    #[test]
    fn test_heart_side_parse() {
        assert_eq!("left".parse::<HeartSide>().unwrap(), HeartSide::Left);
        assert!("middle".parse::<HeartSide>().is_err());
    }
}
