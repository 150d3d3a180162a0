// Alarm threshold domain model
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::telemetry::{PressureReading, TelemetryRecord};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlarmThresholds {
    pub min_warning: f64,
    pub min_error: f64,
    pub max_warning: f64,
    pub max_error: f64,
}

impl AlarmThresholds {
    pub fn new(min_warning: f64, min_error: f64, max_warning: f64, max_error: f64) -> Self {
        Self {
            min_warning,
            min_error,
            max_warning,
            max_error,
        }
    }
}

/// Thresholds keyed by metric id (e.g. "MAP", "PAP").
pub type MetricAlarmSettings = BTreeMap<String, AlarmThresholds>;

/// Only mean arterial pressure ships with thresholds.
pub fn default_alarm_settings() -> MetricAlarmSettings {
    let mut settings = MetricAlarmSettings::new();
    settings.insert("MAP".to_string(), AlarmThresholds::new(25.0, 30.0, 52.0, 67.0));
    settings
}

/// Ordered by severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlarmStatus {
    Normal,
    Warning,
    Alert,
}

/// Evaluate a single value. Error bounds win over warning bounds.
///
/// Metrics without thresholds are always `Normal`.
pub fn evaluate(value: f64, thresholds: Option<&AlarmThresholds>) -> AlarmStatus {
    let Some(t) = thresholds else {
        return AlarmStatus::Normal;
    };

    if value >= t.max_error || value <= t.min_error {
        return AlarmStatus::Alert;
    }
    if value >= t.max_warning || value <= t.min_warning {
        return AlarmStatus::Warning;
    }
    AlarmStatus::Normal
}

/// Evaluate a reading that spans `[min, max]` (`min <= max`): the worse of
/// its two ends. Only the low end can cross a min bound and only the high
/// end a max bound.
pub fn evaluate_range(min: f64, max: f64, thresholds: Option<&AlarmThresholds>) -> AlarmStatus {
    evaluate(min, thresholds).max(evaluate(max, thresholds))
}

pub fn evaluate_metric(
    metric_id: &str,
    reading: &PressureReading,
    settings: &MetricAlarmSettings,
) -> AlarmStatus {
    let low = reading.min_value.min(reading.max_value);
    let high = reading.min_value.max(reading.max_value);
    evaluate_range(low, high, settings.get(metric_id))
}

/// The reading each pressure card displays. Heart summary cards have none.
pub fn card_readings(record: &TelemetryRecord) -> [(&'static str, &PressureReading); 9] {
    [
        ("MAP", &record.art_press_sensor),
        ("PAP", &record.pap_sensor),
        ("CVP", &record.cvp_sensor),
        ("AOP", &record.aop_sensor),
        ("IVC", &record.ivc_sensor),
        ("LAP", &record.left_heart.int_pressure),
        ("RAP", &record.right_heart.int_pressure),
        ("LCO", &record.left_heart.cardiac_output),
        ("RCO", &record.right_heart.cardiac_output),
    ]
}

pub fn card_statuses(
    record: &TelemetryRecord,
    settings: &MetricAlarmSettings,
) -> BTreeMap<String, AlarmStatus> {
    card_readings(record)
        .into_iter()
        .map(|(id, reading)| (id.to_string(), evaluate_metric(id, reading, settings)))
        .collect()
}
