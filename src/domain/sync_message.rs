// Wire schema shared by the main view and the OR View mirror
use serde::{Deserialize, Serialize};

use super::telemetry::{HeartData, PressureReading, TelemetryRecord};

/// The five system-wide pressure sensors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SensorReadings {
    pub art_press: PressureReading,
    pub pap: PressureReading,
    pub cvp: PressureReading,
    pub aop: PressureReading,
    pub ivc: PressureReading,
}

impl SensorReadings {
    pub fn from_record(record: &TelemetryRecord) -> Self {
        Self {
            art_press: record.art_press_sensor.clone(),
            pap: record.pap_sensor.clone(),
            cvp: record.cvp_sensor.clone(),
            aop: record.aop_sensor.clone(),
            ivc: record.ivc_sensor.clone(),
        }
    }
}

/// The slices of state that cross the window boundary, compared as units.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncSnapshot {
    pub sensors: SensorReadings,
    pub left_heart: HeartData,
    pub right_heart: HeartData,
}

/// `{type, data}` envelope posted to the OR View.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncMessage {
    UpdateSensors(SensorReadings),
    UpdateLeftHeart(HeartData),
    UpdateRightHeart(HeartData),
    UpdateStopwatch(u64),
}

impl SyncMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            SyncMessage::UpdateSensors(_) => "UPDATE_SENSORS",
            SyncMessage::UpdateLeftHeart(_) => "UPDATE_LEFT_HEART",
            SyncMessage::UpdateRightHeart(_) => "UPDATE_RIGHT_HEART",
            SyncMessage::UpdateStopwatch(_) => "UPDATE_STOPWATCH",
        }
    }
}

/// Messages for the sub-states that differ by value. Deep-equal snapshots
/// produce nothing.
pub fn diff_sub_states(current: &SyncSnapshot, previous: &SyncSnapshot) -> Vec<SyncMessage> {
    let mut messages = Vec::new();
    if current.sensors != previous.sensors {
        messages.push(SyncMessage::UpdateSensors(current.sensors.clone()));
    }
    if current.left_heart != previous.left_heart {
        messages.push(SyncMessage::UpdateLeftHeart(current.left_heart.clone()));
    }
    if current.right_heart != previous.right_heart {
        messages.push(SyncMessage::UpdateRightHeart(current.right_heart.clone()));
    }
    messages
}

/// Every sub-state, unconditionally.
pub fn full_sync(current: &SyncSnapshot) -> Vec<SyncMessage> {
    vec![
        SyncMessage::UpdateSensors(current.sensors.clone()),
        SyncMessage::UpdateLeftHeart(current.left_heart.clone()),
        SyncMessage::UpdateRightHeart(current.right_heart.clone()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_changed_sub_state_is_sent() {
        let previous = SyncSnapshot::default();
        let mut current = previous.clone();
        current.right_heart.cpu_load = 3.0;

        let messages = diff_sub_states(&current, &previous);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].kind(), "UPDATE_RIGHT_HEART");
    }

    #[test]
    fn test_deep_equal_sends_nothing() {
        let mut a = SyncSnapshot::default();
        a.sensors.pap = PressureReading::new(20.0, 10.0, 30.0);
        let b = a.clone();
        assert!(diff_sub_states(&a, &b).is_empty());
    }

    #[test]
    fn test_full_sync_covers_every_sub_state() {
        let kinds: Vec<_> = full_sync(&SyncSnapshot::default())
            .iter()
            .map(SyncMessage::kind)
            .collect();
        assert_eq!(kinds, vec!["UPDATE_SENSORS", "UPDATE_LEFT_HEART", "UPDATE_RIGHT_HEART"]);
    }

    #[test]
    fn test_envelope_shape() {
        let json = serde_json::to_value(SyncMessage::UpdateStopwatch(42)).unwrap();
        assert_eq!(json, serde_json::json!({ "type": "UPDATE_STOPWATCH", "data": 42 }));

        let mut heart = HeartData::default();
        heart.int_pressure.mean_value = 12.5;
        let json = serde_json::to_value(SyncMessage::UpdateLeftHeart(heart)).unwrap();
        assert_eq!(json["type"], "UPDATE_LEFT_HEART");
        assert_eq!(json["data"]["IntPressure"]["MeanValue"], 12.5);
    }
}
