// Mirror store - OR View state fed only by sync messages
use crate::domain::sync_message::{SensorReadings, SyncMessage};
use crate::domain::telemetry::HeartData;
use serde::Serialize;
use std::sync::{Mutex, PoisonError};

/// What the OR View currently shows.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MirrorState {
    pub sensors: SensorReadings,
    pub left_heart: HeartData,
    pub right_heart: HeartData,
    pub stopwatch_secs: u64,
}

/// Receiving side of the sync channel. Each message replaces its slice
/// wholesale; nothing is merged field by field.
#[derive(Debug, Default)]
pub struct MirrorStore {
    state: Mutex<MirrorState>,
}

impl MirrorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&self, message: SyncMessage) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match message {
            SyncMessage::UpdateSensors(sensors) => state.sensors = sensors,
            SyncMessage::UpdateLeftHeart(heart) => state.left_heart = heart,
            SyncMessage::UpdateRightHeart(heart) => state.right_heart = heart,
            SyncMessage::UpdateStopwatch(secs) => state.stopwatch_secs = secs,
        }
    }

    pub fn snapshot(&self) -> MirrorState {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::telemetry::PressureReading;

    #[test]
    fn test_messages_replace_slices_wholesale() {
        let mirror = MirrorStore::new();
        let mut heart = HeartData::default();
        heart.cpu_load = 40.0;
        heart.int_pressure = PressureReading::new(12.0, 3.0, 20.0);
        mirror.apply(SyncMessage::UpdateLeftHeart(heart));

        // a later message without int_pressure clears it rather than merging
        let mut next = HeartData::default();
        next.cpu_load = 41.0;
        mirror.apply(SyncMessage::UpdateLeftHeart(next.clone()));
        let state = mirror.snapshot();
        assert_eq!(state.left_heart, next);
        assert_eq!(state.right_heart, HeartData::default());
    }

    #[test]
    fn test_envelopes_update_their_own_slice() {
        let mirror = MirrorStore::new();
        let stopwatch: SyncMessage =
            serde_json::from_str(r#"{"type":"UPDATE_STOPWATCH","data":17}"#).unwrap();
        mirror.apply(stopwatch);
        assert_eq!(mirror.snapshot().stopwatch_secs, 17);
        assert_eq!(mirror.snapshot().sensors, SensorReadings::default());

        let sensors: SyncMessage = serde_json::from_str(
            r#"{"type":"UPDATE_SENSORS","data":{"pap":{"MeanValue":"21","MinValue":15,"MaxValue":30}}}"#,
        )
        .unwrap();
        mirror.apply(sensors);
        let state = mirror.snapshot();
        assert_eq!(state.sensors.pap.mean_value, 21.0);
        assert_eq!(state.stopwatch_secs, 17);
    }
}
