// Reactive state store - Canonical telemetry record plus memoized views
use crate::domain::sync_message::SensorReadings;
use crate::domain::telemetry::{HeartData, PressureReading, SystemStatus, TelemetryRecord};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{mpsc, watch};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemInfo {
    pub system_id: String,
    pub timestamp: String,
    pub local_clock: String,
}

/// A value for each heart side.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HeartPair<T> {
    pub left: T,
    pub right: T,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartMetrics {
    pub heart_rate: f64,
    pub operation_state: String,
    pub heart_status: String,
    pub flow_limit: f64,
    pub flow_limit_state: String,
}

/// A projection of the canonical record memoized on its own input slice.
///
/// The projection only runs when the selected slice differs from the last
/// one, and subscribers only wake when the projected output differs.
pub struct DerivedView<I, O> {
    select: fn(&TelemetryRecord) -> I,
    project: fn(&I) -> O,
    input: Mutex<Option<I>>,
    output: watch::Sender<O>,
    recomputes: AtomicU64,
}

impl<I, O> DerivedView<I, O>
where
    I: PartialEq,
    O: PartialEq + Clone + Default,
{
    fn new(select: fn(&TelemetryRecord) -> I, project: fn(&I) -> O) -> Self {
        let (output, _) = watch::channel(O::default());
        Self {
            select,
            project,
            input: Mutex::new(None),
            output,
            recomputes: AtomicU64::new(0),
        }
    }

    fn refresh(&self, record: Option<&TelemetryRecord>) {
        let mut input = self.input.lock().unwrap_or_else(PoisonError::into_inner);

        let next = match record {
            Some(record) => {
                let slice = (self.select)(record);
                if input.as_ref() == Some(&slice) {
                    return;
                }
                self.recomputes.fetch_add(1, Ordering::Relaxed);
                let out = (self.project)(&slice);
                *input = Some(slice);
                out
            }
            None => {
                *input = None;
                O::default()
            }
        };

        self.output.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }

    pub fn get(&self) -> O {
        self.output.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<O> {
        self.output.subscribe()
    }

    /// How many times the projection has run.
    pub fn recompute_count(&self) -> u64 {
        self.recomputes.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewName {
    SystemInfo,
    StatusData,
    LeftHeart,
    RightHeart,
    SensorReadings,
    AtrialPressures,
    CardiacOutput,
    HeartMetrics,
    Messages,
}

impl ViewName {
    pub const ALL: [ViewName; 9] = [
        ViewName::SystemInfo,
        ViewName::StatusData,
        ViewName::LeftHeart,
        ViewName::RightHeart,
        ViewName::SensorReadings,
        ViewName::AtrialPressures,
        ViewName::CardiacOutput,
        ViewName::HeartMetrics,
        ViewName::Messages,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ViewName::SystemInfo => "systemInfo",
            ViewName::StatusData => "statusData",
            ViewName::LeftHeart => "leftHeart",
            ViewName::RightHeart => "rightHeart",
            ViewName::SensorReadings => "sensorReadings",
            ViewName::AtrialPressures => "atrialPressures",
            ViewName::CardiacOutput => "cardiacOutput",
            ViewName::HeartMetrics => "heartMetrics",
            ViewName::Messages => "messages",
        }
    }
}

impl std::str::FromStr for ViewName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ViewName::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| format!("unknown view: {}", s))
    }
}

/// Single source of truth for live telemetry. Ingest is the only writer.
pub struct ReactiveStore {
    record: watch::Sender<Option<Arc<TelemetryRecord>>>,
    // held for a whole publish; also owns the per-record queues
    writer: Mutex<Vec<mpsc::UnboundedSender<Arc<TelemetryRecord>>>>,
    pub system_info: DerivedView<(String, String, String), SystemInfo>,
    pub status_data: DerivedView<SystemStatus, SystemStatus>,
    pub left_heart: DerivedView<HeartData, HeartData>,
    pub right_heart: DerivedView<HeartData, HeartData>,
    pub sensor_readings: DerivedView<SensorReadings, SensorReadings>,
    pub atrial_pressures: DerivedView<(PressureReading, PressureReading), HeartPair<PressureReading>>,
    pub cardiac_output: DerivedView<(PressureReading, PressureReading), HeartPair<PressureReading>>,
    pub heart_metrics: DerivedView<HeartMetrics, HeartMetrics>,
    pub messages: DerivedView<Vec<String>, Vec<String>>,
}

fn pair(slice: &(PressureReading, PressureReading)) -> HeartPair<PressureReading> {
    HeartPair {
        left: slice.0.clone(),
        right: slice.1.clone(),
    }
}

impl ReactiveStore {
    pub fn new() -> Self {
        let (record, _) = watch::channel(None);
        Self {
            record,
            writer: Mutex::new(Vec::new()),
            system_info: DerivedView::new(
                |r| (r.system_id.clone(), r.timestamp.clone(), r.local_clock.clone()),
                |(system_id, timestamp, local_clock)| SystemInfo {
                    system_id: system_id.clone(),
                    timestamp: timestamp.clone(),
                    local_clock: local_clock.clone(),
                },
            ),
            status_data: DerivedView::new(|r| r.status_data.clone(), Clone::clone),
            left_heart: DerivedView::new(|r| r.left_heart.clone(), Clone::clone),
            right_heart: DerivedView::new(|r| r.right_heart.clone(), Clone::clone),
            sensor_readings: DerivedView::new(SensorReadings::from_record, Clone::clone),
            atrial_pressures: DerivedView::new(
                |r| (r.left_heart.int_pressure.clone(), r.right_heart.int_pressure.clone()),
                pair,
            ),
            cardiac_output: DerivedView::new(
                |r| (r.left_heart.cardiac_output.clone(), r.right_heart.cardiac_output.clone()),
                pair,
            ),
            heart_metrics: DerivedView::new(
                |r| HeartMetrics {
                    heart_rate: r.heart_rate,
                    operation_state: r.operation_state.clone(),
                    heart_status: r.heart_status.clone(),
                    flow_limit: r.flow_limit,
                    flow_limit_state: r.flow_limit_state.clone(),
                },
                Clone::clone,
            ),
            messages: DerivedView::new(|r| r.messages.clone(), Clone::clone),
        }
    }

    fn lock_writer(&self) -> MutexGuard<'_, Vec<mpsc::UnboundedSender<Arc<TelemetryRecord>>>> {
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the canonical record and refresh every view. Concurrent
    /// publishes are applied one at a time, so views never mix records.
    pub fn publish(&self, record: TelemetryRecord) {
        let record = Arc::new(record);
        let mut queues = self.lock_writer();
        self.refresh_views(Some(&record));
        self.record.send_replace(Some(record.clone()));
        queues.retain(|tx| tx.send(record.clone()).is_ok());
    }

    /// Drop the current record; every view falls back to its default.
    pub fn clear(&self) {
        let _writer = self.lock_writer();
        self.refresh_views(None);
        self.record.send_replace(None);
    }

    /// Every published record in order, without coalescing bursts.
    pub fn record_queue(&self) -> mpsc::UnboundedReceiver<Arc<TelemetryRecord>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock_writer().push(tx);
        rx
    }

    fn refresh_views(&self, record: Option<&TelemetryRecord>) {
        self.system_info.refresh(record);
        self.status_data.refresh(record);
        self.left_heart.refresh(record);
        self.right_heart.refresh(record);
        self.sensor_readings.refresh(record);
        self.atrial_pressures.refresh(record);
        self.cardiac_output.refresh(record);
        self.heart_metrics.refresh(record);
        self.messages.refresh(record);
    }

    pub fn current(&self) -> Option<Arc<TelemetryRecord>> {
        self.record.borrow().clone()
    }

    /// Projection runs per view, for diagnostics.
    pub fn recompute_counts(&self) -> BTreeMap<&'static str, u64> {
        ViewName::ALL
            .into_iter()
            .map(|name| (name.as_str(), self.recompute_count(name)))
            .collect()
    }

    fn recompute_count(&self, name: ViewName) -> u64 {
        match name {
            ViewName::SystemInfo => self.system_info.recompute_count(),
            ViewName::StatusData => self.status_data.recompute_count(),
            ViewName::LeftHeart => self.left_heart.recompute_count(),
            ViewName::RightHeart => self.right_heart.recompute_count(),
            ViewName::SensorReadings => self.sensor_readings.recompute_count(),
            ViewName::AtrialPressures => self.atrial_pressures.recompute_count(),
            ViewName::CardiacOutput => self.cardiac_output.recompute_count(),
            ViewName::HeartMetrics => self.heart_metrics.recompute_count(),
            ViewName::Messages => self.messages.recompute_count(),
        }
    }

    pub fn view_json(&self, name: ViewName) -> serde_json::Result<serde_json::Value> {
        match name {
            ViewName::SystemInfo => serde_json::to_value(self.system_info.get()),
            ViewName::StatusData => serde_json::to_value(self.status_data.get()),
            ViewName::LeftHeart => serde_json::to_value(self.left_heart.get()),
            ViewName::RightHeart => serde_json::to_value(self.right_heart.get()),
            ViewName::SensorReadings => serde_json::to_value(self.sensor_readings.get()),
            ViewName::AtrialPressures => serde_json::to_value(self.atrial_pressures.get()),
            ViewName::CardiacOutput => serde_json::to_value(self.cardiac_output.get()),
            ViewName::HeartMetrics => serde_json::to_value(self.heart_metrics.get()),
            ViewName::Messages => serde_json::to_value(self.messages.get()),
        }
    }
}

impl Default for ReactiveStore {
    fn default() -> Self {
        Self::new()
    }
}
