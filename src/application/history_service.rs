// History service - Per-metric series appended on every telemetry tick
use crate::domain::history::{BarSeries, HistorySeries, OhlcBar, Retention};
use crate::domain::telemetry::{HeartData, HeartSide, TelemetryRecord, coerce_number};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{mpsc, watch};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    OutflowPressure,
    ThermistorTemp,
    SensorTemp,
    StrokeLength,
    StrokeVolume,
    CardiacOutput,
    PowerConsumption,
}

impl Metric {
    pub const ALL: [Metric; 7] = [
        Metric::OutflowPressure,
        Metric::ThermistorTemp,
        Metric::SensorTemp,
        Metric::StrokeLength,
        Metric::StrokeVolume,
        Metric::CardiacOutput,
        Metric::PowerConsumption,
    ];

    fn name(&self) -> &'static str {
        match self {
            Metric::OutflowPressure => "OutflowPressure",
            Metric::ThermistorTemp => "ThermistorTemp",
            Metric::SensorTemp => "SensorTemp",
            Metric::StrokeLength => "StrokeLength",
            Metric::StrokeVolume => "StrokeVolume",
            Metric::CardiacOutput => "CardiacOutput",
            Metric::PowerConsumption => "PowerConsumption",
        }
    }

    fn read(&self, heart: &HeartData) -> f64 {
        match self {
            Metric::OutflowPressure => heart.outflow_pressure,
            Metric::ThermistorTemp => heart.thermistor_temperature,
            Metric::SensorTemp => heart.sensor_temperature,
            Metric::StrokeLength => heart.actual_stroke_len,
            Metric::StrokeVolume => heart.stroke_volume,
            Metric::CardiacOutput => heart.cardiac_output.mean_value,
            Metric::PowerConsumption => heart.power_consumption.mean_value,
        }
    }
}

/// Identifies one series, e.g. `leftOutflowPressure`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SeriesId {
    pub side: HeartSide,
    pub metric: Metric,
}

impl SeriesId {
    pub fn new(side: HeartSide, metric: Metric) -> Self {
        Self { side, metric }
    }

    pub fn all() -> impl Iterator<Item = SeriesId> {
        HeartSide::ALL
            .into_iter()
            .flat_map(|side| Metric::ALL.into_iter().map(move |metric| SeriesId::new(side, metric)))
    }
}

impl std::fmt::Display for SeriesId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.side.as_str(), self.metric.name())
    }
}

impl std::str::FromStr for SeriesId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SeriesId::all()
            .find(|id| id.to_string() == s)
            .ok_or_else(|| format!("unknown history series: {}", s))
    }
}

/// Chart-ready copy of a series.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesSnapshot {
    pub id: String,
    pub times: Vec<i64>,
    pub values: Vec<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub smoothed: Option<Vec<f64>>,
}

impl SeriesSnapshot {
    fn from_series(id: SeriesId, series: &HistorySeries, alpha: Option<f64>) -> Self {
        Self {
            id: id.to_string(),
            times: series.times(),
            values: series.values(),
            smoothed: alpha.map(|a| series.smoothed(a)),
        }
    }
}

struct Buffers {
    series: HashMap<SeriesId, HistorySeries>,
    bars: HashMap<HeartSide, BarSeries>,
}

#[derive(Clone)]
pub struct HistoryService {
    buffers: Arc<Mutex<Buffers>>,
    max_samples: usize,
    bar_window_ms: i64,
}

impl HistoryService {
    pub fn new(max_samples: usize, bar_window_ms: i64) -> Self {
        Self {
            buffers: Arc::new(Mutex::new(Buffers {
                series: HashMap::new(),
                bars: HashMap::new(),
            })),
            max_samples,
            bar_window_ms,
        }
    }

    /// Coerce and append one sample, returning the series after retention.
    pub fn append_sample(
        &self,
        id: SeriesId,
        raw_value: impl Into<Value>,
        timestamp_ms: i64,
    ) -> HistorySeries {
        let value = coerce_number(&raw_value.into());
        let mut buffers = self.buffers.lock().unwrap_or_else(PoisonError::into_inner);
        let series = buffers
            .series
            .entry(id)
            .or_insert_with(|| HistorySeries::new(Retention::MaxSamples(self.max_samples)));
        series.push(timestamp_ms, value);
        series.clone()
    }

    /// Append every series and one internal-pressure bar per side.
    pub fn record(&self, record: &TelemetryRecord, timestamp_ms: i64) {
        for id in SeriesId::all() {
            let value = id.metric.read(record.heart(id.side));
            self.append_sample(id, value, timestamp_ms);
        }

        let mut buffers = self.buffers.lock().unwrap_or_else(PoisonError::into_inner);
        for side in HeartSide::ALL {
            let pressure = &record.heart(side).int_pressure;
            buffers
                .bars
                .entry(side)
                .or_insert_with(|| BarSeries::new(self.bar_window_ms))
                .push(timestamp_ms, pressure.mean_value, pressure.min_value, pressure.max_value);
        }
    }

    pub fn snapshot(&self, id: SeriesId, alpha: Option<f64>) -> SeriesSnapshot {
        let buffers = self.buffers.lock().unwrap_or_else(PoisonError::into_inner);
        match buffers.series.get(&id) {
            Some(series) => SeriesSnapshot::from_series(id, series, alpha),
            None => SeriesSnapshot::from_series(id, &HistorySeries::default(), alpha),
        }
    }

    pub fn bars(&self, side: HeartSide) -> Vec<OhlcBar> {
        let buffers = self.buffers.lock().unwrap_or_else(PoisonError::into_inner);
        buffers.bars.get(&side).map(BarSeries::bars).unwrap_or_default()
    }

    /// Record every published telemetry record, one sample each, until
    /// shutdown or until the queue closes.
    pub fn spawn_recorder(
        &self,
        mut records: mpsc::UnboundedReceiver<Arc<TelemetryRecord>>,
        mut shutdown: watch::Receiver<bool>,
    ) -> tokio::task::JoinHandle<()> {
        let history = self.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    record = records.recv() => match record {
                        Some(record) => history.record(&record, chrono::Utc::now().timestamp_millis()),
                        None => break,
                    },
                    _ = shutdown.changed() => break,
                }
            }
            tracing::debug!("History recorder stopped");
        })
    }
}
