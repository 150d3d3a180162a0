// Time-series history domain models
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

pub const DEFAULT_MAX_SAMPLES: usize = 500;
pub const DEFAULT_BAR_WINDOW_MS: i64 = 15_000;
pub const DEFAULT_EMA_ALPHA: f64 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    pub time_ms: i64,
    pub value: f64,
}

impl TimeSeriesPoint {
    pub fn new(time_ms: i64, value: f64) -> Self {
        Self { time_ms, value }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Retention {
    /// Keep at most this many samples.
    MaxSamples(usize),
    /// Keep samples no older than this many milliseconds behind the newest.
    TimeWindow(i64),
}

impl Default for Retention {
    fn default() -> Self {
        Retention::MaxSamples(DEFAULT_MAX_SAMPLES)
    }
}

/// Raw, unsmoothed samples for one metric.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistorySeries {
    points: VecDeque<TimeSeriesPoint>,
    retention: Retention,
}

impl HistorySeries {
    pub fn new(retention: Retention) -> Self {
        Self {
            points: VecDeque::new(),
            retention,
        }
    }

    /// Append a sample and apply retention. Times never go backwards: a
    /// sample older than the newest one is stamped with the newest time.
    pub fn push(&mut self, time_ms: i64, value: f64) {
        let time_ms = match self.points.back() {
            Some(last) if last.time_ms > time_ms => last.time_ms,
            _ => time_ms,
        };
        self.points.push_back(TimeSeriesPoint::new(time_ms, value));
        self.trim();
    }

    fn trim(&mut self) {
        match self.retention {
            Retention::MaxSamples(cap) => {
                while self.points.len() > cap {
                    self.points.pop_front();
                }
            }
            Retention::TimeWindow(window_ms) => {
                let Some(newest) = self.points.back().map(|p| p.time_ms) else {
                    return;
                };
                let cutoff = newest - window_ms;
                while self.points.front().is_some_and(|p| p.time_ms < cutoff) {
                    self.points.pop_front();
                }
            }
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn times(&self) -> Vec<i64> {
        self.points.iter().map(|p| p.time_ms).collect()
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }

    /// Values smoothed with an exponential moving average.
    pub fn smoothed(&self, alpha: f64) -> Vec<f64> {
        ema(&self.values(), alpha)
    }
}

/// `s[0] = x[0]`, `s[i] = α·x[i] + (1-α)·s[i-1]`.
pub fn ema(values: &[f64], alpha: f64) -> Vec<f64> {
    let mut out = Vec::with_capacity(values.len());
    let mut prev: Option<f64> = None;
    for &x in values {
        let s = match prev {
            None => x,
            Some(p) => alpha * x + (1.0 - alpha) * p,
        };
        out.push(s);
        prev = Some(s);
    }
    out
}

/// One OHLC bar of a pressure reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OhlcBar {
    pub time_ms: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

/// Bars for the real-time pressure chart, trimmed to a time window.
#[derive(Debug, Clone, PartialEq)]
pub struct BarSeries {
    bars: VecDeque<OhlcBar>,
    window_ms: i64,
}

impl BarSeries {
    pub fn new(window_ms: i64) -> Self {
        Self {
            bars: VecDeque::new(),
            window_ms,
        }
    }

    /// The bar opens at the previous close, or at the current mean for the
    /// first bar.
    pub fn push(&mut self, time_ms: i64, mean: f64, low: f64, high: f64) {
        let (time_ms, open) = match self.bars.back() {
            Some(last) => (time_ms.max(last.time_ms), last.close),
            None => (time_ms, mean),
        };
        self.bars.push_back(OhlcBar {
            time_ms,
            open,
            high,
            low,
            close: mean,
        });

        let cutoff = time_ms - self.window_ms;
        while self.bars.front().is_some_and(|b| b.time_ms < cutoff) {
            self.bars.pop_front();
        }
    }

    pub fn bars(&self) -> Vec<OhlcBar> {
        self.bars.iter().copied().collect()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.bars.len()
    }
}
