// Inbound data-rate estimation
use serde::Serialize;
use std::time::Instant;

pub const DEFAULT_DAMPING: f64 = 0.94;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataRate {
    pub chars_per_sec: f64,
    pub packets_per_sec: f64,
}

/// Counts events between ticks and turns them into heavily smoothed rates.
#[derive(Debug, Clone)]
pub struct RateEstimator {
    damping: f64,
    chars: u64,
    packets: u64,
    last_tick: Instant,
    smoothed: DataRate,
}

impl RateEstimator {
    pub fn new(damping: f64, now: Instant) -> Self {
        Self {
            damping: damping.clamp(0.0, 1.0),
            chars: 0,
            packets: 0,
            last_tick: now,
            smoothed: DataRate::default(),
        }
    }

    pub fn record(&mut self, chars: usize) {
        self.packets += 1;
        self.chars += chars as u64;
    }

    /// Fold the counts since the previous tick into the smoothed rate using
    /// the real elapsed time. Counters reset even when no time has passed.
    pub fn tick(&mut self, now: Instant) -> DataRate {
        let elapsed = now.saturating_duration_since(self.last_tick).as_secs_f64();

        if elapsed > 0.0 {
            let instant_chars = self.chars as f64 / elapsed;
            let instant_packets = self.packets as f64 / elapsed;
            let keep = self.damping;
            self.smoothed.chars_per_sec =
                keep * self.smoothed.chars_per_sec + (1.0 - keep) * instant_chars;
            self.smoothed.packets_per_sec =
                keep * self.smoothed.packets_per_sec + (1.0 - keep) * instant_packets;
        }

        self.chars = 0;
        self.packets = 0;
        self.last_tick = now;
        self.smoothed
    }

    pub fn current(&self) -> DataRate {
        self.smoothed
    }

    /// Packets counted since the last tick.
    #[cfg(test)]
    pub fn pending_packets(&self) -> u64 {
        self.packets
    }
}

impl Default for RateEstimator {
    fn default() -> Self {
        Self::new(DEFAULT_DAMPING, Instant::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_tick_uses_elapsed_time() {
        let start = Instant::now();
        let mut rate = RateEstimator::new(0.94, start);
        rate.record(500);
        rate.record(500);

        // 2 packets / 1000 chars over 100 ms -> 20 pkt/s, 10_000 chars/s
        let r = rate.tick(start + Duration::from_millis(100));
        assert!((r.packets_per_sec - 0.06 * 20.0).abs() < 1e-9);
        assert!((r.chars_per_sec - 0.06 * 10_000.0).abs() < 1e-6);
    }

    #[test]
    fn test_zero_elapsed_resets_counters_without_update() {
        let start = Instant::now();
        let mut rate = RateEstimator::new(0.94, start);
        rate.record(100);
        let r = rate.tick(start);
        assert_eq!(r, DataRate::default());

        // counts from before the zero-length tick are gone
        let r = rate.tick(start + Duration::from_millis(50));
        assert_eq!(r, DataRate::default());
    }

    #[test]
    fn test_rate_decays_when_idle() {
        let start = Instant::now();
        let mut rate = RateEstimator::new(0.94, start);
        rate.record(1_000);
        let first = rate.tick(start + Duration::from_millis(50));
        let second = rate.tick(start + Duration::from_millis(100));
        assert!(second.chars_per_sec < first.chars_per_sec);
        assert!((second.chars_per_sec - first.chars_per_sec * 0.94).abs() < 1e-9);
    }
}
