// Rate monitor - Drives the data-rate estimator on a fixed tick
use crate::domain::rate::{DataRate, RateEstimator};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};

#[derive(Clone)]
pub struct RateMonitor {
    estimator: Arc<Mutex<RateEstimator>>,
    rate_tx: Arc<watch::Sender<DataRate>>,
}

impl RateMonitor {
    pub fn new(damping: f64) -> Self {
        let (rate_tx, _) = watch::channel(DataRate::default());
        Self {
            estimator: Arc::new(Mutex::new(RateEstimator::new(
                damping,
                Instant::now().into_std(),
            ))),
            rate_tx: Arc::new(rate_tx),
        }
    }

    pub fn record(&self, chars: usize) {
        self.estimator
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record(chars);
    }

    #[cfg(test)]
    pub fn pending_packets(&self) -> u64 {
        self.estimator
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pending_packets()
    }

    pub fn tick(&self) -> DataRate {
        let rate = self
            .estimator
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .tick(Instant::now().into_std());
        self.rate_tx.send_if_modified(|current| {
            if *current == rate {
                false
            } else {
                *current = rate;
                true
            }
        });
        rate
    }

    pub fn current(&self) -> DataRate {
        *self.rate_tx.borrow()
    }

    /// Tick until shutdown is signalled.
    pub fn spawn(
        &self,
        period: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> tokio::task::JoinHandle<()> {
        let monitor = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let rate = monitor.tick();
                        tracing::trace!(
                            chars_per_sec = rate.chars_per_sec,
                            packets_per_sec = rate.packets_per_sec,
                            "Data rate tick"
                        );
                    }
                    _ = shutdown.changed() => break,
                }
            }
            tracing::debug!("Rate monitor stopped");
        })
    }
}
