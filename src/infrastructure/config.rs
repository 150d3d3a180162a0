use crate::domain::history::{DEFAULT_BAR_WINDOW_MS, DEFAULT_EMA_ALPHA, DEFAULT_MAX_SAMPLES};
use crate::domain::rate::DEFAULT_DAMPING;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct MonitorConfig {
    pub server: ServerSettings,
    pub storage: StorageSettings,
    pub history: HistorySettings,
    pub rate: RateSettings,
    pub sync: SyncSettings,
    pub host: HostSettings,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerSettings {
    pub bind_addr: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageSettings {
    pub path: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            path: "data/preferences.json".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HistorySettings {
    pub max_samples: usize,
    pub bar_window_ms: i64,
    pub ema_alpha: f64,
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self {
            max_samples: DEFAULT_MAX_SAMPLES,
            bar_window_ms: DEFAULT_BAR_WINDOW_MS,
            ema_alpha: DEFAULT_EMA_ALPHA,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RateSettings {
    pub tick_ms: u64,
    pub damping: f64,
}

impl Default for RateSettings {
    fn default() -> Self {
        Self {
            tick_ms: 50,
            damping: DEFAULT_DAMPING,
        }
    }
}

impl RateSettings {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SyncSettings {
    pub liveness_poll_ms: u64,
    pub stopwatch_tick_ms: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            liveness_poll_ms: 1_000,
            stopwatch_tick_ms: 1_000,
        }
    }
}

impl SyncSettings {
    pub fn liveness_poll(&self) -> Duration {
        Duration::from_millis(self.liveness_poll_ms.max(1))
    }

    pub fn stopwatch_tick(&self) -> Duration {
        Duration::from_millis(self.stopwatch_tick_ms.max(1))
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HostSettings {
    /// Read telemetry from stdin and write events to stdout.
    pub enabled: bool,
}

impl Default for HostSettings {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// `config/monitor.*` if present, overridden by `TAH_MONITOR__SECTION__KEY`
/// environment variables.
pub fn load_monitor_config() -> anyhow::Result<MonitorConfig> {
    load_from(config::File::with_name("config/monitor").required(false))
}

fn load_from<S>(file: S) -> anyhow::Result<MonitorConfig>
where
    S: config::Source + Send + Sync + 'static,
{
    let settings = config::Config::builder()
        .add_source(file)
        .add_source(
            config::Environment::with_prefix("TAH_MONITOR")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    Ok(settings.try_deserialize()?)
}
