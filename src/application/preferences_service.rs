// Preferences service - Alarm thresholds, card visibility, layouts, stopwatch
use crate::application::preferences_repository::{KeyValueStore, StorageError};
use crate::domain::alarm::{AlarmThresholds, MetricAlarmSettings, default_alarm_settings};
use crate::domain::layout::{
    Layout, LayoutView, VisibilityMap, clamp_user_layout, default_visibility, reconcile,
    visible_card_ids,
};
use crate::domain::stopwatch::Stopwatch;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::{Arc, Mutex, PoisonError};

const ALARM_SETTINGS_KEY: &str = "metricAlarmSettings";
const VISIBILITY_KEY: &str = "pressureCardVisibility";
const STOPWATCH_RUNNING_KEY: &str = "stopwatchRunning";
const STOPWATCH_ELAPSED_KEY: &str = "stopwatchElapsedTime";

/// Sole writer of persisted preferences. Missing or corrupt entries read
/// back as their defaults.
#[derive(Clone)]
pub struct PreferencesService {
    store: Arc<dyn KeyValueStore>,
    // serializes read-modify-write sequences
    write_lock: Arc<Mutex<()>>,
}

impl PreferencesService {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    fn load<T: DeserializeOwned>(&self, key: &str, default: impl FnOnce() -> T) -> T {
        match self.store.get(key) {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => value,
                Err(e) => {
                    tracing::warn!("Stored `{}` is corrupt, using default: {}", key, e);
                    default()
                }
            },
            Ok(None) => default(),
            Err(e) => {
                tracing::warn!("Failed to read `{}`, using default: {}", key, e);
                default()
            }
        }
    }

    /// Like `load`, for read-modify-write: a failed read aborts instead of
    /// letting the default overwrite what is stored.
    fn load_for_update<T: DeserializeOwned>(
        &self,
        key: &str,
        default: impl FnOnce() -> T,
    ) -> Result<T, StorageError> {
        match self.store.get(key) {
            Ok(Some(raw)) => Ok(serde_json::from_str(&raw).unwrap_or_else(|e| {
                tracing::warn!("Stored `{}` is corrupt, replacing it: {}", key, e);
                default()
            })),
            Ok(None) => Ok(default()),
            Err(StorageError::Corrupt(e)) => {
                tracing::warn!("Storage is corrupt, replacing `{}`: {}", key, e);
                Ok(default())
            }
            Err(e) => Err(e),
        }
    }

    fn save<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let raw = serde_json::to_string(value)?;
        self.store.set(key, &raw).inspect_err(|e| {
            tracing::error!("Failed to persist `{}`: {}", key, e);
        })
    }

    pub fn alarm_settings(&self) -> MetricAlarmSettings {
        self.load(ALARM_SETTINGS_KEY, default_alarm_settings)
    }

    pub fn set_alarm_settings(&self, settings: &MetricAlarmSettings) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.save(ALARM_SETTINGS_KEY, settings)
    }

    pub fn set_metric_thresholds(
        &self,
        metric_id: &str,
        thresholds: AlarmThresholds,
    ) -> Result<MetricAlarmSettings, StorageError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut settings = self.load_for_update(ALARM_SETTINGS_KEY, default_alarm_settings)?;
        settings.insert(metric_id.to_string(), thresholds);
        self.save(ALARM_SETTINGS_KEY, &settings)?;
        Ok(settings)
    }

    pub fn visibility(&self) -> VisibilityMap {
        self.load(VISIBILITY_KEY, default_visibility)
    }

    /// Persist the visibility map and reconcile both card layouts with it.
    pub fn set_visibility(&self, visibility: &VisibilityMap) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.save(VISIBILITY_KEY, visibility)?;
        let visible = visible_card_ids(visibility);
        for view in LayoutView::ALL {
            let current = self.load_for_update(view.storage_key(), Vec::new)?;
            let (layout, changed) = reconcile(&visible, &current);
            if changed {
                tracing::debug!(view = view.storage_key(), "Visibility change reconciled layout");
                self.save(view.storage_key(), &layout)?;
            }
        }
        Ok(())
    }

    /// The stored layout reconciled against the current visibility. A layout
    /// that had to change is written back.
    pub fn layout(&self, view: LayoutView) -> Result<Layout, StorageError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let visible = visible_card_ids(&self.load_for_update(VISIBILITY_KEY, default_visibility)?);
        let current: Layout = self.load_for_update(view.storage_key(), Vec::new)?;
        let (layout, changed) = reconcile(&visible, &current);
        if changed {
            self.save(view.storage_key(), &layout)?;
        }
        Ok(layout)
    }

    /// Accept a user-driven layout change, clamping rows into the grid.
    pub fn update_layout(&self, view: LayoutView, layout: Layout) -> Result<Layout, StorageError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let visible = visible_card_ids(&self.load_for_update(VISIBILITY_KEY, default_visibility)?);
        let (layout, _) = reconcile(&visible, &clamp_user_layout(layout));
        self.save(view.storage_key(), &layout)?;
        Ok(layout)
    }

    pub fn stopwatch(&self) -> Stopwatch {
        Stopwatch {
            running: self.load(STOPWATCH_RUNNING_KEY, || false),
            elapsed_secs: self.load(STOPWATCH_ELAPSED_KEY, || 0),
        }
    }

    pub fn save_stopwatch(&self, stopwatch: &Stopwatch) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.save(STOPWATCH_RUNNING_KEY, &stopwatch.running)?;
        self.save(STOPWATCH_ELAPSED_KEY, &stopwatch.elapsed_secs)
    }
}
