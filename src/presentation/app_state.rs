// Application state for HTTP handlers
use crate::application::event_dispatch::EventDispatcher;
use crate::application::history_service::HistoryService;
use crate::application::mirror_store::MirrorStore;
use crate::application::preferences_service::PreferencesService;
use crate::application::rate_monitor::RateMonitor;
use crate::application::state_store::ReactiveStore;
use crate::application::sync_bridge::SyncBridge;
use crate::application::telemetry_ingest::TelemetryIngest;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<ReactiveStore>,
    pub ingest: TelemetryIngest,
    pub history: HistoryService,
    pub preferences: PreferencesService,
    pub dispatcher: EventDispatcher,
    pub sync: SyncBridge,
    /// What the OR View stream has delivered.
    pub mirror: Arc<MirrorStore>,
    pub rate: RateMonitor,
    /// Smoothing factor used when a history request gives none.
    pub ema_alpha: f64,
}
