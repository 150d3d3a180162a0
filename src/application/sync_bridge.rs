// Cross-window sync bridge - Mirrors telemetry sub-states into the OR View
use crate::application::preferences_service::PreferencesService;
use crate::application::state_store::ReactiveStore;
use crate::domain::stopwatch::{Stopwatch, StopwatchAction};
use crate::domain::sync_message::{
    SensorReadings, SyncMessage, SyncSnapshot, diff_sub_states, full_sync,
};
use crate::domain::telemetry::HeartData;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("child window is closed")]
    Closed,
    #[error("child window is not keeping up, dropped {0}")]
    Backlogged(&'static str),
}

/// A secondary window reachable only through messages.
pub trait ChildWindow: Send {
    /// There is no close event; callers poll this.
    fn is_closed(&self) -> bool;

    fn post_message(&self, message: &SyncMessage) -> Result<(), SyncError>;
}

/// Diff-based sync state for at most one attached window.
pub struct ChildWindowSync {
    window: Option<Box<dyn ChildWindow>>,
    previous: SyncSnapshot,
    needs_full_sync: bool,
}

impl ChildWindowSync {
    pub fn new() -> Self {
        Self {
            window: None,
            previous: SyncSnapshot::default(),
            needs_full_sync: false,
        }
    }

    /// Attach a freshly opened window. Its first sync is unconditional
    /// because it starts out empty.
    pub fn attach(&mut self, window: Box<dyn ChildWindow>) {
        if self.window.is_some() {
            tracing::info!("Replacing attached OR View window");
        }
        self.window = Some(window);
        self.needs_full_sync = true;
    }

    pub fn is_attached(&self) -> bool {
        self.window.is_some()
    }

    /// Clear the window reference if it has closed. Returns `true` only on
    /// the call that observed the closure.
    pub fn check_liveness(&mut self) -> bool {
        match &self.window {
            Some(window) if window.is_closed() => {
                self.detach();
                true
            }
            _ => false,
        }
    }

    fn detach(&mut self) {
        if self.window.take().is_some() {
            tracing::info!("OR View window closed, sync suspended");
        }
        self.needs_full_sync = false;
    }

    /// Send the sub-states that changed since the last sync (all of them on
    /// the first sync after attach). Returns how many messages went out.
    pub fn sync_if_changed(&mut self, current: &SyncSnapshot) -> usize {
        if self.check_liveness() || self.window.is_none() {
            return 0;
        }

        let messages = if self.needs_full_sync {
            full_sync(current)
        } else {
            diff_sub_states(current, &self.previous)
        };
        if messages.is_empty() {
            return 0;
        }

        let sent = self.send_all(&messages);
        if sent == messages.len() {
            self.needs_full_sync = false;
            self.previous = current.clone();
        }
        sent
    }

    pub fn post_stopwatch(&mut self, elapsed_secs: u64) -> bool {
        if self.check_liveness() || self.window.is_none() {
            return false;
        }
        self.send_all(&[SyncMessage::UpdateStopwatch(elapsed_secs)]) == 1
    }

    fn send_all(&mut self, messages: &[SyncMessage]) -> usize {
        let mut sent = 0;
        for message in messages {
            let Some(window) = &self.window else {
                break;
            };
            match window.post_message(message) {
                Ok(()) => {
                    tracing::debug!(kind = message.kind(), "Posted update to OR View");
                    sent += 1;
                }
                Err(SyncError::Closed) => {
                    self.detach();
                    break;
                }
                Err(e) => {
                    tracing::warn!("OR View update failed: {}", e);
                }
            }
        }
        sent
    }
}

impl Default for ChildWindowSync {
    fn default() -> Self {
        Self::new()
    }
}

/// Owns the sync state, the OR View stopwatch and the timers that drive them.
#[derive(Clone)]
pub struct SyncBridge {
    sync: Arc<Mutex<ChildWindowSync>>,
    stopwatch: Arc<Mutex<Stopwatch>>,
    // latest stopwatch state waiting to be written by the sync task
    unsaved: Arc<watch::Sender<Stopwatch>>,
    store: Arc<ReactiveStore>,
    preferences: PreferencesService,
}

impl SyncBridge {
    pub fn new(store: Arc<ReactiveStore>, preferences: PreferencesService) -> Self {
        let stopwatch = preferences.stopwatch();
        Self {
            sync: Arc::new(Mutex::new(ChildWindowSync::new())),
            stopwatch: Arc::new(Mutex::new(stopwatch)),
            unsaved: Arc::new(watch::channel(stopwatch).0),
            store,
            preferences,
        }
    }

    fn lock_sync(&self) -> MutexGuard<'_, ChildWindowSync> {
        self.sync.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_stopwatch(&self) -> MutexGuard<'_, Stopwatch> {
        self.stopwatch.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Attach a window and bring it up to date immediately.
    pub fn attach(&self, window: Box<dyn ChildWindow>) {
        let snapshot = self.current_snapshot();
        let elapsed = self.lock_stopwatch().elapsed_secs;
        let mut sync = self.lock_sync();
        sync.attach(window);
        sync.sync_if_changed(&snapshot);
        sync.post_stopwatch(elapsed);
    }

    pub fn is_attached(&self) -> bool {
        self.lock_sync().is_attached()
    }

    fn current_snapshot(&self) -> SyncSnapshot {
        SyncSnapshot {
            sensors: self.store.sensor_readings.get(),
            left_heart: self.store.left_heart.get(),
            right_heart: self.store.right_heart.get(),
        }
    }

    pub fn stopwatch(&self) -> Stopwatch {
        *self.lock_stopwatch()
    }

    /// Apply a stopwatch control, queue it for saving and show the new time.
    pub fn control_stopwatch(&self, action: StopwatchAction) -> Stopwatch {
        let state = {
            let mut stopwatch = self.lock_stopwatch();
            stopwatch.apply(action);
            *stopwatch
        };
        self.unsaved.send_replace(state);
        self.lock_sync().post_stopwatch(state.elapsed_secs);
        state
    }

    /// Write a stopwatch state on the blocking pool.
    async fn save_stopwatch(&self, state: Stopwatch) {
        let preferences = self.preferences.clone();
        match tokio::task::spawn_blocking(move || preferences.save_stopwatch(&state)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!("Stopwatch state not persisted: {}", e),
            Err(e) => tracing::warn!("Stopwatch save task failed: {}", e),
        }
    }

    fn tick_stopwatch(&self) {
        let mut sync = self.lock_sync();
        if sync.check_liveness() || !sync.is_attached() {
            return;
        }
        let ticked = {
            let mut stopwatch = self.lock_stopwatch();
            stopwatch.tick().map(|secs| (secs, *stopwatch))
        };
        if let Some((secs, state)) = ticked {
            sync.post_stopwatch(secs);
            self.unsaved.send_replace(state);
        }
    }

    /// Run the sync loop until shutdown: push changed sub-states whenever a
    /// synced view changes, poll window liveness, tick the stopwatch and save
    /// its state.
    pub fn spawn(
        &self,
        liveness_period: Duration,
        stopwatch_period: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> tokio::task::JoinHandle<()> {
        let bridge = self.clone();
        let mut sensors = self.store.sensor_readings.subscribe();
        let mut left = self.store.left_heart.subscribe();
        let mut right = self.store.right_heart.subscribe();
        let mut unsaved = self.unsaved.subscribe();
        tokio::spawn(async move {
            let mut liveness = tokio::time::interval(liveness_period);
            liveness.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut stopwatch = tokio::time::interval(stopwatch_period);
            stopwatch.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // both intervals fire immediately; skip that first tick
            liveness.tick().await;
            stopwatch.tick().await;

            loop {
                tokio::select! {
                    open = synced_views_changed(&mut sensors, &mut left, &mut right) => {
                        if !open {
                            break;
                        }
                        let snapshot = bridge.current_snapshot();
                        bridge.lock_sync().sync_if_changed(&snapshot);
                    }
                    _ = liveness.tick() => {
                        bridge.lock_sync().check_liveness();
                    }
                    _ = stopwatch.tick() => bridge.tick_stopwatch(),
                    changed = unsaved.changed() => {
                        if changed.is_ok() {
                            let state = *unsaved.borrow_and_update();
                            bridge.save_stopwatch(state).await;
                        }
                    }
                    _ = shutdown.changed() => break,
                }
            }

            if unsaved.has_changed().unwrap_or(false) {
                let state = *unsaved.borrow_and_update();
                bridge.save_stopwatch(state).await;
            }
            tracing::debug!("Sync bridge stopped");
        })
    }
}

/// Wait until any synced view changes. `false` once the store is gone.
async fn synced_views_changed(
    sensors: &mut watch::Receiver<SensorReadings>,
    left: &mut watch::Receiver<HeartData>,
    right: &mut watch::Receiver<HeartData>,
) -> bool {
    let open = tokio::select! {
        changed = sensors.changed() => changed.is_ok(),
        changed = left.changed() => changed.is_ok(),
        changed = right.changed() => changed.is_ok(),
    };
    sensors.mark_unchanged();
    left.mark_unchanged();
    right.mark_unchanged();
    open
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::application::preferences_repository::memory::MemoryStore;
    use crate::domain::telemetry::PressureReading;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Records posted messages; can be closed from the outside.
    #[derive(Clone, Default)]
    pub(crate) struct RecordingWindow {
        pub posted: Arc<Mutex<Vec<SyncMessage>>>,
        pub closed: Arc<AtomicBool>,
    }

    impl RecordingWindow {
        pub fn kinds(&self) -> Vec<&'static str> {
            self.posted.lock().unwrap().iter().map(SyncMessage::kind).collect()
        }

        pub fn close(&self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    impl ChildWindow for RecordingWindow {
        fn is_closed(&self) -> bool {
            self.closed.load(Ordering::SeqCst)
        }

        fn post_message(&self, message: &SyncMessage) -> Result<(), SyncError> {
            if self.is_closed() {
                return Err(SyncError::Closed);
            }
            self.posted.lock().unwrap().push(message.clone());
            Ok(())
        }
    }

    fn snapshot_with_pap(mean: f64) -> SyncSnapshot {
        let mut snapshot = SyncSnapshot::default();
        snapshot.sensors.pap = PressureReading::new(mean, mean - 5.0, mean + 5.0);
        snapshot
    }

    #[test]
    fn test_first_sync_after_attach_is_full() {
        let window = RecordingWindow::default();
        let mut sync = ChildWindowSync::new();
        sync.attach(Box::new(window.clone()));

        // identical to the default previous snapshot, still sent in full
        assert_eq!(sync.sync_if_changed(&SyncSnapshot::default()), 3);
        assert_eq!(
            window.kinds(),
            vec!["UPDATE_SENSORS", "UPDATE_LEFT_HEART", "UPDATE_RIGHT_HEART"]
        );

        assert_eq!(sync.sync_if_changed(&SyncSnapshot::default()), 0);
    }

    #[test]
    fn test_only_changes_are_sent_after_first_sync() {
        let window = RecordingWindow::default();
        let mut sync = ChildWindowSync::new();
        sync.attach(Box::new(window.clone()));
        sync.sync_if_changed(&snapshot_with_pap(20.0));

        assert_eq!(sync.sync_if_changed(&snapshot_with_pap(22.0)), 1);
        assert_eq!(window.kinds().last(), Some(&"UPDATE_SENSORS"));
        assert_eq!(window.kinds().len(), 4);
    }

    #[test]
    fn test_no_window_sends_nothing() {
        let mut sync = ChildWindowSync::new();
        assert_eq!(sync.sync_if_changed(&snapshot_with_pap(1.0)), 0);
        assert!(!sync.post_stopwatch(3));
    }

    #[test]
    fn test_closed_window_is_cleared_exactly_once() {
        let window = RecordingWindow::default();
        let mut sync = ChildWindowSync::new();
        sync.attach(Box::new(window.clone()));
        sync.sync_if_changed(&SyncSnapshot::default());

        window.close();
        assert!(sync.check_liveness());
        assert!(!sync.check_liveness());
        assert!(!sync.is_attached());
        assert_eq!(sync.sync_if_changed(&snapshot_with_pap(9.0)), 0);
        assert_eq!(window.kinds().len(), 3);
    }

    #[test]
    fn test_reattach_forces_full_sync_again() {
        let mut sync = ChildWindowSync::new();
        let first = RecordingWindow::default();
        sync.attach(Box::new(first.clone()));
        sync.sync_if_changed(&snapshot_with_pap(5.0));
        first.close();
        sync.check_liveness();

        let second = RecordingWindow::default();
        sync.attach(Box::new(second.clone()));
        assert_eq!(sync.sync_if_changed(&snapshot_with_pap(5.0)), 3);
    }

    fn bridge() -> (SyncBridge, Arc<ReactiveStore>) {
        let store = Arc::new(ReactiveStore::new());
        let prefs = PreferencesService::new(Arc::new(MemoryStore::default()));
        (SyncBridge::new(store.clone(), prefs), store)
    }

    #[tokio::test(start_paused = true)]
    async fn test_stopwatch_ticks_only_with_window_attached() {
        let (bridge, _) = bridge();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = bridge.spawn(Duration::from_secs(1), Duration::from_secs(1), shutdown_rx);

        bridge.control_stopwatch(StopwatchAction::Start);
        tokio::time::sleep(Duration::from_millis(2_500)).await;
        assert_eq!(bridge.stopwatch().elapsed_secs, 0);

        let window = RecordingWindow::default();
        bridge.attach(Box::new(window.clone()));
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(bridge.stopwatch().elapsed_secs, 2);
        assert_eq!(
            window.posted.lock().unwrap().last(),
            Some(&SyncMessage::UpdateStopwatch(2))
        );

        window.close();
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(!bridge.is_attached());
        assert_eq!(bridge.stopwatch().elapsed_secs, 2);

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_view_changes_reach_window_and_stopwatch_is_saved() {
        let store = Arc::new(ReactiveStore::new());
        let backing = Arc::new(MemoryStore::default());
        let prefs = PreferencesService::new(backing);
        let bridge = SyncBridge::new(store.clone(), prefs.clone());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = bridge.spawn(Duration::from_secs(60), Duration::from_secs(60), shutdown_rx);

        let window = RecordingWindow::default();
        bridge.attach(Box::new(window.clone()));
        bridge.control_stopwatch(StopwatchAction::Start);

        let mut record = crate::domain::telemetry::TelemetryRecord::default();
        record.right_heart.cpu_load = 12.0;
        store.publish(record);

        for _ in 0..100 {
            if window.kinds().last() == Some(&"UPDATE_RIGHT_HEART") && prefs.stopwatch().running {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(window.kinds().last(), Some(&"UPDATE_RIGHT_HEART"));
        assert!(prefs.stopwatch().running);

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
