// Event dispatch - User intents forwarded to the native host
use crate::domain::events::{ApplicationEvent, FormSubmission, LogLevel};
use std::sync::Arc;
use std::time::Instant;

/// Synchronous calls into the native host. `None` means the host accepted
/// the payload, `Some(code)` is the host's error code.
pub trait HostBridge: Send + Sync {
    fn send_click(&self, payload: &str) -> Option<i32>;

    fn send_form(&self, payload: &str) -> Option<i32>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Delivered,
    Rejected(i32),
    Disconnected,
    SerializationFailed,
}

#[derive(Clone, Copy)]
enum Channel {
    Click,
    Form,
}

/// Fire-and-forget: no retry, no queue, never fails past this boundary.
#[derive(Clone)]
pub struct EventDispatcher {
    bridge: Option<Arc<dyn HostBridge>>,
}

impl EventDispatcher {
    pub fn new(bridge: Option<Arc<dyn HostBridge>>) -> Self {
        if bridge.is_none() {
            tracing::warn!("Host bridge not available, events will not reach the host");
        }
        Self { bridge }
    }

    pub fn is_connected(&self) -> bool {
        self.bridge.is_some()
    }

    pub fn dispatch(&self, event: &ApplicationEvent) -> DispatchOutcome {
        tracing::debug!(kind = event.kind(), source = %event.header().source, "Dispatching event");
        self.forward(Channel::Click, serde_json::to_string(event))
    }

    pub fn dispatch_form(&self, form: &FormSubmission) -> DispatchOutcome {
        tracing::debug!(form_id = %form.form_id, "Dispatching form submission");
        self.forward(Channel::Form, serde_json::to_string(form))
    }

    pub fn send_log(&self, message: impl Into<String>, level: LogLevel) -> DispatchOutcome {
        self.dispatch(&ApplicationEvent::log(message, level))
    }

    fn forward(&self, channel: Channel, payload: serde_json::Result<String>) -> DispatchOutcome {
        let Some(bridge) = &self.bridge else {
            tracing::warn!("Host bridge not available, dropping event");
            return DispatchOutcome::Disconnected;
        };

        let payload = match payload {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!("Failed to serialize event: {}", e);
                return DispatchOutcome::SerializationFailed;
            }
        };

        let started = Instant::now();
        let result = match channel {
            Channel::Click => bridge.send_click(&payload),
            Channel::Form => bridge.send_form(&payload),
        };
        let elapsed_us = started.elapsed().as_micros() as u64;

        match result {
            None => {
                tracing::debug!(elapsed_us, "Host accepted event");
                DispatchOutcome::Delivered
            }
            Some(code) => {
                tracing::warn!(elapsed_us, code, "Host rejected event");
                DispatchOutcome::Rejected(code)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::events::EventHeader;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeBridge {
        clicks: Mutex<Vec<String>>,
        forms: Mutex<Vec<String>>,
        fail_with: Option<i32>,
    }

    impl HostBridge for FakeBridge {
        fn send_click(&self, payload: &str) -> Option<i32> {
            self.clicks.lock().unwrap().push(payload.to_string());
            self.fail_with
        }

        fn send_form(&self, payload: &str) -> Option<i32> {
            self.forms.lock().unwrap().push(payload.to_string());
            self.fail_with
        }
    }

    fn toggle() -> ApplicationEvent {
        ApplicationEvent::SwitchToggle {
            header: EventHeader::now("test"),
            switch_id: "flowLimit".to_string(),
            state: "on".to_string(),
            metadata: None,
        }
    }

    #[test]
    fn test_event_is_serialized_to_click_channel() {
        let bridge = Arc::new(FakeBridge::default());
        let dispatcher = EventDispatcher::new(Some(bridge.clone()));
        assert_eq!(dispatcher.dispatch(&toggle()), DispatchOutcome::Delivered);

        let clicks = bridge.clicks.lock().unwrap();
        let sent: serde_json::Value = serde_json::from_str(&clicks[0]).unwrap();
        assert_eq!(sent["type"], "SWITCH_TOGGLE");
        assert_eq!(sent["switchId"], "flowLimit");
    }

    #[test]
    fn test_forms_use_form_channel() {
        let bridge = Arc::new(FakeBridge::default());
        let dispatcher = EventDispatcher::new(Some(bridge.clone()));
        let form = FormSubmission {
            form_id: "patient".to_string(),
            timestamp: 1,
            fields: serde_json::Map::new(),
        };
        assert_eq!(dispatcher.dispatch_form(&form), DispatchOutcome::Delivered);
        assert_eq!(bridge.forms.lock().unwrap().len(), 1);
        assert!(bridge.clicks.lock().unwrap().is_empty());
    }

    #[test]
    fn test_error_code_is_reported_not_retried() {
        let bridge = Arc::new(FakeBridge {
            fail_with: Some(5),
            ..Default::default()
        });
        let dispatcher = EventDispatcher::new(Some(bridge.clone()));
        assert_eq!(dispatcher.dispatch(&toggle()), DispatchOutcome::Rejected(5));
        assert_eq!(bridge.clicks.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_missing_bridge_is_disconnected() {
        let dispatcher = EventDispatcher::new(None);
        assert!(!dispatcher.is_connected());
        assert_eq!(dispatcher.dispatch(&toggle()), DispatchOutcome::Disconnected);
        assert_eq!(
            dispatcher.send_log("hello", LogLevel::Info),
            DispatchOutcome::Disconnected
        );
    }
}
