// Outbound user-intent events
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    #[default]
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlMetadata {
    pub action: String,
    pub control: String,
    pub parameter: String,
    pub current_state: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
}

/// Fields shared by every event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventHeader {
    pub timestamp: i64,
    pub source: String,
}

impl EventHeader {
    pub fn now(source: impl Into<String>) -> Self {
        Self {
            timestamp: chrono::Utc::now().timestamp_millis(),
            source: source.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicationEvent {
    #[serde(rename_all = "camelCase")]
    ButtonClick {
        #[serde(flatten)]
        header: EventHeader,
        button_id: String,
        value: bool,
        metadata: ControlMetadata,
    },
    #[serde(rename_all = "camelCase")]
    MenuSelect {
        #[serde(flatten)]
        header: EventHeader,
        menu_id: String,
        selection: String,
        metadata: ControlMetadata,
    },
    #[serde(rename_all = "camelCase")]
    ValueChange {
        #[serde(flatten)]
        header: EventHeader,
        field_id: String,
        value: Value,
        previous_value: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        metadata: Option<Map<String, Value>>,
    },
    #[serde(rename_all = "camelCase")]
    ParameterUpdate {
        #[serde(flatten)]
        header: EventHeader,
        parameter_id: String,
        value: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        metadata: Option<Map<String, Value>>,
    },
    #[serde(rename_all = "camelCase")]
    LogMessage {
        #[serde(flatten)]
        header: EventHeader,
        message: String,
        #[serde(default)]
        level: LogLevel,
    },
    #[serde(rename_all = "camelCase")]
    SwitchToggle {
        #[serde(flatten)]
        header: EventHeader,
        switch_id: String,
        state: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        metadata: Option<Map<String, Value>>,
    },
}

impl ApplicationEvent {
    pub fn log(message: impl Into<String>, level: LogLevel) -> Self {
        ApplicationEvent::LogMessage {
            header: EventHeader::now("client"),
            message: message.into(),
            level,
        }
    }

    pub fn header(&self) -> &EventHeader {
        match self {
            ApplicationEvent::ButtonClick { header, .. }
            | ApplicationEvent::MenuSelect { header, .. }
            | ApplicationEvent::ValueChange { header, .. }
            | ApplicationEvent::ParameterUpdate { header, .. }
            | ApplicationEvent::LogMessage { header, .. }
            | ApplicationEvent::SwitchToggle { header, .. } => header,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ApplicationEvent::ButtonClick { .. } => "BUTTON_CLICK",
            ApplicationEvent::MenuSelect { .. } => "MENU_SELECT",
            ApplicationEvent::ValueChange { .. } => "VALUE_CHANGE",
            ApplicationEvent::ParameterUpdate { .. } => "PARAMETER_UPDATE",
            ApplicationEvent::LogMessage { .. } => "LOG_MESSAGE",
            ApplicationEvent::SwitchToggle { .. } => "SWITCH_TOGGLE",
        }
    }
}

/// A captured form submission, forwarded on the host's form channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormSubmission {
    pub form_id: String,
    pub timestamp: i64,
    #[serde(default)]
    pub fields: Map<String, Value>,
}
