// HTTP request handlers
use crate::application::event_dispatch::DispatchOutcome;
use crate::application::history_service::{SeriesId, SeriesSnapshot};
use crate::application::mirror_store::MirrorState;
use crate::application::state_store::ViewName;
use crate::application::telemetry_ingest::{IngestOutcome, RawMessage};
use crate::domain::alarm::{AlarmStatus, AlarmThresholds, MetricAlarmSettings, card_statuses};
use crate::domain::events::{ApplicationEvent, FormSubmission, LogLevel};
use crate::domain::history::OhlcBar;
use crate::domain::layout::{Layout, LayoutView, VisibilityMap};
use crate::domain::rate::DataRate;
use crate::domain::stopwatch::{Stopwatch, StopwatchAction};
use crate::domain::telemetry::HeartSide;
use crate::infrastructure::chunked_json::stream_from_receiver;
use crate::infrastructure::stream_window::ChannelWindow;
use crate::presentation::app_state::AppState;
use crate::presentation::error::AppError;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

type Shared = State<Arc<AppState>>;

#[derive(Deserialize)]
pub struct HistoryQuery {
    pub alpha: Option<f64>,
}

#[derive(Deserialize)]
pub struct LogRequest {
    pub message: String,
    #[serde(default)]
    pub level: LogLevel,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub host_connected: bool,
    pub or_view_attached: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrViewState {
    pub attached: bool,
    #[serde(flatten)]
    pub shown: MirrorState,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchResponse {
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<i32>,
}

impl DispatchResponse {
    fn from_outcome(outcome: DispatchOutcome) -> (StatusCode, Json<Self>) {
        let (status, outcome, code) = match outcome {
            DispatchOutcome::Delivered => (StatusCode::OK, "delivered", None),
            DispatchOutcome::Rejected(code) => (StatusCode::BAD_GATEWAY, "rejected", Some(code)),
            DispatchOutcome::Disconnected => (StatusCode::SERVICE_UNAVAILABLE, "disconnected", None),
            DispatchOutcome::SerializationFailed => {
                (StatusCode::INTERNAL_SERVER_ERROR, "serialization_failed", None)
            }
        };
        (status, Json(Self { outcome, code }))
    }
}

fn parse<T>(raw: &str) -> Result<T, AppError>
where
    T: std::str::FromStr<Err = String>,
{
    raw.parse().map_err(AppError::NotFound)
}

/// Run file or host I/O on the blocking pool so handlers never stall a
/// runtime thread.
async fn blocking<T, F>(f: F) -> Result<T, AppError>
where
    F: FnOnce() -> Result<T, AppError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError::Internal(format!("blocking task failed: {}", e)))?
}

/// Check if client accepts Brotli compression
fn accepts_brotli(headers: &HeaderMap) -> bool {
    headers
        .get("accept-encoding")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.contains("br"))
        .unwrap_or(false)
}

/// Health check endpoint
pub async fn health_check(State(state): Shared) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        host_connected: state.dispatcher.is_connected(),
        or_view_attached: state.sync.is_attached(),
    })
}

pub async fn get_view(
    Path(name): Path<String>,
    State(state): Shared,
) -> Result<Json<serde_json::Value>, AppError> {
    let view: ViewName = parse(&name)?;
    Ok(Json(state.store.view_json(view)?))
}

/// How often each view has recomputed since startup.
pub async fn get_view_counts(State(state): Shared) -> Json<BTreeMap<&'static str, u64>> {
    Json(state.store.recompute_counts())
}

pub async fn get_history(
    Path(series): Path<String>,
    Query(query): Query<HistoryQuery>,
    State(state): Shared,
) -> Result<Json<SeriesSnapshot>, AppError> {
    let id: SeriesId = parse(&series)?;
    let alpha = query.alpha.unwrap_or(state.ema_alpha);
    if !(alpha > 0.0 && alpha <= 1.0) {
        return Err(AppError::BadRequest(format!("alpha must be in (0, 1], got {}", alpha)));
    }
    Ok(Json(state.history.snapshot(id, Some(alpha))))
}

pub async fn get_bars(
    Path(side): Path<String>,
    State(state): Shared,
) -> Result<Json<Vec<OhlcBar>>, AppError> {
    let side: HeartSide = parse(&side)?;
    Ok(Json(state.history.bars(side)))
}

pub async fn get_alarms(State(state): Shared) -> Result<Json<MetricAlarmSettings>, AppError> {
    let preferences = state.preferences.clone();
    Ok(Json(blocking(move || Ok(preferences.alarm_settings())).await?))
}

pub async fn put_alarms(
    State(state): Shared,
    Json(settings): Json<MetricAlarmSettings>,
) -> Result<Json<MetricAlarmSettings>, AppError> {
    let preferences = state.preferences.clone();
    blocking(move || {
        preferences.set_alarm_settings(&settings)?;
        Ok(Json(settings))
    })
    .await
}

pub async fn put_metric_alarm(
    Path(metric): Path<String>,
    State(state): Shared,
    Json(thresholds): Json<AlarmThresholds>,
) -> Result<Json<MetricAlarmSettings>, AppError> {
    let preferences = state.preferences.clone();
    blocking(move || Ok(Json(preferences.set_metric_thresholds(&metric, thresholds)?))).await
}

/// Status of every pressure card against the current record. Empty until
/// the first record arrives.
pub async fn get_alarm_status(
    State(state): Shared,
) -> Result<Json<BTreeMap<String, AlarmStatus>>, AppError> {
    let Some(record) = state.store.current() else {
        return Ok(Json(BTreeMap::new()));
    };
    let preferences = state.preferences.clone();
    let settings = blocking(move || Ok(preferences.alarm_settings())).await?;
    Ok(Json(card_statuses(&record, &settings)))
}

pub async fn get_visibility(State(state): Shared) -> Result<Json<VisibilityMap>, AppError> {
    let preferences = state.preferences.clone();
    Ok(Json(blocking(move || Ok(preferences.visibility())).await?))
}

pub async fn put_visibility(
    State(state): Shared,
    Json(visibility): Json<VisibilityMap>,
) -> Result<Json<VisibilityMap>, AppError> {
    let preferences = state.preferences.clone();
    blocking(move || {
        preferences.set_visibility(&visibility)?;
        Ok(Json(visibility))
    })
    .await
}

pub async fn get_layout(
    Path(view): Path<String>,
    State(state): Shared,
) -> Result<Json<Layout>, AppError> {
    let view: LayoutView = parse(&view)?;
    let preferences = state.preferences.clone();
    blocking(move || Ok(Json(preferences.layout(view)?))).await
}

pub async fn put_layout(
    Path(view): Path<String>,
    State(state): Shared,
    Json(layout): Json<Layout>,
) -> Result<Json<Layout>, AppError> {
    let view: LayoutView = parse(&view)?;
    let preferences = state.preferences.clone();
    blocking(move || Ok(Json(preferences.update_layout(view, layout)?))).await
}

pub async fn post_event(
    State(state): Shared,
    Json(event): Json<ApplicationEvent>,
) -> Result<impl IntoResponse, AppError> {
    let dispatcher = state.dispatcher.clone();
    let outcome = blocking(move || Ok(dispatcher.dispatch(&event))).await?;
    Ok(DispatchResponse::from_outcome(outcome))
}

pub async fn post_form(
    State(state): Shared,
    Json(form): Json<FormSubmission>,
) -> Result<impl IntoResponse, AppError> {
    let dispatcher = state.dispatcher.clone();
    let outcome = blocking(move || Ok(dispatcher.dispatch_form(&form))).await?;
    Ok(DispatchResponse::from_outcome(outcome))
}

/// Forward a client log line to the host as a `LOG_MESSAGE` event.
pub async fn post_log(
    State(state): Shared,
    Json(log): Json<LogRequest>,
) -> Result<impl IntoResponse, AppError> {
    let dispatcher = state.dispatcher.clone();
    let outcome = blocking(move || Ok(dispatcher.send_log(log.message, log.level))).await?;
    Ok(DispatchResponse::from_outcome(outcome))
}

/// Same path as host input. A JSON content type hands the parsed value to
/// ingest; anything else goes in as text.
pub async fn post_telemetry(
    State(state): Shared,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, AppError> {
    let is_json = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json"));
    let text = || RawMessage::Text(String::from_utf8_lossy(&body).into_owned());
    let raw = if is_json {
        serde_json::from_slice(&body).map(RawMessage::Json).unwrap_or_else(|_| text())
    } else {
        text()
    };
    match state.ingest.ingest(raw) {
        IngestOutcome::Published => Ok(StatusCode::ACCEPTED),
        IngestOutcome::InvalidJson => Err(AppError::BadRequest("telemetry is not valid JSON".into())),
        IngestOutcome::Malformed => Err(AppError::BadRequest(
            "telemetry record is missing required fields".into(),
        )),
    }
}

/// Drop the current record. Views fall back to their defaults.
pub async fn delete_telemetry(State(state): Shared) -> StatusCode {
    state.store.clear();
    StatusCode::NO_CONTENT
}

pub async fn get_data_rate(State(state): Shared) -> Json<DataRate> {
    Json(state.rate.current())
}

pub async fn get_stopwatch(State(state): Shared) -> Json<Stopwatch> {
    Json(state.sync.stopwatch())
}

pub async fn post_stopwatch(
    Path(action): Path<String>,
    State(state): Shared,
) -> Result<Json<Stopwatch>, AppError> {
    let action: StopwatchAction = parse(&action)?;
    Ok(Json(state.sync.control_stopwatch(action)))
}

/// Open the OR View: the response body stays open and carries every sync
/// message until the client disconnects or another OR View replaces it.
pub async fn or_view_stream(headers: HeaderMap, State(state): Shared) -> impl IntoResponse {
    let compress = accepts_brotli(&headers);
    let (window, rx) = ChannelWindow::open(state.mirror.clone());
    state.sync.attach(Box::new(window));
    tracing::info!(compress, "OR View attached");
    stream_from_receiver(rx, compress).await
}

/// What the attached OR View has been sent so far.
pub async fn get_or_view_state(State(state): Shared) -> Json<OrViewState> {
    Json(OrViewState {
        attached: state.sync.is_attached(),
        shown: state.mirror.snapshot(),
    })
}
