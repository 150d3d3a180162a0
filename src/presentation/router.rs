// Router configuration for the monitor HTTP API
use crate::presentation::app_state::AppState;
use crate::presentation::handlers;
use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Compression is handled per chunk on the OR View stream, so there is no
/// CompressionLayer here.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(handlers::health_check))
        .route("/views", get(handlers::get_view_counts))
        .route("/views/:name", get(handlers::get_view))
        .route("/history/:series", get(handlers::get_history))
        .route("/bars/:side", get(handlers::get_bars))
        .route("/alarms", get(handlers::get_alarms).put(handlers::put_alarms))
        .route("/alarms/status", get(handlers::get_alarm_status))
        .route("/alarms/:metric", put(handlers::put_metric_alarm))
        .route("/visibility", get(handlers::get_visibility).put(handlers::put_visibility))
        .route("/layouts/:view", get(handlers::get_layout).put(handlers::put_layout))
        .route("/events", post(handlers::post_event))
        .route("/forms", post(handlers::post_form))
        .route("/log", post(handlers::post_log))
        .route(
            "/telemetry",
            post(handlers::post_telemetry).delete(handlers::delete_telemetry),
        )
        .route("/data-rate", get(handlers::get_data_rate))
        .route("/stopwatch", get(handlers::get_stopwatch))
        .route("/stopwatch/:action", post(handlers::post_stopwatch))
        .route("/or-view/stream", get(handlers::or_view_stream))
        .route("/or-view/state", get(handlers::get_or_view_state))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
