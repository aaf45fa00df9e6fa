//! Route table.
//!
//! # Responsibilities
//! - Bind URL paths to handlers
//! - Wire up middleware (tracing, request ID, response timeout)
//! - Render the human-facing status page

use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::{ListenerConfig, Version};
use crate::http::templates::{TemplateSet, STATUS_TEMPLATE};
use crate::lifecycle::LifecycleState;
use crate::registry::{IdRegistry, Mailboxes};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub version: Version,
    pub mailboxes: Mailboxes,
    pub ids: IdRegistry,
    pub templates: Arc<TemplateSet>,
    pub lifecycle: watch::Receiver<LifecycleState>,
    pub started_at: Instant,
}

#[derive(Serialize)]
struct StatusContext {
    version: String,
    state: LifecycleState,
    mailboxes: usize,
    ids: usize,
    uptime_secs: u64,
}

/// Build the route table without middleware.
pub fn build_routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(status_page))
        .route("/ping", get(ping))
        .route("/version", get(version))
        .with_state(state)
}

/// Wrap a route table in the server's middleware stack.
pub fn apply_layers(router: Router, config: &ListenerConfig) -> Router {
    router
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            config.write_timeout(),
        ))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

async fn ping() -> &'static str {
    "pong"
}

async fn version(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "version": state.version.to_string() }))
}

async fn status_page(State(state): State<AppState>) -> Response {
    let context = StatusContext {
        version: state.version.to_string(),
        state: *state.lifecycle.borrow(),
        mailboxes: state.mailboxes.len(),
        ids: state.ids.len(),
        uptime_secs: state.started_at.elapsed().as_secs(),
    };

    match state.templates.render(STATUS_TEMPLATE, &context) {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to render status page");
            (StatusCode::INTERNAL_SERVER_ERROR, "status page unavailable").into_response()
        }
    }
}
