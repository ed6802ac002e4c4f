//! SSE endpoint that starts a load test and streams its telemetry.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_stream::{wrappers::ReceiverStream, StreamExt};
use tracing::warn;

use engine_client::{EngineApi, EngineClient};
use loadtest::{execute, resolve, resolve_model, HarnessError, LoadTestRequest, TelemetryPublisher};

use crate::auth;
use crate::state::AppState;

/// Telemetry events buffered between the runner and the SSE encoder.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Auth portion of the query string, kept separate from the harness
/// knobs so `token` never reaches the plan.
#[derive(Debug, Deserialize)]
pub struct StreamAuthQuery {
    token: Option<String>,
}

/// GET /api/loadtest - Validate the request, resolve a model, then run
/// the worker pool while streaming telemetry until the summary or the
/// client disconnects.
pub async fn loadtest_stream_handler(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    Query(auth_query): Query<StreamAuthQuery>,
    Query(request): Query<LoadTestRequest>,
) -> Response {
    let presented = auth::extract_token(&headers, auth_query.token.as_deref());
    if !auth::authorized(state.api_token.as_deref(), presented.as_deref()) {
        return error_response(StatusCode::UNAUTHORIZED, "Unauthorized");
    }

    let plan = match resolve(&request) {
        Ok(plan) => plan,
        Err(err) => {
            warn!(error = %err, "rejected load test request");
            return harness_error_response(&err);
        }
    };

    // The caller's token is forwarded verbatim to the engine.
    let engine: Arc<dyn EngineApi> = Arc::new(EngineClient::new(
        state.http.clone(),
        state.engine_url.clone(),
        presented,
    ));

    // Model resolution fails fast before the stream opens; everything
    // after this point is reported in-band as log events.
    let model = match resolve_model(engine.as_ref()).await {
        Ok(model) => model,
        Err(err) => {
            warn!(error = %err, "load test model resolution failed");
            return harness_error_response(&err);
        }
    };

    let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let publisher = TelemetryPublisher::new(tx);
    tokio::spawn(execute(engine, plan, model, publisher));

    let stream = ReceiverStream::new(rx).map(|event| {
        let payload = serde_json::to_string(&event).unwrap_or_else(|_| "{}".to_string());
        Ok::<Event, Infallible>(Event::default().event(event.name()).data(payload))
    });

    let mut response = Sse::new(stream)
        .keep_alive(KeepAlive::default())
        .into_response();
    // Keeps nginx-style proxies from buffering the event stream.
    response
        .headers_mut()
        .insert("x-accel-buffering", HeaderValue::from_static("no"));
    response
}

fn harness_error_response(err: &HarnessError) -> Response {
    let status =
        StatusCode::from_u16(err.http_status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    error_response(status, &err.to_string())
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "ok": false, "error": message }))).into_response()
}
