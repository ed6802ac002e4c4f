//! Telemetry event types streamed to the client.
//!
//! Event names ride in the SSE `event:` field; the payload alone is the
//! `data:` body, so the enum serializes untagged. Payload keys are
//! camelCase to match the dashboard consumer.

use chrono::Utc;
use engine_client::ModelSpec;
use serde::Serialize;

use crate::stats::LatencyStats;

/// One server-sent event.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum TelemetryEvent {
    Open(OpenPayload),
    Ping(PingPayload),
    Progress(ProgressPayload),
    Log(LogPayload),
    Summary(SummaryPayload),
}

impl TelemetryEvent {
    /// SSE event name for this payload.
    pub fn name(&self) -> &'static str {
        match self {
            TelemetryEvent::Open(_) => "open",
            TelemetryEvent::Ping(_) => "ping",
            TelemetryEvent::Progress(_) => "progress",
            TelemetryEvent::Log(_) => "log",
            TelemetryEvent::Summary(_) => "summary",
        }
    }

    /// Heartbeat stamped with the current epoch milliseconds.
    pub fn ping() -> Self {
        TelemetryEvent::Ping(PingPayload {
            t: Utc::now().timestamp_millis(),
        })
    }

    pub fn log(worker_id: Option<u32>, level: LogLevel, message: impl Into<String>) -> Self {
        TelemetryEvent::Log(LogPayload {
            worker_id,
            level,
            message: message.into(),
        })
    }
}

/// Emitted once when the run is accepted and the stream opens.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenPayload {
    /// "prompt" or "providerless".
    pub mode: &'static str,
    pub scenario: String,
    pub profile: Option<String>,
    pub concurrency: u32,
    pub duration_seconds: u64,
    pub cycle_delay_ms: u64,
    pub command: Option<String>,
    pub model: ModelSpec,
}

/// Keepalive emitted every second while the run is live.
#[derive(Debug, Clone, Serialize)]
pub struct PingPayload {
    pub t: i64,
}

/// Rolling counters emitted after a completed cycle. Failed cycles show
/// up in `errors` on the next emit and as `log` events immediately.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressPayload {
    pub completed: u64,
    pub errors: u64,
    pub last_latency_ms: u64,
    pub last_mixed_ms: u64,
    pub last_command_ms: Option<u64>,
    pub last_get_ms: Option<u64>,
    pub last_list_ms: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

/// Free-form run annotation; also carries in-band errors once the
/// stream is open.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker_id: Option<u32>,
    pub level: LogLevel,
    pub message: String,
}

/// Final aggregate, emitted exactly once before the stream closes.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryPayload {
    pub scenario: String,
    pub profile: Option<String>,
    pub duration_seconds: u64,
    pub completed: u64,
    pub errors: u64,
    pub samples: u64,
    pub latency: LatencyStats,
    /// Alias of `latency`, kept for dashboard compatibility.
    pub mixed: LatencyStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<LatencyStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub get_session: Option<LatencyStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub list_sessions: Option<LatencyStats>,
    pub report: String,
}
