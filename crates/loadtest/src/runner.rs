//! Run lifecycle: shared state, heartbeat, worker pool, summary.

use std::sync::Arc;

use chrono::Utc;
use engine_client::{EngineApi, ModelSpec};
use futures::future::join_all;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, Instant};
use tracing::{info, warn};

use crate::events::{LogLevel, OpenPayload, ProgressPayload, SummaryPayload, TelemetryEvent};
use crate::publisher::TelemetryPublisher;
use crate::report;
use crate::scenario::LoadTestPlan;
use crate::stats::LatencyStats;
use crate::worker::{run_worker, CycleResult, WorkerContext};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(1);

// Progress is per-cycle early on, then rate-limited.
const PROGRESS_UNTHROTTLED_CYCLES: u64 = 20;
const PROGRESS_MIN_INTERVAL: Duration = Duration::from_millis(500);

/// Mutable run accounting shared by every worker. Counters only grow;
/// sample series are append-only.
#[derive(Debug, Default)]
pub struct RunState {
    pub completed: u64,
    pub errors: u64,
    pub overall_samples: Vec<u64>,
    pub command_samples: Vec<u64>,
    pub get_samples: Vec<u64>,
    pub list_samples: Vec<u64>,
    last_progress: Option<Instant>,
}

impl RunState {
    /// Record a successful cycle. Returns the progress payload to emit,
    /// or `None` when the emit falls inside the throttle window.
    pub fn record_cycle(&mut self, result: &CycleResult, now: Instant) -> Option<ProgressPayload> {
        self.completed += 1;
        self.overall_samples.push(result.latency_ms);
        if let Some(ms) = result.command_ms {
            self.command_samples.push(ms);
        }
        if let Some(ms) = result.get_ms {
            self.get_samples.push(ms);
        }
        if let Some(ms) = result.list_ms {
            self.list_samples.push(ms);
        }

        let emit = self.completed <= PROGRESS_UNTHROTTLED_CYCLES
            || self
                .last_progress
                .map_or(true, |at| now.duration_since(at) >= PROGRESS_MIN_INTERVAL);
        if !emit {
            return None;
        }
        self.last_progress = Some(now);

        Some(ProgressPayload {
            completed: self.completed,
            errors: self.errors,
            last_latency_ms: result.latency_ms,
            last_mixed_ms: result.latency_ms,
            last_command_ms: result.command_ms,
            last_get_ms: result.get_ms,
            last_list_ms: result.list_ms,
        })
    }

    pub fn record_error(&mut self) {
        self.errors += 1;
    }
}

/// Heartbeat task handle, aborted on drop so the ticker is released on
/// every exit path.
struct HeartbeatGuard(JoinHandle<()>);

impl Drop for HeartbeatGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Execute a full load run against the engine, emitting telemetry into
/// the publisher until the summary closes the stream.
///
/// The deadline is fixed here and never recomputed. A disconnect during
/// the run flips the publisher's closed flag; workers drain, and the
/// summary send becomes a silent no-op.
pub async fn execute(
    engine: Arc<dyn EngineApi>,
    plan: LoadTestPlan,
    model: ModelSpec,
    publisher: TelemetryPublisher,
) {
    let started_at_ms = Utc::now().timestamp_millis();
    let deadline = Instant::now() + Duration::from_secs(plan.duration_seconds);
    let plan = Arc::new(plan);

    info!(
        scenario = %plan.scenario,
        concurrency = plan.concurrency,
        duration_seconds = plan.duration_seconds,
        "load test starting"
    );

    publisher
        .send(TelemetryEvent::Open(OpenPayload {
            mode: if plan.scenario.is_prompt() {
                "prompt"
            } else {
                "providerless"
            },
            scenario: plan.scenario.to_string(),
            profile: plan.profile.map(|p| p.to_string()),
            concurrency: plan.concurrency,
            duration_seconds: plan.duration_seconds,
            cycle_delay_ms: plan.cycle_delay_ms,
            command: plan.command.as_ref().map(|c| c.display_line()),
            model: model.clone(),
        }))
        .await;

    let _heartbeat = HeartbeatGuard(spawn_heartbeat(publisher.clone()));

    let state = Arc::new(Mutex::new(RunState::default()));
    let mut workers = Vec::with_capacity(plan.concurrency as usize);
    for worker_id in 1..=plan.concurrency {
        let ctx = WorkerContext {
            worker_id,
            engine: engine.clone(),
            plan: plan.clone(),
            model: model.clone(),
            state: state.clone(),
            publisher: publisher.clone(),
            deadline,
        };
        workers.push(tokio::spawn(run_worker(ctx)));
    }

    // A panicked worker surfaces here without aborting its siblings.
    for (idx, joined) in join_all(workers).await.into_iter().enumerate() {
        if let Err(err) = joined {
            let worker_id = idx as u32 + 1;
            warn!(worker_id, error = %err, "worker task aborted");
            publisher
                .send(TelemetryEvent::log(
                    Some(worker_id),
                    LogLevel::Error,
                    format!("worker task aborted: {err}"),
                ))
                .await;
        }
    }

    let state = state.lock().await;
    let summary = build_summary(&plan, &state, started_at_ms);
    info!(
        completed = state.completed,
        errors = state.errors,
        duration_seconds = summary.duration_seconds,
        "load test finished"
    );
    publisher.send(TelemetryEvent::Summary(summary)).await;
}

fn spawn_heartbeat(publisher: TelemetryPublisher) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(HEARTBEAT_INTERVAL);
        // the first tick fires immediately; skip it so pings start after
        // one full interval
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if publisher.is_closed() {
                break;
            }
            publisher.try_send(TelemetryEvent::ping());
        }
    })
}

fn build_summary(plan: &LoadTestPlan, state: &RunState, started_at_ms: i64) -> SummaryPayload {
    let elapsed_ms = (Utc::now().timestamp_millis() - started_at_ms).max(0) as f64;
    let duration_seconds = ((elapsed_ms / 1000.0).round() as u64).max(1);

    let latency = LatencyStats::from_samples(&state.overall_samples);
    let providerless = !plan.scenario.is_prompt();

    let mut summary = SummaryPayload {
        scenario: plan.scenario.to_string(),
        profile: plan.profile.map(|p| p.to_string()),
        duration_seconds,
        completed: state.completed,
        errors: state.errors,
        samples: state.overall_samples.len() as u64,
        mixed: latency.clone(),
        latency,
        command: providerless.then(|| LatencyStats::from_samples(&state.command_samples)),
        get_session: providerless.then(|| LatencyStats::from_samples(&state.get_samples)),
        list_sessions: providerless.then(|| LatencyStats::from_samples(&state.list_samples)),
        report: String::new(),
    };
    summary.report = report::render(&summary);
    summary
}
