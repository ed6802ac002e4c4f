//! Worker-pool integration tests against a scripted in-memory engine.
//!
//! All tests run under a paused tokio clock: fake engine latencies are
//! virtual-time sleeps, so measured cycle latencies are exact and the
//! tests finish in milliseconds of real time.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use engine_client::{
    ActiveRunInfo, CommandOutput, CommandRequest, CreateSessionRequest, EngineApi, EngineError,
    EngineResult, EngineSession, PromptRequest, ProviderCatalog, ProvidersConfig, RunHandle,
};
use loadtest::events::{SummaryPayload, TelemetryEvent};
use loadtest::publisher::TelemetryPublisher;
use loadtest::runner::execute;
use loadtest::scenario::{resolve, LoadTestRequest};
use loadtest::{model::resolve_model, HarnessError};
use serde_json::json;
use tokio::sync::{mpsc, Mutex};
use tokio::time::{sleep, Duration, Instant};

// ============================================================
// Scripted engine fake
// ============================================================

#[derive(Default)]
struct FakeEngine {
    command_latency: Duration,
    get_latency: Duration,
    list_latency: Duration,
    submit_latency: Duration,
    /// Polls that still report the run active before it goes idle.
    /// `u32::MAX` pins the run active forever.
    polls_before_idle: u32,
    /// Report a different run id than the one handed out at submission.
    report_foreign_run_id: bool,
    /// Reject session creation for this exact title.
    fail_create_for_title: Option<String>,
    /// Pretend no provider is connected.
    no_connected_providers: bool,

    sessions_created: AtomicU32,
    command_calls: AtomicU32,
    next_run: AtomicU32,
    prompt_runs: Mutex<HashMap<String, (String, u32)>>,
}

impl FakeEngine {
    fn providerless() -> Self {
        Self {
            command_latency: Duration::from_millis(30),
            get_latency: Duration::from_millis(10),
            list_latency: Duration::from_millis(20),
            ..Default::default()
        }
    }

    fn prompting(polls_before_idle: u32) -> Self {
        Self {
            submit_latency: Duration::from_millis(20),
            polls_before_idle,
            ..Default::default()
        }
    }
}

#[async_trait]
impl EngineApi for FakeEngine {
    async fn create_session(&self, req: &CreateSessionRequest) -> EngineResult<EngineSession> {
        if let Some(deny) = &self.fail_create_for_title {
            if req.title.as_deref() == Some(deny.as_str()) {
                return Err(EngineError::Api {
                    status: 500,
                    message: "session store unavailable".to_string(),
                });
            }
        }
        let n = self.sessions_created.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(EngineSession {
            id: format!("session-{n}"),
            title: req.title.clone(),
        })
    }

    async fn get_session(&self, session_id: &str) -> EngineResult<EngineSession> {
        sleep(self.get_latency).await;
        Ok(EngineSession {
            id: session_id.to_string(),
            title: None,
        })
    }

    async fn list_sessions(&self, page_size: u32) -> EngineResult<Vec<EngineSession>> {
        sleep(self.list_latency).await;
        Ok((0..page_size.min(2))
            .map(|i| EngineSession {
                id: format!("s-{i}"),
                title: None,
            })
            .collect())
    }

    async fn run_command(
        &self,
        _session_id: &str,
        req: &CommandRequest,
    ) -> EngineResult<CommandOutput> {
        self.command_calls.fetch_add(1, Ordering::SeqCst);
        sleep(self.command_latency).await;
        Ok(CommandOutput {
            ok: true,
            stdout: format!("{} {}", req.command, req.args.join(" ")),
            stderr: String::new(),
        })
    }

    async fn submit_prompt(
        &self,
        session_id: &str,
        _req: &PromptRequest,
    ) -> EngineResult<RunHandle> {
        sleep(self.submit_latency).await;
        let run_id = format!("run-{}", self.next_run.fetch_add(1, Ordering::SeqCst) + 1);
        self.prompt_runs
            .lock()
            .await
            .insert(session_id.to_string(), (run_id.clone(), self.polls_before_idle));
        Ok(RunHandle {
            run_id,
            attach_event_stream: None,
        })
    }

    async fn active_run(&self, session_id: &str) -> EngineResult<Option<ActiveRunInfo>> {
        let mut runs = self.prompt_runs.lock().await;
        let Some((run_id, polls_left)) = runs.get(session_id).cloned() else {
            return Ok(None);
        };
        if self.report_foreign_run_id {
            return Ok(Some(ActiveRunInfo {
                run_id: "foreign-run".to_string(),
                started_at_ms: None,
            }));
        }
        if polls_left == 0 {
            runs.remove(session_id);
            return Ok(None);
        }
        if polls_left != u32::MAX {
            runs.insert(session_id.to_string(), (run_id.clone(), polls_left - 1));
        }
        Ok(Some(ActiveRunInfo {
            run_id,
            started_at_ms: Some(0),
        }))
    }

    async fn provider_config(&self) -> EngineResult<ProvidersConfig> {
        Ok(serde_json::from_value(json!({
            "providers": {"openrouter": {"default_model": "gpt-4o-mini"}},
            "default": "openrouter"
        }))
        .expect("fake config"))
    }

    async fn provider_catalog(&self) -> EngineResult<ProviderCatalog> {
        let connected: Vec<&str> = if self.no_connected_providers {
            vec![]
        } else {
            vec!["openrouter"]
        };
        Ok(serde_json::from_value(json!({
            "all": [{"id": "openrouter", "models": {"gpt-4o-mini": {}}}],
            "connected": connected,
            "default": "openrouter"
        }))
        .expect("fake catalog"))
    }
}

// ============================================================
// Helpers
// ============================================================

async fn run_to_completion(engine: Arc<FakeEngine>, request: LoadTestRequest) -> Vec<TelemetryEvent> {
    let plan = resolve(&request).expect("valid request");
    let model = resolve_model(engine.as_ref()).await.expect("usable model");

    let (tx, rx) = mpsc::channel(1024);
    let publisher = TelemetryPublisher::new(tx);
    let collector = tokio::spawn(async move {
        let mut rx = rx;
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    });

    execute(engine, plan, model, publisher).await;
    collector.await.expect("collector task")
}

fn summary_of(events: &[TelemetryEvent]) -> &SummaryPayload {
    match events.last().expect("at least one event") {
        TelemetryEvent::Summary(payload) => payload,
        other => panic!("expected summary last, got {}", other.name()),
    }
}

fn count(events: &[TelemetryEvent], name: &str) -> usize {
    events.iter().filter(|event| event.name() == name).count()
}

fn providerless_request(profile: &str, concurrency: u32) -> LoadTestRequest {
    LoadTestRequest {
        scenario: "providerless".to_string(),
        profile: Some(profile.to_string()),
        concurrency,
        duration_seconds: 5,
        cycle_delay_ms: 0,
        ..Default::default()
    }
}

// ============================================================
// Providerless runs
// ============================================================

#[tokio::test(start_paused = true)]
async fn command_only_run_creates_one_session_per_worker_and_mirrors_series() {
    let engine = Arc::new(FakeEngine::providerless());
    let events = run_to_completion(engine.clone(), providerless_request("command_only", 3)).await;

    assert_eq!(engine.sessions_created.load(Ordering::SeqCst), 3);

    let TelemetryEvent::Open(open) = &events[0] else {
        panic!("expected open first, got {}", events[0].name());
    };
    assert_eq!(open.mode, "providerless");
    assert_eq!(open.concurrency, 3);
    assert_eq!(open.command.as_deref(), Some("echo ok"));
    assert_eq!(open.model.provider_id, "openrouter");

    let summary = summary_of(&events);
    assert!(summary.completed > 0);
    assert_eq!(summary.errors, 0);
    assert_eq!(summary.samples, summary.completed);
    // every cycle is a single 30ms command call, so command and overall
    // series are numerically identical
    assert_eq!(summary.latency, summary.mixed);
    assert_eq!(summary.command.as_ref(), Some(&summary.latency));
    assert_eq!(summary.latency.p50, 30);
    assert_eq!(summary.latency.min, 30);
    assert_eq!(summary.latency.max, 30);
    assert!(summary.duration_seconds >= 1);

    assert!(count(&events, "progress") >= 20);
    assert!(count(&events, "ping") >= 3);
    assert_eq!(count(&events, "summary"), 1);
}

#[tokio::test(start_paused = true)]
async fn mixed_profile_joins_primitives_and_times_each_series() {
    let engine = Arc::new(FakeEngine::providerless());
    let mut request = providerless_request("mixed", 1);
    request.cycle_delay_ms = 100;
    let events = run_to_completion(engine.clone(), request).await;

    let progress = events
        .iter()
        .find_map(|event| match event {
            TelemetryEvent::Progress(payload) => Some(payload),
            _ => None,
        })
        .expect("at least one progress event");
    assert_eq!(progress.last_command_ms, Some(30));
    assert_eq!(progress.last_get_ms, Some(10));
    assert_eq!(progress.last_list_ms, Some(20));
    // overall latency is the join wall time, i.e. the slowest primitive
    assert_eq!(progress.last_latency_ms, 30);
    assert_eq!(progress.last_latency_ms, progress.last_mixed_ms);

    let summary = summary_of(&events);
    assert_eq!(summary.latency.p95, 30);
    assert_eq!(summary.command.as_ref().unwrap().p95, 30);
    assert_eq!(summary.get_session.as_ref().unwrap().p95, 10);
    assert_eq!(summary.list_sessions.as_ref().unwrap().p95, 20);
    assert_eq!(summary.samples, summary.completed);
}

#[tokio::test(start_paused = true)]
async fn session_create_failure_stops_that_worker_only() {
    let engine = Arc::new(FakeEngine {
        fail_create_for_title: Some("loadtest-worker-2".to_string()),
        ..FakeEngine::providerless()
    });
    let events = run_to_completion(engine.clone(), providerless_request("command_only", 3)).await;

    assert_eq!(engine.sessions_created.load(Ordering::SeqCst), 2);

    let failure_log = events
        .iter()
        .find_map(|event| match event {
            TelemetryEvent::Log(payload) if payload.message.contains("session create failed") => {
                Some(payload)
            }
            _ => None,
        })
        .expect("session create failure is logged");
    assert_eq!(failure_log.worker_id, Some(2));

    let summary = summary_of(&events);
    // the two surviving workers keep cycling; worker-fatal failures are
    // not cycle errors
    assert!(summary.completed > 0);
    assert_eq!(summary.errors, 0);
}

#[tokio::test(start_paused = true)]
async fn zero_connected_providers_fail_before_any_session_exists() {
    let engine = Arc::new(FakeEngine {
        no_connected_providers: true,
        ..FakeEngine::providerless()
    });

    let err = resolve_model(engine.as_ref()).await.unwrap_err();
    assert!(matches!(err, HarnessError::NoUsableModel));
    assert_eq!(err.to_string(), "No usable model");
    assert_eq!(err.http_status_code(), 400);
    assert_eq!(engine.sessions_created.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn disconnect_stops_new_cycles_and_drops_the_summary() {
    let engine = Arc::new(FakeEngine::providerless());
    let mut request = providerless_request("command_only", 2);
    request.duration_seconds = 3600;

    let plan = resolve(&request).expect("valid request");
    let model = resolve_model(engine.as_ref()).await.expect("usable model");

    let (tx, rx) = mpsc::channel(1024);
    let publisher = TelemetryPublisher::new(tx);
    // subscriber walks away after a handful of events
    let collector = tokio::spawn(async move {
        let mut rx = rx;
        let mut events = Vec::new();
        for _ in 0..10 {
            match rx.recv().await {
                Some(event) => events.push(event),
                None => break,
            }
        }
        drop(rx);
        events
    });

    let started = Instant::now();
    execute(engine.clone(), plan, model, publisher).await;
    let elapsed = started.elapsed();

    // the run wound down long before its 3600s deadline
    assert!(elapsed < Duration::from_secs(600), "run took {elapsed:?}");
    let events = collector.await.expect("collector task");
    assert_eq!(count(&events, "summary"), 0);
    // workers stopped issuing engine calls shortly after the disconnect
    assert!(engine.command_calls.load(Ordering::SeqCst) < 10_000);
}

// ============================================================
// Prompt-driven runs
// ============================================================

#[tokio::test(start_paused = true)]
async fn prompt_run_polls_until_the_run_goes_idle() {
    let engine = Arc::new(FakeEngine::prompting(2));
    let request = LoadTestRequest {
        scenario: "remote".to_string(),
        concurrency: 1,
        duration_seconds: 5,
        cycle_delay_ms: 0,
        ..Default::default()
    };
    let events = run_to_completion(engine.clone(), request).await;

    let TelemetryEvent::Open(open) = &events[0] else {
        panic!("expected open first");
    };
    assert_eq!(open.mode, "prompt");
    assert!(open.profile.is_none());
    assert!(open.command.is_none());

    let summary = summary_of(&events);
    assert!(summary.completed > 0);
    assert_eq!(summary.errors, 0);
    // 20ms submit + three 250ms poll sleeps (two active polls, one idle)
    assert_eq!(summary.latency.p50, 770);
    assert!(summary.command.is_none());
    assert!(summary.get_session.is_none());
    assert!(summary.list_sessions.is_none());
}

#[tokio::test(start_paused = true)]
async fn foreign_run_id_counts_as_completion() {
    let engine = Arc::new(FakeEngine {
        report_foreign_run_id: true,
        ..FakeEngine::prompting(u32::MAX)
    });
    let request = LoadTestRequest {
        scenario: "remote".to_string(),
        concurrency: 1,
        duration_seconds: 5,
        cycle_delay_ms: 0,
        ..Default::default()
    };
    let events = run_to_completion(engine, request).await;

    let summary = summary_of(&events);
    assert_eq!(summary.errors, 0);
    // 20ms submit + a single 250ms poll sleep before the id mismatch
    assert_eq!(summary.latency.p50, 270);
}

#[tokio::test(start_paused = true)]
async fn exhausted_poll_budget_fails_the_cycle() {
    let engine = Arc::new(FakeEngine::prompting(u32::MAX));
    let request = LoadTestRequest {
        scenario: "remote".to_string(),
        concurrency: 1,
        duration_seconds: 5,
        cycle_delay_ms: 0,
        ..Default::default()
    };
    let events = run_to_completion(engine, request).await;

    let summary = summary_of(&events);
    assert_eq!(summary.completed, 0);
    assert_eq!(summary.errors, 1);
    assert_eq!(summary.samples, 0);
    // empty sample set reports all-zero statistics
    assert_eq!(summary.latency, Default::default());

    assert!(events.iter().any(|event| match event {
        TelemetryEvent::Log(payload) => payload.message.contains("poll budget"),
        _ => false,
    }));
}
