//! Worker loop and cycle executors.
//!
//! Each worker owns one engine session and runs cycles strictly
//! sequentially until the run deadline passes or the subscriber
//! disconnects. Cancellation is cooperative: the closed flag is checked
//! between cycles, never mid-call.

use std::future::Future;
use std::sync::Arc;

use engine_client::{
    CommandRequest, CreateSessionRequest, EngineApi, EngineResult, ModelSpec, PermissionRule,
    PromptRequest,
};
use tokio::sync::Mutex;
use tokio::time::{sleep, Duration, Instant};
use tracing::{debug, warn};

use crate::error::{HarnessError, HarnessResult};
use crate::events::{LogLevel, TelemetryEvent};
use crate::publisher::TelemetryPublisher;
use crate::runner::RunState;
use crate::scenario::{LoadTestPlan, ParsedCommand, Profile};

const SESSION_LIST_PAGE_SIZE: u32 = 5;
const RUN_POLL_INTERVAL: Duration = Duration::from_millis(250);
const RUN_POLL_BUDGET: Duration = Duration::from_secs(180);

/// Timings of one completed cycle. Sub-timings are present only for the
/// primitives the cycle actually exercised.
#[derive(Debug, Clone, Copy)]
pub struct CycleResult {
    pub latency_ms: u64,
    pub command_ms: Option<u64>,
    pub get_ms: Option<u64>,
    pub list_ms: Option<u64>,
}

/// Everything one worker task needs; cheap to clone per spawn.
#[derive(Clone)]
pub(crate) struct WorkerContext {
    pub worker_id: u32,
    pub engine: Arc<dyn EngineApi>,
    pub plan: Arc<LoadTestPlan>,
    pub model: ModelSpec,
    pub state: Arc<Mutex<RunState>>,
    pub publisher: TelemetryPublisher,
    pub deadline: Instant,
}

/// Worker entry point. Creates the session, then loops cycles until the
/// deadline or disconnect. A session-create failure stops this worker
/// only; siblings keep running.
pub(crate) async fn run_worker(ctx: WorkerContext) {
    let create = CreateSessionRequest {
        title: Some(format!("loadtest-worker-{}", ctx.worker_id)),
        provider: Some(ctx.model.provider_id.clone()),
        model: Some(ctx.model.model_id.clone()),
        permission: Some(vec![PermissionRule::allow_all()]),
    };

    let session = match ctx.engine.create_session(&create).await {
        Ok(session) => session,
        Err(err) => {
            warn!(worker_id = ctx.worker_id, error = %err, "session create failed");
            ctx.publisher
                .send(TelemetryEvent::log(
                    Some(ctx.worker_id),
                    LogLevel::Error,
                    format!("session create failed: {err}"),
                ))
                .await;
            return;
        }
    };
    debug!(worker_id = ctx.worker_id, session_id = %session.id, "worker session ready");

    // Fixed per-run inputs, built once. The session is abandoned at loop
    // exit; the engine has no teardown call for it.
    let command = ctx
        .plan
        .command
        .clone()
        .unwrap_or_else(ParsedCommand::default_diagnostic);
    let command_request = CommandRequest {
        command: command.program,
        args: command.args,
    };
    let prompt_request = ctx.plan.prompt.clone().map(PromptRequest::text);

    while !ctx.publisher.is_closed() && Instant::now() < ctx.deadline {
        match run_cycle(&ctx, &session.id, &command_request, prompt_request.as_ref()).await {
            Ok(result) => {
                let progress = {
                    let mut state = ctx.state.lock().await;
                    state.record_cycle(&result, Instant::now())
                };
                if let Some(payload) = progress {
                    ctx.publisher.try_send(TelemetryEvent::Progress(payload));
                }
            }
            Err(err) => {
                ctx.state.lock().await.record_error();
                ctx.publisher
                    .send(TelemetryEvent::log(
                        Some(ctx.worker_id),
                        LogLevel::Error,
                        format!("cycle failed: {err}"),
                    ))
                    .await;
            }
        }

        if ctx.plan.cycle_delay_ms > 0
            && !ctx.publisher.is_closed()
            && Instant::now() < ctx.deadline
        {
            sleep(Duration::from_millis(ctx.plan.cycle_delay_ms)).await;
        }
    }

    debug!(worker_id = ctx.worker_id, "worker loop finished");
}

async fn run_cycle(
    ctx: &WorkerContext,
    session_id: &str,
    command: &CommandRequest,
    prompt: Option<&PromptRequest>,
) -> HarnessResult<CycleResult> {
    if let Some(prompt) = prompt {
        return prompt_cycle(ctx, session_id, prompt).await;
    }
    match ctx.plan.profile.unwrap_or(Profile::Mixed) {
        Profile::CommandOnly => command_cycle(ctx, session_id, command).await,
        Profile::GetSessionOnly => get_cycle(ctx, session_id).await,
        Profile::ListSessionsOnly => list_cycle(ctx).await,
        Profile::Mixed | Profile::SoakMixed => mixed_cycle(ctx, session_id, command).await,
    }
}

// ============================================================
// Providerless primitives
// ============================================================

async fn command_cycle(
    ctx: &WorkerContext,
    session_id: &str,
    command: &CommandRequest,
) -> HarnessResult<CycleResult> {
    let (_, ms) = timed(ctx.engine.run_command(session_id, command)).await?;
    Ok(CycleResult {
        latency_ms: ms,
        command_ms: Some(ms),
        get_ms: None,
        list_ms: None,
    })
}

async fn get_cycle(ctx: &WorkerContext, session_id: &str) -> HarnessResult<CycleResult> {
    let (_, ms) = timed(ctx.engine.get_session(session_id)).await?;
    Ok(CycleResult {
        latency_ms: ms,
        command_ms: None,
        get_ms: Some(ms),
        list_ms: None,
    })
}

async fn list_cycle(ctx: &WorkerContext) -> HarnessResult<CycleResult> {
    let (_, ms) = timed(ctx.engine.list_sessions(SESSION_LIST_PAGE_SIZE)).await?;
    Ok(CycleResult {
        latency_ms: ms,
        command_ms: None,
        get_ms: None,
        list_ms: Some(ms),
    })
}

/// All three primitives concurrently; overall latency is the join's wall
/// time. Any primitive failure fails the cycle as a whole.
async fn mixed_cycle(
    ctx: &WorkerContext,
    session_id: &str,
    command: &CommandRequest,
) -> HarnessResult<CycleResult> {
    let start = Instant::now();
    let (command_res, get_res, list_res) = tokio::join!(
        timed(ctx.engine.run_command(session_id, command)),
        timed(ctx.engine.get_session(session_id)),
        timed(ctx.engine.list_sessions(SESSION_LIST_PAGE_SIZE)),
    );
    let (_, command_ms) = command_res?;
    let (_, get_ms) = get_res?;
    let (_, list_ms) = list_res?;

    Ok(CycleResult {
        latency_ms: ms_since(start),
        command_ms: Some(command_ms),
        get_ms: Some(get_ms),
        list_ms: Some(list_ms),
    })
}

// ============================================================
// Prompt-driven cycle
// ============================================================

/// Submit an async prompt, then poll the session's run state until the
/// submitted run is no longer reported active. Run ids are already
/// normalized by the client, so a plain equality check is sound here.
async fn prompt_cycle(
    ctx: &WorkerContext,
    session_id: &str,
    prompt: &PromptRequest,
) -> HarnessResult<CycleResult> {
    let start = Instant::now();
    let handle = ctx.engine.submit_prompt(session_id, prompt).await?;

    let budget_end = Instant::now() + RUN_POLL_BUDGET;
    loop {
        sleep(RUN_POLL_INTERVAL).await;
        if Instant::now() >= budget_end {
            return Err(HarnessError::PollBudgetExhausted(RUN_POLL_BUDGET.as_secs()));
        }
        match ctx.engine.active_run(session_id).await? {
            None => break,
            Some(active) if active.run_id != handle.run_id => break,
            Some(_) => {}
        }
    }

    Ok(CycleResult {
        latency_ms: ms_since(start),
        command_ms: None,
        get_ms: None,
        list_ms: None,
    })
}

async fn timed<F, T>(call: F) -> HarnessResult<(T, u64)>
where
    F: Future<Output = EngineResult<T>>,
{
    let start = Instant::now();
    let value = call.await?;
    Ok((value, ms_since(start)))
}

fn ms_since(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}
