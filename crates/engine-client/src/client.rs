//! Engine API client over reqwest.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use crate::error::{EngineError, EngineResult};
use crate::types::{
    ActiveRunEnvelope, ActiveRunInfo, CommandOutput, CommandRequest, CreateSessionRequest,
    EngineSession, PromptRequest, ProviderCatalog, ProvidersConfig, RunHandle,
};

// Per-call ceilings. Writes get more headroom than reads; run polls are
// kept short so a stalled engine surfaces quickly in cycle errors.
const WRITE_TIMEOUT: Duration = Duration::from_secs(30);
const READ_TIMEOUT: Duration = Duration::from_secs(20);
const POLL_TIMEOUT: Duration = Duration::from_secs(15);

/// Trait over the engine operations the control surface consumes.
#[async_trait]
pub trait EngineApi: Send + Sync {
    /// Create a session.
    async fn create_session(&self, req: &CreateSessionRequest) -> EngineResult<EngineSession>;

    /// Fetch one session's metadata.
    async fn get_session(&self, session_id: &str) -> EngineResult<EngineSession>;

    /// List sessions, newest first, capped at `page_size`.
    async fn list_sessions(&self, page_size: u32) -> EngineResult<Vec<EngineSession>>;

    /// Execute a command inside a session's workspace.
    async fn run_command(&self, session_id: &str, req: &CommandRequest)
        -> EngineResult<CommandOutput>;

    /// Submit a prompt without waiting for completion; returns the run handle.
    async fn submit_prompt(&self, session_id: &str, req: &PromptRequest) -> EngineResult<RunHandle>;

    /// Report the session's active run, if any.
    async fn active_run(&self, session_id: &str) -> EngineResult<Option<ActiveRunInfo>>;

    /// Read configured providers and the configured default.
    async fn provider_config(&self) -> EngineResult<ProvidersConfig>;

    /// Read the provider catalog with connection state.
    async fn provider_catalog(&self) -> EngineResult<ProviderCatalog>;
}

/// Reqwest-backed [`EngineApi`] implementation.
///
/// Holds the shared connection pool, the engine base URL and an optional
/// bearer token that is attached to every request.
#[derive(Clone)]
pub struct EngineClient {
    http: Client,
    base_url: String,
    token: Option<String>,
}

impl EngineClient {
    pub fn new(http: Client, base_url: impl Into<String>, token: Option<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http,
            base_url,
            token,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}

#[async_trait]
impl EngineApi for EngineClient {
    #[instrument(skip(self, req))]
    async fn create_session(&self, req: &CreateSessionRequest) -> EngineResult<EngineSession> {
        let response = self
            .authed(self.http.post(self.url("/session")))
            .timeout(WRITE_TIMEOUT)
            .json(req)
            .send()
            .await?;
        let session: EngineSession = read_json(response).await?;
        debug!(session_id = %session.id, "created session");
        Ok(session)
    }

    async fn get_session(&self, session_id: &str) -> EngineResult<EngineSession> {
        let response = self
            .authed(self.http.get(self.url(&format!("/session/{session_id}"))))
            .timeout(READ_TIMEOUT)
            .send()
            .await?;
        read_json(response).await
    }

    async fn list_sessions(&self, page_size: u32) -> EngineResult<Vec<EngineSession>> {
        let response = self
            .authed(self.http.get(self.url("/session")))
            .timeout(READ_TIMEOUT)
            .query(&[("page_size", page_size)])
            .send()
            .await?;
        read_json(response).await
    }

    async fn run_command(
        &self,
        session_id: &str,
        req: &CommandRequest,
    ) -> EngineResult<CommandOutput> {
        let response = self
            .authed(
                self.http
                    .post(self.url(&format!("/session/{session_id}/command"))),
            )
            .timeout(WRITE_TIMEOUT)
            .json(req)
            .send()
            .await?;
        read_json(response).await
    }

    #[instrument(skip(self, req))]
    async fn submit_prompt(
        &self,
        session_id: &str,
        req: &PromptRequest,
    ) -> EngineResult<RunHandle> {
        let response = self
            .authed(
                self.http
                    .post(self.url(&format!("/session/{session_id}/prompt_async"))),
            )
            .timeout(WRITE_TIMEOUT)
            .query(&[("return", "run")])
            .json(req)
            .send()
            .await?;
        let handle: RunHandle = read_json(response).await?;
        debug!(run_id = %handle.run_id, "prompt run accepted");
        Ok(handle)
    }

    async fn active_run(&self, session_id: &str) -> EngineResult<Option<ActiveRunInfo>> {
        let response = self
            .authed(
                self.http
                    .get(self.url(&format!("/session/{session_id}/run"))),
            )
            .timeout(POLL_TIMEOUT)
            .send()
            .await?;
        let envelope: ActiveRunEnvelope = read_json(response).await?;
        Ok(envelope.active)
    }

    async fn provider_config(&self) -> EngineResult<ProvidersConfig> {
        let response = self
            .authed(self.http.get(self.url("/config/providers")))
            .timeout(READ_TIMEOUT)
            .send()
            .await?;
        read_json(response).await
    }

    async fn provider_catalog(&self) -> EngineResult<ProviderCatalog> {
        let response = self
            .authed(self.http.get(self.url("/provider")))
            .timeout(READ_TIMEOUT)
            .send()
            .await?;
        read_json(response).await
    }
}

async fn read_json<T: DeserializeOwned>(response: Response) -> EngineResult<T> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(EngineError::Api {
            status: status.as_u16(),
            message: api_message(&body),
        });
    }
    Ok(serde_json::from_str(&body)?)
}

/// Pull the message out of the engine's `{"error": ..., "code": ...}`
/// envelope, falling back to the raw body.
fn api_message(body: &str) -> String {
    #[derive(serde::Deserialize)]
    struct ErrorBody {
        error: String,
    }
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => parsed.error,
        Err(_) if body.trim().is_empty() => "empty response body".to_string(),
        Err(_) => body.trim().to_string(),
    }
}
