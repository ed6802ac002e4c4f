//! Wire types for the engine HTTP API.
//!
//! The engine serializes identifiers in camelCase and has drifted between
//! spellings over time (`runID`, `runId`, plain `id`). Every spelling is
//! accepted here and normalized into one snake_case field, so nothing past
//! this module ever needs to know about the aliases.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

/// Session create payload. Unset fields are omitted on the wire.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CreateSessionRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permission: Option<Vec<PermissionRule>>,
}

/// One permission rule attached at session creation.
#[derive(Debug, Clone, Serialize)]
pub struct PermissionRule {
    pub permission: String,
    pub pattern: String,
    pub action: String,
}

impl PermissionRule {
    /// Blanket allow rule for sessions driven by automated traffic.
    pub fn allow_all() -> Self {
        Self {
            permission: "*".to_string(),
            pattern: "*".to_string(),
            action: "allow".to_string(),
        }
    }
}

/// Session metadata as returned by the engine. Fields we do not consume
/// are ignored on deserialization.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineSession {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
}

/// Body for `POST /session/{id}/command`.
#[derive(Debug, Clone, Serialize)]
pub struct CommandRequest {
    pub command: String,
    pub args: Vec<String>,
}

/// Result of a command executed inside a session.
#[derive(Debug, Clone, Deserialize)]
pub struct CommandOutput {
    #[serde(default)]
    pub ok: bool,
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
}

/// Body for `POST /session/{id}/prompt_async`.
#[derive(Debug, Clone, Serialize)]
pub struct PromptRequest {
    pub parts: Vec<PromptPart>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PromptPart {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
}

impl PromptRequest {
    /// Single text-part prompt.
    pub fn text(prompt: impl Into<String>) -> Self {
        Self {
            parts: vec![PromptPart {
                kind: "text".to_string(),
                text: prompt.into(),
            }],
        }
    }
}

/// Accepted async prompt run (202 response).
#[derive(Debug, Clone, Deserialize)]
pub struct RunHandle {
    #[serde(alias = "runID", alias = "runId", alias = "id")]
    pub run_id: String,
    #[serde(default, alias = "attachEventStream")]
    pub attach_event_stream: Option<String>,
}

/// Run metadata from `GET /session/{id}/run`.
#[derive(Debug, Clone, Deserialize)]
pub struct ActiveRunInfo {
    #[serde(alias = "runID", alias = "runId", alias = "id")]
    pub run_id: String,
    #[serde(default, alias = "startedAtMs")]
    pub started_at_ms: Option<i64>,
}

/// Envelope around the active run; `active` is null when the session idles.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActiveRunEnvelope {
    #[serde(default)]
    pub active: Option<ActiveRunInfo>,
}

/// Provider settings from `GET /config/providers`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub providers: HashMap<String, ProviderSettings>,
    #[serde(default, rename = "default")]
    pub default_provider: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderSettings {
    #[serde(default, alias = "defaultModel")]
    pub default_model: Option<String>,
}

/// Provider catalog from `GET /provider`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderCatalog {
    #[serde(default)]
    pub all: Vec<ProviderEntry>,
    #[serde(default)]
    pub connected: Vec<String>,
    #[serde(default, rename = "default")]
    pub default_provider: Option<String>,
}

/// One catalog entry. Models are keyed by model id in a `BTreeMap` so that
/// "first model" is deterministic regardless of engine-side map ordering.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderEntry {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub models: BTreeMap<String, ProviderModel>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderModel {
    #[serde(default)]
    pub name: Option<String>,
}

/// Provider/model pair resolved for a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSpec {
    #[serde(rename = "providerID", alias = "providerId", alias = "provider_id")]
    pub provider_id: String,
    #[serde(rename = "modelID", alias = "modelId", alias = "model_id")]
    pub model_id: String,
}
