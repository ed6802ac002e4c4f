//! Typed async client for the engine HTTP API.
//!
//! Covers the slice of the engine surface the console consumes: session
//! lifecycle, in-session commands, async prompt runs and the provider
//! catalog/config endpoints. The [`EngineApi`] trait is the seam used to
//! fake the engine in tests.

pub mod client;
pub mod error;
pub mod types;

pub use client::{EngineApi, EngineClient};
pub use error::{EngineError, EngineResult};
pub use types::{
    ActiveRunEnvelope, ActiveRunInfo, CommandOutput, CommandRequest, CreateSessionRequest,
    EngineSession, ModelSpec, PermissionRule, PromptPart, PromptRequest, ProviderCatalog,
    ProviderEntry, ProviderModel, ProviderSettings, ProvidersConfig, RunHandle,
};
