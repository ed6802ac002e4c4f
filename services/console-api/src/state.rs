//! Application state and shared resources.

use std::time::Duration;

use anyhow::Result;

/// Shared application state.
pub struct AppState {
    /// Pooled HTTP client reused by every engine call.
    pub http: reqwest::Client,
    /// Engine base URL, no trailing slash.
    pub engine_url: String,
    /// Token required on inbound requests; `None` leaves the surface
    /// open for local development.
    pub api_token: Option<String>,
}

impl AppState {
    pub fn new(engine_url: &str, api_token: Option<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(64)
            .build()?;

        Ok(Self {
            http,
            engine_url: engine_url.trim_end_matches('/').to_string(),
            api_token: api_token.filter(|token| !token.is_empty()),
        })
    }
}
