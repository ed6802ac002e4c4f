//! Concurrent load-generation harness for the engine control surface.
//!
//! A run is one duration-bounded test triggered by one client request:
//! the request is validated into a [`scenario::LoadTestPlan`], a model is
//! resolved fail-fast, then a pool of workers drives cycles against the
//! engine while telemetry streams back over a channel until the final
//! percentile summary.

pub mod error;
pub mod events;
pub mod model;
pub mod publisher;
pub mod report;
pub mod runner;
pub mod scenario;
pub mod stats;
pub mod worker;

pub use error::{HarnessError, HarnessResult};
pub use events::{LogLevel, TelemetryEvent};
pub use model::resolve_model;
pub use publisher::TelemetryPublisher;
pub use runner::{execute, RunState};
pub use scenario::{resolve, LoadTestPlan, LoadTestRequest, Profile, Scenario};
pub use stats::LatencyStats;
pub use worker::CycleResult;
