#![allow(clippy::must_use_candidate)]

mod duration;
mod env;
pub mod health;
pub mod llm;
mod loader;
pub mod telemetry;

use serde::Deserialize;

pub use health::*;
pub use llm::*;
pub use telemetry::*;

/// Top-level Mosaic configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Generation backends and request defaults
    #[serde(default)]
    pub llm: LlmConfig,
    /// Backend reachability checks
    #[serde(default)]
    pub health: HealthConfig,
    /// Logging setup
    #[serde(default)]
    pub telemetry: Option<TelemetryConfig>,
}
