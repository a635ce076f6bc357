use std::time::Duration;

use serde::Deserialize;

/// Backend reachability check configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HealthConfig {
    /// Upper bound for a single health check round-trip
    #[serde(default = "default_timeout", deserialize_with = "crate::duration::deserialize")]
    pub timeout: Duration,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
        }
    }
}

const fn default_timeout() -> Duration {
    Duration::from_secs(5)
}
