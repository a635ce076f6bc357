//! Logging setup for Mosaic
//!
//! Installs a `tracing-subscriber` registry with an `EnvFilter` and a
//! text or JSON formatting layer. Library crates only emit events; the
//! embedding application calls [`init`] once at startup.

use mosaic_config::{LogFormat, TelemetryConfig};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the global subscriber
///
/// `RUST_LOG` takes precedence over the configured filter, which in turn
/// takes precedence over `default_filter`. An unparseable directive falls
/// back to `info`.
///
/// # Errors
///
/// Returns an error if a global subscriber has already been installed
pub fn init(config: Option<&TelemetryConfig>, default_filter: &str) -> anyhow::Result<()> {
    let directive = config.map_or(default_filter, |c| c.filter.as_str());
    let filter = resolve_filter(std::env::var("RUST_LOG").ok().as_deref(), directive);
    let format = config.map(|c| c.format).unwrap_or_default();

    let registry = tracing_subscriber::registry().with(filter);

    let installed = match format {
        LogFormat::Text => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .try_init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
            .try_init(),
    };

    installed.map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))
}

/// Pick the effective filter directive
fn resolve_filter(env_directive: Option<&str>, configured: &str) -> EnvFilter {
    env_directive
        .and_then(|d| EnvFilter::try_new(d).ok())
        .or_else(|| EnvFilter::try_new(configured).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_directive_wins_over_config() {
        let filter = resolve_filter(Some("mosaic_llm=trace"), "warn");
        assert_eq!(filter.to_string(), "mosaic_llm=trace");
    }

    #[test]
    fn configured_directive_used_without_env() {
        let filter = resolve_filter(None, "debug");
        assert_eq!(filter.to_string(), "debug");
    }

    #[test]
    fn invalid_directives_fall_back_to_info() {
        let filter = resolve_filter(Some("mosaic=verbose"), "mosaic=loud");
        assert_eq!(filter.to_string(), "info");
    }

    #[test]
    fn second_init_reports_error() {
        let config = TelemetryConfig::default();
        init(Some(&config), "info").unwrap();
        assert!(init(Some(&config), "info").is_err());
    }
}
