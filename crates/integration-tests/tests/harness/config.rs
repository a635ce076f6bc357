//! Builder for test configurations
//!
//! Renders TOML and loads it through `Config::from_toml`, so tests also
//! exercise parsing and validation.

use std::fmt::Write as _;

use mosaic_config::Config;

/// Fluent builder for a Mosaic `Config`
pub struct ConfigBuilder {
    providers: Vec<String>,
    timeout: String,
    max_retries: u32,
    retry_backoff: String,
    health_timeout: String,
}

impl ConfigBuilder {
    /// Short timeouts and a near-zero backoff so retry tests stay fast
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
            timeout: "5s".to_owned(),
            max_retries: 2,
            retry_backoff: "1ms".to_owned(),
            health_timeout: "2s".to_owned(),
        }
    }

    pub fn with_openai_provider(mut self, name: &str, base_url: &str) -> Self {
        self.providers.push(format!(
            "[llm.providers.{name}]\ntype = \"openai\"\napi_key = \"test-key\"\nbase_url = \"{base_url}\"\n"
        ));
        self
    }

    pub fn with_openai_provider_keyed(mut self, name: &str, base_url: &str, api_key: &str) -> Self {
        self.providers.push(format!(
            "[llm.providers.{name}]\ntype = \"openai\"\napi_key = \"{api_key}\"\nbase_url = \"{base_url}\"\n"
        ));
        self
    }

    pub fn with_azure_provider(mut self, name: &str, base_url: &str, deployment: &str) -> Self {
        self.providers.push(format!(
            "[llm.providers.{name}]\ntype = \"azure_openai\"\napi_key = \"azure-key\"\nbase_url = \"{base_url}\"\ndeployment = \"{deployment}\"\napi_version = \"2024-10-21\"\n"
        ));
        self
    }

    pub fn with_timeout(mut self, timeout: &str) -> Self {
        timeout.clone_into(&mut self.timeout);
        self
    }

    pub const fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_health_timeout(mut self, timeout: &str) -> Self {
        timeout.clone_into(&mut self.health_timeout);
        self
    }

    /// Render the TOML document
    pub fn to_toml(&self) -> String {
        let mut raw = String::new();
        let _ = writeln!(
            raw,
            "[llm.defaults]\ntimeout = \"{}\"\nmax_retries = {}\nretry_backoff = \"{}\"\n",
            self.timeout, self.max_retries, self.retry_backoff
        );
        for provider in &self.providers {
            let _ = writeln!(raw, "{provider}");
        }
        let _ = writeln!(raw, "[health]\ntimeout = \"{}\"", self.health_timeout);
        raw
    }

    pub fn build(self) -> Config {
        Config::from_toml(&self.to_toml()).expect("test configuration should be valid")
    }
}
