//! Control-plane endpoint configuration.

use std::time::Duration;

use anyhow::{Context, Result};

/// Endpoints and credentials for the REST client.
#[derive(Debug, Clone)]
pub struct CloudConfig {
    /// Compute (Nova) endpoint, e.g. `http://controller:8774/v2.1`.
    pub compute_url: String,

    /// Network (Neutron) endpoint, e.g. `http://controller:9696`.
    pub network_url: String,

    /// Pre-issued identity token sent as `X-Auth-Token`.
    pub token: Option<String>,

    /// Per-request timeout.
    pub request_timeout: Duration,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            compute_url: "http://127.0.0.1:8774/v2.1".to_string(),
            network_url: "http://127.0.0.1:9696".to_string(),
            token: None,
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl CloudConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::default().with_env_overrides()
    }

    /// Replace fields whose environment variable is set.
    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Ok(url) = std::env::var("STACKOPS_COMPUTE_URL") {
            self.compute_url = url;
        }

        if let Ok(url) = std::env::var("STACKOPS_NETWORK_URL") {
            self.network_url = url;
        }

        if let Some(token) = std::env::var("STACKOPS_TOKEN").ok().filter(|t| !t.is_empty()) {
            self.token = Some(token);
        }

        if let Ok(raw) = std::env::var("STACKOPS_REQUEST_TIMEOUT_SECS") {
            self.request_timeout = Duration::from_secs(
                raw.parse()
                    .with_context(|| format!("Invalid STACKOPS_REQUEST_TIMEOUT_SECS '{raw}'"))?,
            );
        }

        Ok(self)
    }
}
