use std::time::Duration;

use anyhow::{Context, Result};
use stackops_reconcile::{BackoffPolicy, PoolMembership, WaitPolicy};

/// Behaviour knobs for the orchestration core.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Which instances count as members of a pool.
    pub membership: PoolMembership,

    /// Only reuse floating IPs that belong to the selected external network.
    pub match_external_network: bool,

    /// How long scale-up waits for each new instance.
    pub wait: WaitPolicy,

    pub log_level: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            membership: PoolMembership::default(),
            match_external_network: false,
            wait: WaitPolicy::default(),
            log_level: "info".to_string(),
        }
    }
}

impl OrchestratorConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let membership = match std::env::var("STACKOPS_POOL_MEMBERSHIP") {
            Ok(raw) => raw
                .parse::<PoolMembership>()
                .context("Invalid STACKOPS_POOL_MEMBERSHIP")?,
            Err(_) => defaults.membership,
        };

        let match_external_network = std::env::var("STACKOPS_FIP_MATCH_NETWORK")
            .map(|v| v == "1" || v.to_lowercase() == "true")
            .unwrap_or(defaults.match_external_network);

        let timeout = match std::env::var("STACKOPS_WAIT_TIMEOUT_SECS") {
            Ok(raw) => Duration::from_secs(
                raw.parse()
                    .with_context(|| format!("Invalid STACKOPS_WAIT_TIMEOUT_SECS '{raw}'"))?,
            ),
            Err(_) => defaults.wait.timeout,
        };

        let base = match std::env::var("STACKOPS_WAIT_BACKOFF_MS") {
            Ok(raw) => Duration::from_millis(
                raw.parse()
                    .with_context(|| format!("Invalid STACKOPS_WAIT_BACKOFF_MS '{raw}'"))?,
            ),
            Err(_) => defaults.wait.backoff.base,
        };

        let log_level =
            std::env::var("STACKOPS_LOG_LEVEL").unwrap_or_else(|_| defaults.log_level.clone());

        Ok(Self {
            membership,
            match_external_network,
            wait: WaitPolicy {
                timeout,
                backoff: BackoffPolicy {
                    base,
                    ..defaults.wait.backoff
                },
            },
            log_level,
        })
    }
}
