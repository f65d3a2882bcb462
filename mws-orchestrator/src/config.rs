use serde::Deserialize;
use std::time::Duration;

use crate::client::ClientConfig;
use crate::error::{ProvisionError, Result};
use crate::probe::ProbePolicy;
use crate::retry::PollPolicy;
use crate::workspace::Cloud;

#[derive(Debug, Clone, Deserialize)]
pub struct ProvisionerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_token")]
    pub token: Option<String>,

    #[serde(default = "default_account_id")]
    pub account_id: Option<String>,

    #[serde(default = "default_cloud")]
    pub cloud: String,

    #[serde(default = "default_api_version")]
    pub api_version: String,

    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    #[serde(default = "default_max_poll_interval")]
    pub max_poll_interval_secs: Option<u64>,

    #[serde(default = "default_provision_timeout")]
    pub provision_timeout_secs: u64,

    #[serde(default = "default_delete_timeout")]
    pub delete_timeout_secs: u64,

    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,

    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,

    #[serde(default = "default_skip_probe")]
    pub skip_probe: bool,
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn default_host() -> String {
    std::env::var("MWS_HOST").unwrap_or_else(|_| "https://accounts.cloud.databricks.com".to_string())
}

fn default_token() -> Option<String> {
    std::env::var("MWS_TOKEN").ok().filter(|t| !t.is_empty())
}

fn default_account_id() -> Option<String> {
    std::env::var("MWS_ACCOUNT_ID").ok().filter(|a| !a.is_empty())
}

fn default_cloud() -> String {
    std::env::var("MWS_CLOUD").unwrap_or_else(|_| "aws".to_string())
}

fn default_api_version() -> String {
    std::env::var("MWS_API_VERSION").unwrap_or_else(|_| "2.0".to_string())
}

fn default_poll_interval() -> u64 {
    env_u64("MWS_POLL_INTERVAL_SECS", 10)
}

fn default_max_poll_interval() -> Option<u64> {
    std::env::var("MWS_MAX_POLL_INTERVAL_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
}

fn default_provision_timeout() -> u64 {
    env_u64("MWS_PROVISION_TIMEOUT_SECS", 20 * 60)
}

fn default_delete_timeout() -> u64 {
    env_u64("MWS_DELETE_TIMEOUT_SECS", 15 * 60)
}

fn default_probe_timeout() -> u64 {
    env_u64("MWS_PROBE_TIMEOUT_SECS", 10)
}

fn default_http_timeout() -> u64 {
    env_u64("MWS_HTTP_TIMEOUT_SECS", 60)
}

fn default_skip_probe() -> bool {
    std::env::var("MWS_SKIP_PROBE")
        .map(|v| matches!(v.as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

impl Default for ProvisionerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            token: default_token(),
            account_id: default_account_id(),
            cloud: default_cloud(),
            api_version: default_api_version(),
            poll_interval_secs: default_poll_interval(),
            max_poll_interval_secs: default_max_poll_interval(),
            provision_timeout_secs: default_provision_timeout(),
            delete_timeout_secs: default_delete_timeout(),
            probe_timeout_secs: default_probe_timeout(),
            http_timeout_secs: default_http_timeout(),
            skip_probe: default_skip_probe(),
        }
    }
}

impl ProvisionerConfig {
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Reject settings the poll loop cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_secs == 0 {
            return Err(ProvisionError::Config(
                "poll_interval_secs must be at least 1".to_string(),
            ));
        }
        if matches!(self.max_poll_interval_secs, Some(max) if max < self.poll_interval_secs) {
            return Err(ProvisionError::Config(
                "max_poll_interval_secs must not be below poll_interval_secs".to_string(),
            ));
        }
        Ok(())
    }

    pub fn cloud(&self) -> Result<Cloud> {
        self.cloud.parse()
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            host: self.host.clone(),
            token: self.token.clone(),
            api_version: self.api_version.clone(),
            timeout: Duration::from_secs(self.http_timeout_secs),
        }
    }

    pub fn poll_policy(&self) -> PollPolicy {
        let policy = PollPolicy::fixed(
            Duration::from_secs(self.poll_interval_secs),
            self.provision_timeout(),
        );
        match self.max_poll_interval_secs {
            Some(max) => policy.with_backoff(Duration::from_secs(max)),
            None => policy,
        }
    }

    pub fn provision_timeout(&self) -> Duration {
        Duration::from_secs(self.provision_timeout_secs)
    }

    pub fn delete_timeout(&self) -> Duration {
        Duration::from_secs(self.delete_timeout_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn probe_policy(&self) -> ProbePolicy {
        if self.skip_probe {
            ProbePolicy::Skip
        } else {
            ProbePolicy::Verify
        }
    }
}
