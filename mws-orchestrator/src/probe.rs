//! Reachability check for freshly provisioned workspaces.
//!
//! DNS for a new deployment can lag behind the RUNNING status, so an
//! unreachable workspace is always a retry and never a failure.

use async_trait::async_trait;
use std::time::Duration;
use tracing::info;

use crate::client::ApiClient;
use crate::retry::Attempt;
use crate::workspace::Workspace;

/// Upper bound for one reachability request.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Cheap authenticated endpoint every workspace serves.
const PROBE_PATH: &str = "/token/list";

/// Decides whether a RUNNING workspace still needs a reachability check.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ProbePolicy {
    #[default]
    Verify,
    Skip,
    /// Skip deployments whose name contains the given marker.
    SkipMatching(String),
}

impl ProbePolicy {
    pub fn should_probe(&self, workspace: &Workspace) -> bool {
        match self {
            ProbePolicy::Verify => true,
            ProbePolicy::Skip => false,
            ProbePolicy::SkipMatching(marker) => !workspace.deployment_name.contains(marker),
        }
    }
}

#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    async fn probe(&self, workspace: &Workspace) -> Attempt<()>;
}

/// Probes `GET /api/2.0/token/list` on the workspace host with the account credentials.
#[derive(Debug, Clone)]
pub struct WorkspaceProber {
    client: ApiClient,
    timeout: Duration,
}

impl WorkspaceProber {
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl ReachabilityProbe for WorkspaceProber {
    async fn probe(&self, workspace: &Workspace) -> Attempt<()> {
        let client = self.client.for_host(&workspace.workspace_url);
        match client
            .get_with_timeout::<serde_json::Value>(PROBE_PATH, self.timeout)
            .await
        {
            Ok(_) => Attempt::Success(()),
            Err(e) => {
                let message = format!(
                    "workspace {} is not yet reachable: {}",
                    workspace.workspace_url, e
                );
                info!("{}", message);
                Attempt::Retry(message)
            }
        }
    }
}
