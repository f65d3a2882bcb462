//! Workspace provisioning state machine.
//!
//! create → wait for RUNNING → verify reachability, deleting the workspace again
//! when any of that fails. Updates and reads re-enter the same wait loop, and
//! deletion polls until the control plane reports the workspace missing.

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument};

use crate::client::{ApiClient, ApiError};
use crate::config::ProvisionerConfig;
use crate::control_plane::{AccountsApi, ControlPlane};
use crate::error::{ProvisionError, Result};
use crate::explain::explain_failure;
use crate::hostname;
use crate::probe::{ProbePolicy, ReachabilityProbe, WorkspaceProber};
use crate::retry::{poll_until, Attempt, PollPolicy};
use crate::workspace::{Cloud, Workspace, WorkspaceStatus, WorkspaceUpdate};

/// How long to wait for a workspace to be provisioned and its DNS entry to resolve.
pub const DEFAULT_PROVISION_TIMEOUT: Duration = Duration::from_secs(20 * 60);

/// How long to wait for the asynchronous teardown after a delete call.
pub const DEFAULT_DELETE_TIMEOUT: Duration = Duration::from_secs(15 * 60);

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Drives one workspace at a time through its lifecycle.
///
/// Cloning is cheap; clones share the control plane, the prober and the
/// cancellation token.
#[derive(Clone)]
pub struct WorkspaceOrchestrator {
    control_plane: Arc<dyn ControlPlane>,
    prober: Arc<dyn ReachabilityProbe>,
    probe_policy: ProbePolicy,
    poll: PollPolicy,
    delete_timeout: Duration,
    cancel: CancellationToken,
}

impl WorkspaceOrchestrator {
    pub fn new(control_plane: Arc<dyn ControlPlane>, prober: Arc<dyn ReachabilityProbe>) -> Self {
        Self {
            control_plane,
            prober,
            probe_policy: ProbePolicy::default(),
            poll: PollPolicy::fixed(DEFAULT_POLL_INTERVAL, DEFAULT_PROVISION_TIMEOUT),
            delete_timeout: DEFAULT_DELETE_TIMEOUT,
            cancel: CancellationToken::new(),
        }
    }

    /// Wire the HTTP control plane and prober from configuration.
    pub fn from_config(config: &ProvisionerConfig) -> Result<Self> {
        config.validate()?;
        let cloud = config.cloud()?;
        let client = ApiClient::new(config.client_config())?;
        let prober = WorkspaceProber::new(client.clone()).with_timeout(config.probe_timeout());
        let control_plane = AccountsApi::new(client, cloud);

        Ok(Self::new(Arc::new(control_plane), Arc::new(prober))
            .with_probe_policy(config.probe_policy())
            .with_poll_policy(config.poll_policy())
            .with_delete_timeout(config.delete_timeout()))
    }

    pub fn with_probe_policy(mut self, policy: ProbePolicy) -> Self {
        self.probe_policy = policy;
        self
    }

    pub fn with_poll_policy(mut self, policy: PollPolicy) -> Self {
        self.poll = policy;
        self
    }

    pub fn with_delete_timeout(mut self, timeout: Duration) -> Self {
        self.delete_timeout = timeout;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that aborts any running poll loop of this orchestrator.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Default provisioning timeout from the poll policy.
    pub fn provision_timeout(&self) -> Duration {
        self.poll.timeout
    }

    /// Create a workspace and wait until it is running and reachable.
    ///
    /// On success `ws` carries the assigned id, the RUNNING status and a
    /// non-empty URL. If the wait fails the workspace is deleted again.
    #[instrument(skip_all, fields(account_id = %ws.account_id, deployment = %ws.deployment_name))]
    pub async fn create(&self, ws: &mut Workspace, timeout: Duration) -> Result<()> {
        let cloud = self.control_plane.cloud();
        ws.migrate_customer_managed_key();
        ws.validate_for(cloud)?;
        if cloud == Cloud::Gcp {
            ws.cloud = Some(Cloud::Gcp);
        }

        let created = self.control_plane.create(ws).await?;
        merge_created(ws, created);
        let workspace_id = ws.workspace_id.ok_or_else(|| {
            ProvisionError::Api(ApiError::Decode(
                "create response carries no workspace_id".to_string(),
            ))
        })?;
        info!(workspace_id, "Workspace create accepted");

        match self.wait_for_running(ws, timeout).await {
            Ok(running) => {
                ws.workspace_url = running.workspace_url;
                ws.workspace_status = running.workspace_status;
                ws.workspace_status_message = running.workspace_status_message;
                Ok(())
            }
            Err(err) => {
                error!("Deleting failed workspace: {}", err);
                match self.compensate(&ws.account_id, workspace_id).await {
                    Ok(()) => Err(err),
                    Err(cleanup) => Err(ProvisionError::Compensation {
                        original: Box::new(err),
                        cleanup: Box::new(cleanup),
                    }),
                }
            }
        }
    }

    /// Remove a workspace whose provisioning failed.
    ///
    /// Once cancelled only the delete call is issued; the teardown is not awaited.
    async fn compensate(&self, account_id: &str, workspace_id: u64) -> Result<()> {
        if self.cancel.is_cancelled() {
            self.control_plane.delete(account_id, workspace_id).await?;
            info!(workspace_id, "Delete issued, not waiting after cancellation");
            return Ok(());
        }
        self.delete(account_id, workspace_id).await
    }

    /// Poll until the workspace is RUNNING and reachable, or explain why it failed.
    #[instrument(skip_all, fields(account_id = %ws.account_id, workspace_id = ?ws.workspace_id))]
    pub async fn wait_for_running(&self, ws: &Workspace, timeout: Duration) -> Result<Workspace> {
        let workspace_id = ws.id()?;
        let account_id = ws.account_id.as_str();
        let probe = self.probe_policy.should_probe(ws);

        poll_until(
            "provisioning",
            self.poll.with_timeout(timeout),
            &self.cancel,
            || async move {
                let current = match self.read(account_id, workspace_id).await {
                    Ok(current) => current,
                    Err(e) => return Attempt::Fatal(e),
                };
                self.classify(current, probe).await
            },
        )
        .await
    }

    async fn classify(&self, current: Workspace, probe: bool) -> Attempt<Workspace> {
        match current.workspace_status {
            WorkspaceStatus::Running => {
                info!("Workspace is now running");
                if !probe {
                    return Attempt::Success(current);
                }
                match self.prober.probe(&current).await {
                    Attempt::Success(()) => Attempt::Success(current),
                    Attempt::Retry(message) => Attempt::Retry(message),
                    Attempt::Fatal(e) => Attempt::Fatal(e),
                }
            }
            ref status if status.is_failure() => {
                error!(
                    "Cannot start workspace: {}",
                    current.workspace_status_message
                );
                Attempt::Fatal(explain_failure(self.control_plane.as_ref(), &current).await)
            }
            _ => {
                info!(
                    "Workspace {} is {}: {}",
                    current.display_name(),
                    current.workspace_status,
                    current.workspace_status_message
                );
                Attempt::Retry(current.workspace_status_message)
            }
        }
    }

    /// Apply the mutable subset of fields to a workspace and wait for it to settle.
    #[instrument(skip_all, fields(account_id = %ws.account_id, workspace_id = ?ws.workspace_id))]
    pub async fn update_running(&self, ws: &Workspace, timeout: Duration) -> Result<Workspace> {
        let workspace_id = ws.id()?;
        let mut ws = ws.clone();
        ws.migrate_customer_managed_key();

        let fields = WorkspaceUpdate::from(&ws);
        self.control_plane
            .update(&ws.account_id, workspace_id, &fields)
            .await?;
        info!(workspace_id, "Workspace update accepted");

        self.wait_for_running(&ws, timeout).await
    }

    /// Read a workspace, synthesizing its URL when the API leaves it out.
    pub async fn read(&self, account_id: &str, workspace_id: u64) -> Result<Workspace> {
        let mut ws = self.control_plane.read(account_id, workspace_id).await?;
        self.ensure_url(&mut ws);
        Ok(ws)
    }

    /// Read a workspace and wait for it to be running, as a state refresh does.
    pub async fn refresh(
        &self,
        account_id: &str,
        workspace_id: u64,
        timeout: Duration,
    ) -> Result<Workspace> {
        let mut ws = self.read(account_id, workspace_id).await?;
        // Not part of the GET payload; the API defaults it to true.
        ws.is_no_public_ip_enabled = true;
        let mut running = self.wait_for_running(&ws, timeout).await?;
        running.is_no_public_ip_enabled = true;
        Ok(running)
    }

    pub async fn list(&self, account_id: &str) -> Result<Vec<Workspace>> {
        let mut workspaces = self.control_plane.list(account_id).await?;
        for ws in &mut workspaces {
            self.ensure_url(ws);
        }
        Ok(workspaces)
    }

    /// Delete a workspace and wait until the control plane no longer knows it.
    #[instrument(skip(self))]
    pub async fn delete(&self, account_id: &str, workspace_id: u64) -> Result<()> {
        self.control_plane.delete(account_id, workspace_id).await?;

        poll_until(
            "deletion",
            self.poll.with_timeout(self.delete_timeout),
            &self.cancel,
            || async move {
                match self.read(account_id, workspace_id).await {
                    Err(e) if e.is_missing() => {
                        info!("Workspace {}/{} is removed.", account_id, workspace_id);
                        Attempt::Success(())
                    }
                    Err(e) => Attempt::Fatal(e),
                    Ok(ws) => {
                        let message = format!(
                            "Workspace {} is not removed yet. Workspace status: {} {}",
                            ws.display_name(),
                            ws.workspace_status,
                            ws.workspace_status_message
                        );
                        info!("{}", message);
                        Attempt::Retry(message)
                    }
                }
            },
        )
        .await
    }

    fn ensure_url(&self, ws: &mut Workspace) {
        if ws.workspace_url.is_empty() {
            ws.workspace_url = hostname::workspace_url(self.control_plane.host(), &ws.deployment_name);
        }
    }
}

/// Fold the create response into the caller's workspace.
fn merge_created(ws: &mut Workspace, created: Workspace) {
    ws.workspace_id = created.workspace_id;
    ws.workspace_status = created.workspace_status;
    ws.workspace_status_message = created.workspace_status_message;
    ws.creation_time = created.creation_time;
    if !created.workspace_url.is_empty() {
        ws.workspace_url = created.workspace_url;
    }
    // Most accounts prefix the deployment name and the API returns the full one.
    if !created.deployment_name.is_empty() {
        ws.deployment_name = created.deployment_name;
    }
}
