//! In-memory control plane and prober for tests.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use crate::client::ApiError;
use crate::control_plane::ControlPlane;
use crate::network::Network;
use crate::probe::ReachabilityProbe;
use crate::retry::Attempt;
use crate::workspace::{Cloud, Workspace, WorkspaceStatus, WorkspaceUpdate};

/// One scripted answer to a workspace read.
#[derive(Debug, Clone)]
pub enum ReadStep {
    Status(WorkspaceStatus, String),
    Missing,
    Error(ApiError),
}

pub fn missing_error() -> ApiError {
    ApiError::Response {
        status: 404,
        error_code: "RESOURCE_DOES_NOT_EXIST".to_string(),
        message: "Workspace does not exist".to_string(),
    }
}

#[derive(Default)]
struct Script {
    next_id: u64,
    current: Option<Workspace>,
    reads: VecDeque<ReadStep>,
    last_read: Option<ReadStep>,
    networks: HashMap<String, Result<Network, ApiError>>,
    create_error: Option<ApiError>,
    delete_error: Option<ApiError>,
    update_error: Option<ApiError>,
    created: Vec<Workspace>,
    updates: Vec<WorkspaceUpdate>,
    read_count: u32,
    delete_count: u32,
    network_reads: u32,
}

/// [`ControlPlane`] that answers reads from a script.
///
/// Once the script runs out the last step repeats forever.
pub struct ScriptedControlPlane {
    host: String,
    cloud: Cloud,
    script: Mutex<Script>,
}

impl ScriptedControlPlane {
    pub fn new(host: &str) -> Self {
        Self {
            host: host.to_string(),
            cloud: Cloud::Aws,
            script: Mutex::new(Script {
                next_id: 1000,
                ..Default::default()
            }),
        }
    }

    pub fn with_cloud(mut self, cloud: Cloud) -> Self {
        self.cloud = cloud;
        self
    }

    /// Seed an already existing workspace.
    pub fn with_workspace(self, ws: Workspace) -> Self {
        self.lock().current = Some(ws);
        self
    }

    pub fn then(self, step: ReadStep) -> Self {
        self.lock().reads.push_back(step);
        self
    }

    pub fn then_status(self, status: WorkspaceStatus, message: &str) -> Self {
        self.then(ReadStep::Status(status, message.to_string()))
    }

    pub fn with_network(self, network: Network) -> Self {
        self.lock()
            .networks
            .insert(network.network_id.clone(), Ok(network));
        self
    }

    pub fn with_network_error(self, network_id: &str, err: ApiError) -> Self {
        self.lock()
            .networks
            .insert(network_id.to_string(), Err(err));
        self
    }

    pub fn fail_create(self, err: ApiError) -> Self {
        self.lock().create_error = Some(err);
        self
    }

    pub fn fail_delete(self, err: ApiError) -> Self {
        self.lock().delete_error = Some(err);
        self
    }

    pub fn fail_update(self, err: ApiError) -> Self {
        self.lock().update_error = Some(err);
        self
    }

    pub fn reads(&self) -> u32 {
        self.lock().read_count
    }

    pub fn deletes(&self) -> u32 {
        self.lock().delete_count
    }

    pub fn network_reads(&self) -> u32 {
        self.lock().network_reads
    }

    /// Bodies received by create calls.
    pub fn created(&self) -> Vec<Workspace> {
        self.lock().created.clone()
    }

    /// Bodies received by update calls.
    pub fn updates(&self) -> Vec<WorkspaceUpdate> {
        self.lock().updates.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().expect("script lock poisoned")
    }
}

#[async_trait]
impl ControlPlane for ScriptedControlPlane {
    fn host(&self) -> &str {
        &self.host
    }

    fn cloud(&self) -> Cloud {
        self.cloud
    }

    async fn create(&self, workspace: &Workspace) -> Result<Workspace, ApiError> {
        let mut script = self.lock();
        script.created.push(workspace.clone());
        if let Some(err) = script.create_error.clone() {
            return Err(err);
        }
        let mut created = workspace.clone();
        created.workspace_id = Some(script.next_id);
        created.workspace_status = WorkspaceStatus::Provisioning;
        created.workspace_status_message = "Workspace resources are being set up.".to_string();
        script.next_id += 1;
        script.current = Some(created.clone());
        Ok(created)
    }

    async fn read(&self, account_id: &str, workspace_id: u64) -> Result<Workspace, ApiError> {
        let mut script = self.lock();
        script.read_count += 1;
        let step = match script.reads.pop_front() {
            Some(step) => {
                script.last_read = Some(step.clone());
                step
            }
            None => script.last_read.clone().unwrap_or(ReadStep::Missing),
        };

        match step {
            ReadStep::Missing => Err(missing_error()),
            ReadStep::Error(err) => Err(err),
            ReadStep::Status(status, message) => {
                let mut ws = script.current.clone().unwrap_or_default();
                ws.account_id = account_id.to_string();
                ws.workspace_id = Some(workspace_id);
                ws.workspace_status = status;
                ws.workspace_status_message = message;
                // The GET payload never carries it; serde defaults it to true.
                ws.is_no_public_ip_enabled = true;
                Ok(ws)
            }
        }
    }

    async fn list(&self, _account_id: &str) -> Result<Vec<Workspace>, ApiError> {
        Ok(self.lock().current.clone().into_iter().collect())
    }

    async fn update(
        &self,
        _account_id: &str,
        _workspace_id: u64,
        fields: &WorkspaceUpdate,
    ) -> Result<(), ApiError> {
        let mut script = self.lock();
        script.updates.push(fields.clone());
        match script.update_error.clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn delete(&self, _account_id: &str, _workspace_id: u64) -> Result<(), ApiError> {
        let mut script = self.lock();
        script.delete_count += 1;
        match script.delete_error.clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn list_network_diagnostics(
        &self,
        _account_id: &str,
        network_id: &str,
    ) -> Result<Network, ApiError> {
        let mut script = self.lock();
        script.network_reads += 1;
        script
            .networks
            .get(network_id)
            .cloned()
            .unwrap_or_else(|| Err(missing_error()))
    }
}

/// Prober that reports unreachable for the first `unreachable` calls.
#[derive(Default)]
pub struct StaticProbe {
    unreachable: u32,
    calls: AtomicU32,
}

impl StaticProbe {
    pub fn reachable() -> Self {
        Self::default()
    }

    pub fn unreachable_times(unreachable: u32) -> Self {
        Self {
            unreachable,
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReachabilityProbe for StaticProbe {
    async fn probe(&self, workspace: &Workspace) -> Attempt<()> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.unreachable {
            Attempt::Retry(format!(
                "workspace {} is not yet reachable: dns lookup failed",
                workspace.workspace_url
            ))
        } else {
            Attempt::Success(())
        }
    }
}

/// AWS workspace with every field a create call requires.
pub fn aws_workspace(account_id: &str, deployment_name: &str) -> Workspace {
    let mut ws = Workspace::new(account_id, deployment_name);
    ws.workspace_name = format!("{deployment_name}-workspace");
    ws.aws_region = "us-east-1".to_string();
    ws.credentials_id = "creds-1".to_string();
    ws.storage_configuration_id = "storage-1".to_string();
    ws
}
