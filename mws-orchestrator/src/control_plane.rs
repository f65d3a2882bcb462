//! Account API endpoints used by the lifecycle.
//!
//! [`ControlPlane`] is the seam between the state machine and the network: the
//! production implementation is [`AccountsApi`], tests plug in a scripted fake.

use async_trait::async_trait;

use crate::client::{ApiClient, ApiError};
use crate::network::Network;
use crate::workspace::{Cloud, Workspace, WorkspaceUpdate};

#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Host of the account console, used to derive workspace hostnames.
    fn host(&self) -> &str;

    /// Cloud the account console runs on.
    fn cloud(&self) -> Cloud;

    async fn create(&self, workspace: &Workspace) -> Result<Workspace, ApiError>;

    async fn read(&self, account_id: &str, workspace_id: u64) -> Result<Workspace, ApiError>;

    async fn list(&self, account_id: &str) -> Result<Vec<Workspace>, ApiError>;

    async fn update(
        &self,
        account_id: &str,
        workspace_id: u64,
        fields: &WorkspaceUpdate,
    ) -> Result<(), ApiError>;

    async fn delete(&self, account_id: &str, workspace_id: u64) -> Result<(), ApiError>;

    async fn list_network_diagnostics(
        &self,
        account_id: &str,
        network_id: &str,
    ) -> Result<Network, ApiError>;
}

/// [`ControlPlane`] backed by the account REST API.
#[derive(Debug, Clone)]
pub struct AccountsApi {
    client: ApiClient,
    cloud: Cloud,
}

impl AccountsApi {
    pub fn new(client: ApiClient, cloud: Cloud) -> Self {
        Self { client, cloud }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }
}

fn workspaces_path(account_id: &str) -> String {
    format!("/accounts/{account_id}/workspaces")
}

fn workspace_path(account_id: &str, workspace_id: u64) -> String {
    format!("/accounts/{account_id}/workspaces/{workspace_id}")
}

#[async_trait]
impl ControlPlane for AccountsApi {
    fn host(&self) -> &str {
        self.client.host()
    }

    fn cloud(&self) -> Cloud {
        self.cloud
    }

    async fn create(&self, workspace: &Workspace) -> Result<Workspace, ApiError> {
        self.client
            .post(&workspaces_path(&workspace.account_id), workspace)
            .await
    }

    async fn read(&self, account_id: &str, workspace_id: u64) -> Result<Workspace, ApiError> {
        self.client
            .get(&workspace_path(account_id, workspace_id))
            .await
    }

    async fn list(&self, account_id: &str) -> Result<Vec<Workspace>, ApiError> {
        self.client.get(&workspaces_path(account_id)).await
    }

    async fn update(
        &self,
        account_id: &str,
        workspace_id: u64,
        fields: &WorkspaceUpdate,
    ) -> Result<(), ApiError> {
        self.client
            .patch(&workspace_path(account_id, workspace_id), fields)
            .await
    }

    async fn delete(&self, account_id: &str, workspace_id: u64) -> Result<(), ApiError> {
        self.client
            .delete(&workspace_path(account_id, workspace_id))
            .await
    }

    async fn list_network_diagnostics(
        &self,
        account_id: &str,
        network_id: &str,
    ) -> Result<Network, ApiError> {
        self.client
            .get(&format!("/accounts/{account_id}/networks/{network_id}"))
            .await
    }
}
