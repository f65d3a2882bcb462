//! Managed workspace provisioning
//!
//! This crate drives workspaces of a cloud account through their lifecycle:
//! it creates them through the account API, waits for provisioning to finish,
//! checks that the new endpoint answers and removes half-created workspaces
//! again when anything goes wrong. It is consumed by the `mws` CLI but has no
//! dependency on it.

pub mod client;
pub mod config;
pub mod control_plane;
pub mod error;
pub mod explain;
pub mod hostname;
pub mod lifecycle;
pub mod network;
pub mod probe;
pub mod retry;
pub mod workspace;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use client::{ApiClient, ApiError, ClientConfig};
pub use config::ProvisionerConfig;
pub use control_plane::{AccountsApi, ControlPlane};
pub use error::{ProvisionError, Result};
pub use lifecycle::{WorkspaceOrchestrator, DEFAULT_DELETE_TIMEOUT, DEFAULT_PROVISION_TIMEOUT};
pub use network::{Network, NetworkHealth};
pub use probe::{ProbePolicy, ReachabilityProbe, WorkspaceProber};
pub use retry::{Attempt, PollPolicy};
pub use workspace::{Cloud, Workspace, WorkspaceStatus, WorkspaceUpdate};
