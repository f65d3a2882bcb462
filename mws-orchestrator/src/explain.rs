//! Failure explanation for workspaces that did not come up.

use crate::control_plane::ControlPlane;
use crate::error::ProvisionError;
use crate::workspace::Workspace;

/// Turn a FAILED or CANCELED workspace into an actionable error.
///
/// Workspaces on a customer-managed network usually fail because of the
/// network, so its diagnostics are appended to the status message.
pub async fn explain_failure(control_plane: &dyn ControlPlane, ws: &Workspace) -> ProvisionError {
    if ws.network_id.is_empty() {
        return ProvisionError::Terminal(ws.workspace_status_message.clone());
    }

    let network = match control_plane
        .list_network_diagnostics(&ws.account_id, &ws.network_id)
        .await
    {
        Ok(network) => network,
        Err(e) => {
            return ProvisionError::Terminal(format!(
                "failed to start workspace. Cannot read network: {e}"
            ))
        }
    };

    let diagnostics: String = network
        .error_messages
        .iter()
        .map(|health| {
            format!(
                "error: {}; error_msg: {}; ",
                health.error_type, health.error_message
            )
        })
        .collect();

    ProvisionError::Terminal(format!(
        "Workspace failed to create: {}, network error message: {}",
        ws.workspace_status_message, diagnostics
    ))
}
