//! Workspace hostname synthesis.
//!
//! The account console lives at `accounts.<domain>`; a workspace deployed as
//! `foo` lives at `foo.<domain>`.

use tracing::warn;
use url::{Host, Url};

/// Domain used when the control-plane host cannot be rewritten.
pub const FALLBACK_DOMAIN: &str = "cloud.databricks.com";

/// Compute the workspace hostname from the control-plane host and deployment name.
///
/// `control_plane_host` may be a bare hostname or a full URL.
pub fn workspace_hostname(control_plane_host: &str, deployment_name: &str) -> String {
    let fallback = || format!("{deployment_name}.{FALLBACK_DOMAIN}");

    let with_scheme = if control_plane_host.contains("://") {
        control_plane_host.to_string()
    } else {
        format!("https://{control_plane_host}")
    };
    let url = match Url::parse(&with_scheme) {
        Ok(url) => url,
        Err(e) => {
            warn!("Unable to parse URL from client host: {}", e);
            return fallback();
        }
    };

    let domain = match url.host() {
        Some(Host::Domain(domain)) if !domain.is_empty() => domain.to_string(),
        // IP literal: testing mode
        other => {
            warn!("Unable to split client host: {:?}", other);
            return fallback();
        }
    };

    let mut labels: Vec<&str> = domain.split('.').collect();
    labels[0] = deployment_name;
    labels.join(".")
}

/// Full `https://` URL for a deployment.
pub fn workspace_url(control_plane_host: &str, deployment_name: &str) -> String {
    format!(
        "https://{}",
        workspace_hostname(control_plane_host, deployment_name)
    )
}
