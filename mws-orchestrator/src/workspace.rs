use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{ProvisionError, Result};

/// Cloud provider the account console runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cloud {
    #[default]
    Aws,
    Gcp,
    Azure,
}

impl fmt::Display for Cloud {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cloud::Aws => write!(f, "aws"),
            Cloud::Gcp => write!(f, "gcp"),
            Cloud::Azure => write!(f, "azure"),
        }
    }
}

impl FromStr for Cloud {
    type Err = ProvisionError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "aws" => Ok(Cloud::Aws),
            "gcp" => Ok(Cloud::Gcp),
            "azure" => Ok(Cloud::Azure),
            other => Err(ProvisionError::Config(format!(
                "unknown cloud '{other}', expected aws, gcp or azure"
            ))),
        }
    }
}

/// Provisioning status as reported by the control plane.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkspaceStatus {
    #[default]
    NotProvisioned,
    Provisioning,
    Running,
    Failed,
    Canceled,
    Banned,
    #[serde(other)]
    Unknown,
}

impl WorkspaceStatus {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed | Self::Canceled)
    }
}

impl fmt::Display for WorkspaceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NotProvisioned => "NOT_PROVISIONED",
            Self::Provisioning => "PROVISIONING",
            Self::Running => "RUNNING",
            Self::Failed => "FAILED",
            Self::Canceled => "CANCELED",
            Self::Banned => "BANNED",
            Self::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

/// A managed workspace in an account.
///
/// `workspace_id` stays `None` until the control plane accepted a create call.
/// Empty strings and `None` are left out of the create body.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Workspace {
    pub account_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_id: Option<u64>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub workspace_name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub deployment_name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub workspace_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud: Option<Cloud>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub aws_region: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub location: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub credentials_id: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub storage_configuration_id: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub network_id: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub private_access_settings_id: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub customer_managed_key_id: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub managed_services_customer_managed_key_id: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub storage_customer_managed_key_id: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub pricing_tier: String,

    /// Only sent on create. The GET payload never carries it.
    #[serde(default = "default_no_public_ip")]
    pub is_no_public_ip_enabled: bool,

    #[serde(default, skip_serializing)]
    pub workspace_status: WorkspaceStatus,

    #[serde(default, skip_serializing)]
    pub workspace_status_message: String,

    /// Milliseconds since the epoch
    #[serde(default, skip_serializing)]
    pub creation_time: Option<i64>,
}

fn default_no_public_ip() -> bool {
    true
}

impl Workspace {
    pub fn new(account_id: impl Into<String>, deployment_name: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            deployment_name: deployment_name.into(),
            is_no_public_ip_enabled: true,
            ..Default::default()
        }
    }

    /// Workspace id as used in API paths.
    pub fn id(&self) -> Result<u64> {
        self.workspace_id.ok_or_else(|| {
            ProvisionError::InvalidInput(format!(
                "workspace {} has no workspace_id yet",
                self.display_name()
            ))
        })
    }

    /// Human readable name for log lines.
    pub fn display_name(&self) -> &str {
        if self.workspace_name.is_empty() {
            &self.deployment_name
        } else {
            &self.workspace_name
        }
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.creation_time.and_then(DateTime::from_timestamp_millis)
    }

    /// Fields that must be present before a create call on the given cloud.
    pub fn validate_for(&self, cloud: Cloud) -> Result<()> {
        if self.account_id.is_empty() {
            return Err(ProvisionError::InvalidInput(
                "account_id is required".to_string(),
            ));
        }
        let required: Vec<(&str, &str)> = match cloud {
            Cloud::Aws => vec![
                ("aws_region", self.aws_region.as_str()),
                ("credentials_id", self.credentials_id.as_str()),
                ("storage_configuration_id", self.storage_configuration_id.as_str()),
            ],
            Cloud::Gcp => vec![("location", self.location.as_str())],
            Cloud::Azure => Vec::new(),
        };
        for (field, value) in required {
            if value.is_empty() {
                return Err(ProvisionError::InvalidInput(format!("{field} is required")));
            }
        }
        Ok(())
    }

    /// `customer_managed_key_id` is deprecated in favour of the managed services key.
    pub fn migrate_customer_managed_key(&mut self) {
        if !self.customer_managed_key_id.is_empty()
            && self.managed_services_customer_managed_key_id.is_empty()
        {
            tracing::info!(
                "Using existing customer_managed_key_id as value for new managed_services_customer_managed_key_id"
            );
            self.managed_services_customer_managed_key_id =
                std::mem::take(&mut self.customer_managed_key_id);
        }
    }
}

/// Body of the partial update allowed on a running workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceUpdate {
    pub credentials_id: String,
    pub network_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_customer_managed_key_id: Option<String>,
}

impl From<&Workspace> for WorkspaceUpdate {
    fn from(ws: &Workspace) -> Self {
        Self {
            credentials_id: ws.credentials_id.clone(),
            network_id: ws.network_id.clone(),
            storage_customer_managed_key_id: (!ws.storage_customer_managed_key_id.is_empty())
                .then(|| ws.storage_customer_managed_key_id.clone()),
        }
    }
}
