use serde::{Deserialize, Serialize};

/// One health diagnostic attached to a network configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NetworkHealth {
    #[serde(default)]
    pub error_type: String,
    #[serde(default)]
    pub error_message: String,
}

/// Customer-managed network configuration, owned by the control plane.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Network {
    #[serde(default)]
    pub account_id: String,
    #[serde(default)]
    pub network_id: String,
    #[serde(default)]
    pub network_name: String,
    #[serde(default)]
    pub vpc_status: String,
    #[serde(default)]
    pub error_messages: Vec<NetworkHealth>,
}
