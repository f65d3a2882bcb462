use std::time::Duration;
use thiserror::Error;

use crate::client::ApiError;

pub type Result<T> = std::result::Result<T, ProvisionError>;

/// Errors surfaced by the workspace lifecycle.
#[derive(Error, Debug)]
pub enum ProvisionError {
    /// Transport failure or non-2xx answer from the account API.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Workspace reached FAILED or CANCELED. The message is already explained.
    #[error("{0}")]
    Terminal(String),

    /// Provisioning failed and the partially created workspace could not be removed.
    #[error("{original} - {cleanup}")]
    Compensation {
        original: Box<ProvisionError>,
        cleanup: Box<ProvisionError>,
    },

    #[error("timeout while waiting for workspace {operation} after {elapsed:?}: {last_message}")]
    Timeout {
        operation: String,
        elapsed: Duration,
        last_message: String,
    },

    #[error("workspace {operation} cancelled: {last_message}")]
    Cancelled {
        operation: String,
        last_message: String,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ProvisionError {
    /// The remote object does not exist (404-equivalent).
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Api(e) if e.is_missing())
    }

    /// Both deadline expiry and external cancellation count as timeouts.
    ///
    /// A failed cleanup does not change how the original failure is classified.
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Cancelled { .. } => true,
            Self::Compensation { original, .. } => original.is_timeout(),
            _ => false,
        }
    }
}
