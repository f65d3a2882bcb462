//! Generic authenticated HTTP client for the versioned REST API.
//!
//! Every call is a single round trip: no retries happen at this layer. Non-2xx
//! answers are decoded into [`ApiError::Response`] so callers can tell a missing
//! object apart from any other failure.

use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Error codes the account API uses for objects that do not exist.
const MISSING_ERROR_CODES: &[&str] = &["RESOURCE_DOES_NOT_EXIST", "NOT_FOUND"];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("{error_code}: {message}")]
    Response {
        status: u16,
        error_code: String,
        message: String,
    },

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("invalid client configuration: {0}")]
    Config(String),
}

impl ApiError {
    /// Whether the API reported the object as missing.
    pub fn is_missing(&self) -> bool {
        match self {
            Self::Response {
                status, error_code, ..
            } => *status == 404 || MISSING_ERROR_CODES.contains(&error_code.as_str()),
            _ => false,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::Transport(err.to_string())
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error_code: String,
    #[serde(default)]
    message: String,
}

/// Connection settings for [`ApiClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Control-plane host, e.g. `https://accounts.cloud.databricks.com`
    pub host: String,
    /// Pre-issued bearer token
    pub token: Option<String>,
    /// REST API version segment, e.g. `2.0`
    pub api_version: String,
    /// Upper bound for a single request
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "https://accounts.cloud.databricks.com".to_string(),
            token: None,
            api_version: "2.0".to_string(),
            timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    host: String,
    token: Option<String>,
    api_version: String,
}

impl ApiClient {
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        if config.host.trim().is_empty() {
            return Err(ApiError::Config("host must not be empty".to_string()));
        }
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("mws-orchestrator/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ApiError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            host: normalize_host(&config.host),
            token: config.token,
            api_version: config.api_version,
        })
    }

    /// Base URL of the host this client talks to, scheme included.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Same credentials and connection pool, pointed at another host.
    pub fn for_host(&self, host: &str) -> Self {
        Self {
            client: self.client.clone(),
            host: normalize_host(host),
            token: self.token.clone(),
            api_version: self.api_version.clone(),
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/api/{}{}", self.host, self.api_version, path);
        debug!(%method, url = %url, "account API request");
        let mut request = self.client.request(method, &url);
        if let Some(ref token) = self.token {
            request = request.bearer_auth(token);
        }
        request
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = send(self.request(Method::GET, path)).await?;
        Ok(response.json().await?)
    }

    /// GET with a per-request timeout tighter than the client default.
    pub async fn get_with_timeout<T: DeserializeOwned>(
        &self,
        path: &str,
        timeout: Duration,
    ) -> Result<T, ApiError> {
        let response = send(self.request(Method::GET, path).timeout(timeout)).await?;
        Ok(response.json().await?)
    }

    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = send(self.request(Method::POST, path).json(body)).await?;
        Ok(response.json().await?)
    }

    pub async fn patch<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<(), ApiError> {
        send(self.request(Method::PATCH, path).json(body)).await?;
        Ok(())
    }

    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        send(self.request(Method::DELETE, path)).await?;
        Ok(())
    }
}

async fn send(request: RequestBuilder) -> Result<Response, ApiError> {
    let response = request.send().await?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let body: ErrorBody = serde_json::from_str(&text).unwrap_or_default();
    let error_code = if body.error_code.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("UNKNOWN")
            .to_uppercase()
            .replace(' ', "_")
    } else {
        body.error_code
    };
    let message = if body.message.is_empty() {
        text.trim().to_string()
    } else {
        body.message
    };

    Err(ApiError::Response {
        status: status.as_u16(),
        error_code,
        message,
    })
}

fn normalize_host(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{host}")
    }
}
