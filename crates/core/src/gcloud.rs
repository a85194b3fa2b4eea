//! Google Cloud access
//!
//! Credentials come from the gcloud CLI (application-default credentials);
//! [`GoogleApiClient`] performs authenticated JSON requests and maps HTTP
//! failures onto [`RegistryError`].

use crate::errors::{ComposerError, RegistryError, Result};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, instrument};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Source of OAuth2 bearer tokens
#[async_trait::async_trait]
pub trait TokenProvider: Send + Sync + std::fmt::Debug {
    async fn access_token(&self) -> std::result::Result<String, RegistryError>;
}

/// gcloud CLI wrapper
#[derive(Debug, Clone)]
pub struct GcloudCli {
    command: String,
}

impl GcloudCli {
    pub fn new() -> Self {
        let command = if cfg!(target_os = "windows") {
            "gcloud.cmd"
        } else {
            "gcloud"
        };
        Self::with_command(command)
    }

    pub fn with_command(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    async fn run(&self, args: &[&str]) -> std::io::Result<std::process::Output> {
        debug!("Executing: {} {}", self.command, args.join(" "));
        Command::new(&self.command).args(args).output().await
    }

    /// Project configured in the active gcloud configuration
    #[instrument(skip(self))]
    pub async fn project_id(&self) -> Result<String> {
        let output = self
            .run(&["config", "config-helper", "--format", "json"])
            .await
            .map_err(|e| ComposerError::InvalidAuth {
                message: e.to_string(),
            })?;
        if !output.status.success() {
            return Err(ComposerError::InvalidAuth {
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        let project = parse_project_id(&String::from_utf8_lossy(&output.stdout))?;
        info!("Using GCP project {}", project);
        Ok(project)
    }
}

impl Default for GcloudCli {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl TokenProvider for GcloudCli {
    async fn access_token(&self) -> std::result::Result<String, RegistryError> {
        let output = self
            .run(&["auth", "application-default", "print-access-token"])
            .await
            .map_err(|e| RegistryError::Unauthenticated {
                message: format!("failed to run gcloud: {}", e),
            })?;
        if !output.status.success() {
            return Err(RegistryError::Unauthenticated {
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if token.is_empty() {
            return Err(RegistryError::Unauthenticated {
                message: "gcloud returned an empty access token".to_string(),
            });
        }
        Ok(token)
    }
}

/// Token fixed up front
#[derive(Debug, Clone)]
pub struct StaticTokenProvider(pub String);

#[async_trait::async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn access_token(&self) -> std::result::Result<String, RegistryError> {
        Ok(self.0.clone())
    }
}

/// Extract `configuration.properties.core.project` from `gcloud config config-helper` output
pub fn parse_project_id(config_helper_json: &str) -> Result<String> {
    let value: serde_json::Value =
        serde_json::from_str(config_helper_json).map_err(|e| ComposerError::GcloudConfig {
            message: format!("Failed to decode gcloud CLI configuration: {}", e),
        })?;
    value
        .pointer("/configuration/properties/core/project")
        .and_then(|p| p.as_str())
        .map(str::to_string)
        .ok_or_else(|| ComposerError::GcloudConfig {
            message: "gcloud configuration is missing project id.".to_string(),
        })
}

/// Authenticated JSON client for Google Cloud REST APIs
#[derive(Debug, Clone)]
pub struct GoogleApiClient {
    http: reqwest::Client,
    tokens: Arc<dyn TokenProvider>,
}

impl GoogleApiClient {
    pub fn new(tokens: Arc<dyn TokenProvider>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("composer-dev/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        Self { http, tokens }
    }

    /// GET `url` and decode the JSON body
    #[instrument(skip(self, query))]
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> std::result::Result<T, RegistryError> {
        let token = self.tokens.access_token().await?;
        let response = self
            .http
            .get(url)
            .bearer_auth(token)
            .query(query)
            .send()
            .await
            .map_err(|e| RegistryError::Transport {
                message: if e.is_timeout() {
                    format!("Request timeout for URL: {}. Check network connectivity.", url)
                } else if e.is_connect() {
                    format!("Connection failed for URL: {}", url)
                } else {
                    format!("Network error for URL: {}: {}", url, e)
                },
            })?;

        let status = response.status();
        if status.is_success() {
            return response.json::<T>().await.map_err(|e| RegistryError::Api {
                status: status.as_u16(),
                message: format!("Invalid response body: {}", e),
            });
        }

        let body = response.text().await.unwrap_or_default();
        let message = google_error_message(&body);
        debug!("GET {} failed with {}: {}", url, status, message);
        Err(match status {
            reqwest::StatusCode::NOT_FOUND => RegistryError::NotFound {
                resource: url.to_string(),
            },
            reqwest::StatusCode::FORBIDDEN => RegistryError::PermissionDenied { message },
            reqwest::StatusCode::UNAUTHORIZED => RegistryError::Unauthenticated { message },
            other => RegistryError::Api {
                status: other.as_u16(),
                message,
            },
        })
    }
}

/// `error.message` of a Google API error body, or the raw body
fn google_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
}
