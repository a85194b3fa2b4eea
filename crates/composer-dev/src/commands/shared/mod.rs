//! Shared helpers for command implementations.

use anyhow::Result;
use composer_dev_core::docker::CliRuntime;
use composer_dev_core::environment::EnvironmentContext;
use composer_dev_core::files::{self, COMPOSER_DIR};
use composer_dev_core::gcloud::{GcloudCli, GoogleApiClient};
use composer_dev_core::platform::SystemHost;
use composer_dev_core::registry::ArtifactRegistryClient;
use dialoguer::theme::ColorfulTheme;
use dialoguer::Confirm;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Invalid command line usage that clap cannot detect on its own
#[derive(Debug)]
pub struct UsageError(pub String);

impl std::fmt::Display for UsageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for UsageError {}

/// The user declined a confirmation prompt
#[derive(Debug)]
pub struct Aborted;

impl std::fmt::Display for Aborted {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Aborted")
    }
}

impl std::error::Error for Aborted {}

/// `./composer` under the current working directory
pub fn composer_dir() -> Result<PathBuf> {
    Ok(std::env::current_dir()?.join(COMPOSER_DIR))
}

/// Environment directory for `name`, or the only environment when omitted
pub fn resolve_environment_path(name: Option<&str>) -> Result<PathBuf> {
    Ok(files::resolve_environment_path(&composer_dir()?, name)?)
}

pub fn google_api() -> GoogleApiClient {
    GoogleApiClient::new(Arc::new(GcloudCli::new()))
}

/// Docker CLI, Artifact Registry and the real host
pub fn environment_context() -> EnvironmentContext<CliRuntime> {
    EnvironmentContext::new(
        CliRuntime::docker(),
        Arc::new(ArtifactRegistryClient::new(google_api())),
        Arc::new(SystemHost::detect()),
    )
}

/// `project`, or the project of the active gcloud configuration
pub async fn resolve_project_id(project: Option<String>) -> Result<String> {
    if let Some(project) = project {
        return Ok(project);
    }
    info!("Project id was not provided. It will be retrieved using Cloud CLI.");
    GcloudCli::new().project_id().await.map_err(|err| {
        UsageError(format!(
            "Please provide Google Cloud project id (using '-p' / '--project' option). Failed to retrieve project id from gcloud configuration:\n{}",
            err
        ))
        .into()
    })
}

/// Ask a yes/no question; declining aborts the command
pub fn confirm_or_abort(prompt: &str) -> Result<()> {
    let confirmed = Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .default(false)
        .interact()?;
    if confirmed {
        Ok(())
    } else {
        Err(Aborted.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_explicit_project_skips_gcloud() {
        let project = resolve_project_id(Some("my-project".to_string()))
            .await
            .unwrap();
        assert_eq!(project, "my-project");
    }

    #[test]
    fn test_usage_error_display() {
        let err = UsageError("Missing source".to_string());
        assert_eq!(err.to_string(), "Missing source");
    }
}
