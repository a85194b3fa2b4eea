//! Describe command implementation

use crate::commands::shared::{environment_context, resolve_environment_path};
use crate::ui::colored_status;
use anyhow::Result;
use composer_dev_core::environment::{Environment, EnvironmentDescription};
use console::style;
use tracing::instrument;

#[instrument]
pub async fn execute_describe(environment: Option<String>) -> Result<()> {
    let env_dir = resolve_environment_path(environment.as_deref())?;
    let env = Environment::load_from_config(&env_dir, None, environment_context())?;
    println!("{}", render_description(&env.describe().await?));
    Ok(())
}

fn render_description(description: &EnvironmentDescription) -> String {
    let web_url = description
        .web_url
        .as_ref()
        .map(|url| format!("\nWeb-server can be accessed at {}\n", url))
        .unwrap_or_default();
    format!(
        "\nComposer {} environment is in state: {}.\n{}\n\
         Image version: {}\n\
         Dags directory: {}.\n\
         The environment is using credentials from gcloud located at {}.\n\n\
         This information is based on the data available in the\n\
         environments configurations.\n",
        style(&description.name).bold(),
        colored_status(&description.status),
        web_url,
        description.image_version,
        description.dags_path.display(),
        description.gcloud_path.display(),
    )
}
