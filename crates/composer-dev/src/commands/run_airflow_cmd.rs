//! Run-airflow-cmd command implementation

use crate::commands::shared::{environment_context, resolve_environment_path};
use anyhow::Result;
use composer_dev_core::environment::Environment;
use tracing::instrument;

/// Run `airflow <command...>` in the running environment and print its output
#[instrument]
pub async fn execute_run_airflow_cmd(environment: String, command: Vec<String>) -> Result<()> {
    let env_dir = resolve_environment_path(Some(&environment))?;
    let env = Environment::load_from_config(&env_dir, None, environment_context())?;
    let output = env.run_command(&command).await?;
    println!("{}", output);
    Ok(())
}
