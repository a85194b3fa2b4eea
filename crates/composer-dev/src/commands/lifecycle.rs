//! Start, stop and restart command implementations

use crate::commands::shared::{environment_context, resolve_environment_path};
use crate::ui::spinner::PlainSpinner;
use anyhow::Result;
use composer_dev_core::docker::CliRuntime;
use composer_dev_core::environment::Environment;
use console::style;
use std::sync::Arc;
use tracing::instrument;

/// Load the environment and forward its startup logs above a spinner
fn load_with_spinner(
    environment: Option<&str>,
    port: Option<u32>,
) -> Result<(Environment<CliRuntime>, PlainSpinner)> {
    let env_dir = resolve_environment_path(environment)?;
    let env = Environment::load_from_config(&env_dir, port, environment_context())?;
    let spinner = PlainSpinner::start("Starting environment...");
    let env = env.with_log_observer(Arc::new(spinner.line_printer()));
    Ok((env, spinner))
}

#[instrument]
pub async fn execute_start(environment: Option<String>, port: Option<u32>) -> Result<()> {
    let (env, spinner) = load_with_spinner(environment.as_deref(), port)?;
    spinner.println(&format!("Starting {} composer environment...", env.name()));
    env.start(true).await?;
    spinner.finish_with_message("Environment is ready.");
    print_started(&env).await;
    Ok(())
}

#[instrument]
pub async fn execute_stop(environment: Option<String>) -> Result<()> {
    let env_dir = resolve_environment_path(environment.as_deref())?;
    let env = Environment::load_from_config(&env_dir, None, environment_context())?;
    env.stop(false).await?;
    println!("Stopped composer local environment.");
    Ok(())
}

#[instrument]
pub async fn execute_restart(environment: Option<String>, port: Option<u32>) -> Result<()> {
    let (env, spinner) = load_with_spinner(environment.as_deref(), port)?;
    env.restart().await?;
    spinner.finish_with_message("Environment is ready.");
    print_started(&env).await;
    Ok(())
}

async fn print_started(env: &Environment<CliRuntime>) {
    println!(
        "\nStarted {} environment.\n\n\
         1. You can put your DAGs in {}\n\
         2. Access Airflow at http://localhost:{}\n",
        style(env.name()).bold(),
        env.dags_path().display(),
        env.host_port().await
    );
}
