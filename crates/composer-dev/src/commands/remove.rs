//! Remove command implementation

use crate::commands::shared::{
    confirm_or_abort, environment_context, resolve_environment_path, UsageError,
};
use anyhow::Result;
use composer_dev_core::environment::Environment;
use composer_dev_core::errors::ComposerError;
use tracing::instrument;

/// Delete the environment directory and its container
///
/// A running environment needs `force`; `skip_confirmation` drops the prompt.
#[instrument]
pub async fn execute_remove(
    environment: Option<String>,
    force: bool,
    skip_confirmation: bool,
) -> Result<()> {
    let env_dir = resolve_environment_path(environment.as_deref())?;
    if !skip_confirmation {
        confirm_or_abort(&format!(
            "This will delete directory '{}' and all of its content (data/plugins/dags). This command will not delete any Docker images.",
            env_dir.display()
        ))?;
    }

    match Environment::remove(&env_dir, force, environment_context()).await {
        Ok(()) => Ok(()),
        Err(err @ ComposerError::ForceRequired { .. }) => Err(UsageError(err.to_string()).into()),
        Err(err) => Err(err.into()),
    }
}
