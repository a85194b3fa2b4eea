//! Logs command implementation

use crate::commands::shared::{environment_context, resolve_environment_path};
use anyhow::Result;
use composer_dev_core::docker::MaxLines;
use composer_dev_core::environment::{Environment, LogOutput};
use tracing::instrument;

/// Print container logs; with `follow` this runs until the container stops
#[instrument]
pub async fn execute_logs(
    environment: Option<String>,
    follow: bool,
    max_lines: MaxLines,
) -> Result<()> {
    let env_dir = resolve_environment_path(environment.as_deref())?;
    let env = Environment::load_from_config(&env_dir, None, environment_context())?;

    match env.logs(follow, max_lines).await? {
        LogOutput::Stream(mut stream) => {
            while let Some(line) = stream.next_line().await {
                println!("{}", line.trim());
            }
        }
        LogOutput::Text(text) => {
            for line in text.split('\n') {
                println!("{}", line);
            }
        }
    }
    Ok(())
}
