//! List command implementation

use crate::commands::shared::{composer_dir, environment_context};
use crate::ui::{colored_status, table::Table};
use anyhow::Result;
use composer_dev_core::environment::{list_environments, EnvironmentStatus};
use tracing::instrument;

const LIST_EPILOG: &str = "\nRun describe command with the environment name to see the detailed information and potential configuration errors.\n\n* Based on the data available in the environments configuration files.";

#[instrument]
pub async fn execute_list() -> Result<()> {
    let current_path = std::env::current_dir()?;
    let statuses = list_environments(&composer_dir()?, &environment_context()).await?;

    if statuses.is_empty() {
        println!(
            "No environments could be found at the path: {}",
            current_path.display()
        );
        return Ok(());
    }

    println!(
        "Following local Composer environments could be found at the path: {}\n",
        current_path.display()
    );
    println!("{}", status_table(&statuses).render());
    println!("{}", LIST_EPILOG);
    Ok(())
}

fn status_table(statuses: &[EnvironmentStatus]) -> Table {
    let mut table = Table::new(["Environment Name", "Version*", "State"]);
    for status in statuses {
        table.add_row([
            status.name.clone(),
            status.image_version.clone(),
            colored_status(&status.status),
        ]);
    }
    table
}
