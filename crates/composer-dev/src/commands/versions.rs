//! List-available-versions command implementation

use crate::commands::shared::{google_api, resolve_project_id};
use crate::ui::spinner::PlainSpinner;
use crate::ui::table::Table;
use anyhow::Result;
use composer_dev_core::remote::{ComposerApiClient, VersionCatalog};
use composer_dev_core::version::{filter_superseded_major, sort_and_limit, ImageVersion};
use tracing::{debug, instrument};

/// List-available-versions command arguments
#[derive(Debug, Clone)]
pub struct VersionsArgs {
    pub project: Option<String>,
    pub location: String,
    pub include_past_releases: bool,
    pub limit: usize,
}

#[instrument(skip(args))]
pub async fn execute_list_available_versions(args: VersionsArgs) -> Result<()> {
    let project = resolve_project_id(args.project.clone()).await?;

    let spinner = PlainSpinner::start("Retrieving available versions...");
    let versions = ComposerApiClient::new(google_api())
        .list_image_versions(&project, &args.location, args.include_past_releases)
        .await?;
    spinner.finish_and_clear();
    debug!("Received {} image versions", versions.len());

    let versions = sort_and_limit(filter_superseded_major(versions), args.limit);
    println!("{}", versions_table(&versions).render());
    Ok(())
}

fn versions_table(versions: &[ImageVersion]) -> Table {
    let mut table = Table::new(["Image version", "Release Date"]);
    for version in versions {
        table.add_row([version.id.clone(), version.release_date_display()]);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use composer_dev_core::NaiveDate;

    #[test]
    fn test_versions_table_uses_display_dates() {
        let table = versions_table(&[ImageVersion::new(
            "composer-2.1.0-airflow-2.3.4",
            NaiveDate::from_ymd_opt(2023, 2, 1).unwrap(),
        )]);
        let rendered = console::strip_ansi_codes(&table.render()).to_string();
        assert!(rendered.contains("composer-2.1.0-airflow-2.3.4 │ 01/02/2023"));
    }
}
