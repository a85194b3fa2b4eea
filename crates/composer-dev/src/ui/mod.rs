//! Terminal presentation helpers

pub mod spinner;
pub mod table;

use console::style;
use composer_dev_core::container::ContainerState;

/// Container status in bold green when running, bold red otherwise
pub fn colored_status(status: &str) -> String {
    if status.eq_ignore_ascii_case(ContainerState::Running.as_str()) {
        style(status).green().bold().to_string()
    } else {
        style(status).red().bold().to_string()
    }
}
