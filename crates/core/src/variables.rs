//! Environment variable resolution
//!
//! Variables reach the container from three places: the built-in defaults
//! (see [`crate::container::compute_env_vars`]), the user-edited
//! `variables.env` file, and, when an environment is created from a remote
//! snapshot, the remote Airflow configuration overrides. Two keys can never be
//! overridden and are dropped wherever they appear.
//!
//! Maps are `BTreeMap`s so every rendering is sorted by key.

use crate::errors::{ConfigError, Result};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, instrument, warn};

/// Variables file inside an environment directory
pub const VARIABLES_FILE: &str = "variables.env";

/// Keys that are owned by the container image
pub const BLOCKED_KEYS: [&str; 2] = ["AIRFLOW_HOME", "AIRFLOW__CORE__EXECUTOR"];

/// Prefix of Airflow configuration environment variables
pub const AIRFLOW_OVERRIDE_PREFIX: &str = "AIRFLOW__";

/// Environment variable mapping, sorted by key
pub type EnvVars = BTreeMap<String, String>;

/// Read `KEY=VALUE` lines from a file.
///
/// Blank lines and `#` comments are skipped. Lines are split on the first `=`
/// only and both sides are trimmed.
#[instrument]
pub fn load_from_file(path: &Path) -> Result<EnvVars> {
    debug!("Loading environment variables from {}", path.display());
    if !path.is_file() {
        return Err(ConfigError::VariablesNotFound {
            path: path.display().to_string(),
        }
        .into());
    }
    let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
    parse(&content, path)
}

/// Parse the contents of a variables file; `path` is only used in errors
pub fn parse(content: &str, path: &Path) -> Result<EnvVars> {
    let mut vars = EnvVars::new();
    for line in content.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (key, value) = line
            .split_once('=')
            .ok_or_else(|| ConfigError::InvalidVariablesLine {
                path: path.display().to_string(),
                line: line.to_string(),
            })?;
        vars.insert(key.trim().to_string(), value.trim().to_string());
    }
    Ok(vars)
}

pub fn is_blocked(key: &str) -> bool {
    BLOCKED_KEYS.contains(&key)
}

/// Drop keys that cannot be set by the user, warning once per dropped key
pub fn filter_blocked(vars: EnvVars) -> EnvVars {
    vars.into_iter()
        .filter(|(key, _)| {
            if is_blocked(key) {
                warn!("'{}' environment variable cannot be set and will be ignored.", key);
                false
            } else {
                true
            }
        })
        .collect()
}

/// Translate an Airflow override key (`section-key`) into its environment
/// variable name (`AIRFLOW__SECTION__KEY`).
///
/// Only the first `-` separates the section; returns `None` when there is no
/// separator.
pub fn override_to_env_var(airflow_override: &str) -> Option<String> {
    let (section, key) = airflow_override.split_once('-')?;
    Some(format!(
        "{}{}__{}",
        AIRFLOW_OVERRIDE_PREFIX,
        section.to_uppercase(),
        key.to_uppercase()
    ))
}

/// Overlay remote Airflow overrides on top of `base`.
///
/// Overrides win on collision. Blocked keys are removed after the merge, so
/// they never survive whichever side they came from.
pub fn merge_remote_overrides(base: EnvVars, airflow_overrides: &BTreeMap<String, String>) -> EnvVars {
    let mut merged = base;
    for (name, value) in airflow_overrides {
        match override_to_env_var(name) {
            Some(key) => {
                merged.insert(key, value.clone());
            }
            None => warn!("Ignoring malformed Airflow configuration override '{}'", name),
        }
    }
    filter_blocked(merged)
}

/// Render the commented placeholder file written at create time.
///
/// Values are never written; the user fills them in.
pub fn render_placeholders(vars: &EnvVars) -> String {
    let mut lines: Vec<String> = vars.keys().map(|key| format!("# {}=", key)).collect();
    lines.sort();
    lines.join("\n")
}

/// Render `requirements.txt` lines (`name` immediately followed by its specifier)
///
/// Lines are sorted as rendered, so `boto3==1.26.0` precedes `boto==2.49.0`.
pub fn render_requirements(packages: &BTreeMap<String, String>) -> String {
    let mut lines: Vec<String> = packages
        .iter()
        .map(|(name, specifier)| format!("{}{}", name, specifier))
        .collect();
    lines.sort();
    lines.join("\n")
}
