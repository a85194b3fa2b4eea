//! Bind mount topology
//!
//! Every environment container gets the same six bind mounts, all rooted under
//! [`AIRFLOW_HOME`]:
//!
//! | host                              | container                                |
//! |-----------------------------------|------------------------------------------|
//! | `<env>/requirements.txt`          | `/home/airflow/composer_requirements.txt` |
//! | dags path                         | `/home/airflow/gcs/dags/`                |
//! | `<env>/plugins`                   | `/home/airflow/gcs/plugins/`             |
//! | `<env>/data`                      | `/home/airflow/gcs/data/`                |
//! | gcloud config directory           | `/home/airflow/.config/gcloud`           |
//! | `<env>/airflow.db`                | `/home/airflow/airflow/airflow.db`       |

use crate::platform::{convert_path_for_docker_desktop, Platform};
use std::fmt;
use std::path::{Path, PathBuf};

/// Home directory of the Airflow user inside the image
pub const AIRFLOW_HOME: &str = "/home/airflow";

/// State database file inside an environment directory
pub const AIRFLOW_DB_FILE: &str = "airflow.db";

pub const PLUGINS_DIR: &str = "plugins";
pub const DATA_DIR: &str = "data";

/// Kind of mount handed to the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountType {
    /// Bind mount from host filesystem
    Bind,
}

impl fmt::Display for MountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MountType::Bind => write!(f, "bind"),
        }
    }
}

/// Host path exposed inside the container
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Mount {
    pub source: PathBuf,
    pub target: String,
}

impl Mount {
    fn under_home(source: impl Into<PathBuf>, relative_target: &str) -> Self {
        Self {
            source: source.into(),
            target: format!("{}/{}", AIRFLOW_HOME, relative_target),
        }
    }

    pub fn mount_type(&self) -> MountType {
        MountType::Bind
    }

    /// `--mount` value for the docker CLI.
    ///
    /// Fields containing a comma are quoted, since the CLI parses the value as
    /// CSV.
    pub fn to_docker_arg(&self, platform: Platform) -> String {
        let source = if platform.needs_docker_desktop_path_conversion() {
            convert_path_for_docker_desktop(&self.source)
        } else {
            self.source.display().to_string()
        };
        [
            format!("type={}", self.mount_type()),
            format!("source={}", source),
            format!("target={}", self.target),
        ]
        .iter()
        .map(|field| csv_field(field))
        .collect::<Vec<_>>()
        .join(",")
    }
}

fn csv_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Mounts for an environment container
pub fn compute_mounts(
    env_dir: &Path,
    dags_path: &Path,
    gcloud_config_path: &Path,
    requirements_file: &Path,
) -> Vec<Mount> {
    vec![
        Mount::under_home(requirements_file, "composer_requirements.txt"),
        Mount::under_home(dags_path, "gcs/dags/"),
        Mount::under_home(env_dir.join(PLUGINS_DIR), "gcs/plugins/"),
        Mount::under_home(env_dir.join(DATA_DIR), "gcs/data/"),
        Mount::under_home(gcloud_config_path, ".config/gcloud"),
        Mount::under_home(env_dir.join(AIRFLOW_DB_FILE), "airflow/airflow.db"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn test_compute_mounts_topology() {
        let env_dir = Path::new("/work/composer/dev");
        let mounts = compute_mounts(
            env_dir,
            Path::new("/work/dags"),
            Path::new("/home/me/.config/gcloud"),
            &env_dir.join("requirements.txt"),
        );

        let actual: BTreeSet<(String, String)> = mounts
            .iter()
            .map(|m| (m.source.display().to_string(), m.target.clone()))
            .collect();
        let expected: BTreeSet<(String, String)> = [
            ("/work/composer/dev/requirements.txt", "/home/airflow/composer_requirements.txt"),
            ("/work/dags", "/home/airflow/gcs/dags/"),
            ("/work/composer/dev/plugins", "/home/airflow/gcs/plugins/"),
            ("/work/composer/dev/data", "/home/airflow/gcs/data/"),
            ("/home/me/.config/gcloud", "/home/airflow/.config/gcloud"),
            ("/work/composer/dev/airflow.db", "/home/airflow/airflow/airflow.db"),
        ]
        .iter()
        .map(|(s, t)| (s.to_string(), t.to_string()))
        .collect();
        assert_eq!(actual, expected);
        assert!(mounts.iter().all(|m| m.mount_type() == MountType::Bind));
    }

    #[test]
    fn test_to_docker_arg() {
        let mount = Mount::under_home("/work/dags", "gcs/dags/");
        assert_eq!(
            mount.to_docker_arg(Platform::Linux),
            "type=bind,source=/work/dags,target=/home/airflow/gcs/dags/"
        );
    }

    #[test]
    fn test_to_docker_arg_quotes_commas() {
        let mount = Mount::under_home("/work/a,b", "gcs/dags/");
        assert_eq!(
            mount.to_docker_arg(Platform::MacOS),
            "type=bind,\"source=/work/a,b\",target=/home/airflow/gcs/dags/"
        );
    }

    #[test]
    fn test_to_docker_arg_windows_source() {
        let mount = Mount::under_home(r"C:\Users\dev\dags", "gcs/dags/");
        assert_eq!(
            mount.to_docker_arg(Platform::Windows),
            "type=bind,source=/c/Users/dev/dags,target=/home/airflow/gcs/dags/"
        );
    }
}
