//! Container specification for an environment
//!
//! Translates resolved environment parameters into the exact `docker create`
//! invocation: deterministic name, image, entrypoint, environment, mounts,
//! published port and memory limit.

use crate::errors::{ConfigError, Result};
use crate::mount::{Mount, AIRFLOW_HOME};
use crate::platform::{HostEnvironment, Platform};
use crate::ports::{publish_args, PortBindings};
use crate::variables::EnvVars;
use std::fmt;

/// Prefix of every environment container name
pub const CONTAINER_NAME_PREFIX: &str = "composer-local-dev";

/// Memory limit applied to environment containers
pub const MEMORY_LIMIT: &str = "4g";

/// Entrypoint script location inside the container
pub const ENTRYPOINT_PATH: &str = "/home/airflow/entrypoint.sh";

/// Set to `True` to run the container processes as the host user
pub const RUN_AS_HOST_USER_VAR: &str = "COMPOSER_CONTAINER_RUN_AS_HOST_USER";

/// Deterministic container name for an environment
pub fn container_name(env_name: &str) -> String {
    format!("{}-{}", CONTAINER_NAME_PREFIX, env_name)
}

/// Container state as reported by the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerState {
    Created,
    Running,
    Paused,
    Restarting,
    Removing,
    Exited,
    Dead,
    Other(String),
}

impl ContainerState {
    pub fn parse(status: &str) -> Self {
        match status {
            "created" => ContainerState::Created,
            "running" => ContainerState::Running,
            "paused" => ContainerState::Paused,
            "restarting" => ContainerState::Restarting,
            "removing" => ContainerState::Removing,
            "exited" => ContainerState::Exited,
            "dead" => ContainerState::Dead,
            other => ContainerState::Other(other.to_string()),
        }
    }

    /// Created or running containers count as active while starting
    pub fn is_active(&self) -> bool {
        matches!(self, ContainerState::Created | ContainerState::Running)
    }

    pub fn is_running(&self) -> bool {
        *self == ContainerState::Running
    }

    pub fn as_str(&self) -> &str {
        match self {
            ContainerState::Created => "created",
            ContainerState::Running => "running",
            ContainerState::Paused => "paused",
            ContainerState::Restarting => "restarting",
            ContainerState::Removing => "removing",
            ContainerState::Exited => "exited",
            ContainerState::Dead => "dead",
            ContainerState::Other(s) => s,
        }
    }
}

impl fmt::Display for ContainerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Environment variables every container starts with.
///
/// `overrides` are laid over the defaults and win on collision.
pub fn compute_env_vars(
    dag_dir_list_interval: u32,
    project_id: &str,
    overrides: &EnvVars,
    host: &dyn HostEnvironment,
) -> Result<EnvVars> {
    let host_user_id = if host.is_windows() {
        String::new()
    } else {
        host.user_id().map(|uid| uid.to_string()).unwrap_or_default()
    };

    let defaults = [
        ("AIRFLOW__API__AUTH_BACKEND", "airflow.api.auth.backend.default".to_string()),
        ("AIRFLOW__WEBSERVER__EXPOSE_CONFIG", "true".to_string()),
        ("AIRFLOW__CORE__LOAD_EXAMPLES", "false".to_string()),
        (
            "AIRFLOW__SCHEDULER__DAG_DIR_LIST_INTERVAL",
            dag_dir_list_interval.to_string(),
        ),
        ("AIRFLOW__CORE__DAGS_FOLDER", format!("{}/gcs/dags", AIRFLOW_HOME)),
        ("AIRFLOW__CORE__PLUGINS_FOLDER", format!("{}/gcs/plugins", AIRFLOW_HOME)),
        ("AIRFLOW__CORE__DATA_FOLDER", format!("{}/gcs/data", AIRFLOW_HOME)),
        ("AIRFLOW__WEBSERVER__RELOAD_ON_PLUGIN_CHANGE", "True".to_string()),
        ("COMPOSER_PYTHON_VERSION", "3".to_string()),
        // the image runs as `airflow` (UID 999) unless this is "True"
        (RUN_AS_HOST_USER_VAR, "False".to_string()),
        ("COMPOSER_HOST_USER_NAME", host.user_name()),
        ("COMPOSER_HOST_USER_ID", host_user_id),
        ("AIRFLOW_HOME", format!("{}/airflow", AIRFLOW_HOME)),
        (
            "AIRFLOW_CONN_GOOGLE_CLOUD_DEFAULT",
            format!(
                "google-cloud-platform://?extra__google_cloud_platform__project={}&extra__google_cloud_platform__scope=https://www.googleapis.com/auth/cloud-platform",
                project_id
            ),
        ),
    ];

    let mut env: EnvVars = defaults
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect();
    env.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));

    if host.is_windows() && env.get(RUN_AS_HOST_USER_VAR).map(String::as_str) == Some("True") {
        return Err(ConfigError::RunAsHostUserOnWindows.into());
    }
    Ok(env)
}

/// Everything needed to create an environment container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    /// Executable followed by its arguments
    pub entrypoint: Vec<String>,
    pub env: EnvVars,
    pub mounts: Vec<Mount>,
    pub ports: PortBindings,
    pub memory_limit: String,
}

impl ContainerSpec {
    /// `sh /home/airflow/entrypoint.sh`
    pub fn default_entrypoint() -> Vec<String> {
        vec!["sh".to_string(), ENTRYPOINT_PATH.to_string()]
    }

    /// Arguments following `docker` for creating this container
    pub fn to_create_args(&self, platform: Platform) -> Vec<String> {
        let mut args = vec![
            "create".to_string(),
            "--name".to_string(),
            self.name.clone(),
            "--memory".to_string(),
            self.memory_limit.clone(),
        ];

        let (program, entrypoint_args) = match self.entrypoint.split_first() {
            Some((program, rest)) => (Some(program), rest),
            None => (None, &[][..]),
        };
        if let Some(program) = program {
            args.push("--entrypoint".to_string());
            args.push(program.clone());
        }

        for (key, value) in &self.env {
            args.push("--env".to_string());
            args.push(format!("{}={}", key, value));
        }
        for mount in &self.mounts {
            args.push("--mount".to_string());
            args.push(mount.to_docker_arg(platform));
        }
        for publish in publish_args(&self.ports) {
            args.push("--publish".to_string());
            args.push(publish);
        }

        args.push(self.image.clone());
        args.extend(entrypoint_args.iter().cloned());
        args
    }
}
