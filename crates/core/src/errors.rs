//! Error types and handling
//!
//! The taxonomy mirrors the layers of the tool: configuration problems
//! ([`ConfigError`]), container engine failures ([`DockerError`]), Google Cloud
//! API failures ([`RegistryError`]) and the lifecycle outcomes that wrap them
//! ([`ComposerError`]). Variants carry structured context only; the wording
//! users see lives in the `Display` impls and the CLI picks exit codes from
//! [`ErrorKind`].

use crate::config::IntRange;
use thiserror::Error;

/// Documentation page linked from mount permission failures.
pub const MOUNT_TROUBLESHOOTING_URL: &str =
    "https://cloud.google.com/composer/docs/composer-2/run-local-airflow-environments#troubleshooting-homebrew";

/// Why an environment name was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameViolation {
    TooShort,
    TooLong,
    InvalidCharacters,
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file is absent
    #[error("Configuration file '{path}' not found.")]
    NotFound { path: String },

    /// Configuration file exists but is not a JSON object
    #[error("Failed to parse configuration file: '{path}' with an error: {message}")]
    Parsing { path: String, message: String },

    /// Required key missing from `config.json`
    #[error(
        "Missing required parameter: '{param}' in the environment 'config.json' configuration file."
    )]
    MissingRequiredParameter { param: String },

    /// Key present but not a string
    #[error("Invalid value for '{param}' configuration value. '{value}' is not a valid string.")]
    InvalidStringValue { param: String, value: String },

    /// Key present but not an integer
    #[error("Invalid value for '{param}' configuration value. '{value}' is not a valid integer.")]
    InvalidIntValue { param: String, value: String },

    /// Integer outside of its allowed range
    #[error("Invalid value for '{param}' configuration value. {value} is not in the range {range}.")]
    InvalidIntRange {
        param: String,
        value: i64,
        range: IntRange,
    },

    /// `variables.env` is absent
    #[error("Environment variables file '{path}' not found.")]
    VariablesNotFound { path: String },

    /// Line in `variables.env` without a `=` separator
    #[error(
        "Could not parse the file containing environment variables ({path}). Line '{line}' is invalid. Each line should contain a key-value pair, eg. FOO=BAR."
    )]
    InvalidVariablesLine { path: String, line: String },

    /// Image version does not follow `composer-x.y.z-airflow-a.b.c`
    #[error("Composer version must match `composer-x.y.z-airflow-a.b.c` pattern (got '{value}').")]
    InvalidImageVersion { value: String },

    /// Environment name fails validation
    #[error("{}", describe_name_violation(name, *reason))]
    InvalidEnvironmentName { name: String, reason: NameViolation },

    /// Running as the host user cannot work on Windows hosts
    #[error("COMPOSER_CONTAINER_RUN_AS_HOST_USER must be set to `False` on Windows")]
    RunAsHostUserOnWindows,

    /// `--max-lines` value that is neither `all` nor a positive integer
    #[error("'{value}' is not a positive integer or 'all' keyword")]
    InvalidMaxLines { value: String },

    /// Configuration file I/O error
    #[error("Failed to read configuration file")]
    Io(#[from] std::io::Error),
}

fn describe_name_violation(name: &str, reason: NameViolation) -> String {
    match reason {
        NameViolation::TooShort => format!(
            "Environment name '{}' is too short (min. 3 characters required).",
            name
        ),
        NameViolation::TooLong => format!(
            "Environment name '{}' is too long (max. 40 characters allowed).",
            name
        ),
        NameViolation::InvalidCharacters => format!(
            "Environment name '{}' is not a valid environment name. Environment name can only consist of alphanumeric characters, underscores and hyphens.",
            name
        ),
    }
}

/// Container engine errors
#[derive(Error, Debug)]
pub enum DockerError {
    /// Docker is not installed or not accessible
    #[error("Docker not available or failed to start. Please ensure docker service is installed and running.")]
    NotInstalled,

    /// Docker CLI invocation failure that is not an engine response
    #[error("Docker CLI error: {0}")]
    CLIError(String),

    /// The engine does not have the requested image locally
    #[error("Image not found: {image}")]
    ImageNotFound { image: String },

    /// A container with the requested name already exists
    #[error("Container name conflict for {name}: {message}")]
    NameConflict { name: String, message: String },

    /// Error response from the engine
    #[error("{message}")]
    Api { message: String },
}

impl DockerError {
    /// Engine refused to publish the host port.
    ///
    /// The engine only reports this as free text, so detection is a substring
    /// match on the daemon message.
    pub fn is_port_already_allocated(&self) -> bool {
        matches!(self, DockerError::Api { message } if message.contains("port is already allocated"))
    }

    /// Bind mount source is not shared with the engine (Docker Desktop file sharing).
    pub fn is_mount_permission_error(&self) -> bool {
        matches!(self, DockerError::Api { message } if message.contains("invalid mount config"))
    }
}

/// Google Cloud REST API errors
#[derive(Error, Debug)]
pub enum RegistryError {
    /// HTTP 404
    #[error("Resource not found: {resource}")]
    NotFound { resource: String },

    /// HTTP 403
    #[error("Permission denied: {message}")]
    PermissionDenied { message: String },

    /// HTTP 401, or no access token could be obtained
    #[error("{message}")]
    Unauthenticated { message: String },

    /// Any other non-success response
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// Request never produced a response
    #[error("Transport error: {message}")]
    Transport { message: String },
}

/// Error categories the CLI maps to exit codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidConfiguration,
    NotFound,
    AlreadyRunning,
    NotRunning,
    StartTimeout,
    StartFailed,
    PortInUse,
    ImageNotFound,
    AuthInvalid,
    RemoteApi,
    DockerUnavailable,
    Runtime,
    Io,
    Internal,
}

/// Main error enum wrapping all domain-specific errors
#[derive(Error, Debug)]
pub enum ComposerError {
    /// Configuration-related errors
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Container engine errors
    #[error(transparent)]
    Docker(#[from] DockerError),

    /// Remote environment configuration could not be read
    #[error("Failed to retrieve Cloud Composer environment configuration: {message}")]
    RemoteConfig { message: String },

    /// Image versions could not be listed
    #[error("Failed to list available versions: {message}")]
    ListVersions { message: String },

    /// Registry confirmed that the image tag does not exist
    #[error(
        "Composer version {image_version} seems not to be valid. Please make sure to use existing Cloud Composer version. You can see the list of available versions by running:\n\n    $ composer-dev list-available-versions"
    )]
    ImageNotFound { image_version: String },

    /// Credentials missing, expired or rejected
    #[error(
        "Could not validate authentication data: {}.\nPlease check your internet connection.\nTo obtain and export new credentials please run following two commands:\n\n    $ gcloud auth login\n    $ gcloud auth application-default login\n\nTo obtain new credentials.",
        message.trim_end_matches('.')
    )]
    InvalidAuth { message: String },

    /// gcloud CLI configuration unreadable or incomplete
    #[error("{message}")]
    GcloudConfig { message: String },

    /// gcloud configuration directory could not be located
    #[error("Could not resolve gcloud config location. Please use CLOUDSDK_CONFIG environment variable to override default configuration location.")]
    CredentialsNotFound,

    /// Container for this environment is already running
    #[error("Composer local development for environment '{name}' is already running. Stop or restart it if you want to run it.")]
    AlreadyRunning { name: String },

    /// Removal of a running environment without `--force`
    #[error("The environment is running. Use --force flag if you want to stop environment and remove it.")]
    ForceRequired { name: String },

    /// Container absent or not running
    #[error("Failed to run command: environment not running.")]
    NotRunning { name: String },

    /// Container failed to start
    #[error("{}", message.as_deref().unwrap_or("Environment failed to start."))]
    StartFailed { message: Option<String> },

    /// Readiness marker not seen before the deadline
    #[error("Environment did not start in {seconds} seconds.")]
    StartTimeout { seconds: u64 },

    /// Host port already bound by another process
    #[error("Port {port} is already in use. Please use different port or close application using port {port}.\nYou can select different port by using --port option when starting environment.")]
    PortInUse { port: u32 },

    /// Dags directory missing at start
    #[error("Dags path does not exist or is not a directory: {path}")]
    DagsPathNotFound { path: String },

    /// requirements.txt missing at start
    #[error("Missing '{path}' file.")]
    RequirementsNotFound { path: String },

    /// `./composer` directory missing
    #[error("'{path}' directory not found.\nRun following command to check how to create new environment:\n  $ composer-dev create --help")]
    EnvironmentsDirNotFound { path: String },

    /// `./composer` directory holds no environments
    #[error("No environment detected in '{path}'.\nRun following command to check how to create new environment:\n  $ composer-dev create --help")]
    NoEnvironments { path: String },

    /// Named environment directory missing
    #[error("'{path}' directory not found. Please check that correct environment name was provided and the environment exists.\nRun following command to check how to create new environment:\n  $ composer-dev create --help")]
    EnvironmentNotFound { path: String },

    /// Several environments exist and none was named
    #[error("'{path}' directory contains more than one environment but environment name was not provided. Provide environment argument to select one of the existing environments:\n    {}", names.join("\n    "))]
    EnvironmentNotSelected { path: String, names: Vec<String> },

    /// Filesystem error outside of configuration parsing
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invariant broken inside the tool
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl ComposerError {
    /// Category used by the CLI to pick an exit code
    pub fn kind(&self) -> ErrorKind {
        match self {
            ComposerError::Config(ConfigError::NotFound { .. })
            | ComposerError::Config(ConfigError::VariablesNotFound { .. }) => ErrorKind::NotFound,
            ComposerError::Config(ConfigError::Io(_)) => ErrorKind::Io,
            ComposerError::Config(_) => ErrorKind::InvalidConfiguration,
            ComposerError::Docker(DockerError::NotInstalled) => ErrorKind::DockerUnavailable,
            ComposerError::Docker(DockerError::ImageNotFound { .. }) => ErrorKind::ImageNotFound,
            ComposerError::Docker(DockerError::NameConflict { .. }) => ErrorKind::AlreadyRunning,
            ComposerError::Docker(_) => ErrorKind::Runtime,
            ComposerError::RemoteConfig { .. } | ComposerError::ListVersions { .. } => {
                ErrorKind::RemoteApi
            }
            ComposerError::ImageNotFound { .. } => ErrorKind::ImageNotFound,
            ComposerError::GcloudConfig { .. } => ErrorKind::InvalidConfiguration,
            ComposerError::InvalidAuth { .. } | ComposerError::CredentialsNotFound => {
                ErrorKind::AuthInvalid
            }
            ComposerError::AlreadyRunning { .. } | ComposerError::ForceRequired { .. } => {
                ErrorKind::AlreadyRunning
            }
            ComposerError::NotRunning { .. } => ErrorKind::NotRunning,
            ComposerError::DagsPathNotFound { .. }
            | ComposerError::RequirementsNotFound { .. }
            | ComposerError::EnvironmentsDirNotFound { .. }
            | ComposerError::NoEnvironments { .. }
            | ComposerError::EnvironmentNotFound { .. } => ErrorKind::NotFound,
            ComposerError::EnvironmentNotSelected { .. } => ErrorKind::InvalidConfiguration,
            ComposerError::StartFailed { .. } => ErrorKind::StartFailed,
            ComposerError::StartTimeout { .. } => ErrorKind::StartTimeout,
            ComposerError::PortInUse { .. } => ErrorKind::PortInUse,
            ComposerError::Io(_) => ErrorKind::Io,
            ComposerError::Internal { .. } => ErrorKind::Internal,
        }
    }

    /// Start failure wrapping an engine message
    pub fn start_failed(message: impl Into<String>) -> Self {
        ComposerError::StartFailed {
            message: Some(message.into()),
        }
    }
}

/// Convenience type alias for Results with ComposerError
pub type Result<T> = std::result::Result<T, ComposerError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_config_error_display() {
        let error = ConfigError::MissingRequiredParameter {
            param: "composer_location".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Missing required parameter: 'composer_location' in the environment 'config.json' configuration file."
        );

        let error = ConfigError::InvalidIntValue {
            param: "port".to_string(),
            value: "abc".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Invalid value for 'port' configuration value. 'abc' is not a valid integer."
        );

        let error = ConfigError::InvalidIntRange {
            param: "port".to_string(),
            value: 70000,
            range: IntRange::Between(0, 65536),
        };
        assert_eq!(
            error.to_string(),
            "Invalid value for 'port' configuration value. 70000 is not in the range 0<=x<=65536."
        );

        let error = ConfigError::InvalidIntRange {
            param: "dag_dir_list_interval".to_string(),
            value: -1,
            range: IntRange::AtLeast(0),
        };
        assert!(error.to_string().ends_with("-1 is not in the range x>=0."));
    }

    #[test]
    fn test_name_violation_messages() {
        let error = ConfigError::InvalidEnvironmentName {
            name: "ab".to_string(),
            reason: NameViolation::TooShort,
        };
        assert!(error.to_string().contains("too short"));

        let error = ConfigError::InvalidEnvironmentName {
            name: "a b c".to_string(),
            reason: NameViolation::InvalidCharacters,
        };
        assert!(error.to_string().contains("alphanumeric characters"));
    }

    #[test]
    fn test_port_in_use_names_port() {
        let error = ComposerError::PortInUse { port: 8081 };
        assert!(error.to_string().starts_with("Port 8081 is already in use."));
        assert_eq!(error.kind(), ErrorKind::PortInUse);
    }

    #[test]
    fn test_invalid_auth_strips_trailing_dot() {
        let error = ComposerError::InvalidAuth {
            message: "Reauthentication is needed.".to_string(),
        };
        assert!(error
            .to_string()
            .starts_with("Could not validate authentication data: Reauthentication is needed.\n"));
    }

    #[test]
    fn test_start_failed_default_message() {
        let error = ComposerError::StartFailed { message: None };
        assert_eq!(error.to_string(), "Environment failed to start.");

        let error = ComposerError::start_failed("boom");
        assert_eq!(error.to_string(), "boom");
    }

    #[test]
    fn test_docker_error_classification() {
        let error = DockerError::Api {
            message: "Bind for 0.0.0.0:8080 failed: port is already allocated".to_string(),
        };
        assert!(error.is_port_already_allocated());
        assert!(!error.is_mount_permission_error());

        let error = DockerError::Api {
            message: "invalid mount config for type \"bind\"".to_string(),
        };
        assert!(error.is_mount_permission_error());
    }

    #[test]
    fn test_error_kinds() {
        let cases: Vec<(ComposerError, ErrorKind)> = vec![
            (
                ConfigError::NotFound {
                    path: "config.json".to_string(),
                }
                .into(),
                ErrorKind::NotFound,
            ),
            (
                ConfigError::Parsing {
                    path: "config.json".to_string(),
                    message: "eof".to_string(),
                }
                .into(),
                ErrorKind::InvalidConfiguration,
            ),
            (DockerError::NotInstalled.into(), ErrorKind::DockerUnavailable),
            (
                ComposerError::StartTimeout { seconds: 300 },
                ErrorKind::StartTimeout,
            ),
            (
                ComposerError::NotRunning {
                    name: "env".to_string(),
                },
                ErrorKind::NotRunning,
            ),
            (
                ComposerError::ImageNotFound {
                    image_version: "composer-2.0.8-airflow-2.2.3".to_string(),
                },
                ErrorKind::ImageNotFound,
            ),
        ];
        for (error, kind) in cases {
            assert_eq!(error.kind(), kind, "unexpected kind for {}", error);
        }
    }

    #[test]
    fn test_error_source_chain() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let composer_error = ComposerError::Config(ConfigError::Io(io_error));
        assert!(composer_error.source().is_some());
    }
}
