use crate::commands;
use anyhow::Result;
use clap::{ArgGroup, Parser, Subcommand, ValueEnum};
use composer_dev_core::docker::MaxLines;
use composer_dev_core::files::validate_environment_name;
use composer_dev_core::logging::{self, Verbosity};
use composer_dev_core::version::DEFAULT_VERSIONS_LIMIT;
use std::path::PathBuf;

const DEFAULT_LOCATION: &str = "us-central1";

/// Log format options
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogFormat {
    /// Human-readable text format
    Text,
    /// JSON structured format
    Json,
}

/// Local Composer environment subcommands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create local Composer development environment
    #[command(
        long_about = "Create local Composer development environment.\n\n\
        There are two methods of creating the local environment:\n\n  \
        - --from-source-environment copies the software configuration of a running Cloud Composer environment\n  \
        - --from-image-version starts from a clean Composer image version\n\n\
        The environment is created in the 'composer' directory of the current working directory. \
        Environment names are 3 to 40 characters long and consist of alphanumeric characters, underscores and hyphens.",
        group(
            ArgGroup::new("source")
                .required(true)
                .args(["from_source_environment", "from_image_version"])
        )
    )]
    Create {
        /// Name of your Composer environment to be used as a source
        #[arg(long, value_name = "REMOTE_ENV_NAME")]
        from_source_environment: Option<String>,
        /// Composer image version, e.g. composer-2.0.17-airflow-2.2.5
        #[arg(long, value_name = "COMPOSER_VERSION")]
        from_image_version: Option<String>,
        /// The Google Cloud project ID to use [default: project ID set in Cloud CLI]
        #[arg(short, long, value_name = "PROJECT_ID")]
        project: Option<String>,
        /// ID of the location or fully qualified identifier for the location
        #[arg(short, long, default_value = DEFAULT_LOCATION, value_name = "LOCATION")]
        location: String,
        /// Port used by Airflow web server
        #[arg(
            long = "web-server-port",
            visible_alias = "port",
            value_name = "PORT",
            value_parser = clap::value_parser!(u32).range(0..=65536)
        )]
        web_server_port: Option<u32>,
        /// Path to DAGs folder. If it does not exist, it will be created
        #[arg(long, value_name = "PATH")]
        dags_path: Option<PathBuf>,
        /// Name of the local environment
        #[arg(value_name = "LOCAL_ENVIRONMENT_NAME", value_parser = parse_environment_name)]
        environment: String,
    },

    /// Start Composer environment
    Start {
        #[arg(value_name = "LOCAL_ENVIRONMENT_NAME")]
        environment: Option<String>,
        /// Port used by Airflow web server [default: read from the configuration file]
        #[arg(
            long = "web-server-port",
            visible_alias = "port",
            value_name = "PORT",
            value_parser = clap::value_parser!(u32).range(0..=65536)
        )]
        web_server_port: Option<u32>,
    },

    /// Stop Composer environment. The container is stopped but not removed
    Stop {
        #[arg(value_name = "LOCAL_ENVIRONMENT_NAME")]
        environment: Option<String>,
    },

    /// Restart Composer environment. The container is removed and started again
    Restart {
        #[arg(value_name = "LOCAL_ENVIRONMENT_NAME")]
        environment: Option<String>,
        /// Port used by Airflow web server [default: read from the configuration file]
        #[arg(
            long = "web-server-port",
            visible_alias = "port",
            value_name = "PORT",
            value_parser = clap::value_parser!(u32).range(0..=65536)
        )]
        web_server_port: Option<u32>,
    },

    /// Print logs from the running Composer environment container
    Logs {
        #[arg(value_name = "LOCAL_ENVIRONMENT_NAME")]
        environment: Option<String>,
        /// Follow log output
        #[arg(short, long)]
        follow: bool,
        /// Maximum number of lines to be printed ('all' or a positive integer)
        #[arg(short = 'l', long, default_value = "all", value_name = "MAX_LINES")]
        max_lines: MaxLines,
    },

    /// Print list of the Composer environments found in the current directory
    List,

    /// Describe Composer environment
    Describe {
        #[arg(value_name = "LOCAL_ENVIRONMENT_NAME")]
        environment: Option<String>,
    },

    /// Remove Composer environment directory and its Docker container
    Remove {
        #[arg(value_name = "LOCAL_ENVIRONMENT_NAME")]
        environment: Option<String>,
        /// Force the environment removal even if it is running
        #[arg(long)]
        force: bool,
        /// Do not require confirmation before removing the environment
        #[arg(long)]
        skip_confirmation: bool,
    },

    /// Run command in Airflow, e.g. `composer-dev run-airflow-cmd env_name dags list`
    RunAirflowCmd {
        #[arg(value_name = "LOCAL_ENVIRONMENT_NAME")]
        environment: String,
        /// Airflow command and its arguments
        #[arg(
            value_name = "COMMAND",
            required = true,
            trailing_var_arg = true,
            allow_hyphen_values = true
        )]
        command: Vec<String>,
    },

    /// List Airflow versions available in Composer
    ListAvailableVersions {
        /// The Google Cloud project ID to use [default: project ID set in Cloud CLI]
        #[arg(short, long, value_name = "PROJECT_ID")]
        project: Option<String>,
        /// ID of the location or fully qualified identifier for the location
        #[arg(short, long, default_value = DEFAULT_LOCATION, value_name = "LOCATION")]
        location: String,
        /// Include past releases in listed versions
        #[arg(long)]
        include_past_releases: bool,
        /// Number of versions to display
        #[arg(long, default_value_t = DEFAULT_VERSIONS_LIMIT, value_name = "LIMIT")]
        limit: usize,
    },
}

#[derive(Parser, Debug)]
#[command(
    name = env!("CARGO_PKG_NAME"),
    version,
    about = "Composer local development CLI",
    long_about = "Composer local development CLI\n\nCreate, manage and run local Cloud Composer development environments.",
    color = clap::ColorChoice::Auto
)]
pub struct Cli {
    /// More verbose output
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Print debug log lines
    #[arg(long, global = true)]
    pub debug: bool,

    /// Log format (text or json, defaults to text, can be set via COMPOSER_DEV_LOG_FORMAT env var)
    #[arg(long, global = true, value_enum)]
    pub log_format: Option<LogFormat>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

fn parse_environment_name(name: &str) -> std::result::Result<String, String> {
    validate_environment_name(name)
        .map(|()| name.to_string())
        .map_err(|e| e.to_string())
}

impl Cli {
    pub async fn dispatch(self) -> Result<()> {
        let log_format = self.log_format.map(|format| match format {
            LogFormat::Text => "text",
            LogFormat::Json => "json",
        });
        let verbosity = Verbosity::from_flags(self.verbose, self.debug);
        logging::init(log_format, verbosity)?;
        tracing::debug!("CLI initialized with verbosity: {:?}", verbosity);

        let Some(command) = self.command else {
            println!("Composer local development CLI");
            println!("Run 'composer-dev --help' to see available commands.");
            return Ok(());
        };

        match command {
            Commands::Create {
                from_source_environment,
                from_image_version,
                project,
                location,
                web_server_port,
                dags_path,
                environment,
            } => {
                use crate::commands::create::{execute_create, CreateArgs, EnvironmentSource};

                let source = match (from_source_environment, from_image_version) {
                    (Some(remote), _) => EnvironmentSource::RemoteEnvironment(remote),
                    (None, Some(version)) => EnvironmentSource::ImageVersion(version),
                    (None, None) => {
                        return Err(commands::shared::UsageError(
                            "Missing source of the environment. Provide either --from-source-environment or --from-image-version option.".to_string(),
                        )
                        .into())
                    }
                };
                execute_create(CreateArgs {
                    source,
                    project,
                    location,
                    port: web_server_port,
                    dags_path,
                    environment,
                })
                .await
            }
            Commands::Start {
                environment,
                web_server_port,
            } => commands::lifecycle::execute_start(environment, web_server_port).await,
            Commands::Stop { environment } => commands::lifecycle::execute_stop(environment).await,
            Commands::Restart {
                environment,
                web_server_port,
            } => commands::lifecycle::execute_restart(environment, web_server_port).await,
            Commands::Logs {
                environment,
                follow,
                max_lines,
            } => commands::logs::execute_logs(environment, follow, max_lines).await,
            Commands::List => commands::list::execute_list().await,
            Commands::Describe { environment } => {
                commands::describe::execute_describe(environment).await
            }
            Commands::Remove {
                environment,
                force,
                skip_confirmation,
            } => commands::remove::execute_remove(environment, force, skip_confirmation).await,
            Commands::RunAirflowCmd {
                environment,
                command,
            } => commands::run_airflow_cmd::execute_run_airflow_cmd(environment, command).await,
            Commands::ListAvailableVersions {
                project,
                location,
                include_past_releases,
                limit,
            } => {
                use crate::commands::versions::{execute_list_available_versions, VersionsArgs};

                execute_list_available_versions(VersionsArgs {
                    project,
                    location,
                    include_past_releases,
                    limit,
                })
                .await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_global_flags_default_values() {
        let cli = Cli::parse_from(["composer-dev"]);
        assert!(!cli.verbose);
        assert!(!cli.debug);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_create_requires_exactly_one_source() {
        assert!(Cli::try_parse_from(["composer-dev", "create", "local"]).is_err());
        assert!(Cli::try_parse_from([
            "composer-dev",
            "create",
            "--from-image-version",
            "composer-2.0.8-airflow-2.2.3",
            "--from-source-environment",
            "remote",
            "local",
        ])
        .is_err());

        let cli = Cli::try_parse_from([
            "composer-dev",
            "create",
            "--from-image-version",
            "composer-2.0.8-airflow-2.2.3",
            "--port",
            "8081",
            "local",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Create {
                from_image_version,
                web_server_port,
                location,
                environment,
                ..
            }) => {
                assert_eq!(from_image_version.as_deref(), Some("composer-2.0.8-airflow-2.2.3"));
                assert_eq!(web_server_port, Some(8081));
                assert_eq!(location, "us-central1");
                assert_eq!(environment, "local");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_create_validates_environment_name() {
        let err = Cli::try_parse_from([
            "composer-dev",
            "create",
            "--from-image-version",
            "composer-2.0.8-airflow-2.2.3",
            "ab",
        ])
        .unwrap_err();
        assert!(err.to_string().contains("is too short"));

        assert!(Cli::try_parse_from([
            "composer-dev",
            "create",
            "--from-image-version",
            "composer-2.0.8-airflow-2.2.3",
            "bad name",
        ])
        .is_err());
    }

    #[test]
    fn test_port_range() {
        assert!(Cli::try_parse_from(["composer-dev", "start", "--port", "65536"]).is_ok());
        assert!(Cli::try_parse_from(["composer-dev", "start", "--port", "65537"]).is_err());
        assert!(Cli::try_parse_from(["composer-dev", "start", "--web-server-port", "-1"]).is_err());
    }

    #[test]
    fn test_logs_max_lines() {
        let cli = Cli::parse_from(["composer-dev", "logs"]);
        assert!(matches!(
            cli.command,
            Some(Commands::Logs {
                max_lines: MaxLines::All,
                follow: false,
                ..
            })
        ));

        let cli = Cli::parse_from(["composer-dev", "logs", "dev", "-f", "-l", "25"]);
        assert!(matches!(
            cli.command,
            Some(Commands::Logs {
                max_lines: MaxLines::Count(25),
                follow: true,
                ..
            })
        ));

        assert!(Cli::try_parse_from(["composer-dev", "logs", "--max-lines", "0"]).is_err());
        assert!(Cli::try_parse_from(["composer-dev", "logs", "--max-lines", "some"]).is_err());
    }

    #[test]
    fn test_run_airflow_cmd_keeps_hyphenated_args() {
        let cli =
            Cli::parse_from(["composer-dev", "run-airflow-cmd", "dev", "dags", "list", "-o", "json"]);
        match cli.command {
            Some(Commands::RunAirflowCmd {
                environment,
                command,
            }) => {
                assert_eq!(environment, "dev");
                assert_eq!(command, vec!["dags", "list", "-o", "json"]);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_list_available_versions_defaults() {
        let cli = Cli::parse_from(["composer-dev", "list-available-versions", "-p", "proj"]);
        match cli.command {
            Some(Commands::ListAvailableVersions {
                project,
                location,
                include_past_releases,
                limit,
            }) => {
                assert_eq!(project.as_deref(), Some("proj"));
                assert_eq!(location, "us-central1");
                assert!(!include_past_releases);
                assert_eq!(limit, 10);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
