//! Create command implementation
//!
//! Implements `composer-dev create`, which writes a new environment directory
//! from either a Composer image version or the software configuration of a
//! running Cloud Composer environment.

use crate::commands::shared::{
    composer_dir, confirm_or_abort, environment_context, google_api, resolve_project_id,
};
use anyhow::Result;
use composer_dev_core::docker::ContainerRuntime;
use composer_dev_core::environment::{Environment, EnvironmentSettings};
use composer_dev_core::remote::{ComposerApiClient, SnapshotFetcher};
use std::path::PathBuf;
use tracing::{debug, info, instrument};

/// Where the new environment takes its image version and packages from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvironmentSource {
    /// `--from-image-version`
    ImageVersion(String),
    /// `--from-source-environment`
    RemoteEnvironment(String),
}

/// Create command arguments
#[derive(Debug, Clone)]
pub struct CreateArgs {
    pub source: EnvironmentSource,
    pub project: Option<String>,
    pub location: String,
    pub port: Option<u32>,
    pub dags_path: Option<PathBuf>,
    /// Already validated by the argument parser
    pub environment: String,
}

#[instrument(skip(args), fields(environment = %args.environment))]
pub async fn execute_create(args: CreateArgs) -> Result<()> {
    debug!("Create args: {:?}", args);
    let project = resolve_project_id(args.project.clone()).await?;

    let env_dir = composer_dir()?.join(&args.environment);
    if env_dir.is_dir() {
        confirm_or_abort(&format!(
            "Environment '{}' already exist. Do you want to overwrite it?",
            env_dir.display()
        ))?;
        info!("Overriding already existing local environment.");
    }

    let ctx = environment_context();
    let env = match &args.source {
        EnvironmentSource::ImageVersion(image_version) => {
            let mut settings = EnvironmentSettings::new(&project, image_version, &args.location);
            settings.port = args.port;
            settings.dags_path = args.dags_path.clone();
            Environment::new(&env_dir, settings, ctx)?
        }
        EnvironmentSource::RemoteEnvironment(remote) => {
            let software_config = ComposerApiClient::new(google_api())
                .fetch(&project, &args.location, remote)
                .await?;
            Environment::from_source_environment(
                &env_dir,
                software_config,
                &project,
                &args.location,
                args.port,
                args.dags_path.clone(),
                ctx,
            )?
        }
    };

    env.create().await?;
    println!("{}", created_message(&env));
    Ok(())
}

fn created_message<R: ContainerRuntime>(env: &Environment<R>) -> String {
    format!(
        "\nCreated environment under {env_dir}.\n\
         You can now start it using following command:\n\n\
         $ composer-dev start {name}\n\n\
         You can modify generated files to change your environment settings.\n\
         Common settings are defined in {config}.\n\
         PyPi extra packages are listed in {requirements}.\n\
         Airflow overrides and environment variables are stored in {variables}.\n\n\
         You can put your plugins and data to plugins and data directories\n\
         available at {env_dir}.\n\
         DAGs can be updated at {dags} path.\n\n\
         To apply changes done to environment config and PyPI dependencies\n\
         restart environment using following command:\n\n\
         $ composer-dev restart {name}\n",
        env_dir = env.env_dir().display(),
        name = env.name(),
        config = env.config_path().display(),
        requirements = env.requirements_path().display(),
        variables = env.variables_path().display(),
        dags = env.dags_path().display(),
    )
}
