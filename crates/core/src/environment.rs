//! Local environment lifecycle
//!
//! An [`Environment`] is one directory under `./composer/<name>` backed by
//! exactly one container named `composer-local-dev-<name>`. States move
//! `absent -> created -> running -> (stopped | removed)`; created and running
//! containers both count as active while waiting for readiness.
//!
//! Engine, registry, host and clock access are injected through
//! [`EnvironmentContext`] so the lifecycle runs against in-memory fakes in
//! tests.

use crate::clock::{Clock, SystemClock};
use crate::config::{EnvironmentConfig, DEFAULT_DAG_DIR_LIST_INTERVAL, DEFAULT_PORT};
use crate::container::{
    compute_env_vars, container_name, ContainerSpec, ContainerState, MEMORY_LIMIT,
};
use crate::docker::{ContainerInfo, ContainerRuntime, LogStream, LogsOptions, MaxLines};
use crate::errors::{
    ComposerError, ConfigError, DockerError, ErrorKind, Result, MOUNT_TROUBLESHOOTING_URL,
};
use crate::files::{self, REQUIREMENTS_FILE};
use crate::mount::{compute_mounts, AIRFLOW_DB_FILE, AIRFLOW_HOME};
use crate::platform::HostEnvironment;
use crate::ports::{compute_ports, host_port_for, CONTAINER_WEB_PORT};
use crate::registry::{assert_image_exists, ImageRegistry};
use crate::remote::SoftwareConfig;
use crate::variables::{self, EnvVars, VARIABLES_FILE};
use crate::version::ParsedImageVersion;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, info_span, warn, Instrument, Span};

/// Log line printed by the Airflow scheduler once it is up
pub const READINESS_MARKER: &str = "Searching for files";

/// Upper bound on waiting for [`READINESS_MARKER`]
pub const START_TIMEOUT: Duration = Duration::from_secs(300);

/// Status reported for environments without a container
pub const NOT_STARTED_STATUS: &str = "Not started";

/// Status listed for environments whose configuration cannot be loaded
pub const UNPARSABLE_CONFIG_STATUS: &str = "Could not parse the config";

/// Image version listed for environments whose configuration cannot be loaded
pub const UNKNOWN_IMAGE_VERSION: &str = "x";

const ENTRYPOINT_SCRIPT: &str = include_str!("../assets/entrypoint.sh");
const ENTRYPOINT_FILE_NAME: &str = "entrypoint.sh";
const AIRFLOW_COMMAND: &str = "airflow";

/// Callback receiving container log lines while an environment starts
pub type LogObserver = Arc<dyn Fn(&str) + Send + Sync>;

/// Capabilities an environment needs from the outside world
#[derive(Debug, Clone)]
pub struct EnvironmentContext<R> {
    pub runtime: R,
    pub registry: Arc<dyn ImageRegistry>,
    pub host: Arc<dyn HostEnvironment>,
    pub clock: Arc<dyn Clock>,
}

impl<R> EnvironmentContext<R> {
    pub fn new(runtime: R, registry: Arc<dyn ImageRegistry>, host: Arc<dyn HostEnvironment>) -> Self {
        Self {
            runtime,
            registry,
            host,
            clock: Arc::new(SystemClock::new()),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

/// Parameters of an environment that are not derived from its directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentSettings {
    pub project_id: String,
    pub image_version: String,
    pub location: String,
    /// Defaults to `<env_dir>/dags`
    pub dags_path: Option<PathBuf>,
    pub dag_dir_list_interval: u32,
    /// Defaults to [`DEFAULT_PORT`]
    pub port: Option<u32>,
    /// Package name to version specifier (`==1.2.0`)
    pub pypi_packages: BTreeMap<String, String>,
    pub env_vars: EnvVars,
}

impl EnvironmentSettings {
    pub fn new(
        project_id: impl Into<String>,
        image_version: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            image_version: image_version.into(),
            location: location.into(),
            dags_path: None,
            dag_dir_list_interval: DEFAULT_DAG_DIR_LIST_INTERVAL,
            port: None,
            pypi_packages: BTreeMap::new(),
            env_vars: EnvVars::new(),
        }
    }
}

/// Output of [`Environment::logs`]
#[derive(Debug)]
pub enum LogOutput {
    /// Live stream, ends only when the container stops or the caller drops it
    Stream(LogStream),
    /// Trailing lines as one block
    Text(String),
}

/// Snapshot of an environment for `describe`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentDescription {
    pub name: String,
    pub status: String,
    /// Only set while the container is running
    pub web_url: Option<String>,
    pub image_version: String,
    pub dags_path: PathBuf,
    pub gcloud_path: PathBuf,
}

/// One row of `list`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentStatus {
    pub name: String,
    pub image_version: String,
    pub status: String,
}

/// A local Composer environment
pub struct Environment<R: ContainerRuntime> {
    name: String,
    env_dir: PathBuf,
    container_name: String,
    project_id: String,
    image_version: String,
    image: ParsedImageVersion,
    location: String,
    dags_path: PathBuf,
    dag_dir_list_interval: u32,
    port: u32,
    pypi_packages: BTreeMap<String, String>,
    env_vars: EnvVars,
    ctx: EnvironmentContext<R>,
    span: Span,
    log_observer: Option<LogObserver>,
}

impl<R: ContainerRuntime> fmt::Debug for Environment<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("name", &self.name)
            .field("env_dir", &self.env_dir)
            .field("image_version", &self.image_version)
            .field("dags_path", &self.dags_path)
            .field("port", &self.port)
            .finish_non_exhaustive()
    }
}

impl<R: ContainerRuntime> Environment<R> {
    pub fn new(env_dir: &Path, settings: EnvironmentSettings, ctx: EnvironmentContext<R>) -> Result<Self> {
        let name = env_dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| ComposerError::Internal {
                message: format!("'{}' does not name an environment directory", env_dir.display()),
            })?;
        let image = ParsedImageVersion::parse(&settings.image_version)?;
        let dags_path = files::resolve_dags_path(settings.dags_path.as_deref(), env_dir)?;
        let span = info_span!("environment", env = %name);

        Ok(Self {
            container_name: container_name(&name),
            name,
            env_dir: env_dir.to_path_buf(),
            project_id: settings.project_id,
            image_version: settings.image_version,
            image,
            location: settings.location,
            dags_path,
            dag_dir_list_interval: settings.dag_dir_list_interval,
            port: settings.port.unwrap_or(DEFAULT_PORT),
            pypi_packages: settings.pypi_packages,
            env_vars: settings.env_vars,
            ctx,
            span,
            log_observer: None,
        })
    }

    /// Load an environment from its `config.json` and `variables.env`
    pub fn load_from_config(
        env_dir: &Path,
        port_override: Option<u32>,
        ctx: EnvironmentContext<R>,
    ) -> Result<Self> {
        let config = EnvironmentConfig::load(env_dir, port_override)?;
        let env_vars =
            variables::filter_blocked(variables::load_from_file(&env_dir.join(VARIABLES_FILE))?);

        let settings = EnvironmentSettings {
            project_id: config.project_id,
            image_version: config.image_version,
            location: config.location,
            dags_path: Some(PathBuf::from(config.dags_path)),
            dag_dir_list_interval: config.dag_dir_list_interval,
            port: Some(config.port),
            pypi_packages: BTreeMap::new(),
            env_vars,
        };
        Self::new(env_dir, settings, ctx)
    }

    /// Template a new environment on a remote environment's software configuration.
    ///
    /// Remote environment variables are carried over as keys only; their
    /// values are never written locally.
    pub fn from_source_environment(
        env_dir: &Path,
        software_config: SoftwareConfig,
        project_id: &str,
        location: &str,
        port: Option<u32>,
        dags_path: Option<PathBuf>,
        ctx: EnvironmentContext<R>,
    ) -> Result<Self> {
        let env_keys: EnvVars = software_config
            .env_variables
            .keys()
            .map(|key| (key.clone(), String::new()))
            .collect();
        let env_vars = variables::merge_remote_overrides(
            env_keys,
            &software_config.airflow_config_overrides,
        );

        let settings = EnvironmentSettings {
            project_id: project_id.to_string(),
            image_version: software_config.image_version,
            location: location.to_string(),
            dags_path,
            dag_dir_list_interval: DEFAULT_DAG_DIR_LIST_INTERVAL,
            port,
            pypi_packages: software_config.pypi_packages,
            env_vars,
        };
        Self::new(env_dir, settings, ctx)
    }

    /// Forward container log lines seen while waiting for readiness
    pub fn with_log_observer(mut self, observer: LogObserver) -> Self {
        self.log_observer = Some(observer);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn env_dir(&self) -> &Path {
        &self.env_dir
    }

    pub fn container_name(&self) -> &str {
        &self.container_name
    }

    pub fn image_version(&self) -> &str {
        &self.image_version
    }

    pub fn dags_path(&self) -> &Path {
        &self.dags_path
    }

    pub fn port(&self) -> u32 {
        self.port
    }

    pub fn env_vars(&self) -> &EnvVars {
        &self.env_vars
    }

    pub fn pypi_packages(&self) -> &BTreeMap<String, String> {
        &self.pypi_packages
    }

    pub fn config_path(&self) -> PathBuf {
        self.env_dir.join(crate::config::CONFIG_FILE)
    }

    pub fn requirements_path(&self) -> PathBuf {
        self.env_dir.join(REQUIREMENTS_FILE)
    }

    pub fn variables_path(&self) -> PathBuf {
        self.env_dir.join(VARIABLES_FILE)
    }

    fn airflow_db_path(&self) -> PathBuf {
        self.env_dir.join(AIRFLOW_DB_FILE)
    }

    /// Configuration as persisted to `config.json`
    pub fn config(&self) -> EnvironmentConfig {
        EnvironmentConfig {
            image_version: self.image_version.clone(),
            location: self.location.clone(),
            project_id: self.project_id.clone(),
            dags_path: self.dags_path.display().to_string(),
            dag_dir_list_interval: self.dag_dir_list_interval,
            port: self.port,
        }
    }

    /// Write the environment directory: subdirectories, empty database,
    /// `config.json`, `requirements.txt` and `variables.env`.
    ///
    /// Overwrite confirmation for an existing directory is the caller's job.
    pub async fn create(&self) -> Result<()> {
        async {
            assert_image_exists(self.ctx.registry.as_ref(), &self.image_version).await?;
            files::create_environment_directories(&self.env_dir, &self.dags_path)?;
            files::create_empty_file(&self.airflow_db_path(), true)?;
            self.config().persist(&self.env_dir)?;

            std::fs::write(
                self.requirements_path(),
                variables::render_requirements(&self.pypi_packages),
            )?;
            // keys only; values stay out of the environment directory
            std::fs::write(
                self.variables_path(),
                variables::render_placeholders(&self.env_vars),
            )?;
            info!("Created environment under {}", self.env_dir.display());
            Ok::<(), ComposerError>(())
        }
        .instrument(self.span.clone())
        .await
    }

    /// Create the container if needed, start it and wait until Airflow is ready.
    pub async fn start(&self, assert_not_running: bool) -> Result<()> {
        async {
            self.ctx.runtime.ping().await?;
            assert_image_exists(self.ctx.registry.as_ref(), &self.image_version).await?;
            files::assert_requirements_exist(&self.env_dir)?;
            files::assert_dags_path_exists(&self.dags_path)?;

            let requirements = self.requirements_path();
            let airflow_db = self.airflow_db_path();
            files::create_empty_file(&airflow_db, true)?;
            files::fix_file_permissions(self.ctx.host.as_ref(), &[&requirements, &airflow_db])?;
            files::dos2unix_file(&requirements)?;

            let container = self.get_or_create_container().await?;
            if assert_not_running && container.state.is_running() {
                return Err(ComposerError::AlreadyRunning {
                    name: self.name.clone(),
                });
            }

            if let Err(err) = self.ctx.runtime.start_container(&self.container_name).await {
                debug!("Starting environment failed: {}", err);
                return Err(match err {
                    ComposerError::Docker(docker_err) if docker_err.is_port_already_allocated() => {
                        self.ctx.runtime.remove_container(&self.container_name).await?;
                        ComposerError::PortInUse { port: self.port }
                    }
                    ComposerError::Docker(DockerError::NotInstalled) => DockerError::NotInstalled.into(),
                    other => ComposerError::start_failed(format!(
                        "Environment failed to start with an error: {}",
                        other
                    )),
                });
            }

            self.wait_for_start().await?;
            info!(
                "Started {} environment, Airflow available at http://localhost:{}",
                self.name, self.port
            );
            Ok::<(), ComposerError>(())
        }
        .instrument(self.span.clone())
        .await
    }

    /// Existing container, or a freshly created one with the entrypoint copied in
    pub async fn get_or_create_container(&self) -> Result<ContainerInfo> {
        if let Some(container) = self.get_container().await? {
            debug!("Reusing container {} ({})", container.name, container.state);
            return Ok(container);
        }
        self.create_container().await
    }

    async fn create_container(&self) -> Result<ContainerInfo> {
        let spec = self.container_spec()?;
        match self.create_once(&spec).await {
            Err(ComposerError::Docker(DockerError::ImageNotFound { .. })) => {
                debug!("Image {} missing locally, pulling", spec.image);
                self.pull_image().await?;
                self.create_once(&spec).await.map_err(|err| match err {
                    ComposerError::Docker(DockerError::ImageNotFound { .. }) => {
                        ComposerError::ImageNotFound {
                            image_version: self.image_version.clone(),
                        }
                    }
                    other => other,
                })?;
            }
            other => {
                other?;
            }
        }

        self.ctx
            .runtime
            .copy_archive(&self.container_name, AIRFLOW_HOME, entrypoint_archive()?)
            .await?;

        self.get_container().await?.ok_or_else(|| ComposerError::Internal {
            message: format!("container {} vanished after creation", self.container_name),
        })
    }

    async fn create_once(&self, spec: &ContainerSpec) -> Result<String> {
        match self.ctx.runtime.create_container(spec).await {
            Ok(id) => {
                debug!("Created container {} ({})", spec.name, id);
                Ok(id)
            }
            Err(ComposerError::Docker(DockerError::NameConflict { .. })) => {
                Err(ComposerError::AlreadyRunning {
                    name: self.name.clone(),
                })
            }
            Err(ComposerError::Docker(err @ DockerError::Api { .. })) => {
                let mut message = format!("Failed to create container with an error: {}", err);
                if err.is_mount_permission_error() {
                    message.push_str(&format!(
                        "\nPossible reason is that composer-dev was installed in the path that is not available to Docker. See {} for more information.",
                        MOUNT_TROUBLESHOOTING_URL
                    ));
                }
                Err(ComposerError::start_failed(message))
            }
            Err(other) => Err(other),
        }
    }

    async fn pull_image(&self) -> Result<()> {
        let image = self.image.docker_image_ref();
        info!("Pulling image {}", image);
        self.ctx
            .runtime
            .pull_image(&image)
            .await
            .map_err(|err| match err {
                ComposerError::Docker(DockerError::ImageNotFound { .. }) => {
                    ComposerError::ImageNotFound {
                        image_version: self.image_version.clone(),
                    }
                }
                other => other,
            })
    }

    /// Full `docker create` request for this environment
    pub fn container_spec(&self) -> Result<ContainerSpec> {
        let host = self.ctx.host.as_ref();
        let gcloud_config_path = host.gcloud_config_path()?;
        let env = compute_env_vars(
            self.dag_dir_list_interval,
            &self.project_id,
            &self.env_vars,
            host,
        )?;

        Ok(ContainerSpec {
            name: self.container_name.clone(),
            image: self.image.docker_image_ref(),
            entrypoint: ContainerSpec::default_entrypoint(),
            env,
            mounts: compute_mounts(
                &self.env_dir,
                &self.dags_path,
                &gcloud_config_path,
                &self.requirements_path(),
            ),
            ports: compute_ports(self.port),
            memory_limit: MEMORY_LIMIT.to_string(),
        })
    }

    async fn get_container(&self) -> Result<Option<ContainerInfo>> {
        self.ctx.runtime.inspect_container(&self.container_name).await
    }

    async fn require_container(&self) -> Result<ContainerInfo> {
        self.get_container().await?.ok_or_else(|| ComposerError::NotRunning {
            name: self.name.clone(),
        })
    }

    async fn assert_container_is_active(&self) -> Result<()> {
        match self.get_container().await? {
            Some(container) if container.state.is_active() => Ok(()),
            Some(container) => {
                debug!("Container left the active states: {}", container.state);
                Err(ComposerError::StartFailed { message: None })
            }
            None => Err(ComposerError::StartFailed { message: None }),
        }
    }

    /// Follow the container logs until the scheduler reports readiness.
    ///
    /// Fails when the container stops being active, when [`START_TIMEOUT`]
    /// elapses, or when the log stream ends first.
    pub async fn wait_for_start(&self) -> Result<()> {
        let clock = self.ctx.clock.as_ref();
        let started_at = clock.now();

        self.assert_container_is_active().await?;
        let mut stream = self
            .ctx
            .runtime
            .logs(
                &self.container_name,
                LogsOptions {
                    follow: true,
                    tail: MaxLines::All,
                    timestamps: true,
                },
            )
            .await?;

        loop {
            let elapsed = clock.now().saturating_sub(started_at);
            let remaining = START_TIMEOUT.saturating_sub(elapsed);
            let line = match tokio::time::timeout(remaining, stream.next_line()).await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(_) => return Err(start_timeout()),
            };
            let line = line.trim();
            if let Some(observer) = &self.log_observer {
                observer(line);
            }

            if line.contains(READINESS_MARKER) {
                let duration = clock.now().saturating_sub(started_at);
                info!("Environment started in {:.2} seconds", duration.as_secs_f64());
                return Ok(());
            }
            if clock.now().saturating_sub(started_at) >= START_TIMEOUT {
                return Err(start_timeout());
            }
            self.assert_container_is_active().await?;
        }

        Err(ComposerError::StartFailed { message: None })
    }

    /// Stop the container, optionally removing it afterwards
    pub async fn stop(&self, remove_container: bool) -> Result<()> {
        async {
            self.require_container().await?;
            info!("Stopping composer local environment");
            self.ctx.runtime.stop_container(&self.container_name).await?;
            if remove_container {
                self.ctx.runtime.remove_container(&self.container_name).await?;
            }
            Ok::<(), ComposerError>(())
        }
        .instrument(self.span.clone())
        .await
    }

    /// Recreate the container and start it again
    pub async fn restart(&self) -> Result<()> {
        match self.stop(true).await {
            Ok(()) | Err(ComposerError::NotRunning { .. }) => {}
            Err(err) => return Err(err),
        }
        self.start(false).await
    }

    /// Engine-reported container status, or [`NOT_STARTED_STATUS`]
    pub async fn status(&self) -> Result<String> {
        Ok(match self.get_container().await? {
            Some(container) => container.state.to_string(),
            None => NOT_STARTED_STATUS.to_string(),
        })
    }

    /// Run `airflow <argv...>` inside the running container
    pub async fn run_command(&self, argv: &[String]) -> Result<String> {
        async {
            let container = self.require_container().await?;
            if !container.state.is_running() {
                return Err(ComposerError::NotRunning {
                    name: self.name.clone(),
                });
            }

            let mut command = Vec::with_capacity(argv.len() + 1);
            command.push(AIRFLOW_COMMAND.to_string());
            command.extend(argv.iter().cloned());
            debug!("Running {:?}", command);

            let result = self.ctx.runtime.exec(&self.container_name, &command).await?;
            if !result.success() {
                warn!("Command exited with code {}", result.exit_code);
            }
            Ok::<String, ComposerError>(format!("{}{}", result.stdout, result.stderr))
        }
        .instrument(self.span.clone())
        .await
    }

    /// Container logs with timestamps
    pub async fn logs(&self, follow: bool, max_lines: MaxLines) -> Result<LogOutput> {
        self.require_container().await?;
        let stream = self
            .ctx
            .runtime
            .logs(
                &self.container_name,
                LogsOptions {
                    follow,
                    tail: max_lines,
                    timestamps: true,
                },
            )
            .await?;
        if follow {
            debug!("Printing previous {} lines and following container logs", max_lines);
            Ok(LogOutput::Stream(stream))
        } else {
            debug!("Printing previous {} lines from container logs", max_lines);
            Ok(LogOutput::Text(stream.collect_text().await))
        }
    }

    /// Host port bound to the webserver, falling back to the configured port
    pub async fn host_port(&self) -> u32 {
        let bound = match self.get_container().await {
            Ok(Some(container)) => host_port_for(&container.port_mappings, CONTAINER_WEB_PORT),
            Ok(None) => None,
            Err(err) => {
                debug!("Failed to inspect container: {}", err);
                None
            }
        };
        bound.unwrap_or_else(|| {
            warn!("Failed to retrieve used port from the Docker daemon, using port from the environment configuration.");
            self.port
        })
    }

    pub async fn describe(&self) -> Result<EnvironmentDescription> {
        let status = self.status().await?;
        let web_url = if status == ContainerState::Running.as_str() {
            Some(format!("http://localhost:{}", self.host_port().await))
        } else {
            None
        };
        Ok(EnvironmentDescription {
            name: self.name.clone(),
            status,
            web_url,
            image_version: self.image_version.clone(),
            dags_path: self.dags_path.clone(),
            gcloud_path: self.ctx.host.gcloud_config_path()?,
        })
    }

    /// Image version of the container when it exists and is tagged, otherwise the configured one
    pub async fn current_image_version(&self) -> Result<String> {
        let Some(container) = self.get_container().await? else {
            debug!(
                "Environment {} container does not exist. Using image version from the configuration file.",
                self.name
            );
            return Ok(self.image_version.clone());
        };
        match ParsedImageVersion::from_image_tag(&container.image) {
            Ok(parsed) => Ok(parsed.image_version()),
            Err(_) => {
                warn!(
                    "Failed to read image version from the container tag for {} environment. Using image version from the configuration file.",
                    self.name
                );
                Ok(self.image_version.clone())
            }
        }
    }
}

impl<R: ContainerRuntime + Clone> Environment<R> {
    /// Delete an environment directory, stopping and removing its container first.
    ///
    /// A running container requires `force`. A configuration that cannot be
    /// loaded does not block removal; the container is then left alone.
    pub async fn remove(env_dir: &Path, force: bool, ctx: EnvironmentContext<R>) -> Result<()> {
        match Self::load_from_config(env_dir, None, ctx) {
            Ok(env) => {
                if let Some(container) = env.get_container().await? {
                    if container.state.is_running() {
                        if !force {
                            return Err(ComposerError::ForceRequired {
                                name: env.name.clone(),
                            });
                        }
                        warn!("The environment is running. Killing the container...");
                        env.ctx.runtime.stop_container(&env.container_name).await?;
                    }
                    env.ctx.runtime.remove_container(&env.container_name).await?;
                }
            }
            Err(err) if is_config_load_failure(&err) => {
                warn!(
                    "Failed to load environment configuration ({}). Environment Docker container could not be removed.",
                    err
                );
            }
            Err(err) => return Err(err),
        }

        info!("Removing {}", env_dir.display());
        std::fs::remove_dir_all(env_dir)?;
        Ok(())
    }
}

/// Name, image version and status of every environment under `composer_dir`
pub async fn list_environments<R>(
    composer_dir: &Path,
    ctx: &EnvironmentContext<R>,
) -> Result<Vec<EnvironmentStatus>>
where
    R: ContainerRuntime + Clone,
{
    let mut statuses = Vec::new();
    let mut engine_checked = false;
    for env_dir in files::environment_directories(composer_dir)? {
        let name = env_dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        let (image_version, status) = match Environment::load_from_config(&env_dir, None, ctx.clone()) {
            Ok(env) => {
                if !engine_checked {
                    ctx.runtime.ping().await?;
                    engine_checked = true;
                }
                let status = env.status().await?;
                (env.current_image_version().await?, status)
            }
            Err(err) if is_config_load_failure(&err) => {
                debug!("Failed to load {}: {}", env_dir.display(), err);
                (
                    UNKNOWN_IMAGE_VERSION.to_string(),
                    UNPARSABLE_CONFIG_STATUS.to_string(),
                )
            }
            Err(err) => return Err(err),
        };

        statuses.push(EnvironmentStatus {
            name,
            image_version,
            status: capitalize(&status),
        });
    }
    Ok(statuses)
}

/// Errors that mean the environment directory itself is malformed
fn is_config_load_failure(err: &ComposerError) -> bool {
    err.kind() == ErrorKind::InvalidConfiguration
        || matches!(
            err,
            ComposerError::Config(ConfigError::NotFound { .. })
                | ComposerError::Config(ConfigError::VariablesNotFound { .. })
        )
}

fn start_timeout() -> ComposerError {
    ComposerError::StartTimeout {
        seconds: START_TIMEOUT.as_secs(),
    }
}

/// Upper-case first character, lower-case the rest
fn capitalize(status: &str) -> String {
    let mut chars = status.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Tar archive holding the entrypoint script, executable
fn entrypoint_archive() -> Result<Vec<u8>> {
    let script = ENTRYPOINT_SCRIPT.as_bytes();
    let mut header = tar::Header::new_gnu();
    header.set_path(ENTRYPOINT_FILE_NAME)?;
    header.set_size(script.len() as u64);
    header.set_mode(0o755);
    header.set_mtime(0);
    header.set_cksum();

    let mut builder = tar::Builder::new(Vec::new());
    builder.append(&header, script)?;
    Ok(builder.into_inner()?)
}
