//! Container runtime capability
//!
//! The lifecycle only talks to the engine through [`ContainerRuntime`].
//! [`CliRuntime`] drives the `docker` CLI; [`mock::MockRuntime`] keeps
//! containers in memory for tests.

use crate::container::{ContainerSpec, ContainerState};
use crate::errors::{ComposerError, ConfigError, DockerError, Result};
use crate::platform::Platform;
use crate::ports::{parse_port_mappings, PortMapping};
use std::fmt;
use std::io::Write;
use std::process::{Command, Output, Stdio};
use std::str::FromStr;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, instrument};

/// Overrides the docker binary used by [`CliRuntime`]
pub const DOCKER_PATH_ENV: &str = "COMPOSER_DEV_DOCKER";

/// Container details the lifecycle needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerInfo {
    pub id: String,
    pub name: String,
    /// Image reference the container was created from
    pub image: String,
    pub state: ContainerState,
    pub port_mappings: Vec<PortMapping>,
}

/// Result of executing a command in a container
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ExecResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// How many trailing log lines to return
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaxLines {
    All,
    Count(u32),
}

impl FromStr for MaxLines {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if s == "all" {
            return Ok(MaxLines::All);
        }
        match s.parse::<u32>() {
            Ok(n) if n > 0 => Ok(MaxLines::Count(n)),
            _ => Err(ConfigError::InvalidMaxLines {
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for MaxLines {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaxLines::All => write!(f, "all"),
            MaxLines::Count(n) => write!(f, "{}", n),
        }
    }
}

/// Options for reading container logs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogsOptions {
    pub follow: bool,
    pub tail: MaxLines,
    pub timestamps: bool,
}

/// Decoded container log lines, in arrival order
///
/// Backed by a channel so the same type serves a live `docker logs` process
/// and a fixed list of lines.
#[derive(Debug)]
pub struct LogStream {
    lines: mpsc::UnboundedReceiver<String>,
    // keeps the producing process alive; killed on drop
    _child: Option<tokio::process::Child>,
}

impl LogStream {
    pub fn from_lines<I>(lines: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        for line in lines {
            let _ = tx.send(line.into());
        }
        Self {
            lines: rx,
            _child: None,
        }
    }

    /// Next line, or `None` once the source is exhausted
    pub async fn next_line(&mut self) -> Option<String> {
        self.lines.recv().await
    }

    /// Drain the stream into one newline-joined block
    pub async fn collect_text(mut self) -> String {
        let mut lines = Vec::new();
        while let Some(line) = self.next_line().await {
            lines.push(line);
        }
        lines.join("\n")
    }
}

/// Container engine operations used by the environment lifecycle
#[allow(async_fn_in_trait)]
pub trait ContainerRuntime {
    /// Health check for engine availability
    async fn ping(&self) -> Result<()>;

    /// Look a container up by name; `None` when absent
    async fn inspect_container(&self, name: &str) -> Result<Option<ContainerInfo>>;

    /// Create (not start) a container, returning its id
    async fn create_container(&self, spec: &ContainerSpec) -> Result<String>;

    /// Extract a tar archive into `dest_dir` inside the container
    async fn copy_archive(&self, name: &str, dest_dir: &str, archive: Vec<u8>) -> Result<()>;

    async fn start_container(&self, name: &str) -> Result<()>;

    async fn stop_container(&self, name: &str) -> Result<()>;

    async fn remove_container(&self, name: &str) -> Result<()>;

    /// Run a command in a running container and capture its output
    async fn exec(&self, name: &str, argv: &[String]) -> Result<ExecResult>;

    async fn logs(&self, name: &str, options: LogsOptions) -> Result<LogStream>;

    async fn pull_image(&self, image: &str) -> Result<()>;
}

/// Docker CLI-based runtime
#[derive(Debug, Clone)]
pub struct CliRuntime {
    docker_path: String,
    platform: Platform,
}

impl CliRuntime {
    /// Runtime using `docker` from `PATH`, or [`DOCKER_PATH_ENV`] when set
    pub fn docker() -> Self {
        let docker_path = std::env::var(DOCKER_PATH_ENV).unwrap_or_else(|_| "docker".to_string());
        Self::with_path(docker_path)
    }

    pub fn with_path(docker_path: impl Into<String>) -> Self {
        Self {
            docker_path: docker_path.into(),
            platform: Platform::detect(),
        }
    }

    async fn run(&self, args: Vec<String>, stdin: Option<Vec<u8>>) -> Result<Output> {
        let docker_path = self.docker_path.clone();
        tokio::task::spawn_blocking(move || execute_docker(&docker_path, &args, stdin))
            .await
            .map_err(|e| DockerError::CLIError(format!("Task join error: {}", e)))?
            .map_err(Into::into)
    }

    /// Run a command that must succeed
    async fn run_checked(&self, args: Vec<String>, stdin: Option<Vec<u8>>) -> Result<String> {
        let output = self.run(args, stdin).await?;
        if !output.status.success() {
            return Err(classify_error(&String::from_utf8_lossy(&output.stderr)).into());
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn parse_container_inspect(json_output: &str) -> Result<Option<ContainerInfo>> {
        let value: serde_json::Value = serde_json::from_str(json_output)
            .map_err(|e| DockerError::CLIError(format!("Failed to parse inspect output: {}", e)))?;
        let Some(container) = value.as_array().and_then(|a| a.first()) else {
            return Ok(None);
        };

        let field = |pointer: &str| {
            container
                .pointer(pointer)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string()
        };

        Ok(Some(ContainerInfo {
            id: field("/Id"),
            name: field("/Name").trim_start_matches('/').to_string(),
            image: field("/Config/Image"),
            state: ContainerState::parse(&field("/State/Status")),
            port_mappings: parse_port_mappings(container),
        }))
    }
}

impl Default for CliRuntime {
    fn default() -> Self {
        Self::docker()
    }
}

fn execute_docker(
    docker_path: &str,
    args: &[String],
    stdin: Option<Vec<u8>>,
) -> std::result::Result<Output, DockerError> {
    debug!("Executing: {} {}", docker_path, args.join(" "));

    let spawn_error = |e: std::io::Error| {
        if e.kind() == std::io::ErrorKind::NotFound {
            DockerError::NotInstalled
        } else {
            DockerError::CLIError(format!("Failed to execute docker: {}", e))
        }
    };

    let mut command = Command::new(docker_path);
    command
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    match stdin {
        None => command.stdin(Stdio::null()).output().map_err(spawn_error),
        Some(input) => {
            let mut child = command.stdin(Stdio::piped()).spawn().map_err(spawn_error)?;
            if let Some(mut pipe) = child.stdin.take() {
                pipe.write_all(&input)
                    .map_err(|e| DockerError::CLIError(format!("Failed to write stdin: {}", e)))?;
            }
            child
                .wait_with_output()
                .map_err(|e| DockerError::CLIError(format!("Failed to wait for docker: {}", e)))
        }
    }
}

/// Map docker CLI stderr onto engine error variants
fn classify_error(stderr: &str) -> DockerError {
    let message = stderr.trim().to_string();
    let lower = message.to_lowercase();

    if lower.contains("cannot connect to the docker daemon") || lower.contains("error during connect") {
        DockerError::NotInstalled
    } else if lower.contains("no such image") || lower.contains("manifest unknown") || lower.contains("pull access denied") {
        DockerError::ImageNotFound { image: message }
    } else if lower.contains("is already in use by container") {
        DockerError::NameConflict {
            name: String::new(),
            message,
        }
    } else {
        DockerError::Api { message }
    }
}

fn is_no_such_container(stderr: &str) -> bool {
    let lower = stderr.to_lowercase();
    lower.contains("no such container") || lower.contains("no such object")
}

async fn forward_lines<R>(reader: R, tx: mpsc::UnboundedSender<String>)
where
    R: AsyncRead + Unpin,
{
    let mut segments = BufReader::new(reader).split(b'\n');
    while let Ok(Some(segment)) = segments.next_segment().await {
        let line = String::from_utf8_lossy(&segment).trim_end_matches('\r').to_string();
        if tx.send(line).is_err() {
            break;
        }
    }
}

impl ContainerRuntime for CliRuntime {
    #[instrument(skip(self))]
    async fn ping(&self) -> Result<()> {
        let output = self
            .run(
                vec!["version".into(), "--format".into(), "json".into()],
                None,
            )
            .await?;
        if output.status.success() {
            Ok(())
        } else {
            debug!("docker version failed: {}", String::from_utf8_lossy(&output.stderr));
            Err(DockerError::NotInstalled.into())
        }
    }

    #[instrument(skip(self))]
    async fn inspect_container(&self, name: &str) -> Result<Option<ContainerInfo>> {
        let output = self
            .run(
                vec![
                    "inspect".into(),
                    "--type".into(),
                    "container".into(),
                    name.to_string(),
                ],
                None,
            )
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if is_no_such_container(&stderr) {
                debug!("Container {} not found", name);
                return Ok(None);
            }
            return Err(classify_error(&stderr).into());
        }
        Self::parse_container_inspect(&String::from_utf8_lossy(&output.stdout))
    }

    #[instrument(skip(self, spec), fields(name = %spec.name, image = %spec.image))]
    async fn create_container(&self, spec: &ContainerSpec) -> Result<String> {
        let mut args = spec.to_create_args(self.platform);
        // never pull implicitly; a missing image is reported and pulled by the caller
        args.insert(1, "--pull".to_string());
        args.insert(2, "never".to_string());

        match self.run_checked(args, None).await {
            Ok(stdout) => Ok(stdout.trim().to_string()),
            Err(ComposerError::Docker(DockerError::NameConflict { message, .. })) => {
                Err(DockerError::NameConflict {
                    name: spec.name.clone(),
                    message,
                }
                .into())
            }
            Err(ComposerError::Docker(DockerError::ImageNotFound { .. })) => {
                Err(DockerError::ImageNotFound {
                    image: spec.image.clone(),
                }
                .into())
            }
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self, archive), fields(bytes = archive.len()))]
    async fn copy_archive(&self, name: &str, dest_dir: &str, archive: Vec<u8>) -> Result<()> {
        self.run_checked(
            vec!["cp".into(), "-".into(), format!("{}:{}", name, dest_dir)],
            Some(archive),
        )
        .await
        .map(|_| ())
    }

    #[instrument(skip(self))]
    async fn start_container(&self, name: &str) -> Result<()> {
        self.run_checked(vec!["start".into(), name.to_string()], None)
            .await
            .map(|_| ())
    }

    #[instrument(skip(self))]
    async fn stop_container(&self, name: &str) -> Result<()> {
        self.run_checked(vec!["stop".into(), name.to_string()], None)
            .await
            .map(|_| ())
    }

    #[instrument(skip(self))]
    async fn remove_container(&self, name: &str) -> Result<()> {
        self.run_checked(vec!["rm".into(), name.to_string()], None)
            .await
            .map(|_| ())
    }

    #[instrument(skip(self))]
    async fn exec(&self, name: &str, argv: &[String]) -> Result<ExecResult> {
        let mut args = vec!["exec".to_string(), name.to_string()];
        args.extend(argv.iter().cloned());
        let output = self.run(args, None).await?;
        Ok(ExecResult {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }

    #[instrument(skip(self))]
    async fn logs(&self, name: &str, options: LogsOptions) -> Result<LogStream> {
        let mut args = vec!["logs".to_string()];
        if options.timestamps {
            args.push("--timestamps".to_string());
        }
        if options.follow {
            args.push("--follow".to_string());
        }
        args.push("--tail".to_string());
        args.push(options.tail.to_string());
        args.push(name.to_string());
        debug!("Executing: {} {}", self.docker_path, args.join(" "));

        let mut child = tokio::process::Command::new(&self.docker_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    DockerError::NotInstalled
                } else {
                    DockerError::CLIError(format!("Failed to read logs: {}", e))
                }
            })?;

        let (tx, rx) = mpsc::unbounded_channel();
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_lines(stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_lines(stderr, tx));
        }

        Ok(LogStream {
            lines: rx,
            _child: Some(child),
        })
    }

    #[instrument(skip(self))]
    async fn pull_image(&self, image: &str) -> Result<()> {
        let output = self.run(vec!["pull".into(), image.to_string()], None).await?;
        if output.status.success() {
            return Ok(());
        }
        match classify_error(&String::from_utf8_lossy(&output.stderr)) {
            DockerError::NotInstalled => Err(DockerError::NotInstalled.into()),
            _ => Err(DockerError::ImageNotFound {
                image: image.to_string(),
            }
            .into()),
        }
    }
}

pub mod mock {
    //! In-memory container runtime
    //!
    //! Behaves like the engine for the operations the lifecycle uses: names
    //! are unique, images must be present locally (or pulled) before create,
    //! running containers cannot be removed. Failures can be scripted through
    //! [`MockRuntimeConfig`].

    use super::{ContainerInfo, ContainerRuntime, ExecResult, LogStream, LogsOptions, MaxLines};
    use crate::container::{ContainerSpec, ContainerState};
    use crate::errors::{DockerError, Result};
    use crate::ports::{PortMapping, CONTAINER_WEB_PORT};
    use std::collections::{HashMap, HashSet};
    use std::sync::{Arc, Mutex};
    use tracing::{debug, instrument};

    /// Scriptable behaviour
    #[derive(Debug, Clone)]
    pub struct MockRuntimeConfig {
        /// Every call fails with [`DockerError::NotInstalled`]
        pub daemon_unavailable: bool,
        /// Start fails with the engine's "port is already allocated" message
        pub port_allocated_on_start: bool,
        /// Start fails with this engine message
        pub start_error: Option<String>,
        /// Create fails with this engine message
        pub create_error: Option<String>,
        /// State a container lands in after a successful start
        pub state_after_start: ContainerState,
        /// Pulls fail as if the image did not exist in the registry
        pub pull_fails: bool,
        /// Lines returned by every logs call
        pub log_lines: Vec<String>,
        pub exec_response: ExecResult,
    }

    impl Default for MockRuntimeConfig {
        fn default() -> Self {
            Self {
                daemon_unavailable: false,
                port_allocated_on_start: false,
                start_error: None,
                create_error: None,
                state_after_start: ContainerState::Running,
                pull_fails: false,
                log_lines: Vec::new(),
                exec_response: ExecResult::default(),
            }
        }
    }

    /// Container held by the mock
    #[derive(Debug, Clone)]
    pub struct MockContainer {
        pub id: String,
        pub name: String,
        pub image: String,
        pub state: ContainerState,
        pub host_port: Option<u32>,
        pub spec: Option<ContainerSpec>,
        /// Destination directory and bytes of every copied archive
        pub archives: Vec<(String, Vec<u8>)>,
    }

    impl MockContainer {
        pub fn new(name: impl Into<String>, image: impl Into<String>) -> Self {
            let name = name.into();
            Self {
                id: format!("mock-{}", name),
                name,
                image: image.into(),
                state: ContainerState::Created,
                host_port: None,
                spec: None,
                archives: Vec::new(),
            }
        }

        pub fn with_state(mut self, state: ContainerState) -> Self {
            self.state = state;
            self
        }

        pub fn with_host_port(mut self, port: u32) -> Self {
            self.host_port = Some(port);
            self
        }

        fn info(&self) -> ContainerInfo {
            let port_mappings = match (self.state.is_running(), self.host_port) {
                (true, Some(host_port)) => vec![PortMapping {
                    container_port: CONTAINER_WEB_PORT.to_string(),
                    host_port,
                    host_ip: "0.0.0.0".to_string(),
                }],
                _ => Vec::new(),
            };
            ContainerInfo {
                id: self.id.clone(),
                name: self.name.clone(),
                image: self.image.clone(),
                state: self.state.clone(),
                port_mappings,
            }
        }
    }

    /// Recorded runtime call
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum MockCall {
        Inspect(String),
        Create(String),
        CopyArchive { name: String, dest_dir: String },
        Start(String),
        Stop(String),
        Remove(String),
        Exec { name: String, argv: Vec<String> },
        Logs { name: String, follow: bool, tail: MaxLines },
        Pull(String),
    }

    #[derive(Debug, Default)]
    struct MockState {
        containers: HashMap<String, MockContainer>,
        local_images: HashSet<String>,
        calls: Vec<MockCall>,
    }

    /// In-memory [`ContainerRuntime`]
    #[derive(Debug, Clone, Default)]
    pub struct MockRuntime {
        state: Arc<Mutex<MockState>>,
        config: Arc<Mutex<MockRuntimeConfig>>,
    }

    impl MockRuntime {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_config(config: MockRuntimeConfig) -> Self {
            Self {
                state: Arc::default(),
                config: Arc::new(Mutex::new(config)),
            }
        }

        /// Mark an image as already present on the engine
        pub fn with_local_image(self, image: impl Into<String>) -> Self {
            self.state.lock().unwrap().local_images.insert(image.into());
            self
        }

        pub fn add_container(&self, container: MockContainer) {
            let mut state = self.state.lock().unwrap();
            state.local_images.insert(container.image.clone());
            state.containers.insert(container.name.clone(), container);
        }

        pub fn container(&self, name: &str) -> Option<MockContainer> {
            self.state.lock().unwrap().containers.get(name).cloned()
        }

        pub fn set_state(&self, name: &str, new_state: ContainerState) {
            if let Some(c) = self.state.lock().unwrap().containers.get_mut(name) {
                c.state = new_state;
            }
        }

        pub fn update_config(&self, update: impl FnOnce(&mut MockRuntimeConfig)) {
            update(&mut self.config.lock().unwrap());
        }

        pub fn calls(&self) -> Vec<MockCall> {
            self.state.lock().unwrap().calls.clone()
        }

        pub fn pull_count(&self) -> usize {
            self.calls()
                .iter()
                .filter(|c| matches!(c, MockCall::Pull(_)))
                .count()
        }

        fn record(&self, call: MockCall) -> Result<MockRuntimeConfig> {
            self.state.lock().unwrap().calls.push(call);
            let config = self.config.lock().unwrap().clone();
            if config.daemon_unavailable {
                return Err(DockerError::NotInstalled.into());
            }
            Ok(config)
        }

        fn no_such_container(name: &str) -> DockerError {
            DockerError::Api {
                message: format!("Error response from daemon: No such container: {}", name),
            }
        }
    }

    impl ContainerRuntime for MockRuntime {
        async fn ping(&self) -> Result<()> {
            if self.config.lock().unwrap().daemon_unavailable {
                return Err(DockerError::NotInstalled.into());
            }
            Ok(())
        }

        #[instrument(skip(self))]
        async fn inspect_container(&self, name: &str) -> Result<Option<ContainerInfo>> {
            self.record(MockCall::Inspect(name.to_string()))?;
            Ok(self
                .state
                .lock()
                .unwrap()
                .containers
                .get(name)
                .map(MockContainer::info))
        }

        #[instrument(skip(self, spec))]
        async fn create_container(&self, spec: &ContainerSpec) -> Result<String> {
            let config = self.record(MockCall::Create(spec.name.clone()))?;
            if let Some(message) = config.create_error {
                return Err(DockerError::Api { message }.into());
            }

            let mut state = self.state.lock().unwrap();
            if state.containers.contains_key(&spec.name) {
                return Err(DockerError::NameConflict {
                    name: spec.name.clone(),
                    message: format!(
                        "Conflict. The container name \"/{}\" is already in use by container",
                        spec.name
                    ),
                }
                .into());
            }
            if !state.local_images.contains(&spec.image) {
                return Err(DockerError::ImageNotFound {
                    image: spec.image.clone(),
                }
                .into());
            }

            let mut container = MockContainer::new(spec.name.clone(), spec.image.clone());
            container.host_port = spec.ports.get(CONTAINER_WEB_PORT).copied();
            container.spec = Some(spec.clone());
            let id = container.id.clone();
            debug!("MockRuntime created container {}", spec.name);
            state.containers.insert(spec.name.clone(), container);
            Ok(id)
        }

        async fn copy_archive(&self, name: &str, dest_dir: &str, archive: Vec<u8>) -> Result<()> {
            self.record(MockCall::CopyArchive {
                name: name.to_string(),
                dest_dir: dest_dir.to_string(),
            })?;
            match self.state.lock().unwrap().containers.get_mut(name) {
                Some(c) => {
                    c.archives.push((dest_dir.to_string(), archive));
                    Ok(())
                }
                None => Err(Self::no_such_container(name).into()),
            }
        }

        async fn start_container(&self, name: &str) -> Result<()> {
            let config = self.record(MockCall::Start(name.to_string()))?;
            let mut state = self.state.lock().unwrap();
            let container = state
                .containers
                .get_mut(name)
                .ok_or_else(|| Self::no_such_container(name))?;

            if config.port_allocated_on_start {
                let port = container.host_port.unwrap_or_default();
                return Err(DockerError::Api {
                    message: format!(
                        "Error response from daemon: driver failed programming external connectivity on endpoint {}: Bind for 0.0.0.0:{} failed: port is already allocated",
                        name, port
                    ),
                }
                .into());
            }
            if let Some(message) = config.start_error {
                return Err(DockerError::Api { message }.into());
            }
            container.state = config.state_after_start;
            Ok(())
        }

        async fn stop_container(&self, name: &str) -> Result<()> {
            self.record(MockCall::Stop(name.to_string()))?;
            match self.state.lock().unwrap().containers.get_mut(name) {
                Some(c) => {
                    c.state = ContainerState::Exited;
                    Ok(())
                }
                None => Err(Self::no_such_container(name).into()),
            }
        }

        async fn remove_container(&self, name: &str) -> Result<()> {
            self.record(MockCall::Remove(name.to_string()))?;
            let mut state = self.state.lock().unwrap();
            match state.containers.get(name) {
                Some(c) if c.state.is_running() => Err(DockerError::Api {
                    message: format!(
                        "Error response from daemon: You cannot remove a running container {}",
                        c.id
                    ),
                }
                .into()),
                Some(_) => {
                    state.containers.remove(name);
                    Ok(())
                }
                None => Err(Self::no_such_container(name).into()),
            }
        }

        async fn exec(&self, name: &str, argv: &[String]) -> Result<ExecResult> {
            let config = self.record(MockCall::Exec {
                name: name.to_string(),
                argv: argv.to_vec(),
            })?;
            match self.state.lock().unwrap().containers.get(name) {
                Some(c) if c.state.is_running() => Ok(config.exec_response),
                Some(c) => Err(DockerError::Api {
                    message: format!("Error response from daemon: Container {} is not running", c.id),
                }
                .into()),
                None => Err(Self::no_such_container(name).into()),
            }
        }

        async fn logs(&self, name: &str, options: LogsOptions) -> Result<LogStream> {
            let config = self.record(MockCall::Logs {
                name: name.to_string(),
                follow: options.follow,
                tail: options.tail,
            })?;
            if !self.state.lock().unwrap().containers.contains_key(name) {
                return Err(Self::no_such_container(name).into());
            }
            let lines = match options.tail {
                MaxLines::All => config.log_lines,
                MaxLines::Count(n) => {
                    let skip = config.log_lines.len().saturating_sub(n as usize);
                    config.log_lines.into_iter().skip(skip).collect()
                }
            };
            Ok(LogStream::from_lines(lines))
        }

        async fn pull_image(&self, image: &str) -> Result<()> {
            let config = self.record(MockCall::Pull(image.to_string()))?;
            if config.pull_fails {
                return Err(DockerError::ImageNotFound {
                    image: image.to_string(),
                }
                .into());
            }
            self.state
                .lock()
                .unwrap()
                .local_images
                .insert(image.to_string());
            Ok(())
        }
    }
}
