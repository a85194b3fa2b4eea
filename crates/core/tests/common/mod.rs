//! Shared fixtures for environment integration tests.
#![allow(dead_code)]

use composer_dev_core::clock::{Clock, ManualClock};
use composer_dev_core::config::EnvironmentConfig;
use composer_dev_core::container::container_name;
use composer_dev_core::docker::mock::MockRuntime;
use composer_dev_core::environment::{Environment, EnvironmentContext};
use composer_dev_core::errors::RegistryError;
use composer_dev_core::platform::FixedHost;
use composer_dev_core::registry::ImageRegistry;
use composer_dev_core::version::ParsedImageVersion;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub const IMAGE_VERSION: &str = "composer-2.0.8-airflow-2.2.3";
pub const ENV_NAME: &str = "dev";

/// Registry answering every tag lookup the same way
#[derive(Debug, Default)]
pub struct FakeRegistry {
    outcome: Mutex<Option<RegistryError>>,
    checked: Mutex<Vec<String>>,
}

impl FakeRegistry {
    pub fn existing() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing(error: RegistryError) -> Arc<Self> {
        Arc::new(Self {
            outcome: Mutex::new(Some(error)),
            checked: Mutex::new(Vec::new()),
        })
    }

    pub fn checked_tags(&self) -> Vec<String> {
        self.checked.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ImageRegistry for FakeRegistry {
    async fn check_tag(&self, version: &ParsedImageVersion) -> Result<(), RegistryError> {
        self.checked.lock().unwrap().push(version.image_tag());
        match self.outcome.lock().unwrap().as_ref() {
            None => Ok(()),
            Some(RegistryError::NotFound { resource }) => Err(RegistryError::NotFound {
                resource: resource.clone(),
            }),
            Some(RegistryError::PermissionDenied { message }) => {
                Err(RegistryError::PermissionDenied {
                    message: message.clone(),
                })
            }
            Some(RegistryError::Unauthenticated { message }) => {
                Err(RegistryError::Unauthenticated {
                    message: message.clone(),
                })
            }
            Some(other) => Err(RegistryError::Api {
                status: 500,
                message: other.to_string(),
            }),
        }
    }
}

/// Working directory with a `composer/` folder and a gcloud config directory
pub struct Workspace {
    pub root: TempDir,
    pub runtime: MockRuntime,
    pub registry: Arc<FakeRegistry>,
    pub clock: Option<Arc<dyn Clock>>,
}

impl Workspace {
    pub fn new() -> Self {
        Self::with_runtime(MockRuntime::new().with_local_image(image_ref()))
    }

    pub fn with_runtime(runtime: MockRuntime) -> Self {
        let root = TempDir::new().unwrap();
        std::fs::create_dir_all(root.path().join("composer")).unwrap();
        std::fs::create_dir_all(root.path().join("gcloud")).unwrap();
        Self {
            root,
            runtime,
            registry: FakeRegistry::existing(),
            clock: None,
        }
    }

    pub fn with_registry(mut self, registry: Arc<FakeRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_manual_clock(mut self, clock: ManualClock) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }

    pub fn composer_dir(&self) -> PathBuf {
        self.root.path().join("composer")
    }

    pub fn env_dir(&self, name: &str) -> PathBuf {
        self.composer_dir().join(name)
    }

    pub fn gcloud_dir(&self) -> PathBuf {
        self.root.path().join("gcloud")
    }

    pub fn context(&self) -> EnvironmentContext<MockRuntime> {
        let ctx = EnvironmentContext::new(
            self.runtime.clone(),
            self.registry.clone(),
            Arc::new(FixedHost::linux(self.gcloud_dir())),
        );
        match &self.clock {
            Some(clock) => ctx.with_clock(clock.clone()),
            None => ctx,
        }
    }

    /// Environment directory as `create` leaves it, with the given port
    pub fn write_environment(&self, name: &str, port: u32) -> PathBuf {
        let env_dir = self.env_dir(name);
        let dags = env_dir.join("dags");
        std::fs::create_dir_all(&dags).unwrap();
        std::fs::create_dir_all(env_dir.join("data")).unwrap();
        std::fs::create_dir_all(env_dir.join("plugins")).unwrap();
        EnvironmentConfig {
            image_version: IMAGE_VERSION.to_string(),
            location: "us-central1".to_string(),
            project_id: "test-project".to_string(),
            dags_path: dags.display().to_string(),
            dag_dir_list_interval: 10,
            port,
        }
        .persist(&env_dir)
        .unwrap();
        std::fs::write(env_dir.join("requirements.txt"), "pandas==1.4.0\r\n").unwrap();
        std::fs::write(env_dir.join("variables.env"), "# FOO=\nEXTRA=1\n").unwrap();
        env_dir
    }

    pub fn load(&self, env_dir: &Path) -> Environment<MockRuntime> {
        Environment::load_from_config(env_dir, None, self.context()).unwrap()
    }
}

pub fn image_ref() -> String {
    ParsedImageVersion::parse(IMAGE_VERSION)
        .unwrap()
        .docker_image_ref()
}

pub fn env_container(name: &str) -> String {
    container_name(name)
}

pub fn ready_logs() -> Vec<String> {
    vec![
        "2024-01-01T00:00:00Z Installing requirements".to_string(),
        "2024-01-01T00:00:05Z [scheduler] Starting the scheduler".to_string(),
        "2024-01-01T00:00:06Z [scheduler] Searching for files in /home/airflow/gcs/dags".to_string(),
        "2024-01-01T00:00:07Z after ready".to_string(),
    ]
}
