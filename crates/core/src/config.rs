//! Environment configuration store
//!
//! Each environment directory holds a `config.json` with exactly six keys.
//! The file is re-read on every lifecycle operation: [`EnvironmentConfig`] is
//! rebuilt from disk (plus an optional port override) and never mutated in
//! place.
//!
//! ```json
//! {
//!     "composer_image_version": "composer-2.0.8-airflow-2.2.3",
//!     "composer_location": "us-central1",
//!     "composer_project_id": "my-project",
//!     "dags_path": "/home/user/dags",
//!     "dag_dir_list_interval": 10,
//!     "port": 8080
//! }
//! ```

use crate::errors::{ConfigError, Result};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use std::path::Path;
use tracing::{debug, instrument};

/// Name of the persisted configuration file inside an environment directory
pub const CONFIG_FILE: &str = "config.json";

/// Web server port used when none is configured
pub const DEFAULT_PORT: u32 = 8080;

/// Default scheduler DAG directory refresh interval in seconds
pub const DEFAULT_DAG_DIR_LIST_INTERVAL: u32 = 10;

/// Allowed range for the web server port
pub const PORT_RANGE: IntRange = IntRange::Between(0, 65536);

/// Allowed range for the DAG directory refresh interval
pub const INTERVAL_RANGE: IntRange = IntRange::AtLeast(0);

/// Inclusive bounds for integer parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntRange {
    /// `value >= bound`
    AtLeast(i64),
    /// `low <= value <= high`
    Between(i64, i64),
}

impl IntRange {
    pub fn contains(&self, value: i64) -> bool {
        match *self {
            IntRange::AtLeast(bound) => value >= bound,
            IntRange::Between(low, high) => low <= value && value <= high,
        }
    }
}

impl fmt::Display for IntRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntRange::AtLeast(bound) => write!(f, "x>={}", bound),
            IntRange::Between(low, high) => write!(f, "{}<=x<={}", low, high),
        }
    }
}

/// Raw view of a loaded configuration file with typed accessors
#[derive(Debug, Clone)]
pub struct ConfigStore {
    values: Map<String, Value>,
}

impl ConfigStore {
    /// Read and parse a configuration file.
    ///
    /// A missing file and a malformed one are distinct errors.
    #[instrument]
    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading environment configuration from {}", path.display());

        if !path.is_file() {
            return Err(ConfigError::NotFound {
                path: path.display().to_string(),
            }
            .into());
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            debug!("Failed to read configuration file: {}", e);
            ConfigError::Io(e)
        })?;

        let value: Value = serde_json::from_str(&content).map_err(|e| ConfigError::Parsing {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        match value {
            Value::Object(values) => Ok(Self { values }),
            _ => Err(ConfigError::Parsing {
                path: path.display().to_string(),
                message: "configuration must be a JSON object".to_string(),
            }
            .into()),
        }
    }

    pub fn get_required_string(&self, name: &str) -> Result<String> {
        match self.required(name)? {
            Value::String(s) => Ok(s.clone()),
            other => Err(ConfigError::InvalidStringValue {
                param: name.to_string(),
                value: other.to_string(),
            }
            .into()),
        }
    }

    /// Integer parameter, optionally range-checked.
    ///
    /// Numeric strings such as `"8080"` are accepted.
    pub fn get_required_int(&self, name: &str, range: Option<IntRange>) -> Result<i64> {
        let raw = self.required(name)?;
        let value = match raw {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        }
        .ok_or_else(|| ConfigError::InvalidIntValue {
            param: name.to_string(),
            value: match raw {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            },
        })?;

        if let Some(range) = range {
            if !range.contains(value) {
                return Err(ConfigError::InvalidIntRange {
                    param: name.to_string(),
                    value,
                    range,
                }
                .into());
            }
        }
        Ok(value)
    }

    fn required(&self, name: &str) -> Result<&Value> {
        self.values.get(name).ok_or_else(|| {
            ConfigError::MissingRequiredParameter {
                param: name.to_string(),
            }
            .into()
        })
    }
}

/// Persisted environment configuration
///
/// Field order is the on-disk key order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnvironmentConfig {
    #[serde(rename = "composer_image_version")]
    pub image_version: String,
    #[serde(rename = "composer_location")]
    pub location: String,
    #[serde(rename = "composer_project_id")]
    pub project_id: String,
    pub dags_path: String,
    pub dag_dir_list_interval: u32,
    pub port: u32,
}

impl EnvironmentConfig {
    /// Load `config.json` from an environment directory.
    ///
    /// When `port_override` is given the persisted `port` is neither read nor
    /// validated.
    pub fn load(env_dir: &Path, port_override: Option<u32>) -> Result<Self> {
        let store = ConfigStore::load(&env_dir.join(CONFIG_FILE))?;
        Self::from_store(&store, port_override)
    }

    pub fn from_store(store: &ConfigStore, port_override: Option<u32>) -> Result<Self> {
        let project_id = store.get_required_string("composer_project_id")?;
        let image_version = store.get_required_string("composer_image_version")?;
        let location = store.get_required_string("composer_location")?;
        let dags_path = store.get_required_string("dags_path")?;
        let dag_dir_list_interval =
            store.get_required_int("dag_dir_list_interval", Some(INTERVAL_RANGE))?;
        let port = match port_override {
            Some(port) => port,
            None => store.get_required_int("port", Some(PORT_RANGE))? as u32,
        };

        Ok(Self {
            image_version,
            location,
            project_id,
            dags_path,
            dag_dir_list_interval: u32::try_from(dag_dir_list_interval).map_err(|_| {
                ConfigError::InvalidIntRange {
                    param: "dag_dir_list_interval".to_string(),
                    value: dag_dir_list_interval,
                    range: INTERVAL_RANGE,
                }
            })?,
            port,
        })
    }

    /// Render as 4-space indented JSON in the fixed key order
    pub fn to_json_string(&self) -> Result<String> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut serializer)
            .map_err(|e| ConfigError::Io(std::io::Error::other(e)))?;
        String::from_utf8(buf).map_err(|e| ConfigError::Io(std::io::Error::other(e)).into())
    }

    /// Write `config.json` into the environment directory
    #[instrument(skip(self))]
    pub fn persist(&self, env_dir: &Path) -> Result<()> {
        let path = env_dir.join(CONFIG_FILE);
        debug!("Saving environment configuration to {}", path.display());
        std::fs::write(&path, self.to_json_string()?).map_err(ConfigError::Io)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ComposerError;
    use tempfile::TempDir;

    fn sample() -> EnvironmentConfig {
        EnvironmentConfig {
            image_version: "composer-2.0.8-airflow-2.2.3".to_string(),
            location: "us-central1".to_string(),
            project_id: "my-project".to_string(),
            dags_path: "/home/user/dags".to_string(),
            dag_dir_list_interval: 10,
            port: 8080,
        }
    }

    fn write_config(dir: &TempDir, content: &str) {
        std::fs::write(dir.path().join(CONFIG_FILE), content).unwrap();
    }

    #[test]
    fn test_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let config = sample();
        config.persist(temp_dir.path()).unwrap();

        let loaded = EnvironmentConfig::load(temp_dir.path(), None).unwrap();
        assert_eq!(loaded, config);

        loaded.persist(temp_dir.path()).unwrap();
        let reloaded = EnvironmentConfig::load(temp_dir.path(), None).unwrap();
        assert_eq!(reloaded, config);
    }

    #[test]
    fn test_key_order_and_indent() {
        let rendered = sample().to_json_string().unwrap();
        let keys: Vec<usize> = [
            "composer_image_version",
            "composer_location",
            "composer_project_id",
            "dags_path",
            "dag_dir_list_interval",
            "port",
        ]
        .iter()
        .map(|k| rendered.find(&format!("\"{}\"", k)).unwrap())
        .collect();
        assert!(keys.windows(2).all(|w| w[0] < w[1]));
        assert!(rendered.contains("\n    \"port\": 8080"));
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let err = EnvironmentConfig::load(temp_dir.path(), None).unwrap_err();
        assert!(matches!(
            err,
            ComposerError::Config(ConfigError::NotFound { .. })
        ));
    }

    #[test]
    fn test_malformed_file_is_parsing_error() {
        let temp_dir = TempDir::new().unwrap();
        write_config(&temp_dir, "{ not json");
        let err = EnvironmentConfig::load(temp_dir.path(), None).unwrap_err();
        assert!(matches!(
            err,
            ComposerError::Config(ConfigError::Parsing { .. })
        ));

        write_config(&temp_dir, "[1, 2]");
        let err = EnvironmentConfig::load(temp_dir.path(), None).unwrap_err();
        assert!(matches!(
            err,
            ComposerError::Config(ConfigError::Parsing { .. })
        ));
    }

    #[test]
    fn test_missing_required_parameter() {
        let temp_dir = TempDir::new().unwrap();
        write_config(
            &temp_dir,
            r#"{"composer_project_id": "p", "composer_image_version": "composer-2.0.8-airflow-2.2.3"}"#,
        );
        let err = EnvironmentConfig::load(temp_dir.path(), None).unwrap_err();
        match err {
            ComposerError::Config(ConfigError::MissingRequiredParameter { param }) => {
                assert_eq!(param, "composer_location")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_int_value_and_range_are_distinct() {
        let temp_dir = TempDir::new().unwrap();
        write_config(
            &temp_dir,
            r#"{"port": "abc", "dag_dir_list_interval": -5, "other": 7.5}"#,
        );
        let store = ConfigStore::load(&temp_dir.path().join(CONFIG_FILE)).unwrap();

        assert!(matches!(
            store.get_required_int("port", Some(PORT_RANGE)),
            Err(ComposerError::Config(ConfigError::InvalidIntValue { .. }))
        ));
        assert!(matches!(
            store.get_required_int("other", None),
            Err(ComposerError::Config(ConfigError::InvalidIntValue { .. }))
        ));
        match store.get_required_int("dag_dir_list_interval", Some(INTERVAL_RANGE)) {
            Err(ComposerError::Config(ConfigError::InvalidIntRange { value, range, .. })) => {
                assert_eq!(value, -5);
                assert_eq!(range.to_string(), "x>=0");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_numeric_string_accepted() {
        let temp_dir = TempDir::new().unwrap();
        write_config(&temp_dir, r#"{"port": "9000"}"#);
        let store = ConfigStore::load(&temp_dir.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(store.get_required_int("port", Some(PORT_RANGE)).unwrap(), 9000);
    }

    #[test]
    fn test_port_bounds() {
        assert!(PORT_RANGE.contains(0));
        assert!(PORT_RANGE.contains(65536));
        assert!(!PORT_RANGE.contains(65537));
        assert!(!PORT_RANGE.contains(-1));
        assert_eq!(PORT_RANGE.to_string(), "0<=x<=65536");
    }

    #[test]
    fn test_port_override_skips_validation() {
        let temp_dir = TempDir::new().unwrap();
        let mut value = serde_json::to_value(sample()).unwrap();
        value["port"] = Value::String("not a port".to_string());
        write_config(&temp_dir, &value.to_string());

        assert!(EnvironmentConfig::load(temp_dir.path(), None).is_err());
        let config = EnvironmentConfig::load(temp_dir.path(), Some(9090)).unwrap();
        assert_eq!(config.port, 9090);
    }
}
