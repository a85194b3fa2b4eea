//! Environment directory layout and file helpers
//!
//! Environments live in `<cwd>/composer/<name>/`; any direct subdirectory
//! holding a `config.json` counts as one.

use crate::config::CONFIG_FILE;
use crate::errors::{ComposerError, ConfigError, NameViolation, Result};
use crate::mount::{DATA_DIR, PLUGINS_DIR};
use crate::platform::{normalize_line_endings, HostEnvironment};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

/// Directory (relative to the working directory) holding all environments
pub const COMPOSER_DIR: &str = "composer";

/// Requirements file inside an environment directory
pub const REQUIREMENTS_FILE: &str = "requirements.txt";

/// Default dags directory name inside an environment directory
pub const DEFAULT_DAGS_DIR: &str = "dags";

const MIN_NAME_LEN: usize = 3;
const MAX_NAME_LEN: usize = 40;

/// Environment names are 3 to 40 characters from `[A-Za-z0-9_-]`
pub fn validate_environment_name(name: &str) -> Result<()> {
    let reason = if name.chars().count() < MIN_NAME_LEN {
        Some(NameViolation::TooShort)
    } else if name.chars().count() > MAX_NAME_LEN {
        Some(NameViolation::TooLong)
    } else if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        Some(NameViolation::InvalidCharacters)
    } else {
        None
    };

    match reason {
        Some(reason) => Err(ConfigError::InvalidEnvironmentName {
            name: name.to_string(),
            reason,
        }
        .into()),
        None => Ok(()),
    }
}

/// Make `path` absolute without requiring it to exist
pub fn absolute_path(path: &Path) -> Result<PathBuf> {
    if path.exists() {
        return Ok(fs::canonicalize(path)?);
    }
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

/// Environment directories directly under `composer_dir`, sorted by name
pub fn available_environments(composer_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut envs = Vec::new();
    for entry in fs::read_dir(composer_dir)? {
        let path = entry?.path();
        if path.is_dir() && path.join(CONFIG_FILE).is_file() {
            envs.push(path);
        }
    }
    envs.sort();
    Ok(envs)
}

/// Like [`available_environments`] but empty when `composer_dir` is missing
pub fn environment_directories(composer_dir: &Path) -> Result<Vec<PathBuf>> {
    if !composer_dir.is_dir() {
        return Ok(Vec::new());
    }
    available_environments(composer_dir)
}

/// Pick the environment directory for a command.
///
/// Without a name, the only existing environment is used.
#[instrument]
pub fn resolve_environment_path(composer_dir: &Path, name: Option<&str>) -> Result<PathBuf> {
    if !composer_dir.is_dir() {
        return Err(ComposerError::EnvironmentsDirNotFound {
            path: composer_dir.display().to_string(),
        });
    }

    let envs = available_environments(composer_dir)?;
    debug!("Found {} local environments", envs.len());
    if envs.is_empty() {
        return Err(ComposerError::NoEnvironments {
            path: composer_dir.display().to_string(),
        });
    }

    match name {
        Some(name) => {
            let env_path = composer_dir.join(name);
            if !env_path.is_dir() {
                return Err(ComposerError::EnvironmentNotFound {
                    path: env_path.display().to_string(),
                });
            }
            Ok(env_path)
        }
        None if envs.len() > 1 => Err(ComposerError::EnvironmentNotSelected {
            path: composer_dir.display().to_string(),
            names: envs
                .iter()
                .filter_map(|p| p.file_name())
                .map(|n| n.to_string_lossy().to_string())
                .collect(),
        }),
        None => {
            info!(
                "Environment not provided, using the only existing environment: {}",
                envs[0].display()
            );
            Ok(envs[0].clone())
        }
    }
}

/// Absolute dags directory, `<env_dir>/dags` when not configured
pub fn resolve_dags_path(dags_path: Option<&Path>, env_dir: &Path) -> Result<PathBuf> {
    match dags_path {
        Some(path) => absolute_path(path),
        None => {
            warn!("Dags path not provided, using the environment's 'dags' directory.");
            absolute_path(&env_dir.join(DEFAULT_DAGS_DIR))
        }
    }
}

/// Create the environment directory with its `data` and `plugins` subdirectories,
/// plus the dags directory when missing
#[instrument]
pub fn create_environment_directories(env_dir: &Path, dags_path: &Path) -> Result<()> {
    info!("Creating environment directories in {}", env_dir.display());
    fs::create_dir_all(env_dir)?;
    for sub_dir in [DATA_DIR, PLUGINS_DIR] {
        fs::create_dir_all(env_dir.join(sub_dir))?;
    }
    if !dags_path.is_dir() {
        warn!(
            "Dags path '{}' does not exist. It will be created.",
            dags_path.display()
        );
        fs::create_dir_all(dags_path)?;
    }
    Ok(())
}

pub fn create_empty_file(path: &Path, skip_if_exists: bool) -> Result<()> {
    if skip_if_exists && path.exists() {
        return Ok(());
    }
    fs::write(path, b"")?;
    Ok(())
}

pub fn assert_dags_path_exists(path: &Path) -> Result<()> {
    if path.is_dir() {
        Ok(())
    } else {
        Err(ComposerError::DagsPathNotFound {
            path: path.display().to_string(),
        })
    }
}

pub fn assert_requirements_exist(env_dir: &Path) -> Result<()> {
    let path = env_dir.join(REQUIREMENTS_FILE);
    if path.is_file() {
        Ok(())
    } else {
        Err(ComposerError::RequirementsNotFound {
            path: path.display().to_string(),
        })
    }
}

/// Bind-mounted files must be writable by the container user on Linux hosts
pub fn fix_file_permissions(host: &dyn HostEnvironment, files: &[&Path]) -> Result<()> {
    if !host.is_linux() {
        return Ok(());
    }
    for file in files {
        make_world_writable(file)?;
    }
    Ok(())
}

#[cfg(unix)]
fn make_world_writable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    debug!("Setting 0666 permissions on {}", path.display());
    fs::set_permissions(path, fs::Permissions::from_mode(0o666))?;
    Ok(())
}

#[cfg(not(unix))]
fn make_world_writable(_path: &Path) -> Result<()> {
    Ok(())
}

/// Rewrite a file with LF line endings
pub fn dos2unix_file(path: &Path) -> Result<()> {
    let content = fs::read(path)?;
    let normalized = normalize_line_endings(&content);
    if normalized != content {
        fs::write(path, normalized)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::FixedHost;
    use tempfile::TempDir;

    fn make_env(composer_dir: &Path, name: &str) -> PathBuf {
        let env = composer_dir.join(name);
        fs::create_dir_all(&env).unwrap();
        fs::write(env.join(CONFIG_FILE), "{}").unwrap();
        env
    }

    #[test]
    fn test_validate_environment_name() {
        assert!(validate_environment_name("dev").is_ok());
        assert!(validate_environment_name("my_env-01").is_ok());
        assert!(validate_environment_name(&"a".repeat(40)).is_ok());

        let long_name = "a".repeat(41);
        for (name, expected) in [
            ("ab", NameViolation::TooShort),
            (long_name.as_str(), NameViolation::TooLong),
            ("my env", NameViolation::InvalidCharacters),
            ("env/../x", NameViolation::InvalidCharacters),
        ] {
            match validate_environment_name(name) {
                Err(ComposerError::Config(ConfigError::InvalidEnvironmentName { reason, .. })) => {
                    assert_eq!(reason, expected, "wrong violation for '{}'", name)
                }
                other => panic!("unexpected result for '{}': {:?}", name, other),
            }
        }
    }

    #[test]
    fn test_available_environments_requires_config() {
        let temp_dir = TempDir::new().unwrap();
        make_env(temp_dir.path(), "beta");
        make_env(temp_dir.path(), "alpha");
        fs::create_dir_all(temp_dir.path().join("not-an-env")).unwrap();

        let envs = available_environments(temp_dir.path()).unwrap();
        let names: Vec<_> = envs
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["alpha", "beta"]);
    }

    #[test]
    fn test_resolve_environment_path() {
        let temp_dir = TempDir::new().unwrap();
        let composer_dir = temp_dir.path().join(COMPOSER_DIR);

        assert!(matches!(
            resolve_environment_path(&composer_dir, None),
            Err(ComposerError::EnvironmentsDirNotFound { .. })
        ));

        fs::create_dir_all(&composer_dir).unwrap();
        assert!(matches!(
            resolve_environment_path(&composer_dir, None),
            Err(ComposerError::NoEnvironments { .. })
        ));

        let only = make_env(&composer_dir, "only");
        assert_eq!(resolve_environment_path(&composer_dir, None).unwrap(), only);

        make_env(&composer_dir, "other");
        match resolve_environment_path(&composer_dir, None) {
            Err(ComposerError::EnvironmentNotSelected { names, .. }) => {
                assert_eq!(names, vec!["only", "other"])
            }
            other => panic!("unexpected result: {:?}", other),
        }

        assert_eq!(
            resolve_environment_path(&composer_dir, Some("other")).unwrap(),
            composer_dir.join("other")
        );
        assert!(matches!(
            resolve_environment_path(&composer_dir, Some("missing")),
            Err(ComposerError::EnvironmentNotFound { .. })
        ));
    }

    #[test]
    fn test_resolve_dags_path_defaults_and_is_absolute() {
        let temp_dir = TempDir::new().unwrap();
        let dags = resolve_dags_path(None, temp_dir.path()).unwrap();
        assert!(dags.is_absolute());
        assert!(dags.ends_with(DEFAULT_DAGS_DIR));

        let relative = resolve_dags_path(Some(Path::new("some/dags")), temp_dir.path()).unwrap();
        assert!(relative.is_absolute());
    }

    #[test]
    fn test_create_environment_directories() {
        let temp_dir = TempDir::new().unwrap();
        let env_dir = temp_dir.path().join("composer").join("dev");
        let dags = temp_dir.path().join("dags");
        create_environment_directories(&env_dir, &dags).unwrap();

        assert!(env_dir.join(DATA_DIR).is_dir());
        assert!(env_dir.join(PLUGINS_DIR).is_dir());
        assert!(dags.is_dir());
        assert!(assert_dags_path_exists(&dags).is_ok());
    }

    #[test]
    fn test_create_empty_file_skip_if_exists() {
        let temp_dir = TempDir::new().unwrap();
        let db = temp_dir.path().join("airflow.db");
        fs::write(&db, "data").unwrap();

        create_empty_file(&db, true).unwrap();
        assert_eq!(fs::read_to_string(&db).unwrap(), "data");

        create_empty_file(&db, false).unwrap();
        assert_eq!(fs::read_to_string(&db).unwrap(), "");
    }

    #[test]
    fn test_assert_requirements_exist() {
        let temp_dir = TempDir::new().unwrap();
        assert!(matches!(
            assert_requirements_exist(temp_dir.path()),
            Err(ComposerError::RequirementsNotFound { .. })
        ));
        fs::write(temp_dir.path().join(REQUIREMENTS_FILE), "").unwrap();
        assert!(assert_requirements_exist(temp_dir.path()).is_ok());
    }

    #[test]
    fn test_dos2unix_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(REQUIREMENTS_FILE);
        fs::write(&path, "numpy\r\npandas\r\n").unwrap();
        dos2unix_file(&path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "numpy\npandas\n");
    }

    #[test]
    fn test_dos2unix_file_accepts_non_utf8_content() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(REQUIREMENTS_FILE);
        fs::write(&path, b"# caf\xe9\r\nnumpy\r\n").unwrap();
        dos2unix_file(&path).unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"# caf\xe9\nnumpy\n");
    }

    #[test]
    fn test_dos2unix_file_keeps_lone_carriage_return() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(REQUIREMENTS_FILE);
        fs::write(&path, "a\rb\r\n").unwrap();
        dos2unix_file(&path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "a\rb\n");
    }

    #[cfg(unix)]
    #[test]
    fn test_fix_file_permissions_on_linux_host() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("airflow.db");
        fs::write(&path, "").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o600)).unwrap();

        fix_file_permissions(&FixedHost::linux("/tmp"), &[&path]).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o666);
    }
}
