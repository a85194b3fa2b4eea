//! Host platform capability
//!
//! Everything that depends on the operating system the tool runs on (host
//! user identity, the gcloud configuration location, Docker Desktop path
//! conventions) sits behind [`HostEnvironment`] so lifecycle code can be
//! exercised with a [`FixedHost`] in tests.

use crate::errors::{ComposerError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, instrument};

/// Overrides the gcloud configuration directory
pub const CLOUDSDK_CONFIG_ENV: &str = "CLOUDSDK_CONFIG";

/// Platform types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    /// Native Linux
    Linux,
    /// macOS
    MacOS,
    /// Native Windows
    Windows,
    /// Windows Subsystem for Linux
    WSL,
}

impl Platform {
    /// Detect the current platform environment
    #[instrument]
    pub fn detect() -> Self {
        if cfg!(target_os = "windows") {
            return Platform::Windows;
        }
        if cfg!(target_os = "macos") {
            return Platform::MacOS;
        }
        if cfg!(target_os = "linux") && Self::is_wsl() {
            return Platform::WSL;
        }
        Platform::Linux
    }

    fn is_wsl() -> bool {
        match fs::read_to_string("/proc/version") {
            Ok(version) => {
                let is_wsl = version.to_lowercase().contains("microsoft");
                debug!("WSL detection: {}", is_wsl);
                is_wsl
            }
            Err(_) => false,
        }
    }

    pub fn is_windows(self) -> bool {
        self == Platform::Windows
    }

    /// Linux kernels, including WSL, where bind-mounted files keep host permissions
    pub fn is_linux(self) -> bool {
        matches!(self, Platform::Linux | Platform::WSL)
    }

    /// Check if this platform requires Docker Desktop path conversion
    pub fn needs_docker_desktop_path_conversion(self) -> bool {
        matches!(self, Platform::Windows | Platform::WSL)
    }
}

/// Operating-system facts the lifecycle depends on
pub trait HostEnvironment: Send + Sync + std::fmt::Debug {
    fn platform(&self) -> Platform;

    /// Numeric id of the invoking user; `None` where the concept does not apply
    fn user_id(&self) -> Option<u32>;

    fn user_name(&self) -> String;

    /// Directory holding the gcloud CLI configuration and credentials
    fn gcloud_config_path(&self) -> Result<PathBuf>;

    fn is_windows(&self) -> bool {
        self.platform().is_windows()
    }

    fn is_linux(&self) -> bool {
        self.platform().is_linux()
    }
}

/// The machine the process is running on
#[derive(Debug, Clone)]
pub struct SystemHost {
    platform: Platform,
    user_id: Option<u32>,
    user_name: String,
}

impl SystemHost {
    pub fn detect() -> Self {
        let platform = Platform::detect();
        let user_id = if platform.is_windows() {
            None
        } else {
            host_user_id()
        };
        Self {
            platform,
            user_id,
            user_name: host_user_name(),
        }
    }
}

impl HostEnvironment for SystemHost {
    fn platform(&self) -> Platform {
        self.platform
    }

    fn user_id(&self) -> Option<u32> {
        self.user_id
    }

    fn user_name(&self) -> String {
        self.user_name.clone()
    }

    fn gcloud_config_path(&self) -> Result<PathBuf> {
        if let Ok(path) = std::env::var(CLOUDSDK_CONFIG_ENV) {
            return Ok(PathBuf::from(path));
        }
        let candidate = match std::env::var("APPDATA") {
            Ok(appdata) if self.platform.is_windows() => Some(PathBuf::from(appdata).join("gcloud")),
            _ => directories_next::BaseDirs::new()
                .map(|dirs| dirs.home_dir().join(".config").join("gcloud")),
        };
        match candidate {
            Some(path) if path.is_dir() => Ok(path),
            _ => Err(ComposerError::CredentialsNotFound),
        }
    }
}

fn host_user_id() -> Option<u32> {
    if let Some(uid) = std::env::var("UID").ok().and_then(|s| s.parse().ok()) {
        return Some(uid);
    }
    let output = Command::new("id").arg("-u").output().ok()?;
    let uid = String::from_utf8_lossy(&output.stdout).trim().parse().ok();
    debug!("Host UID from `id -u`: {:?}", uid);
    uid
}

fn host_user_name() -> String {
    ["LOGNAME", "USER", "LNAME", "USERNAME"]
        .iter()
        .find_map(|var| std::env::var(var).ok().filter(|v| !v.is_empty()))
        .unwrap_or_else(|| "airflow".to_string())
}

/// Host with fixed answers, for tests and for callers that already know them
#[derive(Debug, Clone)]
pub struct FixedHost {
    pub platform: Platform,
    pub user_id: Option<u32>,
    pub user_name: String,
    pub gcloud_config_path: PathBuf,
}

impl FixedHost {
    pub fn linux(gcloud_config_path: impl Into<PathBuf>) -> Self {
        Self {
            platform: Platform::Linux,
            user_id: Some(1000),
            user_name: "developer".to_string(),
            gcloud_config_path: gcloud_config_path.into(),
        }
    }

    pub fn windows(gcloud_config_path: impl Into<PathBuf>) -> Self {
        Self {
            platform: Platform::Windows,
            user_id: None,
            user_name: "developer".to_string(),
            gcloud_config_path: gcloud_config_path.into(),
        }
    }
}

impl HostEnvironment for FixedHost {
    fn platform(&self) -> Platform {
        self.platform
    }

    fn user_id(&self) -> Option<u32> {
        self.user_id
    }

    fn user_name(&self) -> String {
        self.user_name.clone()
    }

    fn gcloud_config_path(&self) -> Result<PathBuf> {
        Ok(self.gcloud_config_path.clone())
    }
}

/// Convert Windows-style paths to the `/c/path` form Docker Desktop expects
pub fn convert_path_for_docker_desktop(path: &Path) -> String {
    let path_str = path.to_string_lossy();

    if path_str.starts_with('/') {
        return path_str.to_string();
    }

    if let Some(rest) = path_str.strip_prefix(r"\\?\") {
        if let Some(unc_path) = rest.strip_prefix("UNC\\") {
            return format!("//{}", unc_path.replace('\\', "/"));
        }
        return convert_drive_path(rest);
    }

    convert_drive_path(&path_str)
}

fn convert_drive_path(windows_path: &str) -> String {
    let mut chars = windows_path.chars();
    match (chars.next(), chars.next()) {
        (Some(drive), Some(':')) => {
            let rest = chars.as_str().replace('\\', "/");
            let drive = drive.to_ascii_lowercase();
            if rest.is_empty() || rest == "/" {
                format!("/{}", drive)
            } else if rest.starts_with('/') {
                format!("/{}{}", drive, rest)
            } else {
                format!("/{}/{}", drive, rest)
            }
        }
        _ => windows_path.replace('\\', "/"),
    }
}

/// Convert CRLF line endings to LF; a lone CR is kept
pub fn normalize_line_endings(content: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(content.len());
    let mut bytes = content.iter().peekable();
    while let Some(&b) = bytes.next() {
        if b == b'\r' && bytes.peek() == Some(&&b'\n') {
            continue;
        }
        out.push(b);
    }
    out
}
