//! Core library for composer-dev
//!
//! Lifecycle management of local Cloud Composer environments: environment
//! configuration, container specification, the Docker CLI adapter and the
//! Google Cloud API clients used to validate image versions and template
//! environments on existing ones.

pub mod clock;
pub mod config;
pub mod container;
pub mod docker;
pub mod environment;
pub mod errors;
pub mod files;
pub mod gcloud;
pub mod logging;
pub mod mount;
pub mod platform;
pub mod ports;
pub mod registry;
pub mod remote;
pub mod variables;
pub mod version;

// Re-export for callers constructing image versions
pub use chrono::NaiveDate;

/// Get the version of the core library
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        let version = version();
        assert!(!version.is_empty());
        assert!(version.contains('.'));
    }
}
