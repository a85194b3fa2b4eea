//! Image version parsing and ordering
//!
//! An image version such as `composer-2.0.8-airflow-2.2.3` names both the
//! Composer release and the Airflow version it ships. Registry paths use the
//! Airflow part in dashed form (`2-2-3`).

use crate::errors::{ConfigError, Result};
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use std::cmp::Ordering;
use std::fmt;

static IMAGE_VERSION_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^composer-([1-9][0-9]*\.[0-9]+\.[0-9]+)-airflow-([1-9][0-9]*[.-][0-9]+[.-][0-9]+)$")
        .expect("Valid regex pattern")
});

/// Identifier prefix of the previous major Composer generation
pub const SUPERSEDED_MAJOR_PREFIX: &str = "composer-1";

/// Number of versions listed when no limit is given
pub const DEFAULT_VERSIONS_LIMIT: usize = 10;

const RELEASER_PROJECT: &str = "cloud-airflow-releaser";
const IMAGE_REGISTRY_HOST: &str = "us-docker.pkg.dev";

/// Parsed `composer-X.Y.Z-airflow-A.B.C` identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedImageVersion {
    /// Composer release, dotted (`2.0.8`)
    pub composer: String,
    /// Airflow version, dashed (`2-2-3`)
    pub airflow: String,
}

impl ParsedImageVersion {
    pub fn parse(image_version: &str) -> Result<Self> {
        let captures = IMAGE_VERSION_PATTERN
            .captures(image_version)
            .ok_or_else(|| ConfigError::InvalidImageVersion {
                value: image_version.to_string(),
            })?;
        Ok(Self {
            composer: captures[1].to_string(),
            airflow: captures[2].replace('.', "-"),
        })
    }

    /// Recover a version from a container image tag (`...:composer-2.0.8-airflow-2-2-3`)
    pub fn from_image_tag(tag: &str) -> Result<Self> {
        let tag = tag.rsplit(':').next().unwrap_or(tag);
        Self::parse(tag)
    }

    pub fn airflow_dotted(&self) -> String {
        self.airflow.replace('-', ".")
    }

    /// Tag used in the registry (`composer-2.0.8-airflow-2-2-3`)
    pub fn image_tag(&self) -> String {
        format!("composer-{}-airflow-{}", self.composer, self.airflow)
    }

    /// User-facing identifier (`composer-2.0.8-airflow-2.2.3`)
    pub fn image_version(&self) -> String {
        format!("composer-{}-airflow-{}", self.composer, self.airflow_dotted())
    }

    /// Artifact Registry resource name of the tag
    pub fn artifact_registry_path(&self) -> String {
        let airflow = &self.airflow;
        format!(
            "projects/{RELEASER_PROJECT}/locations/us/repositories/airflow-worker-scheduler-{airflow}/packages/airflow-worker-scheduler-{airflow}/tags/{}",
            self.image_tag()
        )
    }

    /// Pullable image reference
    pub fn docker_image_ref(&self) -> String {
        let airflow = &self.airflow;
        format!(
            "{IMAGE_REGISTRY_HOST}/{RELEASER_PROJECT}/airflow-worker-scheduler-{airflow}/airflow-worker-scheduler-{airflow}:{}",
            self.image_tag()
        )
    }
}

/// Released image version as reported by the Composer API
///
/// Ordered by release date, then by identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageVersion {
    pub id: String,
    pub release_date: NaiveDate,
}

impl ImageVersion {
    pub fn new(id: impl Into<String>, release_date: NaiveDate) -> Self {
        Self {
            id: id.into(),
            release_date,
        }
    }

    /// Release date rendered as `dd/mm/yyyy`
    pub fn release_date_display(&self) -> String {
        self.release_date.format("%d/%m/%Y").to_string()
    }
}

impl Ord for ImageVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.release_date
            .cmp(&other.release_date)
            .then_with(|| self.id.cmp(&other.id))
    }
}

impl PartialOrd for ImageVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ImageVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.id, self.release_date_display())
    }
}

/// Drop versions of the previous major generation, preserving order
pub fn filter_superseded_major(versions: Vec<ImageVersion>) -> Vec<ImageVersion> {
    versions
        .into_iter()
        .filter(|v| !v.id.starts_with(SUPERSEDED_MAJOR_PREFIX))
        .collect()
}

/// Newest first, truncated to `limit`
pub fn sort_and_limit(mut versions: Vec<ImageVersion>, limit: usize) -> Vec<ImageVersion> {
    versions.sort_by(|a, b| b.cmp(a));
    versions.truncate(limit);
    versions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ComposerError;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse() {
        let parsed = ParsedImageVersion::parse("composer-2.0.8-airflow-2.2.3").unwrap();
        assert_eq!(parsed.composer, "2.0.8");
        assert_eq!(parsed.airflow, "2-2-3");
        assert_eq!(parsed.image_version(), "composer-2.0.8-airflow-2.2.3");
    }

    #[test]
    fn test_parse_accepts_dashed_airflow() {
        let parsed = ParsedImageVersion::parse("composer-2.1.12-airflow-2-4-3").unwrap();
        assert_eq!(parsed.airflow, "2-4-3");
        assert_eq!(parsed.airflow_dotted(), "2.4.3");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for value in [
            "",
            "composer-2.0.8",
            "composer-0.0.8-airflow-2.2.3",
            "composer-2.0.8-airflow-2.2",
            "composer-latest-airflow-2.2.3",
            "xcomposer-2.0.8-airflow-2.2.3",
            "composer-2.0.8-airflow-2.2.3-extra",
        ] {
            let err = ParsedImageVersion::parse(value).unwrap_err();
            assert!(
                matches!(err, ComposerError::Config(ConfigError::InvalidImageVersion { .. })),
                "expected rejection of '{}'",
                value
            );
        }
    }

    #[test]
    fn test_registry_addresses() {
        let parsed = ParsedImageVersion::parse("composer-2.0.8-airflow-2.2.3").unwrap();
        assert_eq!(
            parsed.artifact_registry_path(),
            "projects/cloud-airflow-releaser/locations/us/repositories/airflow-worker-scheduler-2-2-3/packages/airflow-worker-scheduler-2-2-3/tags/composer-2.0.8-airflow-2-2-3"
        );
        assert_eq!(
            parsed.docker_image_ref(),
            "us-docker.pkg.dev/cloud-airflow-releaser/airflow-worker-scheduler-2-2-3/airflow-worker-scheduler-2-2-3:composer-2.0.8-airflow-2-2-3"
        );
    }

    #[test]
    fn test_from_image_tag() {
        let parsed = ParsedImageVersion::from_image_tag(
            "us-docker.pkg.dev/cloud-airflow-releaser/airflow-worker-scheduler-2-2-3/airflow-worker-scheduler-2-2-3:composer-2.0.8-airflow-2-2-3",
        )
        .unwrap();
        assert_eq!(parsed.image_version(), "composer-2.0.8-airflow-2.2.3");
    }

    #[test]
    fn test_ordering_by_date_then_id() {
        let older = ImageVersion::new("composer-2.0.9-airflow-2.2.3", date(2022, 1, 1));
        let newer = ImageVersion::new("composer-2.0.8-airflow-2.2.3", date(2022, 2, 1));
        assert!(older < newer);

        let a = ImageVersion::new("composer-2.0.8-airflow-2.1.4", date(2022, 2, 1));
        let b = ImageVersion::new("composer-2.0.8-airflow-2.2.3", date(2022, 2, 1));
        assert!(a < b);
        assert_ne!(a, b);
        assert_eq!(b.clone(), b);
    }

    #[test]
    fn test_sort_and_limit_returns_latest() {
        let versions = vec![
            ImageVersion::new("composer-2.0.1-airflow-2.1.4", date(2021, 10, 1)),
            ImageVersion::new("composer-2.0.5-airflow-2.2.3", date(2022, 3, 5)),
            ImageVersion::new("composer-2.0.2-airflow-2.1.4", date(2021, 12, 24)),
            ImageVersion::new("composer-2.0.4-airflow-2.2.3", date(2022, 3, 1)),
            ImageVersion::new("composer-2.0.3-airflow-2.1.4", date(2022, 1, 15)),
        ];
        let limited = sort_and_limit(versions.clone(), 1);
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].id, "composer-2.0.5-airflow-2.2.3");

        let all = sort_and_limit(versions, 10);
        assert_eq!(all.len(), 5);
        assert!(all.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn test_sort_and_limit_tie_broken_by_id() {
        let versions = vec![
            ImageVersion::new("composer-2.0.8-airflow-2.1.4", date(2022, 3, 5)),
            ImageVersion::new("composer-2.0.8-airflow-2.2.3", date(2022, 3, 5)),
        ];
        let limited = sort_and_limit(versions, 1);
        assert_eq!(limited[0].id, "composer-2.0.8-airflow-2.2.3");
    }

    #[test]
    fn test_filter_superseded_major() {
        let versions = vec![
            ImageVersion::new("composer-2.0.1-airflow-2.1.4", date(2021, 10, 1)),
            ImageVersion::new("composer-1.18.0-airflow-1.10.15", date(2022, 1, 1)),
            ImageVersion::new("composer-2.0.2-airflow-2.1.4", date(2021, 12, 24)),
            ImageVersion::new("composer-1.17.9-airflow-2.1.4", date(2021, 11, 1)),
            ImageVersion::new("composer-2.0.3-airflow-2.2.3", date(2022, 1, 15)),
        ];
        let filtered = filter_superseded_major(versions);
        let ids: Vec<&str> = filtered.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "composer-2.0.1-airflow-2.1.4",
                "composer-2.0.2-airflow-2.1.4",
                "composer-2.0.3-airflow-2.2.3",
            ]
        );
    }

    #[test]
    fn test_release_date_display() {
        let version = ImageVersion::new("composer-2.0.8-airflow-2.2.3", date(2022, 3, 5));
        assert_eq!(version.release_date_display(), "05/03/2022");
    }
}
