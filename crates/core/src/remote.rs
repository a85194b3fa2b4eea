//! Cloud Composer REST API: environment snapshots and released image versions

use crate::errors::{ComposerError, Result};
use crate::gcloud::GoogleApiClient;
use crate::version::ImageVersion;
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::{debug, info, instrument, warn};

/// Default Cloud Composer REST endpoint
pub const COMPOSER_API_BASE_URL: &str = "https://composer.googleapis.com/v1";

/// Software configuration of a remote environment
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SoftwareConfig {
    pub image_version: String,
    pub pypi_packages: BTreeMap<String, String>,
    pub env_variables: BTreeMap<String, String>,
    pub airflow_config_overrides: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct EnvironmentResource {
    #[serde(default)]
    config: EnvironmentResourceConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct EnvironmentResourceConfig {
    software_config: SoftwareConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ListImageVersionsPage {
    image_versions: Vec<ImageVersionResource>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageVersionResource {
    image_version_id: String,
    release_date: Option<ApiDate>,
}

#[derive(Debug, Deserialize)]
struct ApiDate {
    #[serde(default)]
    year: i32,
    #[serde(default)]
    month: u32,
    #[serde(default)]
    day: u32,
}

/// Reads the software configuration of a running Composer environment
#[async_trait::async_trait]
pub trait SnapshotFetcher: Send + Sync {
    async fn fetch(&self, project: &str, location: &str, environment: &str) -> Result<SoftwareConfig>;
}

/// Lists image versions released for a location
#[async_trait::async_trait]
pub trait VersionCatalog: Send + Sync {
    async fn list_image_versions(
        &self,
        project: &str,
        location: &str,
        include_past_releases: bool,
    ) -> Result<Vec<ImageVersion>>;
}

/// Cloud Composer v1 client
#[derive(Debug, Clone)]
pub struct ComposerApiClient {
    api: GoogleApiClient,
    base_url: String,
}

impl ComposerApiClient {
    pub fn new(api: GoogleApiClient) -> Self {
        Self::with_base_url(api, COMPOSER_API_BASE_URL)
    }

    pub fn with_base_url(api: GoogleApiClient, base_url: impl Into<String>) -> Self {
        Self {
            api,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait::async_trait]
impl SnapshotFetcher for ComposerApiClient {
    #[instrument(skip(self))]
    async fn fetch(&self, project: &str, location: &str, environment: &str) -> Result<SoftwareConfig> {
        info!("Getting Cloud Composer environment configuration.");
        let url = format!(
            "{}/projects/{}/locations/{}/environments/{}",
            self.base_url, project, location, environment
        );
        let resource: EnvironmentResource =
            self.api
                .get_json(&url, &[])
                .await
                .map_err(|e| ComposerError::RemoteConfig {
                    message: e.to_string(),
                })?;
        debug!("Software config: {:?}", resource.config.software_config);
        Ok(resource.config.software_config)
    }
}

#[async_trait::async_trait]
impl VersionCatalog for ComposerApiClient {
    #[instrument(skip(self))]
    async fn list_image_versions(
        &self,
        project: &str,
        location: &str,
        include_past_releases: bool,
    ) -> Result<Vec<ImageVersion>> {
        let url = format!(
            "{}/projects/{}/locations/{}/imageVersions",
            self.base_url, project, location
        );
        let mut versions = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query = vec![("includePastReleases", include_past_releases.to_string())];
            if let Some(token) = &page_token {
                query.push(("pageToken", token.clone()));
            }
            let page: ListImageVersionsPage =
                self.api
                    .get_json(&url, &query)
                    .await
                    .map_err(|e| ComposerError::ListVersions {
                        message: e.to_string(),
                    })?;

            for resource in page.image_versions {
                match resource.release_date.as_ref().and_then(ApiDate::to_naive) {
                    Some(date) => versions.push(ImageVersion::new(resource.image_version_id, date)),
                    None => warn!(
                        "Skipping image version {} without a valid release date",
                        resource.image_version_id
                    ),
                }
            }

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        debug!("Listed {} image versions", versions.len());
        Ok(versions)
    }
}

impl ApiDate {
    fn to_naive(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, self.day)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gcloud::StaticTokenProvider;
    use std::sync::Arc;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> ComposerApiClient {
        let api = GoogleApiClient::new(Arc::new(StaticTokenProvider("token".into())));
        ComposerApiClient::with_base_url(api, format!("{}/v1", server.uri()))
    }

    #[tokio::test]
    async fn test_fetch_software_config() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/projects/p/locations/us-central1/environments/prod"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "name": "projects/p/locations/us-central1/environments/prod",
                "config": {
                    "softwareConfig": {
                        "imageVersion": "composer-2.0.8-airflow-2.2.3",
                        "pypiPackages": {"pandas": "==1.4.0"},
                        "envVariables": {"FOO": "bar"},
                        "airflowConfigOverrides": {"core-dags_are_paused_at_creation": "True"}
                    }
                }
            })))
            .mount(&server)
            .await;

        let config = client(&server).fetch("p", "us-central1", "prod").await.unwrap();
        assert_eq!(config.image_version, "composer-2.0.8-airflow-2.2.3");
        assert_eq!(config.pypi_packages["pandas"], "==1.4.0");
        assert_eq!(config.env_variables["FOO"], "bar");
        assert_eq!(
            config.airflow_config_overrides["core-dags_are_paused_at_creation"],
            "True"
        );
    }

    #[tokio::test]
    async fn test_fetch_missing_sections_default() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/projects/p/locations/l/environments/e"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "config": {"softwareConfig": {"imageVersion": "composer-2.1.0-airflow-2.3.4"}}
            })))
            .mount(&server)
            .await;

        let config = client(&server).fetch("p", "l", "e").await.unwrap();
        assert!(config.pypi_packages.is_empty());
        assert!(config.env_variables.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_error_is_remote_config() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
                "error": {"code": 403, "message": "caller lacks permission"}
            })))
            .mount(&server)
            .await;

        let err = client(&server).fetch("p", "l", "e").await.unwrap_err();
        assert!(matches!(err, ComposerError::RemoteConfig { .. }));
        assert!(err.to_string().contains("caller lacks permission"));
        assert_eq!(err.kind(), crate::errors::ErrorKind::RemoteApi);
    }

    #[tokio::test]
    async fn test_list_image_versions_follows_pages() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/projects/p/locations/l/imageVersions"))
            .and(query_param("pageToken", "next"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "imageVersions": [
                    {"imageVersionId": "composer-2.0.9-airflow-2.2.3", "releaseDate": {"year": 2022, "month": 3, "day": 1}}
                ]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/projects/p/locations/l/imageVersions"))
            .and(query_param("includePastReleases", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "imageVersions": [
                    {"imageVersionId": "composer-2.0.8-airflow-2.2.3", "releaseDate": {"year": 2022, "month": 2, "day": 7}},
                    {"imageVersionId": "composer-2.0.7-airflow-2.2.3"}
                ],
                "nextPageToken": "next"
            })))
            .mount(&server)
            .await;

        let versions = client(&server)
            .list_image_versions("p", "l", true)
            .await
            .unwrap();
        let ids: Vec<_> = versions.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["composer-2.0.8-airflow-2.2.3", "composer-2.0.9-airflow-2.2.3"]
        );
        assert_eq!(versions[0].release_date_display(), "07/02/2022");
    }

    #[tokio::test]
    async fn test_list_image_versions_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500).set_body_string("backend down"))
            .mount(&server)
            .await;

        let err = client(&server)
            .list_image_versions("p", "l", false)
            .await
            .unwrap_err();
        assert!(matches!(err, ComposerError::ListVersions { .. }));
    }
}
