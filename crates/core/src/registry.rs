//! Image tag existence checks against Artifact Registry

use crate::errors::{ComposerError, RegistryError, Result};
use crate::gcloud::GoogleApiClient;
use crate::version::ParsedImageVersion;
use tracing::{debug, instrument, warn};

/// Default Artifact Registry REST endpoint
pub const ARTIFACT_REGISTRY_BASE_URL: &str = "https://artifactregistry.googleapis.com/v1";

const IMAGE_TAG_PERMISSION_DENIED_WARN: &str =
    "Received permission denied when checking image existence. Proceeding without verifying that the image exists.";

/// Lookup of released image tags
#[async_trait::async_trait]
pub trait ImageRegistry: Send + Sync + std::fmt::Debug {
    /// Succeeds when the tag for `version` exists in the registry
    async fn check_tag(&self, version: &ParsedImageVersion) -> std::result::Result<(), RegistryError>;
}

/// [`ImageRegistry`] backed by the Artifact Registry REST API
#[derive(Debug, Clone)]
pub struct ArtifactRegistryClient {
    api: GoogleApiClient,
    base_url: String,
}

impl ArtifactRegistryClient {
    pub fn new(api: GoogleApiClient) -> Self {
        Self::with_base_url(api, ARTIFACT_REGISTRY_BASE_URL)
    }

    pub fn with_base_url(api: GoogleApiClient, base_url: impl Into<String>) -> Self {
        Self {
            api,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait::async_trait]
impl ImageRegistry for ArtifactRegistryClient {
    #[instrument(skip(self))]
    async fn check_tag(&self, version: &ParsedImageVersion) -> std::result::Result<(), RegistryError> {
        let url = format!("{}/{}", self.base_url, version.artifact_registry_path());
        let _tag: serde_json::Value = self.api.get_json(&url, &[]).await?;
        debug!("Image tag {} exists", version.image_tag());
        Ok(())
    }
}

/// Fail only when the registry positively reports the tag as missing or the
/// credentials are rejected; every other registry failure is logged and ignored.
#[instrument(skip(registry))]
pub async fn assert_image_exists(registry: &dyn ImageRegistry, image_version: &str) -> Result<()> {
    let parsed = ParsedImageVersion::parse(image_version)?;
    match registry.check_tag(&parsed).await {
        Ok(()) => Ok(()),
        Err(RegistryError::NotFound { .. }) => Err(ComposerError::ImageNotFound {
            image_version: image_version.to_string(),
        }),
        Err(RegistryError::PermissionDenied { message }) => {
            warn!("{}", IMAGE_TAG_PERMISSION_DENIED_WARN);
            debug!("Permission denied details: {}", message);
            Ok(())
        }
        Err(RegistryError::Unauthenticated { message }) => {
            Err(ComposerError::InvalidAuth { message })
        }
        Err(other) => {
            warn!("Could not verify that image version {} exists: {}", image_version, other);
            Ok(())
        }
    }
}
