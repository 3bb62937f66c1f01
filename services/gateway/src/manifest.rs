//! Manifest retrieval through the registry backend

use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::access::RepositoryGrant;
use crate::backend::{BackendError, RawManifest, RegistryBackend};
use crate::error::{GatewayError, GatewayResult};
use crate::permission::Operation;

/// A content descriptor inside a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Descriptor {
    /// Media type of the referenced content.
    #[serde(default)]
    pub media_type: String,

    /// Size in bytes.
    #[serde(default)]
    pub size: u64,

    /// Content digest.
    pub digest: String,
}

/// The parts of an image manifest the gateway reads.
///
/// Schema 1 manifests have no config descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageManifest {
    /// Manifest schema version.
    pub schema_version: u32,

    /// Image config blob.
    #[serde(default)]
    pub config: Option<Descriptor>,

    /// Filesystem layers.
    #[serde(default)]
    pub layers: Vec<Descriptor>,
}

impl ImageManifest {
    /// Total image size: config plus layers.
    pub fn size(&self) -> u64 {
        let config = self.config.as_ref().map_or(0, |config| config.size);
        self.layers
            .iter()
            .fold(config, |total, layer| total.saturating_add(layer.size))
    }
}

/// Manifest response: the manifest document and its image config.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManifestInfo {
    /// Manifest digest.
    pub digest: String,

    /// Manifest media type.
    pub media_type: String,

    /// Manifest document.
    pub manifest: serde_json::Value,

    /// Image config document, when the manifest references one.
    pub config: Option<serde_json::Value>,
}

/// Adapter over the registry backend.
///
/// Translates backend errors into gateway errors: every flavor of absence
/// becomes `NotFound`, transport failures become `BackendUnavailable`.
#[derive(Debug, Clone)]
pub struct ManifestGateway {
    backend: Arc<dyn RegistryBackend>,
}

impl ManifestGateway {
    /// Create a gateway over a registry backend.
    pub fn new(backend: Arc<dyn RegistryBackend>) -> Self {
        Self { backend }
    }

    /// Tags of a repository, as the registry reports them.
    pub(crate) async fn tags(&self, repository: &str) -> GatewayResult<Vec<String>> {
        self.backend
            .list_tags(repository)
            .await
            .map_err(|error| translate(repository, error))
    }

    /// Fetch and decode a manifest.
    pub(crate) async fn fetch(
        &self,
        repository: &str,
        reference: &str,
    ) -> GatewayResult<(RawManifest, ImageManifest)> {
        let raw = self
            .backend
            .manifest(repository, reference)
            .await
            .map_err(|error| translate(repository, error))?;

        let manifest = serde_json::from_slice(&raw.payload).map_err(|error| {
            GatewayError::MalformedBackendData {
                what: "manifest",
                repository: repository.to_string(),
                reason: error.to_string(),
            }
        })?;

        Ok((raw, manifest))
    }

    /// Fetch the image config blob referenced by a manifest.
    ///
    /// The manifest was found, so a config blob missing from the registry is
    /// a fault in the registry's data, not an unknown resource.
    pub(crate) async fn config(
        &self,
        repository: &str,
        manifest: &ImageManifest,
    ) -> GatewayResult<Option<Bytes>> {
        let Some(descriptor) = &manifest.config else {
            return Ok(None);
        };

        self.backend
            .blob(repository, &descriptor.digest)
            .await
            .map(Some)
            .map_err(|error| match error {
                BackendError::BlobUnknown(digest) => GatewayError::MalformedBackendData {
                    what: "image config",
                    repository: repository.to_string(),
                    reason: format!("config blob {digest} is missing"),
                },
                other => translate(repository, other),
            })
    }

    /// The manifest and image config for a tag of a readable repository.
    #[tracing::instrument(level = "debug", skip(self, grant), fields(repository = grant.name()))]
    pub async fn get_manifest(
        &self,
        grant: &RepositoryGrant,
        reference: &str,
    ) -> GatewayResult<ManifestInfo> {
        grant.require(Operation::Read)?;
        let repository = grant.name();

        let (raw, manifest) = self.fetch(repository, reference).await?;
        let config = self
            .config(repository, &manifest)
            .await?
            .map(|blob| decode_json(repository, "image config", &blob))
            .transpose()?;

        Ok(ManifestInfo {
            digest: raw.digest,
            media_type: raw.media_type,
            manifest: decode_json(repository, "manifest", &raw.payload)?,
            config,
        })
    }
}

fn decode_json(
    repository: &str,
    what: &'static str,
    data: &[u8],
) -> GatewayResult<serde_json::Value> {
    serde_json::from_slice(data).map_err(|error| GatewayError::MalformedBackendData {
        what,
        repository: repository.to_string(),
        reason: error.to_string(),
    })
}

fn translate(repository: &str, error: BackendError) -> GatewayError {
    if !error.is_not_found() {
        tracing::warn!(%repository, %error, "registry backend unavailable");
    }
    error.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Resource;
    use crate::role::Actor;
    use crate::testing;

    #[tokio::test]
    async fn manifest_for_known_tag() {
        let fixture = testing::Fixture::new().await;
        let grant = fixture.read_grant(testing::HELLO_WORLD).await;

        let info = fixture
            .manifests()
            .get_manifest(&grant, "latest")
            .await
            .unwrap();
        assert!(info.digest.starts_with("sha256:"));
        assert_eq!(info.manifest["schemaVersion"], 2);
        let config = info.config.expect("config blob");
        assert_eq!(config["architecture"], "amd64");
    }

    #[tokio::test]
    async fn unknown_tag_is_not_found() {
        let fixture = testing::Fixture::new().await;
        let grant = fixture.read_grant(testing::HELLO_WORLD).await;

        for reference in ["l", "sha256:0000", "../latest"] {
            let err = fixture
                .manifests()
                .get_manifest(&grant, reference)
                .await
                .unwrap_err();
            assert!(
                matches!(err, GatewayError::NotFound(Resource::Manifest { .. })),
                "{reference}: {err}"
            );
        }
    }

    #[tokio::test]
    async fn repository_without_images_is_not_found() {
        let fixture = testing::Fixture::new().await;
        let grant = fixture.read_grant(testing::EMPTY_REPO).await;

        let err = fixture
            .manifests()
            .get_manifest(&grant, "latest")
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::NotFound(Resource::Repository(_))), "{err}");
    }

    #[tokio::test]
    async fn transport_failure_is_unavailable() {
        let fixture = testing::Fixture::new().await;
        let grant = fixture.read_grant(testing::HELLO_WORLD).await;
        let gateway = ManifestGateway::new(Arc::new(testing::UnreachableRegistry));

        let err = gateway.get_manifest(&grant, "latest").await.unwrap_err();
        assert!(
            matches!(err, GatewayError::BackendUnavailable(BackendError::Unavailable(_))),
            "{err}"
        );
    }

    #[tokio::test]
    async fn missing_config_blob_is_malformed_data() {
        let fixture = testing::Fixture::new().await;
        fixture.push_dangling_config(testing::HELLO_WORLD, "broken").await;
        let grant = fixture.read_grant(testing::HELLO_WORLD).await;

        let err = fixture
            .manifests()
            .get_manifest(&grant, "broken")
            .await
            .unwrap_err();
        assert!(
            matches!(
                err,
                GatewayError::MalformedBackendData {
                    what: "image config",
                    ..
                }
            ),
            "{err}"
        );
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn schema_one_manifest_has_no_config() {
        let fixture = testing::Fixture::new().await;
        fixture
            .registry
            .put_manifest(testing::HELLO_WORLD, "legacy", r#"{"schemaVersion":1}"#)
            .await;
        let grant = fixture
            .access()
            .repository(&Actor::anonymous(), testing::HELLO_WORLD, Operation::Read)
            .await
            .unwrap();

        let info = fixture
            .manifests()
            .get_manifest(&grant, "legacy")
            .await
            .unwrap();
        assert!(info.config.is_none());
        assert_eq!(
            info.media_type,
            "application/vnd.docker.distribution.manifest.v1+json"
        );
    }

    #[test]
    fn manifest_size_sums_config_and_layers() {
        let manifest: ImageManifest = serde_json::from_value(serde_json::json!({
            "schemaVersion": 2,
            "config": {"mediaType": "c", "size": 10, "digest": "sha256:c"},
            "layers": [
                {"mediaType": "l", "size": 100, "digest": "sha256:a"},
                {"mediaType": "l", "size": 5, "digest": "sha256:b"},
            ],
        }))
        .unwrap();
        assert_eq!(manifest.size(), 115);
    }
}
