//! Registry backend collaborator
//!
//! The gateway never talks the registry wire protocol itself. It consumes a
//! [`RegistryBackend`], whose errors are tagged so that "does not exist" can
//! never be confused with "could not ask".

use std::collections::{BTreeMap, HashMap};
use std::error::Error as StdError;
use std::fmt;

use bytes::Bytes;
use serde_json::json;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;

/// Docker v2 image manifest media type.
pub const DOCKER_MANIFEST_V2: &str = "application/vnd.docker.distribution.manifest.v2+json";
/// Docker image config media type.
pub const DOCKER_IMAGE_CONFIG: &str = "application/vnd.docker.container.image.v1+json";
/// Docker gzipped layer media type.
pub const DOCKER_LAYER: &str = "application/vnd.docker.image.rootfs.diff.tar.gzip";

/// Errors reported by a registry backend.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The registry has no repository with this name.
    #[error("repository unknown: {0}")]
    RepositoryUnknown(String),

    /// The reference does not resolve to a manifest in this repository.
    ///
    /// Malformed references land here too: the registry does not tell them
    /// apart from unknown ones.
    #[error("manifest unknown: {repository}:{reference}")]
    ManifestUnknown {
        /// Repository name
        repository: String,
        /// Tag or digest
        reference: String,
    },

    /// No blob with this digest.
    #[error("blob unknown: {0}")]
    BlobUnknown(String),

    /// The registry could not be reached or answered with a server fault.
    #[error("registry transport failure: {0}")]
    Unavailable(#[source] Box<dyn StdError + Send + Sync + 'static>),
}

impl BackendError {
    /// Wrap a transport-level failure.
    pub fn unavailable<E>(error: E) -> Self
    where
        E: Into<Box<dyn StdError + Send + Sync + 'static>>,
    {
        BackendError::Unavailable(error.into())
    }

    /// Whether this error reports semantic absence rather than a fault.
    pub fn is_not_found(&self) -> bool {
        !matches!(self, BackendError::Unavailable(_))
    }
}

/// A manifest as returned by the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawManifest {
    /// Content digest, `sha256:<hex>`.
    pub digest: String,

    /// Media type of the payload.
    pub media_type: String,

    /// Manifest document bytes.
    pub payload: Bytes,
}

/// Read access to a container registry.
#[async_trait::async_trait]
pub trait RegistryBackend: fmt::Debug + Send + Sync {
    /// Tags of a repository.
    async fn list_tags(&self, repository: &str) -> Result<Vec<String>, BackendError>;

    /// Resolve a tag or digest to its manifest.
    async fn manifest(&self, repository: &str, reference: &str)
        -> Result<RawManifest, BackendError>;

    /// Fetch a blob, such as an image config, by digest.
    async fn blob(&self, repository: &str, digest: &str) -> Result<Bytes, BackendError>;
}

/// Compute the `sha256:<hex>` digest of some content.
pub fn content_digest(data: &[u8]) -> String {
    format!("sha256:{}", hex::encode(Sha256::digest(data)))
}

/// Detect manifest type from content
fn detect_media_type(data: &[u8]) -> String {
    if let Ok(json) = serde_json::from_slice::<serde_json::Value>(data) {
        if let Some(media_type) = json.get("mediaType").and_then(|v| v.as_str()) {
            return media_type.to_string();
        }

        if let Some(schema_version) = json.get("schemaVersion").and_then(|v| v.as_u64()) {
            return match schema_version {
                1 => "application/vnd.docker.distribution.manifest.v1+json".to_string(),
                2 if json.get("manifests").is_some() => {
                    "application/vnd.docker.distribution.manifest.list.v2+json".to_string()
                }
                2 => DOCKER_MANIFEST_V2.to_string(),
                _ => "application/vnd.oci.image.manifest.v1+json".to_string(),
            };
        }
    }

    "application/vnd.oci.image.manifest.v1+json".to_string()
}

#[derive(Debug, Default)]
struct RepositoryContent {
    /// tag -> manifest digest
    tags: BTreeMap<String, String>,
    /// digest -> manifest bytes
    manifests: HashMap<String, Bytes>,
}

/// Registry backend that keeps manifests and blobs in memory.
///
/// Blobs are content-addressed and shared across repositories.
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    repositories: RwLock<HashMap<String, RepositoryContent>>,
    blobs: RwLock<HashMap<String, Bytes>>,
}

impl MemoryRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a blob, returning its digest.
    pub async fn put_blob(&self, data: impl Into<Bytes>) -> String {
        let data = data.into();
        let digest = content_digest(&data);
        self.blobs.write().await.insert(digest.clone(), data);
        digest
    }

    /// Store a manifest under a reference, returning its digest.
    ///
    /// A reference that is not a digest also becomes a tag.
    pub async fn put_manifest(
        &self,
        repository: &str,
        reference: &str,
        data: impl Into<Bytes>,
    ) -> String {
        let data = data.into();
        let digest = content_digest(&data);

        let mut repositories = self.repositories.write().await;
        let content = repositories.entry(repository.to_string()).or_default();
        content.manifests.insert(digest.clone(), data);
        if !reference.starts_with("sha256:") {
            content.tags.insert(reference.to_string(), digest.clone());
        }

        digest
    }

    /// Push a complete image: config blob, layer blobs and a v2 manifest.
    ///
    /// Returns the manifest digest.
    pub async fn push_image(
        &self,
        repository: &str,
        tag: &str,
        config: &serde_json::Value,
        layers: &[&[u8]],
    ) -> String {
        let config = Bytes::from(config.to_string());
        let config_size = config.len();
        let config_digest = self.put_blob(config).await;

        let mut descriptors = Vec::with_capacity(layers.len());
        for layer in layers {
            let size = layer.len();
            let digest = self.put_blob(Bytes::copy_from_slice(layer)).await;
            descriptors.push(json!({
                "mediaType": DOCKER_LAYER,
                "size": size,
                "digest": digest,
            }));
        }

        let manifest = json!({
            "schemaVersion": 2,
            "mediaType": DOCKER_MANIFEST_V2,
            "config": {
                "mediaType": DOCKER_IMAGE_CONFIG,
                "size": config_size,
                "digest": config_digest,
            },
            "layers": descriptors,
        });

        self.put_manifest(repository, tag, manifest.to_string())
            .await
    }
}

#[async_trait::async_trait]
impl RegistryBackend for MemoryRegistry {
    async fn list_tags(&self, repository: &str) -> Result<Vec<String>, BackendError> {
        let repositories = self.repositories.read().await;
        let content = repositories
            .get(repository)
            .ok_or_else(|| BackendError::RepositoryUnknown(repository.to_string()))?;
        Ok(content.tags.keys().cloned().collect())
    }

    async fn manifest(
        &self,
        repository: &str,
        reference: &str,
    ) -> Result<RawManifest, BackendError> {
        let unknown = || BackendError::ManifestUnknown {
            repository: repository.to_string(),
            reference: reference.to_string(),
        };

        let repositories = self.repositories.read().await;
        let content = repositories
            .get(repository)
            .ok_or_else(|| BackendError::RepositoryUnknown(repository.to_string()))?;

        let digest = if reference.starts_with("sha256:") {
            reference
        } else {
            content.tags.get(reference).ok_or_else(unknown)?.as_str()
        };

        let payload = content.manifests.get(digest).ok_or_else(unknown)?.clone();

        Ok(RawManifest {
            digest: digest.to_string(),
            media_type: detect_media_type(&payload),
            payload,
        })
    }

    #[tracing::instrument(level = "trace", skip(self))]
    async fn blob(&self, repository: &str, digest: &str) -> Result<Bytes, BackendError> {
        self.blobs
            .read()
            .await
            .get(digest)
            .cloned()
            .ok_or_else(|| BackendError::BlobUnknown(digest.to_string()))
    }
}
