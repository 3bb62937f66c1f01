//! Tag metadata assembly
//!
//! Tag records are built from two registry documents: the manifest (digest,
//! size) and the image config blob it points at (platform, author, creation
//! time, labels).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::access::RepositoryGrant;
use crate::error::{GatewayError, GatewayResult, Resource};
use crate::manifest::ManifestGateway;
use crate::permission::Operation;

/// Label consulted when an image has no explicit author.
pub const MAINTAINER_LABEL: &str = "Maintainer";

/// Summary of a tag.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Tag {
    /// Tag name.
    pub name: String,
    /// Manifest digest.
    pub digest: String,
    /// Image size in bytes.
    pub size: u64,
    /// CPU architecture.
    pub architecture: String,
    /// Operating system.
    pub os: String,
    /// Image author.
    pub author: String,
    /// Image creation time.
    pub created: Option<DateTime<Utc>>,
    /// Docker version used to build the image.
    pub docker_version: String,
}

/// Free-form configuration carried by the image.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ImageConfig {
    /// Image labels.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

/// A tag together with its image configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TagDetail {
    /// Tag summary.
    #[serde(flatten)]
    pub tag: Tag,

    /// Image configuration, when the manifest references one.
    pub config: Option<ImageConfig>,
}

impl From<TagDetail> for Tag {
    fn from(detail: TagDetail) -> Self {
        detail.tag
    }
}

/// Fill in an empty author from the `Maintainer` label.
///
/// An explicit author is never overwritten, and no other label is consulted.
pub fn populate_author(detail: &mut TagDetail) {
    if !detail.tag.author.is_empty() {
        return;
    }

    if let Some(maintainer) = detail
        .config
        .as_ref()
        .and_then(|config| config.labels.get(MAINTAINER_LABEL))
    {
        detail.tag.author = maintainer.clone();
    }
}

/// Docker image config, as stored in the registry.
#[derive(Debug, Default, Deserialize)]
struct ImageConfigBlob {
    #[serde(default)]
    architecture: String,
    #[serde(default)]
    os: String,
    #[serde(default)]
    author: String,
    #[serde(default)]
    created: Option<DateTime<Utc>>,
    #[serde(default)]
    docker_version: String,
    #[serde(default)]
    config: Option<ContainerConfig>,
}

#[derive(Debug, Default, Deserialize)]
struct ContainerConfig {
    #[serde(rename = "Labels", default)]
    labels: Option<BTreeMap<String, String>>,
}

/// Builds tag records for readable repositories.
#[derive(Debug, Clone)]
pub struct TagMetadataAssembler {
    manifests: ManifestGateway,
}

impl TagMetadataAssembler {
    /// Create an assembler on top of a manifest gateway.
    pub fn new(manifests: ManifestGateway) -> Self {
        Self { manifests }
    }

    /// All tags of a repository, ordered by name.
    #[tracing::instrument(level = "debug", skip_all, fields(repository = grant.name()))]
    pub async fn list_tags(&self, grant: &RepositoryGrant) -> GatewayResult<Vec<Tag>> {
        grant.require(Operation::Read)?;

        let mut names = self.manifests.tags(grant.name()).await?;
        names.sort();

        let mut tags = Vec::with_capacity(names.len());
        for name in names {
            tags.push(self.assemble(grant.name(), &name).await?.into());
        }
        Ok(tags)
    }

    /// Detail for a single tag.
    #[tracing::instrument(level = "debug", skip(self, grant), fields(repository = grant.name()))]
    pub async fn get_tag(&self, grant: &RepositoryGrant, tag: &str) -> GatewayResult<TagDetail> {
        grant.require(Operation::Read)?;
        self.assemble(grant.name(), tag).await
    }

    async fn assemble(&self, repository: &str, tag: &str) -> GatewayResult<TagDetail> {
        let (raw, manifest) = self
            .manifests
            .fetch(repository, tag)
            .await
            .map_err(|error| match error {
                GatewayError::NotFound(Resource::Manifest { .. }) => {
                    GatewayError::NotFound(Resource::Tag {
                        repository: repository.to_string(),
                        tag: tag.to_string(),
                    })
                }
                other => other,
            })?;

        let blob = match self.manifests.config(repository, &manifest).await? {
            Some(data) => serde_json::from_slice::<ImageConfigBlob>(&data).map_err(|error| {
                GatewayError::MalformedBackendData {
                    what: "image config",
                    repository: repository.to_string(),
                    reason: error.to_string(),
                }
            })?,
            None => ImageConfigBlob::default(),
        };

        let config = blob.config.map(|config| ImageConfig {
            labels: config.labels.unwrap_or_default(),
        });

        let mut detail = TagDetail {
            tag: Tag {
                name: tag.to_string(),
                digest: raw.digest,
                size: manifest.size(),
                architecture: blob.architecture,
                os: blob.os,
                author: blob.author,
                created: blob.created,
                docker_version: blob.docker_version,
            },
            config,
        };
        populate_author(&mut detail);
        Ok(detail)
    }
}
