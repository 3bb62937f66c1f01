//! Seed data for the in-memory collaborators
//!
//! ```json
//! {
//!   "users": [{"user_id": 1, "username": "admin", "sysadmin": true}],
//!   "projects": [{"project_id": 1, "name": "library", "public": true}],
//!   "members": [{"project_id": 1, "entity_id": 2, "entity_type": "u", "role": 2}],
//!   "repositories": [{"project_id": 1, "name": "library/hello-world", "pull_count": 3}],
//!   "images": [{"repository": "library/hello-world", "tag": "latest", "config": {"os": "linux"}}]
//! }
//! ```

use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use metadata_store::{MemoryStore, Project, ProjectMember, Repository, StoreError, User};
use serde::Deserialize;

use crate::backend::MemoryRegistry;

/// Errors loading or applying seed data.
#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    /// The seed file could not be read.
    #[error("reading seed file {path}")]
    Io {
        /// Seed file path
        path: Utf8PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// The seed document is not valid.
    #[error("parsing seed data")]
    Parse(#[from] serde_json::Error),

    /// The store rejected a record.
    #[error("loading seed data")]
    Store(#[from] StoreError),
}

/// An image pushed to the in-memory registry.
#[derive(Debug, Clone, Deserialize)]
pub struct SeedImage {
    /// Repository name.
    pub repository: String,

    /// Tag to push.
    pub tag: String,

    /// Image config document.
    #[serde(default = "empty_object")]
    pub config: serde_json::Value,

    /// Layer contents.
    #[serde(default)]
    pub layers: Vec<String>,
}

fn empty_object() -> serde_json::Value {
    serde_json::Value::Object(Default::default())
}

/// Users, projects, memberships, repositories and images.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Seed {
    /// Users.
    pub users: Vec<User>,

    /// Projects.
    pub projects: Vec<Project>,

    /// Project memberships.
    pub members: Vec<ProjectMember>,

    /// Repository records.
    pub repositories: Vec<Repository>,

    /// Registry content.
    pub images: Vec<SeedImage>,
}

impl Seed {
    /// Parse a JSON seed document.
    pub fn from_json(document: &str) -> Result<Self, SeedError> {
        Ok(serde_json::from_str(document)?)
    }

    /// Read a JSON seed file.
    pub fn from_path(path: &Utf8Path) -> Result<Self, SeedError> {
        let document = std::fs::read_to_string(path).map_err(|source| SeedError::Io {
            path: path.to_owned(),
            source,
        })?;
        Self::from_json(&document)
    }

    /// Load everything into the store and registry.
    ///
    /// Projects go in before the members and repositories that refer to them.
    pub async fn apply(
        &self,
        store: &MemoryStore,
        registry: &MemoryRegistry,
    ) -> Result<(), SeedError> {
        for user in &self.users {
            store.insert_user(user.clone()).await;
        }
        for project in &self.projects {
            store.insert_project(project.clone()).await?;
        }
        for member in &self.members {
            store.add_member(member.clone()).await?;
        }
        for repository in &self.repositories {
            store.insert_repository(repository.clone()).await?;
        }

        for image in &self.images {
            let layers: Vec<&[u8]> = image.layers.iter().map(|layer| layer.as_bytes()).collect();
            let digest = registry
                .push_image(&image.repository, &image.tag, &image.config, &layers)
                .await;
            tracing::debug!(
                repository = %image.repository,
                tag = %image.tag,
                %digest,
                "seeded image"
            );
        }

        tracing::info!(
            users = self.users.len(),
            projects = self.projects.len(),
            repositories = self.repositories.len(),
            images = self.images.len(),
            "loaded seed data"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use metadata_store::{MemberRole, MetadataStore};

    use super::*;
    use crate::backend::RegistryBackend;

    const DOCUMENT: &str = r#"{
        "users": [{"user_id": 7, "username": "dev"}],
        "projects": [{"project_id": 1, "name": "library", "public": true}],
        "members": [{"project_id": 1, "entity_id": 7, "entity_type": "u", "role": 2}],
        "repositories": [{"project_id": 1, "name": "library/app", "pull_count": 4}],
        "images": [{"repository": "library/app", "tag": "v1", "layers": ["abc"]}]
    }"#;

    #[tokio::test]
    async fn apply_seed() {
        let seed = Seed::from_json(DOCUMENT).unwrap();
        let store = MemoryStore::new();
        let registry = MemoryRegistry::new();
        seed.apply(&store, &registry).await.unwrap();

        let user = store.get_user("dev").await.unwrap().unwrap();
        assert!(!user.sysadmin);

        let member = store.get_member(1, 7).await.unwrap().unwrap();
        assert_eq!(member.role, MemberRole::Developer);

        let repository = store.get_repository("library/app").await.unwrap().unwrap();
        assert_eq!(repository.pull_count, 4);
        assert_eq!(repository.description, "");

        assert_eq!(registry.list_tags("library/app").await.unwrap(), ["v1"]);
    }

    #[tokio::test]
    async fn member_of_missing_project_fails() {
        let seed = Seed::from_json(
            r#"{"members": [{"project_id": 9, "entity_id": 1, "entity_type": "u", "role": 1}]}"#,
        )
        .unwrap();
        let err = seed
            .apply(&MemoryStore::new(), &MemoryRegistry::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SeedError::Store(_)));
    }

    #[test]
    fn unknown_role_is_rejected() {
        let err = Seed::from_json(
            r#"{"members": [{"project_id": 1, "entity_id": 1, "entity_type": "u", "role": 9}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, SeedError::Parse(_)));
    }
}
