//! Shared fixture for unit tests.

use std::sync::Arc;

use bytes::Bytes;
use chrono::{TimeZone, Utc};
use metadata_store::{
    EntityType, MemberRole, MemoryStore, MetadataStore, Page, Project, ProjectId, ProjectMember,
    Repository, RepositoryPage, StoreError, StoreErrorKind, User, UserId,
};
use serde_json::json;

use crate::access::{AccessControl, RepositoryGrant};
use crate::backend::{BackendError, MemoryRegistry, RawManifest, RegistryBackend};
use crate::catalog::RepositoryCatalogService;
use crate::manifest::ManifestGateway;
use crate::mutation::RepositoryMutationService;
use crate::permission::Operation;
use crate::role::Actor;
use crate::tags::TagMetadataAssembler;

pub(crate) const LIBRARY: ProjectId = 1;
pub(crate) const PRIVATE: ProjectId = 2;

pub(crate) const ADMIN: &str = "admin";
pub(crate) const NON_MEMBER: &str = "outsider";
pub(crate) const GUEST: &str = "guest";
pub(crate) const DEVELOPER: &str = "developer";
pub(crate) const PROJECT_ADMIN: &str = "project-admin";

pub(crate) const HELLO_WORLD: &str = "library/hello-world";
pub(crate) const BUSYBOX: &str = "library/busybox";
pub(crate) const SECRET_REPO: &str = "private/secret";
pub(crate) const EMPTY_REPO: &str = "private/empty";

/// A registry backend whose transport always fails.
#[derive(Debug)]
pub(crate) struct UnreachableRegistry;

fn refused() -> BackendError {
    BackendError::unavailable(std::io::Error::new(
        std::io::ErrorKind::ConnectionRefused,
        "connection refused",
    ))
}

#[async_trait::async_trait]
impl RegistryBackend for UnreachableRegistry {
    async fn list_tags(&self, _repository: &str) -> Result<Vec<String>, BackendError> {
        Err(refused())
    }

    async fn manifest(
        &self,
        _repository: &str,
        _reference: &str,
    ) -> Result<RawManifest, BackendError> {
        Err(refused())
    }

    async fn blob(&self, _repository: &str, _digest: &str) -> Result<Bytes, BackendError> {
        Err(refused())
    }
}

/// A metadata store whose engine is always down.
#[derive(Debug)]
pub(crate) struct UnavailableStore;

fn store_down() -> StoreError {
    StoreError::builder("unavailable", StoreErrorKind::Unavailable, "connection reset").build()
}

#[async_trait::async_trait]
impl MetadataStore for UnavailableStore {
    async fn get_project(&self, _id: ProjectId) -> Result<Option<Project>, StoreError> {
        Err(store_down())
    }

    async fn list_projects(&self) -> Result<Vec<Project>, StoreError> {
        Err(store_down())
    }

    async fn get_member(
        &self,
        _project_id: ProjectId,
        _user_id: UserId,
    ) -> Result<Option<ProjectMember>, StoreError> {
        Err(store_down())
    }

    async fn get_user(&self, _username: &str) -> Result<Option<User>, StoreError> {
        Err(store_down())
    }

    async fn get_repository(&self, _name: &str) -> Result<Option<Repository>, StoreError> {
        Err(store_down())
    }

    async fn list_repositories(
        &self,
        _project_id: ProjectId,
        _keyword: Option<&str>,
        _page: Page,
    ) -> Result<RepositoryPage, StoreError> {
        Err(store_down())
    }

    async fn repositories_in(
        &self,
        _projects: &[ProjectId],
    ) -> Result<Vec<Repository>, StoreError> {
        Err(store_down())
    }

    async fn update_repository_description(
        &self,
        _name: &str,
        _description: &str,
    ) -> Result<(), StoreError> {
        Err(store_down())
    }
}

#[derive(Debug)]
pub(crate) struct Fixture {
    pub(crate) store: Arc<MemoryStore>,
    pub(crate) registry: Arc<MemoryRegistry>,
}

fn repository(project_id: ProjectId, name: &str, pull_count: u64, month: u32) -> Repository {
    let created = Utc.with_ymd_and_hms(2024, month, 1, 0, 0, 0).unwrap();
    Repository {
        project_id,
        name: name.to_string(),
        description: String::new(),
        pull_count,
        star_count: 0,
        creation_time: created,
        update_time: created,
    }
}

impl Fixture {
    pub(crate) async fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let registry = Arc::new(MemoryRegistry::new());

        let users = [
            (1, ADMIN, true),
            (2, NON_MEMBER, false),
            (3, GUEST, false),
            (4, DEVELOPER, false),
            (5, PROJECT_ADMIN, false),
        ];
        for (user_id, username, sysadmin) in users {
            store
                .insert_user(User {
                    user_id,
                    username: username.to_string(),
                    sysadmin,
                })
                .await;
        }

        let projects = [(LIBRARY, "library", true), (PRIVATE, "private", false)];
        for (project_id, name, public) in projects {
            store
                .insert_project(Project {
                    project_id,
                    name: name.to_string(),
                    public,
                    creation_time: Utc::now(),
                })
                .await
                .unwrap();
        }

        for (entity_id, role) in [
            (3, MemberRole::Guest),
            (4, MemberRole::Developer),
            (5, MemberRole::ProjectAdmin),
        ] {
            store
                .add_member(ProjectMember {
                    project_id: LIBRARY,
                    entity_id,
                    entity_type: EntityType::User,
                    role,
                })
                .await
                .unwrap();
        }

        for repo in [
            repository(LIBRARY, HELLO_WORLD, 10, 1),
            repository(LIBRARY, BUSYBOX, 50, 2),
            repository(LIBRARY, "library/alpine", 10, 3),
            repository(PRIVATE, SECRET_REPO, 5, 1),
            repository(PRIVATE, EMPTY_REPO, 0, 1),
        ] {
            store.insert_repository(repo).await.unwrap();
        }

        registry
            .push_image(
                HELLO_WORLD,
                "latest",
                &json!({
                    "architecture": "amd64",
                    "os": "linux",
                    "author": "",
                    "created": "2024-01-01T00:00:00Z",
                    "docker_version": "24.0.5",
                    "config": {"Labels": {"Maintainer": "registry team"}},
                }),
                &[b"hello".as_slice()],
            )
            .await;

        let busybox = json!({
            "architecture": "amd64",
            "os": "linux",
            "author": "busybox maintainers",
            "config": {"Labels": null},
        });
        for tag in ["latest", "1.36"] {
            registry
                .push_image(BUSYBOX, tag, &busybox, &[b"busybox".as_slice()])
                .await;
        }

        registry
            .push_image(
                "library/alpine",
                "3.19",
                &json!({"architecture": "arm64", "os": "linux"}),
                &[],
            )
            .await;
        registry
            .push_image(SECRET_REPO, "v1", &json!({"os": "linux"}), &[])
            .await;

        Self { store, registry }
    }

    /// Tag a manifest whose config digest has no blob in the registry.
    pub(crate) async fn push_dangling_config(&self, repository: &str, tag: &str) {
        let manifest = json!({
            "schemaVersion": 2,
            "config": {
                "mediaType": crate::backend::DOCKER_IMAGE_CONFIG,
                "size": 2,
                "digest": "sha256:deadbeef",
            },
            "layers": [],
        });
        self.registry
            .put_manifest(repository, tag, manifest.to_string())
            .await;
    }

    pub(crate) fn store(&self) -> Arc<dyn MetadataStore> {
        self.store.clone()
    }

    pub(crate) fn access(&self) -> AccessControl {
        AccessControl::new(self.store())
    }

    pub(crate) fn manifests(&self) -> ManifestGateway {
        ManifestGateway::new(self.registry.clone())
    }

    pub(crate) fn tags(&self) -> TagMetadataAssembler {
        TagMetadataAssembler::new(self.manifests())
    }

    pub(crate) fn catalog(&self) -> RepositoryCatalogService {
        RepositoryCatalogService::new(self.store(), self.access())
    }

    pub(crate) fn mutation(&self) -> RepositoryMutationService {
        RepositoryMutationService::new(self.store())
    }

    pub(crate) async fn actor(&self, username: &str) -> Actor {
        let user = self
            .store
            .get_user(username)
            .await
            .unwrap()
            .unwrap_or_else(|| panic!("fixture user {username}"));
        Actor::user(&user)
    }

    pub(crate) async fn read_grant_as(&self, actor: &Actor, repository: &str) -> RepositoryGrant {
        self.access()
            .repository(actor, repository, Operation::Read)
            .await
            .unwrap()
    }

    pub(crate) async fn read_grant(&self, repository: &str) -> RepositoryGrant {
        let admin = self.actor(ADMIN).await;
        self.read_grant_as(&admin, repository).await
    }

    pub(crate) async fn stored(&self, repository: &str) -> Repository {
        self.store
            .get_repository(repository)
            .await
            .unwrap()
            .unwrap()
    }
}
