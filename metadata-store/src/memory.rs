use std::collections::{BTreeMap, HashMap};

use chrono::Utc;
use tokio::sync::RwLock;

use crate::error::{StoreError, StoreErrorKind};
use crate::model::{
    EntityType, Page, Project, ProjectId, ProjectMember, Repository, RepositoryPage, User, UserId,
};
use crate::store::MetadataStore;

const ENGINE: &str = "memory";

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<String, User>,
    projects: BTreeMap<ProjectId, Project>,
    members: HashMap<(ProjectId, i64, EntityType), ProjectMember>,
    repositories: HashMap<String, Repository>,
}

/// Metadata store that keeps every table in memory.
///
/// All tables sit behind one [`RwLock`], so reads run concurrently and every
/// write replaces whole records under the write guard.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a user, keyed by username.
    pub async fn insert_user(&self, user: User) {
        let mut tables = self.tables.write().await;
        tables.users.insert(user.username.clone(), user);
    }

    /// Insert or replace a project.
    pub async fn insert_project(&self, project: Project) -> Result<(), StoreError> {
        if project.project_id <= 0 {
            return Err(StoreError::builder(
                ENGINE,
                StoreErrorKind::InvalidRequest,
                "project ids must be positive",
            )
            .entity("project")
            .key(project.project_id.to_string())
            .build());
        }

        let mut tables = self.tables.write().await;
        tables.projects.insert(project.project_id, project);
        Ok(())
    }

    /// Insert or replace a membership record.
    pub async fn add_member(&self, member: ProjectMember) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.projects.contains_key(&member.project_id) {
            return Err(missing_project(member.project_id));
        }
        tables.members.insert(
            (member.project_id, member.entity_id, member.entity_type),
            member,
        );
        Ok(())
    }

    /// Insert a new repository.
    ///
    /// The owning project must exist, and the name must be unique.
    pub async fn insert_repository(&self, repository: Repository) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.projects.contains_key(&repository.project_id) {
            return Err(missing_project(repository.project_id));
        }
        if tables.repositories.contains_key(&repository.name) {
            return Err(StoreError::builder(
                ENGINE,
                StoreErrorKind::Conflict,
                "repository already exists",
            )
            .entity("repository")
            .key(repository.name)
            .build());
        }
        tables
            .repositories
            .insert(repository.name.clone(), repository);
        Ok(())
    }
}

fn missing_project(id: ProjectId) -> StoreError {
    StoreError::builder(ENGINE, StoreErrorKind::NotFound, "project does not exist")
        .entity("project")
        .key(id.to_string())
        .build()
}

#[async_trait::async_trait]
impl MetadataStore for MemoryStore {
    async fn get_project(&self, id: ProjectId) -> Result<Option<Project>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.projects.get(&id).cloned())
    }

    async fn list_projects(&self) -> Result<Vec<Project>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.projects.values().cloned().collect())
    }

    async fn get_member(
        &self,
        project_id: ProjectId,
        user_id: UserId,
    ) -> Result<Option<ProjectMember>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .members
            .get(&(project_id, user_id, EntityType::User))
            .cloned())
    }

    async fn get_user(&self, username: &str) -> Result<Option<User>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.users.get(username).cloned())
    }

    async fn get_repository(&self, name: &str) -> Result<Option<Repository>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.repositories.get(name).cloned())
    }

    #[tracing::instrument(level = "trace", skip(self))]
    async fn list_repositories(
        &self,
        project_id: ProjectId,
        keyword: Option<&str>,
        page: Page,
    ) -> Result<RepositoryPage, StoreError> {
        let tables = self.tables.read().await;
        let mut matches: Vec<&Repository> = tables
            .repositories
            .values()
            .filter(|repo| repo.project_id == project_id)
            .filter(|repo| keyword.is_none_or(|keyword| repo.name.contains(keyword)))
            .collect();

        matches.sort_by(|a, b| {
            b.creation_time
                .cmp(&a.creation_time)
                .then_with(|| a.name.cmp(&b.name))
        });

        let total = matches.len() as u64;
        let offset = usize::try_from(page.offset()).unwrap_or(usize::MAX);
        let size = usize::try_from(page.size).unwrap_or(usize::MAX);
        let repositories = matches
            .into_iter()
            .skip(offset)
            .take(size)
            .cloned()
            .collect();

        Ok(RepositoryPage {
            repositories,
            total,
        })
    }

    async fn repositories_in(
        &self,
        projects: &[ProjectId],
    ) -> Result<Vec<Repository>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .repositories
            .values()
            .filter(|repo| projects.contains(&repo.project_id))
            .cloned()
            .collect())
    }

    #[tracing::instrument(level = "debug", skip(self, description))]
    async fn update_repository_description(
        &self,
        name: &str,
        description: &str,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let repository = tables.repositories.get_mut(name).ok_or_else(|| {
            StoreError::builder(
                ENGINE,
                StoreErrorKind::NotFound,
                "repository does not exist",
            )
            .entity("repository")
            .key(name)
            .build()
        })?;

        repository.description = description.to_owned();
        repository.update_time = Utc::now();
        Ok(())
    }
}
