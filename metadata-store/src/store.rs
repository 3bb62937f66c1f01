use std::fmt;

use crate::error::StoreError;
use crate::model::{
    Page, Project, ProjectId, ProjectMember, Repository, RepositoryPage, User, UserId,
};

/// Persistence collaborator for projects, members, users and repositories.
///
/// Reads report absence as `Ok(None)`; errors are reserved for engine
/// failures. Each write must be atomic for the record it touches: a reader
/// observes either the old or the new record, never a mix.
#[async_trait::async_trait]
pub trait MetadataStore: fmt::Debug + Send + Sync {
    /// Fetch a project by id.
    async fn get_project(&self, id: ProjectId) -> Result<Option<Project>, StoreError>;

    /// All projects, ordered by id.
    async fn list_projects(&self) -> Result<Vec<Project>, StoreError>;

    /// Membership of a user in a project.
    async fn get_member(
        &self,
        project_id: ProjectId,
        user_id: UserId,
    ) -> Result<Option<ProjectMember>, StoreError>;

    /// Fetch a user by login name.
    async fn get_user(&self, username: &str) -> Result<Option<User>, StoreError>;

    /// Fetch a repository by its full name.
    async fn get_repository(&self, name: &str) -> Result<Option<Repository>, StoreError>;

    /// List repositories of a project.
    ///
    /// `keyword` is a case-sensitive substring filter on the repository name.
    /// Results are ordered by creation time, newest first, with ties broken by
    /// name so that pagination is stable.
    async fn list_repositories(
        &self,
        project_id: ProjectId,
        keyword: Option<&str>,
        page: Page,
    ) -> Result<RepositoryPage, StoreError>;

    /// All repositories belonging to any of the given projects, unordered.
    async fn repositories_in(&self, projects: &[ProjectId])
        -> Result<Vec<Repository>, StoreError>;

    /// Replace the description of a repository and bump its update time.
    ///
    /// Fails with [`StoreErrorKind::NotFound`](crate::StoreErrorKind::NotFound)
    /// when the repository does not exist.
    async fn update_repository_description(
        &self,
        name: &str,
        description: &str,
    ) -> Result<(), StoreError>;
}
