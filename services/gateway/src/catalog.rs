//! Repository listings

use std::sync::Arc;

use metadata_store::{MetadataStore, Page, ProjectId, Repository};

use crate::access::{AccessControl, ProjectGrant};
use crate::error::GatewayResult;
use crate::permission::{Operation, PermissionMatrix};
use crate::role::Actor;

/// One page of a project's repositories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryListing {
    /// Repositories in the requested page.
    pub repositories: Vec<Repository>,

    /// Number of matches across all pages.
    pub total: u64,
}

/// Lists, searches and ranks repositories.
#[derive(Debug, Clone)]
pub struct RepositoryCatalogService {
    store: Arc<dyn MetadataStore>,
    access: AccessControl,
}

impl RepositoryCatalogService {
    /// Create the catalog service.
    pub fn new(store: Arc<dyn MetadataStore>, access: AccessControl) -> Self {
        Self { store, access }
    }

    /// Repositories of a readable project, newest first.
    ///
    /// `keyword` is a case-sensitive substring match on the repository name.
    #[tracing::instrument(
        level = "debug",
        skip(self, grant),
        fields(project = grant.project().project_id)
    )]
    pub async fn list(
        &self,
        grant: &ProjectGrant,
        keyword: Option<&str>,
        page: Page,
    ) -> GatewayResult<RepositoryListing> {
        grant.require(Operation::Read)?;

        let page = self
            .store
            .list_repositories(grant.project().project_id, keyword, page)
            .await?;

        Ok(RepositoryListing {
            repositories: page.repositories,
            total: page.total,
        })
    }

    /// The `count` most pulled repositories the actor may read.
    ///
    /// Ties are broken by name, ascending.
    #[tracing::instrument(level = "debug", skip(self), fields(actor = %actor))]
    pub async fn top(&self, actor: &Actor, count: usize) -> GatewayResult<Vec<Repository>> {
        let readable = self.readable_projects(actor).await?;
        let mut repositories = self.store.repositories_in(&readable).await?;

        repositories.sort_by(|a, b| {
            b.pull_count
                .cmp(&a.pull_count)
                .then_with(|| a.name.cmp(&b.name))
        });
        repositories.truncate(count);
        Ok(repositories)
    }

    async fn readable_projects(&self, actor: &Actor) -> GatewayResult<Vec<ProjectId>> {
        let mut readable = Vec::new();
        for project in self.store.list_projects().await? {
            let role = self.access.roles().role_in(actor, &project).await?;
            if PermissionMatrix::allows(role, Operation::Read, &project) {
                readable.push(project.project_id);
            }
        }
        Ok(readable)
    }
}
