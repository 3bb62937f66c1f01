//! Existence-then-authorization pipeline
//!
//! Every service entry point takes a grant from this module. A grant can only
//! be produced by [`AccessControl`], which loads the target (failing with
//! `NotFound` first), resolves the actor's role and consults the
//! [`PermissionMatrix`]. Input validation happens before any of this, in the
//! HTTP layer.

use std::sync::Arc;

use metadata_store::{MetadataStore, Project, ProjectId, Repository};

use crate::error::{GatewayError, GatewayResult, Resource};
use crate::permission::{Operation, PermissionMatrix};
use crate::role::{Actor, EffectiveRole, RoleResolver};

/// Proof that an actor may perform an operation on a project.
#[derive(Debug, Clone)]
pub struct ProjectGrant {
    project: Project,
    role: EffectiveRole,
}

impl ProjectGrant {
    /// The project the grant applies to.
    pub fn project(&self) -> &Project {
        &self.project
    }

    /// The actor's effective role on the project.
    pub fn role(&self) -> EffectiveRole {
        self.role
    }

    /// Re-check the grant for a (possibly different) operation.
    pub fn require(&self, operation: Operation) -> GatewayResult<()> {
        PermissionMatrix::authorize(self.role, operation, &self.project)
    }
}

/// Proof that an actor may perform an operation on a repository.
#[derive(Debug, Clone)]
pub struct RepositoryGrant {
    project: ProjectGrant,
    repository: Repository,
}

impl RepositoryGrant {
    /// The repository record as loaded when the grant was issued.
    pub fn repository(&self) -> &Repository {
        &self.repository
    }

    /// Full repository name.
    pub fn name(&self) -> &str {
        &self.repository.name
    }

    /// The owning project.
    pub fn project(&self) -> &Project {
        self.project.project()
    }

    /// The actor's effective role on the owning project.
    pub fn role(&self) -> EffectiveRole {
        self.project.role()
    }

    /// Re-check the grant for a (possibly different) operation.
    pub fn require(&self, operation: Operation) -> GatewayResult<()> {
        self.project.require(operation)
    }
}

/// Issues grants: existence check, role resolution, authorization.
#[derive(Debug, Clone)]
pub struct AccessControl {
    store: Arc<dyn MetadataStore>,
    roles: RoleResolver,
}

impl AccessControl {
    /// Create the pipeline over a metadata store.
    pub fn new(store: Arc<dyn MetadataStore>) -> Self {
        let roles = RoleResolver::new(store.clone());
        Self { store, roles }
    }

    /// The role resolver used by this pipeline.
    pub fn roles(&self) -> &RoleResolver {
        &self.roles
    }

    /// Grant `operation` on a project.
    #[tracing::instrument(level = "debug", skip(self), fields(actor = %actor))]
    pub async fn project(
        &self,
        actor: &Actor,
        project_id: ProjectId,
        operation: Operation,
    ) -> GatewayResult<ProjectGrant> {
        let project = self.roles.project(project_id).await?;
        self.grant(actor, project, operation).await
    }

    /// Grant `operation` on a repository.
    #[tracing::instrument(level = "debug", skip(self), fields(actor = %actor))]
    pub async fn repository(
        &self,
        actor: &Actor,
        name: &str,
        operation: Operation,
    ) -> GatewayResult<RepositoryGrant> {
        let repository = self
            .store
            .get_repository(name)
            .await?
            .ok_or_else(|| GatewayError::NotFound(Resource::Repository(name.to_string())))?;

        let project = self.roles.project(repository.project_id).await?;
        let project = self.grant(actor, project, operation).await?;

        Ok(RepositoryGrant {
            project,
            repository,
        })
    }

    async fn grant(
        &self,
        actor: &Actor,
        project: Project,
        operation: Operation,
    ) -> GatewayResult<ProjectGrant> {
        let role = self.roles.role_in(actor, &project).await?;
        PermissionMatrix::authorize(role, operation, &project)?;
        Ok(ProjectGrant { project, role })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    #[tokio::test]
    async fn missing_repository_is_reported_before_permissions() {
        let fixture = testing::Fixture::new().await;
        let access = fixture.access();

        let err = access
            .repository(
                &Actor::anonymous(),
                "non_exist_repository",
                Operation::UpdateDescription,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::NotFound(Resource::Repository(_))), "{err}");
    }

    #[tokio::test]
    async fn private_repository_needs_membership() {
        let fixture = testing::Fixture::new().await;
        let access = fixture.access();

        let err = access
            .repository(&Actor::anonymous(), testing::SECRET_REPO, Operation::Read)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::AuthenticationRequired));

        let outsider = fixture.actor(testing::NON_MEMBER).await;
        let err = access
            .repository(&outsider, testing::SECRET_REPO, Operation::Read)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::PermissionDenied));

        let admin = fixture.actor(testing::ADMIN).await;
        let grant = access
            .repository(&admin, testing::SECRET_REPO, Operation::Read)
            .await
            .unwrap();
        assert_eq!(grant.role(), EffectiveRole::SystemAdmin);
        assert_eq!(grant.project().project_id, testing::PRIVATE);
    }

    #[tokio::test]
    async fn grants_can_be_rechecked() {
        let fixture = testing::Fixture::new().await;
        let guest = fixture.actor(testing::GUEST).await;

        let grant = fixture
            .access()
            .repository(&guest, testing::HELLO_WORLD, Operation::Read)
            .await
            .unwrap();
        assert_eq!(grant.role(), EffectiveRole::Guest);
        assert!(grant.require(Operation::Read).is_ok());
        assert!(matches!(
            grant.require(Operation::UpdateDescription),
            Err(GatewayError::PermissionDenied)
        ));
    }
}
