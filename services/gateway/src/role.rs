//! Actors and effective roles

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use metadata_store::{MemberRole, MetadataStore, Project, ProjectId, User, UserId};
use serde::Serialize;

use crate::error::{GatewayError, GatewayResult, Resource};

/// The verified identity behind an authenticated actor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// User id, matched against membership entity ids.
    pub user_id: UserId,

    /// Login name.
    pub username: String,
}

/// Whoever is making the request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Actor {
    identity: Option<Identity>,
    system_admin: bool,
}

impl Actor {
    /// An unauthenticated actor.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// An authenticated actor for a known user.
    pub fn user(user: &User) -> Self {
        Self {
            identity: Some(Identity {
                user_id: user.user_id,
                username: user.username.clone(),
            }),
            system_admin: user.sysadmin,
        }
    }

    /// The verified identity, if any.
    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// Whether a verified identity is attached.
    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }

    /// Whether the actor is a system administrator.
    ///
    /// Always false for anonymous actors.
    pub fn is_system_admin(&self) -> bool {
        self.is_authenticated() && self.system_admin
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.identity {
            Some(identity) => f.write_str(&identity.username),
            None => f.write_str("<anonymous>"),
        }
    }
}

/// An actor's privilege on one project, derived per request.
///
/// Variants are ranked; comparisons use the rank, so `SystemAdmin` dominates
/// every project role and `NonMember` sits strictly below `Guest`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectiveRole {
    /// No verified identity.
    Anonymous,
    /// Authenticated, but not a member of the project.
    NonMember,
    /// Project guest.
    Guest,
    /// Project developer.
    Developer,
    /// Project administrator.
    ProjectAdmin,
    /// System administrator.
    SystemAdmin,
}

impl EffectiveRole {
    /// Numeric privilege rank.
    pub const fn rank(self) -> u8 {
        match self {
            EffectiveRole::Anonymous => 0,
            EffectiveRole::NonMember => 1,
            EffectiveRole::Guest => 2,
            EffectiveRole::Developer => 3,
            EffectiveRole::ProjectAdmin => 4,
            EffectiveRole::SystemAdmin => 5,
        }
    }

    /// Whether this role is at least as privileged as `minimum`.
    pub fn satisfies(self, minimum: EffectiveRole) -> bool {
        self >= minimum
    }
}

impl PartialOrd for EffectiveRole {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EffectiveRole {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl From<MemberRole> for EffectiveRole {
    fn from(role: MemberRole) -> Self {
        match role {
            MemberRole::Guest => EffectiveRole::Guest,
            MemberRole::Developer => EffectiveRole::Developer,
            MemberRole::ProjectAdmin => EffectiveRole::ProjectAdmin,
        }
    }
}

impl fmt::Display for EffectiveRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EffectiveRole::Anonymous => "anonymous",
            EffectiveRole::NonMember => "non-member",
            EffectiveRole::Guest => "guest",
            EffectiveRole::Developer => "developer",
            EffectiveRole::ProjectAdmin => "project admin",
            EffectiveRole::SystemAdmin => "system admin",
        };
        f.write_str(name)
    }
}

/// Computes an actor's effective role on a project.
#[derive(Debug, Clone)]
pub struct RoleResolver {
    store: Arc<dyn MetadataStore>,
}

impl RoleResolver {
    /// Create a resolver over a metadata store.
    pub fn new(store: Arc<dyn MetadataStore>) -> Self {
        Self { store }
    }

    /// Load a project, failing with `NotFound` if it does not exist.
    pub async fn project(&self, id: ProjectId) -> GatewayResult<Project> {
        self.store
            .get_project(id)
            .await?
            .ok_or(GatewayError::NotFound(Resource::Project(id)))
    }

    /// Effective role of `actor` on the project with id `project_id`.
    ///
    /// Project existence is checked first, whoever the actor is.
    pub async fn resolve(
        &self,
        actor: &Actor,
        project_id: ProjectId,
    ) -> GatewayResult<EffectiveRole> {
        let project = self.project(project_id).await?;
        self.role_in(actor, &project).await
    }

    /// Effective role of `actor` on an already loaded project.
    #[tracing::instrument(
        level = "debug",
        skip_all,
        fields(actor = %actor, project = project.project_id)
    )]
    pub async fn role_in(&self, actor: &Actor, project: &Project) -> GatewayResult<EffectiveRole> {
        let Some(identity) = actor.identity() else {
            return Ok(EffectiveRole::Anonymous);
        };

        if actor.is_system_admin() {
            return Ok(EffectiveRole::SystemAdmin);
        }

        let role = match self
            .store
            .get_member(project.project_id, identity.user_id)
            .await?
        {
            Some(member) => member.role.into(),
            None => EffectiveRole::NonMember,
        };
        tracing::debug!(%role, "resolved effective role");
        Ok(role)
    }
}
