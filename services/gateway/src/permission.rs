//! Operation authorization

use metadata_store::Project;

use crate::error::{GatewayError, GatewayResult};
use crate::role::EffectiveRole;

/// Classes of operation the gateway authorizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Read repository, tag and manifest metadata.
    Read,
    /// Change a repository's description.
    UpdateDescription,
    /// Push images into a repository.
    Push,
    /// Delete repositories or tags.
    Delete,
}

/// Fixed table of minimum roles per operation.
///
/// The table compares role ranks, so any role at or above the minimum passes.
#[derive(Debug, Clone, Copy, Default)]
pub struct PermissionMatrix;

impl PermissionMatrix {
    /// Minimum effective role for `operation` on `project`.
    pub fn minimum_role(operation: Operation, project: &Project) -> EffectiveRole {
        match operation {
            Operation::Read if project.public => EffectiveRole::Anonymous,
            Operation::Read => EffectiveRole::Guest,
            Operation::UpdateDescription => EffectiveRole::Developer,
            Operation::Push | Operation::Delete => EffectiveRole::ProjectAdmin,
        }
    }

    /// Whether `role` may perform `operation` on `project`.
    pub fn allows(role: EffectiveRole, operation: Operation, project: &Project) -> bool {
        role.satisfies(Self::minimum_role(operation, project))
    }

    /// Authorize `operation`, reporting why it was refused.
    ///
    /// Anonymous actors are told to authenticate; everyone else is denied.
    pub fn authorize(
        role: EffectiveRole,
        operation: Operation,
        project: &Project,
    ) -> GatewayResult<()> {
        if Self::allows(role, operation, project) {
            return Ok(());
        }

        tracing::debug!(%role, ?operation, project = project.project_id, "operation refused");
        match role {
            EffectiveRole::Anonymous => Err(GatewayError::AuthenticationRequired),
            _ => Err(GatewayError::PermissionDenied),
        }
    }
}
