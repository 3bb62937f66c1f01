//! Repository metadata updates

use std::sync::Arc;

use metadata_store::{MetadataStore, StoreErrorKind};

use crate::access::RepositoryGrant;
use crate::error::{GatewayError, GatewayResult, Resource};
use crate::permission::Operation;

/// Applies authorized changes to repository records.
///
/// Atomicity of each write is delegated to the metadata store; concurrent
/// updates are last-write-wins.
#[derive(Debug, Clone)]
pub struct RepositoryMutationService {
    store: Arc<dyn MetadataStore>,
}

impl RepositoryMutationService {
    /// Create the mutation service.
    pub fn new(store: Arc<dyn MetadataStore>) -> Self {
        Self { store }
    }

    /// Replace a repository's description.
    ///
    /// Repeating the same update succeeds and leaves the same description.
    #[tracing::instrument(
        level = "debug",
        skip(self, grant, description),
        fields(repository = grant.name())
    )]
    pub async fn update_description(
        &self,
        grant: &RepositoryGrant,
        description: &str,
    ) -> GatewayResult<()> {
        grant.require(Operation::UpdateDescription)?;

        self.store
            .update_repository_description(grant.name(), description)
            .await
            .map_err(|error| match error.kind() {
                StoreErrorKind::NotFound => {
                    GatewayError::NotFound(Resource::Repository(grant.name().to_string()))
                }
                _ => error.into(),
            })?;

        tracing::info!(repository = grant.name(), role = %grant.role(), "updated description");
        Ok(())
    }
}
