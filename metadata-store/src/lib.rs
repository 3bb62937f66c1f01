//! # Metadata store
//!
//! Persistence collaborator for the registry gateway: projects, users,
//! project membership and repository records.
//!
//! The [`MetadataStore`] trait is the contract the gateway consumes. An
//! in-memory implementation, [`MemoryStore`], backs tests and the
//! standalone server.

mod error;
mod memory;
mod model;
mod store;

#[doc(inline)]
pub use error::{StoreError, StoreErrorBuilder, StoreErrorKind};
#[doc(inline)]
pub use memory::MemoryStore;
#[doc(inline)]
pub use model::{
    EntityType, MemberRole, Page, Project, ProjectId, ProjectMember, Repository, RepositoryPage,
    UnknownMemberRole, User, UserId,
};
#[doc(inline)]
pub use store::MetadataStore;
