//! # Registry Metadata Gateway
//!
//! An HTTP gateway that answers repository, tag and manifest queries for a
//! multi-tenant container registry, and mediates every read and write through
//! project role based access control.
//!
//! ## Features
//!
//! - Repository listing, keyword search and pagination per project
//! - Most pulled repositories across the projects a caller may read
//! - Tag summaries and details assembled from manifests and image configs
//! - Manifest retrieval through a pluggable registry backend
//! - Authorized repository description updates
//! - Builder pattern for configuration
//!
//! Every request runs the same pipeline: parameters are validated, the
//! project or repository must exist, the caller's role on the project is
//! resolved, and the [`PermissionMatrix`] decides. Services only accept the
//! [`ProjectGrant`] or [`RepositoryGrant`] that [`AccessControl`] hands out
//! once all of that has passed.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use gateway::{GatewayBuilder, MemoryRegistry};
//! use metadata_store::MemoryStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let gateway = GatewayBuilder::new()
//!     .store(Arc::new(MemoryStore::new()))
//!     .backend(Arc::new(MemoryRegistry::new()))
//!     .build();
//!
//! // Use the gateway service with axum or any tower-compatible server
//! # Ok(())
//! # }
//! ```

mod access;
mod api;
mod backend;
mod catalog;
mod config;
mod error;
mod identity;
mod manifest;
mod mutation;
mod permission;
mod role;
mod routes;
mod seed;
mod tags;
mod validation;

#[cfg(test)]
mod testing;

pub use access::{AccessControl, ProjectGrant, RepositoryGrant};
pub use api::{GatewayBuilder, GatewayState};
pub use backend::{
    BackendError, DOCKER_IMAGE_CONFIG, DOCKER_LAYER, DOCKER_MANIFEST_V2, MemoryRegistry,
    RawManifest, RegistryBackend, content_digest,
};
pub use catalog::{RepositoryCatalogService, RepositoryListing};
pub use config::{ConfigError, GatewayConfig, LogConfig, LogFormat};
pub use error::{GatewayError, GatewayResult, Resource};
pub use identity::{Credentials, DEFAULT_IDENTITY_HEADER, IdentityResolver};
pub use manifest::{Descriptor, ImageManifest, ManifestGateway, ManifestInfo};
pub use mutation::RepositoryMutationService;
pub use permission::{Operation, PermissionMatrix};
pub use role::{Actor, EffectiveRole, Identity, RoleResolver};
pub use routes::TOTAL_COUNT_HEADER;
pub use seed::{Seed, SeedError, SeedImage};
pub use tags::{
    ImageConfig, MAINTAINER_LABEL, Tag, TagDetail, TagMetadataAssembler, populate_author,
};
pub use validation::{DEFAULT_TOP_COUNT, PageLimits};
