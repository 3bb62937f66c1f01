//! Gateway builder and router

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{HeaderName, Request, StatusCode};
use axum::response::Json;
use axum::routing::get;
use metadata_store::MetadataStore;
use serde_json::json;
use tower::ServiceBuilder;
use tower_http::request_id::{
    MakeRequestUuid, PropagateRequestIdLayer, RequestId, SetRequestIdLayer,
};
use tower_http::trace::TraceLayer;

use crate::access::AccessControl;
use crate::backend::RegistryBackend;
use crate::catalog::RepositoryCatalogService;
use crate::config::GatewayConfig;
use crate::identity::{DEFAULT_IDENTITY_HEADER, IdentityResolver};
use crate::manifest::ManifestGateway;
use crate::mutation::RepositoryMutationService;
use crate::tags::TagMetadataAssembler;
use crate::validation::PageLimits;

/// Shared handler state.
#[derive(Debug, Clone)]
pub struct GatewayState {
    pub(crate) access: AccessControl,
    pub(crate) catalog: RepositoryCatalogService,
    pub(crate) tags: TagMetadataAssembler,
    pub(crate) manifests: ManifestGateway,
    pub(crate) mutation: RepositoryMutationService,
    pub(crate) identity: IdentityResolver,
    pub(crate) limits: PageLimits,
}

impl GatewayState {
    /// Wire the services over a metadata store and registry backend.
    pub fn new(
        store: Arc<dyn MetadataStore>,
        backend: Arc<dyn RegistryBackend>,
        identity_header: HeaderName,
        limits: PageLimits,
    ) -> Self {
        let access = AccessControl::new(store.clone());
        let manifests = ManifestGateway::new(backend);

        Self {
            catalog: RepositoryCatalogService::new(store.clone(), access.clone()),
            tags: TagMetadataAssembler::new(manifests.clone()),
            mutation: RepositoryMutationService::new(store.clone()),
            identity: IdentityResolver::new(store, identity_header),
            manifests,
            access,
            limits,
        }
    }
}

/// Gateway builder for configuring and creating the HTTP service
#[derive(Debug)]
pub struct GatewayBuilder {
    store: Option<Arc<dyn MetadataStore>>,
    backend: Option<Arc<dyn RegistryBackend>>,
    identity_header: HeaderName,
    limits: PageLimits,
}

impl Default for GatewayBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GatewayBuilder {
    /// Create a new gateway builder
    pub fn new() -> Self {
        Self {
            store: None,
            backend: None,
            identity_header: HeaderName::from_static(DEFAULT_IDENTITY_HEADER),
            limits: PageLimits::default(),
        }
    }

    /// Set the metadata store
    pub fn store(mut self, store: Arc<dyn MetadataStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the registry backend
    pub fn backend(mut self, backend: Arc<dyn RegistryBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Set the header carrying the verified username
    pub fn identity_header(mut self, header: HeaderName) -> Self {
        self.identity_header = header;
        self
    }

    /// Set the page size bounds for listings
    pub fn page_limits(mut self, limits: PageLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Apply the request-handling settings of a configuration file
    pub fn config(self, config: &GatewayConfig) -> Self {
        self.identity_header(config.identity_header.clone())
            .page_limits(config.pagination)
    }

    /// Build the gateway service
    ///
    /// Returns a Router that can be served with any tower-compatible server
    pub fn build(self) -> Router {
        let store = self.store.expect("metadata store must be configured");
        let backend = self.backend.expect("registry backend must be configured");

        let state = GatewayState::new(store, backend, self.identity_header, self.limits);

        let layers = ServiceBuilder::new()
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(
                TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                    let request_id = request
                        .extensions()
                        .get::<RequestId>()
                        .and_then(|id| id.header_value().to_str().ok())
                        .unwrap_or_default();
                    tracing::info_span!(
                        "request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id,
                    )
                }),
            )
            .layer(PropagateRequestIdLayer::x_request_id());

        Router::new()
            .route("/api/ping", get(ping))
            .merge(crate::routes::router())
            .layer(layers)
            .with_state(state)
    }
}

/// Liveness endpoint
async fn ping() -> (StatusCode, Json<serde_json::Value>) {
    (StatusCode::OK, Json(json!({})))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::http::Request;
    use metadata_store::MemoryStore;
    use tower::ServiceExt;

    use super::*;
    use crate::backend::MemoryRegistry;

    fn gateway() -> Router {
        GatewayBuilder::new()
            .store(Arc::new(MemoryStore::new()))
            .backend(Arc::new(MemoryRegistry::new()))
            .build()
    }

    #[tokio::test]
    async fn ping_carries_request_id() {
        let response = gateway()
            .oneshot(
                Request::builder()
                    .uri("/api/ping")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn supplied_request_id_is_echoed() {
        let response = gateway()
            .oneshot(
                Request::builder()
                    .uri("/api/ping")
                    .header("x-request-id", "abc-123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.headers()["x-request-id"], "abc-123");
    }

    #[tokio::test]
    async fn store_outage_is_service_unavailable() {
        let app = GatewayBuilder::new()
            .store(Arc::new(crate::testing::UnavailableStore))
            .backend(Arc::new(MemoryRegistry::new()))
            .build();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/repositories?project_id=1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["errors"][0]["code"], "STORE_UNAVAILABLE");
    }

    #[test]
    #[should_panic(expected = "metadata store must be configured")]
    fn builder_requires_store() {
        let _ = GatewayBuilder::new()
            .backend(Arc::new(MemoryRegistry::new()))
            .build();
    }
}
