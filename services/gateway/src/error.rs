//! Error types for the gateway

use std::fmt;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use metadata_store::{ProjectId, StoreError};

use crate::backend::BackendError;

/// Result type for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;

/// A resource which can be reported as missing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resource {
    /// A project, by id.
    Project(ProjectId),

    /// A repository, by full name.
    Repository(String),

    /// A tag within a repository.
    Tag {
        /// Repository name
        repository: String,
        /// Tag name
        tag: String,
    },

    /// A manifest, by repository and reference.
    Manifest {
        /// Repository name
        repository: String,
        /// Tag or digest
        reference: String,
    },

    /// A content-addressed blob.
    Blob(String),
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::Project(id) => write!(f, "project {id}"),
            Resource::Repository(name) => write!(f, "repository {name}"),
            Resource::Tag { repository, tag } => write!(f, "tag {repository}:{tag}"),
            Resource::Manifest {
                repository,
                reference,
            } => write!(f, "manifest {repository}:{reference}"),
            Resource::Blob(digest) => write!(f, "blob {digest}"),
        }
    }
}

/// Error kinds surfaced by the gateway
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Malformed request input
    #[error("invalid {field}: {reason}")]
    Validation {
        /// Parameter which failed validation
        field: &'static str,
        /// Why it was rejected
        reason: String,
    },

    /// The operation needs an authenticated actor
    #[error("authentication required")]
    AuthenticationRequired,

    /// The actor is authenticated but lacks the required role
    #[error("permission denied")]
    PermissionDenied,

    /// The addressed resource does not exist
    #[error("{0} not found")]
    NotFound(Resource),

    /// The registry backend could not be reached
    #[error("registry backend unavailable")]
    BackendUnavailable(#[source] BackendError),

    /// The registry backend returned data that could not be interpreted
    #[error("malformed {what} for {repository}: {reason}")]
    MalformedBackendData {
        /// What was being decoded
        what: &'static str,
        /// Repository the data belongs to
        repository: String,
        /// Decoder message
        reason: String,
    },

    /// The metadata store is temporarily unreachable
    #[error("metadata store unavailable")]
    StoreUnavailable(#[source] StoreError),

    /// Persistence failure
    #[error("metadata store error: {0}")]
    Store(#[source] StoreError),
}

impl GatewayError {
    /// Shorthand for a validation failure.
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        GatewayError::Validation {
            field,
            reason: reason.into(),
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::Validation { .. } => StatusCode::BAD_REQUEST,
            GatewayError::AuthenticationRequired => StatusCode::UNAUTHORIZED,
            GatewayError::PermissionDenied => StatusCode::FORBIDDEN,
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::BackendUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::MalformedBackendData { .. } => StatusCode::BAD_GATEWAY,
            GatewayError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for error responses
    pub fn error_code(&self) -> &'static str {
        match self {
            GatewayError::Validation { .. } => "INVALID_PARAMETER",
            GatewayError::AuthenticationRequired => "UNAUTHORIZED",
            GatewayError::PermissionDenied => "FORBIDDEN",
            GatewayError::NotFound(_) => "NOT_FOUND",
            GatewayError::BackendUnavailable(_) => "REGISTRY_UNAVAILABLE",
            GatewayError::MalformedBackendData { .. } => "REGISTRY_DATA_INVALID",
            GatewayError::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            GatewayError::Store(_) => "UNKNOWN",
        }
    }

    fn store_error(&self) -> Option<&StoreError> {
        match self {
            GatewayError::StoreUnavailable(error) | GatewayError::Store(error) => Some(error),
            _ => None,
        }
    }
}

impl From<StoreError> for GatewayError {
    fn from(error: StoreError) -> Self {
        if error.is_retryable() {
            GatewayError::StoreUnavailable(error)
        } else {
            GatewayError::Store(error)
        }
    }
}

impl From<BackendError> for GatewayError {
    fn from(error: BackendError) -> Self {
        match error {
            BackendError::RepositoryUnknown(name) => {
                GatewayError::NotFound(Resource::Repository(name))
            }
            BackendError::ManifestUnknown {
                repository,
                reference,
            } => GatewayError::NotFound(Resource::Manifest {
                repository,
                reference,
            }),
            BackendError::BlobUnknown(digest) => GatewayError::NotFound(Resource::Blob(digest)),
            unavailable @ BackendError::Unavailable(_) => {
                GatewayError::BackendUnavailable(unavailable)
            }
        }
    }
}

impl From<QueryRejection> for GatewayError {
    fn from(rejection: QueryRejection) -> Self {
        GatewayError::validation("query", rejection.body_text())
    }
}

impl From<JsonRejection> for GatewayError {
    fn from(rejection: JsonRejection) -> Self {
        GatewayError::validation("body", rejection.body_text())
    }
}

/// Error response format
#[derive(Debug, serde::Serialize)]
struct ErrorResponse {
    errors: Vec<ErrorDetail>,
}

#[derive(Debug, serde::Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code();
        let message = self.to_string();

        if let Some(store) = self.store_error() {
            tracing::error!(
                engine = store.engine(),
                kind = %store.kind(),
                span_trace = %store.span_trace(),
                "{message}: {store}"
            );
        } else if status.is_server_error() {
            tracing::error!(error = ?self, "{message}");
        } else {
            tracing::debug!(%status, "{message}");
        }

        let body = ErrorResponse {
            errors: vec![ErrorDetail { code, message }],
        };

        (status, axum::Json(body)).into_response()
    }
}
