//! Repository, tag and manifest routes
//!
//! Repository names contain slashes, so everything below
//! `/api/repositories/` is matched by one wildcard and split by
//! [`RepositoryPath::parse`]. A trailing `tags/...` or `manifest` segment
//! is read as a sub-resource first; when no repository matches that reading,
//! the whole path is looked up as a repository name, so an image called
//! `library/tags` is still reachable.

use axum::Router;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderName, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use serde::Deserialize;

use crate::api::GatewayState;
use crate::error::{GatewayError, GatewayResult, Resource};
use crate::identity::Credentials;
use crate::permission::Operation;
use crate::validation;

/// Total number of matches of a paginated listing.
pub const TOTAL_COUNT_HEADER: HeaderName = HeaderName::from_static("x-total-count");

const TAGS_SEGMENT: &str = "/tags";
const MANIFEST_SEGMENT: &str = "/manifest";

pub(crate) fn router() -> Router<GatewayState> {
    Router::new()
        .route("/api/repositories", get(list_repositories))
        .route("/api/repositories/top", get(top_repositories))
        .route(
            "/api/repositories/{*path}",
            get(get_repository_path).put(update_repository),
        )
}

/// What a path below `/api/repositories/` addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RepositoryPath<'a> {
    Repository(&'a str),
    Tags(&'a str),
    Tag { repository: &'a str, tag: &'a str },
    Manifest { repository: &'a str, tag: &'a str },
}

impl<'a> RepositoryPath<'a> {
    pub(crate) fn parse(path: &'a str) -> Self {
        let path = path.trim_matches('/');

        if let Some((repository, tag)) = path
            .strip_suffix(MANIFEST_SEGMENT)
            .and_then(split_tag)
        {
            return RepositoryPath::Manifest { repository, tag };
        }

        if let Some(repository) = path.strip_suffix(TAGS_SEGMENT).filter(|r| !r.is_empty()) {
            return RepositoryPath::Tags(repository);
        }

        if let Some((repository, tag)) = split_tag(path) {
            return RepositoryPath::Tag { repository, tag };
        }

        RepositoryPath::Repository(path)
    }

    /// The repository name this path addresses.
    pub(crate) fn repository(&self) -> &'a str {
        match *self {
            RepositoryPath::Repository(name) | RepositoryPath::Tags(name) => name,
            RepositoryPath::Tag { repository, .. }
            | RepositoryPath::Manifest { repository, .. } => repository,
        }
    }
}

/// Split `<repository>/tags/<tag>`.
fn split_tag(path: &str) -> Option<(&str, &str)> {
    let (head, tag) = path.rsplit_once('/')?;
    let repository = head.strip_suffix(TAGS_SEGMENT)?;
    (!repository.is_empty() && !tag.is_empty()).then_some((repository, tag))
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    project_id: Option<String>,
    q: Option<String>,
    page: Option<String>,
    page_size: Option<String>,
}

/// List a project's repositories
async fn list_repositories(
    State(state): State<GatewayState>,
    credentials: Credentials,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> GatewayResult<Response> {
    let Query(query) = query?;
    let project_id = validation::project_id(query.project_id.as_deref())?;
    let page = validation::page(
        query.page.as_deref(),
        query.page_size.as_deref(),
        state.limits,
    )?;

    let actor = state.identity.resolve(&credentials).await?;
    let grant = state
        .access
        .project(&actor, project_id, Operation::Read)
        .await?;

    let keyword = query.q.as_deref().filter(|q| !q.is_empty());
    let listing = state.catalog.list(&grant, keyword, page).await?;

    Ok((
        StatusCode::OK,
        [(TOTAL_COUNT_HEADER, listing.total.to_string())],
        Json(listing.repositories),
    )
        .into_response())
}

#[derive(Debug, Deserialize)]
struct TopQuery {
    count: Option<String>,
}

/// Most pulled repositories visible to the caller
async fn top_repositories(
    State(state): State<GatewayState>,
    credentials: Credentials,
    query: Result<Query<TopQuery>, QueryRejection>,
) -> GatewayResult<Response> {
    let Query(query) = query?;
    let count = validation::count(query.count.as_deref())?;

    let actor = state.identity.resolve(&credentials).await?;
    let repositories = state.catalog.top(&actor, count).await?;

    Ok(Json(repositories).into_response())
}

/// Repository record, tag list, tag detail or manifest
async fn get_repository_path(
    State(state): State<GatewayState>,
    Path(path): Path<String>,
    credentials: Credentials,
) -> GatewayResult<Response> {
    let name = path.trim_matches('/');
    let target = RepositoryPath::parse(name);

    let actor = state.identity.resolve(&credentials).await?;
    let (target, grant) = match state
        .access
        .repository(&actor, target.repository(), Operation::Read)
        .await
    {
        Ok(grant) => (target, grant),
        Err(missing @ GatewayError::NotFound(Resource::Repository(_)))
            if target.repository() != name =>
        {
            let grant = state
                .access
                .repository(&actor, name, Operation::Read)
                .await
                .map_err(|error| match error {
                    GatewayError::NotFound(_) => missing,
                    other => other,
                })?;
            (RepositoryPath::Repository(name), grant)
        }
        Err(error) => return Err(error),
    };

    let response = match target {
        RepositoryPath::Repository(_) => Json(grant.repository()).into_response(),
        RepositoryPath::Tags(_) => Json(state.tags.list_tags(&grant).await?).into_response(),
        RepositoryPath::Tag { tag, .. } => {
            Json(state.tags.get_tag(&grant, tag).await?).into_response()
        }
        RepositoryPath::Manifest { tag, .. } => {
            Json(state.manifests.get_manifest(&grant, tag).await?).into_response()
        }
    };
    Ok(response)
}

#[derive(Debug, Deserialize)]
struct DescriptionUpdate {
    description: String,
}

/// Replace a repository's description
async fn update_repository(
    State(state): State<GatewayState>,
    Path(path): Path<String>,
    credentials: Credentials,
    body: Result<Json<DescriptionUpdate>, JsonRejection>,
) -> GatewayResult<StatusCode> {
    let Json(update) = body?;
    let name = path.trim_matches('/');

    let actor = state.identity.resolve(&credentials).await?;
    let grant = state
        .access
        .repository(&actor, name, Operation::UpdateDescription)
        .await?;

    state
        .mutation
        .update_description(&grant, &update.description)
        .await?;
    Ok(StatusCode::OK)
}
