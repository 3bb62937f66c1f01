//! Request identity
//!
//! Authentication happens upstream of the gateway. An authenticating proxy
//! forwards the verified username in a trusted header, or middleware inserts
//! an [`Actor`] into the request extensions directly. This module only turns
//! that into an [`Actor`].

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderName};
use metadata_store::MetadataStore;

use crate::api::GatewayState;
use crate::error::GatewayResult;
use crate::role::Actor;

/// Header carrying the verified username when none is configured.
pub const DEFAULT_IDENTITY_HEADER: &str = "x-registry-user";

/// Unresolved identity claims attached to a request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Credentials {
    /// Nothing attached.
    #[default]
    Anonymous,

    /// A verified username, still to be looked up.
    Username(String),

    /// An actor resolved by upstream middleware.
    Resolved(Actor),
}

/// Resolves request credentials to actors.
#[derive(Debug, Clone)]
pub struct IdentityResolver {
    store: Arc<dyn MetadataStore>,
    header: HeaderName,
}

impl IdentityResolver {
    /// Create a resolver reading usernames from `header`.
    pub fn new(store: Arc<dyn MetadataStore>, header: HeaderName) -> Self {
        Self { store, header }
    }

    /// Extract credentials from request headers.
    ///
    /// Empty or non-UTF-8 values count as absent.
    pub fn credentials(&self, headers: &HeaderMap) -> Credentials {
        headers
            .get(&self.header)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|username| !username.is_empty())
            .map(|username| Credentials::Username(username.to_string()))
            .unwrap_or_default()
    }

    /// Turn credentials into an actor.
    ///
    /// A username the store does not know resolves to an anonymous actor.
    pub async fn resolve(&self, credentials: &Credentials) -> GatewayResult<Actor> {
        match credentials {
            Credentials::Anonymous => Ok(Actor::anonymous()),
            Credentials::Resolved(actor) => Ok(actor.clone()),
            Credentials::Username(username) => match self.store.get_user(username).await? {
                Some(user) => Ok(Actor::user(&user)),
                None => {
                    tracing::debug!(%username, "unknown user, treating as anonymous");
                    Ok(Actor::anonymous())
                }
            },
        }
    }
}

impl FromRequestParts<GatewayState> for Credentials {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &GatewayState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(actor) = parts.extensions.get::<Actor>() {
            return Ok(Credentials::Resolved(actor.clone()));
        }
        Ok(state.identity.credentials(&parts.headers))
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;
    use crate::testing;

    fn resolver(fixture: &testing::Fixture) -> IdentityResolver {
        IdentityResolver::new(
            fixture.store(),
            HeaderName::from_static(DEFAULT_IDENTITY_HEADER),
        )
    }

    #[tokio::test]
    async fn header_names_a_known_user() {
        let fixture = testing::Fixture::new().await;
        let resolver = resolver(&fixture);

        let mut headers = HeaderMap::new();
        headers.insert(
            DEFAULT_IDENTITY_HEADER,
            HeaderValue::from_static(testing::DEVELOPER),
        );
        let credentials = resolver.credentials(&headers);
        assert_eq!(
            credentials,
            Credentials::Username(testing::DEVELOPER.to_string())
        );

        let actor = resolver.resolve(&credentials).await.unwrap();
        assert!(actor.is_authenticated());
        assert_eq!(actor.identity().unwrap().user_id, 4);
    }

    #[tokio::test]
    async fn missing_or_unknown_users_are_anonymous() {
        let fixture = testing::Fixture::new().await;
        let resolver = resolver(&fixture);

        assert_eq!(resolver.credentials(&HeaderMap::new()), Credentials::Anonymous);

        let mut headers = HeaderMap::new();
        headers.insert(DEFAULT_IDENTITY_HEADER, HeaderValue::from_static("  "));
        assert_eq!(resolver.credentials(&headers), Credentials::Anonymous);

        let actor = resolver
            .resolve(&Credentials::Username("nobody".into()))
            .await
            .unwrap();
        assert!(!actor.is_authenticated());
    }
}
