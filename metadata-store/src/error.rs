use std::error::Error as StdError;
use std::fmt;

use tracing_error::SpanTrace;

/// Categorizes store errors by their semantic meaning, independent of the
/// engine which produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorKind {
    /// The record addressed by a write does not exist.
    ///
    /// Reads report absence with `Ok(None)` instead.
    NotFound,

    /// The write would violate a uniqueness constraint.
    Conflict,

    /// The persistence engine could not be reached.
    ///
    /// **Retryable:** Yes.
    Unavailable,

    /// The request was rejected by the engine as malformed.
    InvalidRequest,
}

impl StoreErrorKind {
    /// Returns whether this error kind typically indicates a retryable condition.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreErrorKind::Unavailable)
    }
}

impl fmt::Display for StoreErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreErrorKind::NotFound => write!(f, "not found"),
            StoreErrorKind::Conflict => write!(f, "conflict"),
            StoreErrorKind::Unavailable => write!(f, "unavailable"),
            StoreErrorKind::InvalidRequest => write!(f, "invalid request"),
        }
    }
}

/// Error returned by a [`MetadataStore`](crate::MetadataStore).
///
/// Carries the semantic [`StoreErrorKind`], the engine name, the entity and
/// key that were being addressed, and the underlying error.
///
/// ```rust
/// use metadata_store::{StoreError, StoreErrorKind};
///
/// let error = StoreError::builder("memory", StoreErrorKind::NotFound, "no such repository")
///     .entity("repository")
///     .key("library/hello-world")
///     .build();
/// assert_eq!(error.kind(), StoreErrorKind::NotFound);
/// ```
#[derive(Debug)]
pub struct StoreError {
    kind: StoreErrorKind,
    engine: &'static str,
    entity: Option<&'static str>,
    key: Option<String>,
    source: Box<dyn StdError + Send + Sync + 'static>,
    span_trace: SpanTrace,
}

impl StdError for StoreError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(self.source.as_ref())
    }
}

impl StoreError {
    /// Create a builder for a store error with entity and key context.
    pub fn builder<E>(engine: &'static str, kind: StoreErrorKind, error: E) -> StoreErrorBuilder
    where
        E: Into<Box<dyn StdError + Send + Sync + 'static>>,
    {
        StoreErrorBuilder {
            kind,
            engine,
            entity: None,
            key: None,
            source: error.into(),
        }
    }

    /// Returns the error kind.
    pub fn kind(&self) -> StoreErrorKind {
        self.kind
    }

    /// Returns the engine name.
    pub fn engine(&self) -> &'static str {
        self.engine
    }

    /// Returns the entity being addressed, if known.
    pub fn entity(&self) -> Option<&'static str> {
        self.entity
    }

    /// Returns the key being addressed, if known.
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// Returns whether this error is likely retryable.
    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    /// Span context at the point where the error was built.
    ///
    /// Empty unless a `tracing_error::ErrorLayer` is installed.
    pub fn span_trace(&self) -> &SpanTrace {
        &self.span_trace
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Store error [{}] from {}", self.kind, self.engine)?;

        if let Some(entity) = self.entity {
            write!(f, " ({entity}")?;
            if let Some(key) = &self.key {
                write!(f, ": {key}")?;
            }
            write!(f, ")")?;
        }

        write!(f, ": {}", self.source)
    }
}

/// Builder for [`StoreError`] with optional context fields.
#[derive(Debug)]
pub struct StoreErrorBuilder {
    kind: StoreErrorKind,
    engine: &'static str,
    entity: Option<&'static str>,
    key: Option<String>,
    source: Box<dyn StdError + Send + Sync + 'static>,
}

impl StoreErrorBuilder {
    /// Set the entity name (e.g. `"repository"`).
    pub fn entity(mut self, entity: &'static str) -> Self {
        self.entity = Some(entity);
        self
    }

    /// Set the record key.
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Build the `StoreError`.
    pub fn build(self) -> StoreError {
        StoreError {
            kind: self.kind,
            engine: self.engine,
            entity: self.entity,
            key: self.key,
            source: self.source,
            span_trace: SpanTrace::capture(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static_assertions::assert_impl_all!(StoreError: Send, Sync, StdError);

    #[test]
    fn display_includes_entity_and_key() {
        let error = StoreError::builder("memory", StoreErrorKind::NotFound, "missing")
            .entity("repository")
            .key("library/busybox")
            .build();

        assert_eq!(
            error.to_string(),
            "Store error [not found] from memory (repository: library/busybox): missing"
        );
        assert_eq!(error.key(), Some("library/busybox"));
        assert!(!error.is_retryable());
    }

    #[test]
    fn unavailable_is_retryable() {
        let error =
            StoreError::builder("postgres", StoreErrorKind::Unavailable, "connection reset")
                .entity("project")
                .build();

        assert_eq!(error.kind(), StoreErrorKind::Unavailable);
        assert_eq!(error.engine(), "postgres");
        assert!(error.is_retryable());
        assert!(!StoreErrorKind::Conflict.is_retryable());
    }
}
