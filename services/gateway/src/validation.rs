//! Request parameter validation
//!
//! Runs before any store or registry access. Repository and tag names are
//! deliberately not checked here: image names allow a wide character set and
//! their validity is decided by lookup.

use metadata_store::{Page, ProjectId};
use serde::Deserialize;

use crate::error::{GatewayError, GatewayResult};

/// Default number of entries returned by the top-repositories listing.
pub const DEFAULT_TOP_COUNT: usize = 10;

/// Page size bounds for paginated listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct PageLimits {
    /// Page size used when the request does not ask for one.
    pub default_page_size: u64,

    /// Largest page size a request may ask for; larger requests are capped.
    pub max_page_size: u64,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            default_page_size: 10,
            max_page_size: 100,
        }
    }
}

fn positive_integer(field: &'static str, raw: &str) -> GatewayResult<u64> {
    match raw.parse::<u64>() {
        Ok(0) => Err(GatewayError::validation(field, "must be greater than zero")),
        Ok(value) => Ok(value),
        Err(_) => Err(GatewayError::validation(
            field,
            format!("{raw:?} is not a positive integer"),
        )),
    }
}

/// Parse a project id. Non-numeric and non-positive values are rejected.
pub fn project_id(raw: Option<&str>) -> GatewayResult<ProjectId> {
    let raw = raw.ok_or_else(|| GatewayError::validation("project_id", "is required"))?;
    let id = positive_integer("project_id", raw)?;
    ProjectId::try_from(id).map_err(|_| GatewayError::validation("project_id", "out of range"))
}

/// Parse the `count` of a ranked listing, defaulting when absent.
pub fn count(raw: Option<&str>) -> GatewayResult<usize> {
    match raw {
        None => Ok(DEFAULT_TOP_COUNT),
        Some(raw) => {
            let count = positive_integer("count", raw)?;
            usize::try_from(count).map_err(|_| GatewayError::validation("count", "out of range"))
        }
    }
}

/// Parse `page` and `page_size`, applying defaults and the size cap.
pub fn page(
    page: Option<&str>,
    page_size: Option<&str>,
    limits: PageLimits,
) -> GatewayResult<Page> {
    let number = page
        .map(|raw| positive_integer("page", raw))
        .transpose()?
        .unwrap_or(1);
    let size = page_size
        .map(|raw| positive_integer("page_size", raw))
        .transpose()?
        .unwrap_or(limits.default_page_size)
        .min(limits.max_page_size);

    Ok(Page::new(number, size))
}
