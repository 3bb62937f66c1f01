//! Records held by the metadata store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Project identifier. Always positive for stored projects.
pub type ProjectId = i64;

/// User identifier.
pub type UserId = i64;

/// A project: the tenant namespace repositories live in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    /// Numeric project identifier.
    pub project_id: ProjectId,

    /// Project name, which is also the first component of repository names.
    pub name: String,

    /// Public projects are readable by anyone, including anonymous actors.
    #[serde(default)]
    pub public: bool,

    /// When the project was created.
    #[serde(default = "Utc::now")]
    pub creation_time: DateTime<Utc>,
}

/// A registered user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Numeric user identifier, used as the member entity id.
    pub user_id: UserId,

    /// Login name.
    pub username: String,

    /// System administrators bypass project membership.
    #[serde(default)]
    pub sysadmin: bool,
}

/// Kind of entity a membership record refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityType {
    /// A single user.
    #[serde(rename = "u")]
    User,

    /// A user group.
    #[serde(rename = "g")]
    Group,
}

/// Role granted by a membership record, ordered by privilege.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum MemberRole {
    /// Read access.
    Guest = 1,

    /// Read and write access to repository metadata.
    Developer = 2,

    /// Full control over the project.
    ProjectAdmin = 3,
}

/// A numeric role value outside the known set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unknown member role: {0}")]
pub struct UnknownMemberRole(pub u8);

impl TryFrom<u8> for MemberRole {
    type Error = UnknownMemberRole;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(MemberRole::Guest),
            2 => Ok(MemberRole::Developer),
            3 => Ok(MemberRole::ProjectAdmin),
            other => Err(UnknownMemberRole(other)),
        }
    }
}

impl From<MemberRole> for u8 {
    fn from(role: MemberRole) -> Self {
        role as u8
    }
}

/// Membership of an entity in a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectMember {
    /// Project the membership belongs to.
    pub project_id: ProjectId,

    /// User or group identifier.
    pub entity_id: i64,

    /// Whether `entity_id` names a user or a group.
    pub entity_type: EntityType,

    /// Granted role.
    pub role: MemberRole,
}

/// Repository metadata record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    /// Owning project.
    pub project_id: ProjectId,

    /// Full name, `<project>/<image>`.
    pub name: String,

    /// Free-form description.
    #[serde(default)]
    pub description: String,

    /// Number of pulls recorded for this repository.
    #[serde(default)]
    pub pull_count: u64,

    /// Number of stars.
    #[serde(default)]
    pub star_count: u64,

    /// When the repository was first pushed.
    #[serde(default = "Utc::now")]
    pub creation_time: DateTime<Utc>,

    /// Last metadata change.
    #[serde(default = "Utc::now")]
    pub update_time: DateTime<Utc>,
}

/// A 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    /// Page number, starting at 1.
    pub number: u64,

    /// Maximum number of records in the page.
    pub size: u64,
}

impl Page {
    /// Create a page request. Zero values are clamped to 1.
    pub fn new(number: u64, size: u64) -> Self {
        Self {
            number: number.max(1),
            size: size.max(1),
        }
    }

    /// Number of records to skip.
    pub fn offset(&self) -> u64 {
        (self.number - 1).saturating_mul(self.size)
    }
}

/// One page of repositories and the total number of matches.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RepositoryPage {
    /// Repositories in this page.
    pub repositories: Vec<Repository>,

    /// Total number of matching repositories across all pages.
    pub total: u64,
}
