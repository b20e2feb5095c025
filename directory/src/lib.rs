//! Client for the directory service backing the data-sharing platform.
//!
//! This crate provides:
//! - [`DirectoryClient`] trait for abstracting access to the remote service
//! - [`HttpDirectoryClient`] production client that talks to the REST API
//! - [`MockDirectoryClient`] mock client for testing with pre-registered fixtures
//! - [`DirectorySource`] config enum for choosing between mock and live clients
//!
//! The trait covers the calls the provenance and permissions crates need:
//! entity metadata (no content download), the activity record that generated
//! an entity, user profiles, ACLs, batched principal-header resolution and
//! team membership enumeration.
//!
//! ## Usage with DirectorySource
//!
//! ```ignore
//! use directory::DirectorySource;
//!
//! // Development/testing: use mock fixtures
//! let mock = MockDirectoryClient::new();
//! mock.register_entity(entity);
//! let client = DirectorySource::Mock(mock).into_client();
//!
//! // Production: use the live REST API
//! let client = DirectorySource::live("https://repo.example.org/v1").into_client();
//!
//! let entity = client.get_entity("syn123", None).await?;
//! ```

mod http;
mod mock;
mod types;

pub use http::HttpDirectoryClient;
pub use mock::MockDirectoryClient;
pub use types::{
    AccessControlList, AccessGrant, ActivityRecord, Entity, PrincipalHeader, PrincipalRef,
    TeamMember, UsedEntity, UsedReference, UserProfile, AUTHENTICATED_PRINCIPAL_ID,
    PUBLIC_PRINCIPAL_ID,
};

use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("upstream unavailable: {0}")]
    Upstream(String),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DirectoryError>;

/// Trait for fetching records from the directory service.
///
/// This trait abstracts the remote service to enable dependency injection
/// and mocking for testing. Production code uses [`HttpDirectoryClient`],
/// while tests can use [`MockDirectoryClient`].
///
/// Entity fetches are metadata-only; nothing here downloads entity content.
#[async_trait]
pub trait DirectoryClient: Send + Sync {
    /// Fetch an entity's metadata, at a specific version when given.
    async fn get_entity(&self, id: &str, version: Option<u64>) -> Result<Entity>;

    /// Fetch the activity record that generated an entity.
    ///
    /// Returns `Ok(None)` when no activity has been recorded for the entity.
    async fn get_provenance_activity(&self, entity: &Entity) -> Result<Option<ActivityRecord>>;

    /// Fetch a user's profile.
    async fn get_user_profile(&self, user_id: &str) -> Result<UserProfile>;

    /// Fetch the access control list governing an entity.
    async fn get_access_control_list(&self, entity_id: &str) -> Result<AccessControlList>;

    /// Resolve many principal IDs to headers in a single round trip.
    ///
    /// IDs the service does not know are omitted from the result.
    async fn resolve_principal_headers(&self, ids: &[String]) -> Result<Vec<PrincipalHeader>>;

    /// Enumerate the members of a team.
    async fn get_team_members(&self, team_id: &str) -> Result<Vec<TeamMember>>;
}

/// Configuration for the directory data source.
///
/// Use this to explicitly choose between mock and live clients.
pub enum DirectorySource {
    /// Use a mock client pre-registered with fixtures.
    Mock(MockDirectoryClient),

    /// Connect to the live REST API.
    Live {
        /// Base URL of the service (e.g. "https://repo.example.org/v1")
        base_url: String,
        /// Optional bearer token sent with every request.
        auth_token: Option<String>,
    },
}

impl DirectorySource {
    /// Create a live source with the given base URL and no auth token.
    pub fn live(base_url: impl Into<String>) -> Self {
        Self::Live {
            base_url: base_url.into(),
            auth_token: None,
        }
    }

    /// Create a live source that authenticates with a bearer token.
    pub fn live_with_auth(base_url: impl Into<String>, auth_token: impl Into<String>) -> Self {
        Self::Live {
            base_url: base_url.into(),
            auth_token: Some(auth_token.into()),
        }
    }

    /// Create the appropriate [`DirectoryClient`] implementation.
    pub fn into_client(self) -> Box<dyn DirectoryClient> {
        match self {
            Self::Mock(mock) => Box::new(mock),
            Self::Live {
                base_url,
                auth_token,
            } => Box::new(HttpDirectoryClient::with_auth(&base_url, auth_token)),
        }
    }
}
