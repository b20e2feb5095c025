//! Wire types returned by the directory service.
//!
//! Field names follow the service's JSON (camelCase); annotation values are
//! kept as raw JSON since the service allows scalars and sequences of
//! arbitrary scalar types.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Reserved pseudo-principal granting access to everyone.
pub const PUBLIC_PRINCIPAL_ID: &str = "273949";

/// Reserved pseudo-principal granting access to any signed-in user.
pub const AUTHENTICATED_PRINCIPAL_ID: &str = "273948";

/// A versioned item in the directory service (dataset, file, etc.).
///
/// This is metadata only; entity content lives behind a separate download
/// API that this client does not cover.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    pub id: String,
    /// Display name of the entity.
    pub name: String,
    pub version_number: u64,
    /// User ID of the entity's creator.
    pub created_by: String,
    /// User-supplied annotations. Values may be scalars or sequences.
    #[serde(default)]
    pub annotations: HashMap<String, Value>,
}

/// A recorded process that generated an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityRecord {
    pub id: String,
    /// User ID of whoever recorded the activity.
    pub created_by: String,
    /// Snapshot instant at which the activity was recorded. The service
    /// tracks no separate end time.
    pub created_on: DateTime<Utc>,
    /// Entities the activity consumed.
    #[serde(default)]
    pub used: Vec<UsedEntity>,
}

/// One "used" entry on an activity record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsedEntity {
    /// The consumed entity. The service does not guarantee this is present
    /// or complete, so callers must treat missing pieces as malformed.
    #[serde(default)]
    pub reference: Option<UsedReference>,
}

/// A reference to a consumed entity at an exact version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsedReference {
    #[serde(default)]
    pub target_id: Option<String>,
    #[serde(default)]
    pub target_version_number: Option<u64>,
}

/// A user's public profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub owner_id: String,
    pub user_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

/// The access control list governing an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessControlList {
    /// ID of the entity the ACL is attached to.
    pub id: String,
    #[serde(default)]
    pub resource_access: Vec<AccessGrant>,
}

/// One grant on an ACL: a principal (user or team) and its access types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessGrant {
    pub principal_id: String,
    #[serde(default)]
    pub access_type: Vec<String>,
}

impl AccessGrant {
    pub fn new(principal_id: impl Into<String>, access_type: &[&str]) -> Self {
        Self {
            principal_id: principal_id.into(),
            access_type: access_type.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Header describing a principal, resolved in batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrincipalHeader {
    pub owner_id: String,
    /// `true` for individual users, `false` for teams.
    pub is_individual: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
}

/// One membership record of a team.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamMember {
    pub member: PrincipalRef,
}

/// Minimal principal identity carried inside membership records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrincipalRef {
    pub owner_id: String,
}

/// Paged response of `/userGroupHeaders/batch`.
#[derive(Debug, Deserialize)]
pub(crate) struct PrincipalHeaderPage {
    #[serde(default)]
    pub children: Vec<PrincipalHeader>,
}

/// Paged response of `/teamMembers/{id}`.
#[derive(Debug, Deserialize)]
pub(crate) struct TeamMemberPage {
    #[serde(default)]
    pub results: Vec<TeamMember>,
}
