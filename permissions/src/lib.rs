//! # Permissions
//!
//! Resolves the effective per-user permissions an entity's ACL grants.
//! Team grants are expanded into one grant per member, and a user who is
//! reached through several grants (a direct grant plus one or more teams)
//! ends up with the set union of all the access types granted to them.
//!
//! Unlike the provenance builder there is no partial-result mode here: an
//! incomplete permission picture would be unsafe to present as
//! authoritative, so every fetch failure propagates.
//!
//! ## Example
//!
//! ```ignore
//! use permissions::resolve_effective_permissions;
//!
//! let effective = resolve_effective_permissions(&client, "syn123").await?;
//! for (user_id, access) in &effective {
//!     println!("{}: {:?}", user_id, access);
//! }
//! ```

use std::collections::{BTreeSet, HashMap};

use thiserror::Error;
use tracing::debug;

use directory::{
    AccessGrant, DirectoryClient, DirectoryError, AUTHENTICATED_PRINCIPAL_ID, PUBLIC_PRINCIPAL_ID,
};

/// Errors from permission resolution. All are fatal to the call.
#[derive(Debug, Error)]
pub enum PermissionsError {
    #[error("failed to fetch ACL for entity {entity_id}: {source}")]
    Acl {
        entity_id: String,
        source: DirectoryError,
    },

    #[error("failed to resolve principal headers for entity {entity_id}: {source}")]
    PrincipalHeaders {
        entity_id: String,
        source: DirectoryError,
    },

    #[error("failed to fetch members of team {team_id}: {source}")]
    TeamMembers {
        team_id: String,
        source: DirectoryError,
    },

    #[error("principal header {principal_id} matches no grant on the ACL of entity {entity_id}")]
    UnknownPrincipal {
        entity_id: String,
        principal_id: String,
    },
}

/// Resolve the effective per-user permissions on an entity.
///
/// Fetches the entity's ACL, resolves every principal on it in one batched
/// round trip, expands team grants into per-member grants, and merges
/// access types per user. The returned map is keyed by principal id;
/// ordering carries no meaning.
pub async fn resolve_effective_permissions(
    client: &dyn DirectoryClient,
    entity_id: &str,
) -> Result<HashMap<String, BTreeSet<String>>, PermissionsError> {
    let acl = client
        .get_access_control_list(entity_id)
        .await
        .map_err(|source| PermissionsError::Acl {
            entity_id: entity_id.to_string(),
            source,
        })?;
    let expanded = expand_team_grants(client, entity_id, &acl.resource_access).await?;
    Ok(merge_grants(expanded))
}

/// Expand an ACL's grants into per-user grants.
///
/// Individual principals pass through unchanged. For a team, every member
/// receives a copy of the team's grant with the principal id rewritten to
/// the member's user id. Reserved public/anonymous pseudo-principals pass
/// through like individuals.
async fn expand_team_grants(
    client: &dyn DirectoryClient,
    entity_id: &str,
    grants: &[AccessGrant],
) -> Result<Vec<AccessGrant>, PermissionsError> {
    if grants.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<String> = grants.iter().map(|g| g.principal_id.clone()).collect();
    let headers = client
        .resolve_principal_headers(&ids)
        .await
        .map_err(|source| PermissionsError::PrincipalHeaders {
            entity_id: entity_id.to_string(),
            source,
        })?;

    let by_principal: HashMap<&str, &AccessGrant> = grants
        .iter()
        .map(|grant| (grant.principal_id.as_str(), grant))
        .collect();

    let mut expanded = Vec::new();
    for header in &headers {
        if header.owner_id == PUBLIC_PRINCIPAL_ID || header.owner_id == AUTHENTICATED_PRINCIPAL_ID
        {
            debug!(principal_id = %header.owner_id, "reserved principal on ACL, passing through");
        }
        let grant = by_principal.get(header.owner_id.as_str()).ok_or_else(|| {
            PermissionsError::UnknownPrincipal {
                entity_id: entity_id.to_string(),
                principal_id: header.owner_id.clone(),
            }
        })?;
        if header.is_individual {
            expanded.push((*grant).clone());
        } else {
            let members = client
                .get_team_members(&header.owner_id)
                .await
                .map_err(|source| PermissionsError::TeamMembers {
                    team_id: header.owner_id.clone(),
                    source,
                })?;
            for member in members {
                let mut member_grant = (*grant).clone();
                // the team's access, attributed to the individual
                member_grant.principal_id = member.member.owner_id;
                expanded.push(member_grant);
            }
        }
    }
    Ok(expanded)
}

/// Fold grants per principal, merging access types by set union.
///
/// A principal appearing once keeps that grant's access types unchanged;
/// a principal appearing several times gets the union across all of its
/// occurrences.
pub fn merge_grants(
    grants: impl IntoIterator<Item = AccessGrant>,
) -> HashMap<String, BTreeSet<String>> {
    let mut merged: HashMap<String, BTreeSet<String>> = HashMap::new();
    for grant in grants {
        merged
            .entry(grant.principal_id)
            .or_default()
            .extend(grant.access_type);
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_is_set_union_not_overwrite() {
        let merged = merge_grants(vec![
            AccessGrant::new("U1", &["READ"]),
            AccessGrant::new("U1", &["READ", "UPDATE"]),
        ]);

        assert_eq!(merged.len(), 1);
        assert_eq!(
            merged["U1"],
            BTreeSet::from(["READ".to_string(), "UPDATE".to_string()])
        );
    }

    #[test]
    fn test_merge_single_occurrence_passes_through() {
        let merged = merge_grants(vec![AccessGrant::new("U1", &["READ", "DOWNLOAD"])]);

        assert_eq!(
            merged["U1"],
            BTreeSet::from(["READ".to_string(), "DOWNLOAD".to_string()])
        );
    }

    #[test]
    fn test_merge_keeps_principals_independent() {
        let merged = merge_grants(vec![
            AccessGrant::new("U1", &["READ"]),
            AccessGrant::new("U2", &["UPDATE"]),
            AccessGrant::new("U1", &["DOWNLOAD"]),
        ]);

        assert_eq!(merged.len(), 2);
        assert_eq!(
            merged["U1"],
            BTreeSet::from(["READ".to_string(), "DOWNLOAD".to_string()])
        );
        assert_eq!(merged["U2"], BTreeSet::from(["UPDATE".to_string()]));
    }

    #[test]
    fn test_merge_deduplicates_repeated_access_types() {
        let merged = merge_grants(vec![
            AccessGrant::new("U1", &["READ", "READ"]),
            AccessGrant::new("U1", &["READ"]),
        ]);

        assert_eq!(merged["U1"], BTreeSet::from(["READ".to_string()]));
    }
}
