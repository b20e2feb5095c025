//! Integration tests for ACL permission resolution.
//!
//! These tests run the real resolver against a `MockDirectoryClient`
//! pre-registered with ACLs, principal headers and team rosters.

use std::collections::BTreeSet;

use async_trait::async_trait;
use directory::{
    AccessControlList, AccessGrant, ActivityRecord, DirectoryClient, DirectoryError, Entity,
    MockDirectoryClient, PrincipalHeader, Result, TeamMember, UserProfile, PUBLIC_PRINCIPAL_ID,
};
use permissions::{resolve_effective_permissions, PermissionsError};

fn individual(user_id: &str) -> PrincipalHeader {
    PrincipalHeader {
        owner_id: user_id.to_string(),
        is_individual: true,
        user_name: None,
    }
}

fn acl(entity_id: &str, grants: Vec<AccessGrant>) -> AccessControlList {
    AccessControlList {
        id: entity_id.to_string(),
        resource_access: grants,
    }
}

fn access(types: &[&str]) -> BTreeSet<String> {
    types.iter().map(|s| s.to_string()).collect()
}

/// ACL grants `{P_team: {READ}}`; the team has members U1 and U2.
/// Resolved result is `{U1: {READ}, U2: {READ}}`.
#[tokio::test]
async fn test_team_grant_expands_to_members() {
    let client = MockDirectoryClient::new();
    client.register_acl(acl("E123", vec![AccessGrant::new("T9", &["READ"])]));
    client.register_team("T9", &["U1", "U2"]);

    let effective = resolve_effective_permissions(&client, "E123").await.unwrap();

    assert_eq!(effective.len(), 2);
    assert_eq!(effective["U1"], access(&["READ"]));
    assert_eq!(effective["U2"], access(&["READ"]));
    assert!(!effective.contains_key("T9"));
}

/// U1 holds `{READ}` directly and `{READ, UPDATE}` through a team; the
/// resolved grant is the union `{READ, UPDATE}`.
#[tokio::test]
async fn test_direct_and_team_grants_union() {
    let client = MockDirectoryClient::new();
    client.register_acl(acl(
        "E123",
        vec![
            AccessGrant::new("U1", &["READ"]),
            AccessGrant::new("T9", &["READ", "UPDATE"]),
        ],
    ));
    client.register_header(individual("U1"));
    client.register_team("T9", &["U1", "U2"]);

    let effective = resolve_effective_permissions(&client, "E123").await.unwrap();

    assert_eq!(effective["U1"], access(&["READ", "UPDATE"]));
    assert_eq!(effective["U2"], access(&["READ", "UPDATE"]));
}

#[tokio::test]
async fn test_individual_grant_passes_through_unchanged() {
    let client = MockDirectoryClient::new();
    client.register_acl(acl(
        "E123",
        vec![AccessGrant::new("U1", &["READ", "DOWNLOAD"])],
    ));
    client.register_header(individual("U1"));

    let effective = resolve_effective_permissions(&client, "E123").await.unwrap();

    assert_eq!(effective.len(), 1);
    assert_eq!(effective["U1"], access(&["READ", "DOWNLOAD"]));
}

#[tokio::test]
async fn test_member_of_two_teams_gets_union() {
    let client = MockDirectoryClient::new();
    client.register_acl(acl(
        "E123",
        vec![
            AccessGrant::new("T1", &["READ"]),
            AccessGrant::new("T2", &["DOWNLOAD"]),
        ],
    ));
    client.register_team("T1", &["U1", "U2"]);
    client.register_team("T2", &["U1"]);

    let effective = resolve_effective_permissions(&client, "E123").await.unwrap();

    assert_eq!(effective["U1"], access(&["READ", "DOWNLOAD"]));
    assert_eq!(effective["U2"], access(&["READ"]));
}

#[tokio::test]
async fn test_reserved_public_principal_passes_through() {
    let client = MockDirectoryClient::new();
    client.register_acl(acl(
        "E123",
        vec![AccessGrant::new(PUBLIC_PRINCIPAL_ID, &["READ"])],
    ));
    client.register_header(individual(PUBLIC_PRINCIPAL_ID));

    let effective = resolve_effective_permissions(&client, "E123").await.unwrap();

    assert_eq!(effective[PUBLIC_PRINCIPAL_ID], access(&["READ"]));
}

#[tokio::test]
async fn test_empty_acl_resolves_to_no_grants() {
    let client = MockDirectoryClient::new();
    client.register_acl(acl("E123", vec![]));

    let effective = resolve_effective_permissions(&client, "E123").await.unwrap();
    assert!(effective.is_empty());
}

#[tokio::test]
async fn test_missing_acl_is_fatal() {
    let client = MockDirectoryClient::new();

    let result = resolve_effective_permissions(&client, "E404").await;

    match result {
        Err(PermissionsError::Acl { entity_id, .. }) => assert_eq!(entity_id, "E404"),
        other => panic!("expected Acl error, got {:?}", other),
    }
}

/// Stub directory whose batch endpoint answers with a canonicalized id the
/// ACL does not carry.
struct AliasingDirectory;

#[async_trait]
impl DirectoryClient for AliasingDirectory {
    async fn get_entity(&self, id: &str, _version: Option<u64>) -> Result<Entity> {
        Err(DirectoryError::NotFound(id.to_string()))
    }

    async fn get_provenance_activity(&self, _entity: &Entity) -> Result<Option<ActivityRecord>> {
        Ok(None)
    }

    async fn get_user_profile(&self, user_id: &str) -> Result<UserProfile> {
        Err(DirectoryError::NotFound(user_id.to_string()))
    }

    async fn get_access_control_list(&self, entity_id: &str) -> Result<AccessControlList> {
        Ok(acl(entity_id, vec![AccessGrant::new("U1", &["READ"])]))
    }

    async fn resolve_principal_headers(&self, _ids: &[String]) -> Result<Vec<PrincipalHeader>> {
        Ok(vec![individual("U999")])
    }

    async fn get_team_members(&self, team_id: &str) -> Result<Vec<TeamMember>> {
        Err(DirectoryError::NotFound(team_id.to_string()))
    }
}

/// A header that maps to no grant on the ACL must fail the whole
/// resolution rather than silently drop or invent a grant.
#[tokio::test]
async fn test_header_for_unknown_principal_is_fatal() {
    let result = resolve_effective_permissions(&AliasingDirectory, "E123").await;

    match result {
        Err(PermissionsError::UnknownPrincipal {
            entity_id,
            principal_id,
        }) => {
            assert_eq!(entity_id, "E123");
            assert_eq!(principal_id, "U999");
        }
        other => panic!("expected UnknownPrincipal error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_unresolvable_team_is_fatal() {
    // Header says T9 is a team, but the roster fetch fails. No partial
    // result may be returned.
    let client = MockDirectoryClient::new();
    client.register_acl(acl("E123", vec![AccessGrant::new("T9", &["READ"])]));
    client.register_header(PrincipalHeader {
        owner_id: "T9".to_string(),
        is_individual: false,
        user_name: None,
    });

    let result = resolve_effective_permissions(&client, "E123").await;

    match result {
        Err(PermissionsError::TeamMembers { team_id, .. }) => assert_eq!(team_id, "T9"),
        other => panic!("expected TeamMembers error, got {:?}", other),
    }
}
