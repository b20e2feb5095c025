//! Mock directory client for testing and local development.
//!
//! The `MockDirectoryClient` can be pre-registered with entities, activity
//! records, profiles, ACLs, principal headers and team rosters, allowing
//! tests to run without network access. Fetches of unregistered records
//! answer `NotFound`, and [`MockDirectoryClient::deny_entity`] /
//! [`MockDirectoryClient::deny_activity`] inject `PermissionDenied` for a
//! specific entity's metadata or activity fetch.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use async_trait::async_trait;

use crate::{
    AccessControlList, ActivityRecord, DirectoryClient, DirectoryError, Entity, PrincipalHeader,
    Result, TeamMember, UserProfile,
};

/// Mock directory client that returns pre-registered fixtures.
#[derive(Default)]
pub struct MockDirectoryClient {
    /// Entity id -> all registered versions of that entity.
    entities: RwLock<HashMap<String, Vec<Entity>>>,
    /// Entity ids whose fetches answer `PermissionDenied`.
    denied: RwLock<HashSet<String>>,
    /// Entity id -> activity that generated it.
    activities: RwLock<HashMap<String, ActivityRecord>>,
    /// Entity ids whose activity fetches answer `PermissionDenied`.
    denied_activities: RwLock<HashSet<String>>,
    profiles: RwLock<HashMap<String, UserProfile>>,
    acls: RwLock<HashMap<String, AccessControlList>>,
    headers: RwLock<HashMap<String, PrincipalHeader>>,
    teams: RwLock<HashMap<String, Vec<TeamMember>>>,
    /// User id -> number of profile fetches served, for asserting memoization.
    profile_fetches: RwLock<HashMap<String, usize>>,
}

impl MockDirectoryClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one version of an entity.
    pub fn register_entity(&self, entity: Entity) {
        self.entities
            .write()
            .unwrap()
            .entry(entity.id.clone())
            .or_default()
            .push(entity);
    }

    /// Make every fetch of the given entity id answer `PermissionDenied`.
    pub fn deny_entity(&self, id: &str) {
        self.denied.write().unwrap().insert(id.to_string());
    }

    /// Make the activity fetch for the given entity id answer
    /// `PermissionDenied`.
    pub fn deny_activity(&self, entity_id: &str) {
        self.denied_activities
            .write()
            .unwrap()
            .insert(entity_id.to_string());
    }

    /// Register the activity record that generated an entity.
    pub fn register_activity(&self, entity_id: &str, activity: ActivityRecord) {
        self.activities
            .write()
            .unwrap()
            .insert(entity_id.to_string(), activity);
    }

    pub fn register_profile(&self, profile: UserProfile) {
        self.profiles
            .write()
            .unwrap()
            .insert(profile.owner_id.clone(), profile);
    }

    pub fn register_acl(&self, acl: AccessControlList) {
        self.acls.write().unwrap().insert(acl.id.clone(), acl);
    }

    pub fn register_header(&self, header: PrincipalHeader) {
        self.headers
            .write()
            .unwrap()
            .insert(header.owner_id.clone(), header);
    }

    /// Register a team roster, also registering the team's header.
    pub fn register_team(&self, team_id: &str, member_ids: &[&str]) {
        self.register_header(PrincipalHeader {
            owner_id: team_id.to_string(),
            is_individual: false,
            user_name: None,
        });
        let members = member_ids
            .iter()
            .map(|id| TeamMember {
                member: crate::PrincipalRef {
                    owner_id: id.to_string(),
                },
            })
            .collect();
        self.teams.write().unwrap().insert(team_id.to_string(), members);
    }

    /// Number of profile fetches served for a user.
    pub fn profile_fetch_count(&self, user_id: &str) -> usize {
        self.profile_fetches
            .read()
            .unwrap()
            .get(user_id)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl DirectoryClient for MockDirectoryClient {
    async fn get_entity(&self, id: &str, version: Option<u64>) -> Result<Entity> {
        if self.denied.read().unwrap().contains(id) {
            return Err(DirectoryError::PermissionDenied(format!(
                "entity denied in mock: {}",
                id
            )));
        }
        let entities = self.entities.read().unwrap();
        let versions = entities
            .get(id)
            .ok_or_else(|| DirectoryError::NotFound(format!("entity not in mock: {}", id)))?;
        let found = match version {
            Some(version) => versions.iter().find(|e| e.version_number == version),
            None => versions.iter().max_by_key(|e| e.version_number),
        };
        found.cloned().ok_or_else(|| {
            DirectoryError::NotFound(format!("entity version not in mock: {}.{:?}", id, version))
        })
    }

    async fn get_provenance_activity(&self, entity: &Entity) -> Result<Option<ActivityRecord>> {
        if self.denied_activities.read().unwrap().contains(&entity.id) {
            return Err(DirectoryError::PermissionDenied(format!(
                "activity denied in mock: {}",
                entity.id
            )));
        }
        Ok(self.activities.read().unwrap().get(&entity.id).cloned())
    }

    async fn get_user_profile(&self, user_id: &str) -> Result<UserProfile> {
        *self
            .profile_fetches
            .write()
            .unwrap()
            .entry(user_id.to_string())
            .or_insert(0) += 1;
        self.profiles
            .read()
            .unwrap()
            .get(user_id)
            .cloned()
            .ok_or_else(|| DirectoryError::NotFound(format!("profile not in mock: {}", user_id)))
    }

    async fn get_access_control_list(&self, entity_id: &str) -> Result<AccessControlList> {
        self.acls
            .read()
            .unwrap()
            .get(entity_id)
            .cloned()
            .ok_or_else(|| DirectoryError::NotFound(format!("acl not in mock: {}", entity_id)))
    }

    async fn resolve_principal_headers(&self, ids: &[String]) -> Result<Vec<PrincipalHeader>> {
        // Like the real batch endpoint, unknown ids are omitted rather than
        // reported as errors.
        let headers = self.headers.read().unwrap();
        Ok(ids.iter().filter_map(|id| headers.get(id).cloned()).collect())
    }

    async fn get_team_members(&self, team_id: &str) -> Result<Vec<TeamMember>> {
        self.teams
            .read()
            .unwrap()
            .get(team_id)
            .cloned()
            .ok_or_else(|| DirectoryError::NotFound(format!("team not in mock: {}", team_id)))
    }
}
