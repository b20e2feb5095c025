//! Production client that talks to the directory service's REST API.

use async_trait::async_trait;
use reqwest::{Client as ReqwestClient, StatusCode};
use serde::de::DeserializeOwned;

use crate::types::{PrincipalHeaderPage, TeamMemberPage};
use crate::{
    AccessControlList, ActivityRecord, DirectoryClient, DirectoryError, Entity, PrincipalHeader,
    Result, TeamMember, UserProfile,
};

/// REST client for the directory service.
///
/// Thin by design: no retry or backoff, no session management beyond an
/// optional bearer token. Timeouts belong to the underlying `reqwest`
/// client configuration.
///
/// # Example
///
/// ```ignore
/// use directory::{DirectoryClient, HttpDirectoryClient};
///
/// let client = HttpDirectoryClient::new("https://repo.example.org/v1");
/// let entity = client.get_entity("syn123", None).await?;
/// ```
pub struct HttpDirectoryClient {
    base_url: String,
    auth_token: Option<String>,
    client: ReqwestClient,
}

impl HttpDirectoryClient {
    pub fn new(base_url: &str) -> Self {
        Self::with_auth(base_url, None)
    }

    pub fn with_auth(base_url: &str, auth_token: Option<String>) -> Self {
        HttpDirectoryClient {
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_token,
            client: ReqwestClient::new(),
        }
    }

    fn build_get(&self, path: &str, query: &[(&str, &str)]) -> reqwest::RequestBuilder {
        let mut request = self.client.get(format!("{}{}", self.base_url, path));
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }
        if !query.is_empty() {
            request = request.query(query);
        }
        request
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.get_json_with_query(path, &[]).await
    }

    async fn get_json_with_query<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        let response = self.build_get(path, query).send().await?;
        let url = response.url().clone();
        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(DirectoryError::PermissionDenied(url.to_string()))
            }
            StatusCode::NOT_FOUND => Err(DirectoryError::NotFound(url.to_string())),
            status if status.is_server_error() => Err(DirectoryError::Upstream(format!(
                "{} returned {}",
                url, status
            ))),
            _ => Ok(response.error_for_status()?.json::<T>().await?),
        }
    }
}

#[async_trait]
impl DirectoryClient for HttpDirectoryClient {
    async fn get_entity(&self, id: &str, version: Option<u64>) -> Result<Entity> {
        let path = match version {
            Some(version) => format!("/entity/{}/version/{}", id, version),
            None => format!("/entity/{}", id),
        };
        self.get_json(&path).await
    }

    async fn get_provenance_activity(&self, entity: &Entity) -> Result<Option<ActivityRecord>> {
        // The service answers 404 when no activity was recorded.
        match self
            .get_json(&format!("/entity/{}/generatedBy", entity.id))
            .await
        {
            Ok(activity) => Ok(Some(activity)),
            Err(DirectoryError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn get_user_profile(&self, user_id: &str) -> Result<UserProfile> {
        self.get_json(&format!("/userProfile/{}", user_id)).await
    }

    async fn get_access_control_list(&self, entity_id: &str) -> Result<AccessControlList> {
        self.get_json(&format!("/entity/{}/acl", entity_id)).await
    }

    async fn resolve_principal_headers(&self, ids: &[String]) -> Result<Vec<PrincipalHeader>> {
        // One round trip for the whole batch.
        let joined = ids.join(",");
        let page: PrincipalHeaderPage = self
            .get_json_with_query("/userGroupHeaders/batch", &[("ids", joined.as_str())])
            .await?;
        Ok(page.children)
    }

    async fn get_team_members(&self, team_id: &str) -> Result<Vec<TeamMember>> {
        let page: TeamMemberPage = self
            .get_json(&format!("/teamMembers/{}", team_id))
            .await?;
        Ok(page.results)
    }
}
