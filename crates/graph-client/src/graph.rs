use async_trait::async_trait;
use reqwest::Url;
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

use sensitivity_core::clients::IdentityClient;
use sensitivity_core::types::Visibility;
use sensitivity_core::ClientResult;

use crate::error::{check, GraphClientError, Result};
use crate::token::TokenProvider;

pub const GRAPH_SCOPE: &str = "https://graph.microsoft.com/.default";

/// [`IdentityClient`] backed by Microsoft Graph group endpoints.
pub struct GraphIdentityClient {
    http: reqwest::Client,
    base_url: String,
    tokens: Arc<dyn TokenProvider>,
}

impl GraphIdentityClient {
    pub fn new(http: reqwest::Client, base_url: &str, tokens: Arc<dyn TokenProvider>) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            tokens,
        }
    }

    /// `{base}/groups/{segments...}`, each segment percent-encoded so an id
    /// can never step outside its own resource.
    fn groups_url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.base_url).map_err(|e| {
            GraphClientError::InvalidUrl(format!("graph base url '{}': {e}", self.base_url))
        })?;
        url.path_segments_mut()
            .map_err(|_| {
                GraphClientError::InvalidUrl(format!("graph base url '{}' has no path", self.base_url))
            })?
            .pop_if_empty()
            .push("groups")
            .extend(segments);
        Ok(url)
    }

    async fn patch_group(&self, group_id: &str, body: serde_json::Value) -> Result<()> {
        let url = self.groups_url(&[group_id])?;
        debug!(%url, "PATCH group");
        let token = self.tokens.token(GRAPH_SCOPE).await?;
        let resp = self
            .http
            .patch(url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;
        check(resp).await?;
        Ok(())
    }

    async fn delete_owner(&self, group_id: &str, owner_id: &str) -> Result<()> {
        let url = self.groups_url(&[group_id, "owners", owner_id, "$ref"])?;
        debug!(%url, "DELETE group owner");
        let token = self.tokens.token(GRAPH_SCOPE).await?;
        let resp = self.http.delete(url).bearer_auth(token).send().await?;
        check(resp).await?;
        Ok(())
    }
}

#[async_trait]
impl IdentityClient for GraphIdentityClient {
    async fn assign_label(&self, group_id: &str, label_id: &str) -> ClientResult<()> {
        let body = json!({ "assignedLabels": [{ "labelId": label_id }] });
        Ok(self.patch_group(group_id, body).await?)
    }

    async fn set_visibility(&self, group_id: &str, visibility: Visibility) -> ClientResult<()> {
        let body = json!({ "visibility": visibility.as_str() });
        Ok(self.patch_group(group_id, body).await?)
    }

    async fn remove_owner(&self, group_id: &str, owner_id: &str) -> ClientResult<()> {
        Ok(self.delete_owner(group_id, owner_id).await?)
    }
}
