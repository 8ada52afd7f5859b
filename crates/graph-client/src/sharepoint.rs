//! [`SiteClient`] over the SharePoint REST API.
//!
//! Every call takes the absolute site URL; the token scope is per tenant.
//! Principals are resolved with `ensureuser` before any permission change.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Method, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

use sensitivity_core::clients::SiteClient;
use sensitivity_core::ClientResult;

use crate::error::{check, GraphClientError, Result};
use crate::token::TokenProvider;

const ODATA_JSON: &str = "application/json;odata=nometadata";

pub fn sharepoint_scope(tenant_name: &str) -> String {
    format!("https://{tenant_name}.sharepoint.com/.default")
}

#[derive(Debug, Deserialize)]
struct IdOnly {
    #[serde(rename = "Id")]
    id: i64,
}

pub struct SharePointSiteClient {
    http: reqwest::Client,
    scope: String,
    tokens: Arc<dyn TokenProvider>,
}

impl SharePointSiteClient {
    pub fn new(
        http: reqwest::Client,
        scope: impl Into<String>,
        tokens: Arc<dyn TokenProvider>,
    ) -> Self {
        Self {
            http,
            scope: scope.into(),
            tokens,
        }
    }

    /// `{site_url}/_api/{path}`, with an optional `@v` OData parameter alias
    /// holding a quoted string literal.
    ///
    /// `site_url` must be a plain address: dot segments, queries and
    /// fragments would make the request land on some other site.
    fn api_url(site_url: &str, path: &str, alias: Option<&str>) -> Result<Url> {
        let site = site_url.trim_end_matches('/');
        let dotted = site.split('/').any(|seg| {
            let seg = seg.to_ascii_lowercase().replace("%2e", ".");
            seg == "." || seg == ".."
        });
        if dotted || site.contains(['?', '#']) {
            return Err(GraphClientError::InvalidUrl(format!(
                "site url '{site}' is not a plain site address"
            )));
        }

        let mut url = Url::parse(site)
            .map_err(|e| GraphClientError::InvalidUrl(format!("site url '{site}': {e}")))?;
        url.path_segments_mut()
            .map_err(|_| GraphClientError::InvalidUrl(format!("site url '{site}' has no path")))?
            .pop_if_empty()
            .push("_api")
            .extend(path.split('/'));
        if let Some(value) = alias {
            let literal = format!("'{}'", value.replace('\'', "''"));
            url.query_pairs_mut().append_pair("@v", &literal);
        }
        Ok(url)
    }

    async fn send(
        &self,
        method: Method,
        url: Url,
        body: Option<Value>,
        merge: bool,
    ) -> Result<reqwest::Response> {
        debug!(%method, %url, merge, "sharepoint request");
        let empty_post = body.is_none() && method == Method::POST;
        let token = self.tokens.token(&self.scope).await?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ODATA_JSON));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(ODATA_JSON));
        if merge {
            headers.insert("X-HTTP-Method", HeaderValue::from_static("MERGE"));
            headers.insert("IF-MATCH", HeaderValue::from_static("*"));
        }

        let mut req = self
            .http
            .request(method, url)
            .bearer_auth(token)
            .headers(headers);
        if let Some(body) = body {
            req = req.json(&body);
        } else if empty_post {
            // SharePoint answers 411 to a bodiless POST without a length.
            req = req.header(reqwest::header::CONTENT_LENGTH, 0);
        }
        check(req.send().await?).await
    }

    async fn ensure_user(&self, site_url: &str, login_name: &str) -> Result<i64> {
        let url = Self::api_url(site_url, "web/ensureuser", None)?;
        let resp = self
            .send(Method::POST, url, Some(json!({ "logonName": login_name })), false)
            .await?;
        Ok(resp.json::<IdOnly>().await?.id)
    }

    async fn set_site_admin(&self, site_url: &str, login_name: &str, is_admin: bool) -> Result<()> {
        let user_id = self.ensure_user(site_url, login_name).await?;
        let url = Self::api_url(site_url, &format!("web/GetUserById({user_id})"), None)?;
        self.send(Method::POST, url, Some(json!({ "IsSiteAdmin": is_admin })), true)
            .await?;
        Ok(())
    }

    async fn role_definition_id(&self, site_url: &str, role_name: &str) -> Result<i64> {
        let url = Self::api_url(
            site_url,
            "web/roledefinitions/getbyname(@v)",
            Some(role_name),
        )?;
        let resp = self.send(Method::GET, url, None, false).await?;
        Ok(resp.json::<IdOnly>().await?.id)
    }
}

#[async_trait]
impl SiteClient for SharePointSiteClient {
    async fn add_site_administrator(&self, site_url: &str, login_name: &str) -> ClientResult<()> {
        Ok(self.set_site_admin(site_url, login_name, true).await?)
    }

    async fn remove_site_administrator(&self, site_url: &str, login_name: &str) -> ClientResult<()> {
        Ok(self.set_site_admin(site_url, login_name, false).await?)
    }

    async fn remove_owner_group_member(&self, site_url: &str, login_name: &str) -> ClientResult<()> {
        let url = Self::api_url(
            site_url,
            "web/AssociatedOwnerGroup/users/removeByLoginName(@v)",
            Some(login_name),
        )?;
        self.send(Method::POST, url, None, false).await?;
        Ok(())
    }

    async fn grant_role(&self, site_url: &str, principal: &str, role_name: &str) -> ClientResult<()> {
        let principal_id = self.ensure_user(site_url, principal).await?;
        let role_id = self.role_definition_id(site_url, role_name).await?;
        let url = Self::api_url(
            site_url,
            &format!("web/roleassignments/addroleassignment(principalid={principal_id},roledefid={role_id})"),
            None,
        )?;
        self.send(Method::POST, url, None, false).await?;
        Ok(())
    }

    async fn break_permission_inheritance(&self, site_url: &str) -> ClientResult<()> {
        let url = Self::api_url(
            site_url,
            "web/DefaultDocumentLibrary/breakroleinheritance(copyRoleAssignments=true,clearSubscopes=true)",
            None,
        )?;
        self.send(Method::POST, url, None, false).await?;
        Ok(())
    }

    async fn disable_hub_permission_sync(&self, site_url: &str) -> ClientResult<()> {
        let url = Self::api_url(site_url, "site", None)?;
        self.send(
            Method::POST,
            url,
            Some(json!({ "CanSyncHubSitePermissions": false })),
            true,
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::StaticTokenProvider;
    use mockito::Matcher;
    use sensitivity_core::ClientError;

    fn client() -> SharePointSiteClient {
        SharePointSiteClient::new(
            reqwest::Client::new(),
            sharepoint_scope("contoso"),
            Arc::new(StaticTokenProvider("sp-tok".into())),
        )
    }

    fn site(server: &mockito::Server) -> String {
        format!("{}/teams/R1", server.url())
    }

    #[test]
    fn scope_is_per_tenant() {
        assert_eq!(
            sharepoint_scope("contoso"),
            "https://contoso.sharepoint.com/.default"
        );
    }

    #[test]
    fn alias_literal_escapes_quotes() {
        let url = SharePointSiteClient::api_url(
            "https://contoso.sharepoint.com/teams/R1/",
            "web/roledefinitions/getbyname(@v)",
            Some("O'Brien"),
        )
        .unwrap();
        assert_eq!(url.path(), "/teams/R1/_api/web/roledefinitions/getbyname(@v)");
        let (key, value) = url.query_pairs().next().unwrap();
        assert_eq!(key, "@v");
        assert_eq!(value, "'O''Brien'");
    }

    #[test]
    fn dot_segments_in_site_url_are_rejected() {
        for site in [
            "https://contoso.sharepoint.com/teams/1/../../../sites/hr",
            "https://contoso.sharepoint.com/teams/%2E%2E/sites/hr",
            "https://contoso.sharepoint.com/teams/R1?x=1",
            "https://contoso.sharepoint.com/teams/R1#frag",
        ] {
            let err = SharePointSiteClient::api_url(site, "site", None).unwrap_err();
            assert!(matches!(err, GraphClientError::InvalidUrl(_)), "{site}");
        }
    }

    #[tokio::test]
    async fn hostile_site_url_makes_no_request() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let site = format!("{}/teams/1/../../sites/hr", server.url());
        let err = client()
            .break_permission_inheritance(&site)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Other(_)));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn add_site_administrator_ensures_then_merges() {
        let mut server = mockito::Server::new_async().await;
        let ensure = server
            .mock("POST", "/teams/R1/_api/web/ensureuser")
            .match_header("authorization", "Bearer sp-tok")
            .match_body(Matcher::Json(json!({"logonName": "sca"})))
            .with_status(200)
            .with_body(r#"{"Id": 7, "LoginName": "sca"}"#)
            .create_async()
            .await;
        let merge = server
            .mock("POST", "/teams/R1/_api/web/GetUserById(7)")
            .match_header("x-http-method", "MERGE")
            .match_body(Matcher::Json(json!({"IsSiteAdmin": true})))
            .with_status(204)
            .create_async()
            .await;

        client()
            .add_site_administrator(&site(&server), "sca")
            .await
            .unwrap();
        ensure.assert_async().await;
        merge.assert_async().await;
    }

    #[tokio::test]
    async fn grant_role_resolves_principal_and_role() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/teams/R1/_api/web/ensureuser")
            .with_status(200)
            .with_body(r#"{"Id": 12}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/teams/R1/_api/web/roledefinitions/getbyname(@v)")
            .match_query(Matcher::UrlEncoded("@v".into(), "'Read'".into()))
            .with_status(200)
            .with_body(r#"{"Id": 1073741826, "Name": "Read"}"#)
            .create_async()
            .await;
        let assign = server
            .mock(
                "POST",
                "/teams/R1/_api/web/roleassignments/addroleassignment(principalid=12,roledefid=1073741826)",
            )
            .with_status(200)
            .create_async()
            .await;

        client()
            .grant_role(&site(&server), "all-users", "Read")
            .await
            .unwrap();
        assign.assert_async().await;
    }

    #[tokio::test]
    async fn sharepoint_error_is_reported() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/teams/R1/_api/web/DefaultDocumentLibrary/breakroleinheritance(copyRoleAssignments=true,clearSubscopes=true)")
            .with_status(403)
            .with_body(r#"{"odata.error":{"code":"-2147024891","message":{"lang":"en-US","value":"Access denied."}}}"#)
            .create_async()
            .await;

        let err = client()
            .break_permission_inheritance(&site(&server))
            .await
            .unwrap_err();
        match err {
            ClientError::Api { status, message } => {
                assert_eq!(status, 403);
                assert_eq!(message, "Access denied.");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn disable_hub_sync_merges_site() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/teams/R1/_api/site")
            .match_header("x-http-method", "MERGE")
            .match_body(Matcher::Json(json!({"CanSyncHubSitePermissions": false})))
            .with_status(204)
            .create_async()
            .await;

        client()
            .disable_hub_permission_sync(&site(&server))
            .await
            .unwrap();
        mock.assert_async().await;
    }
}
