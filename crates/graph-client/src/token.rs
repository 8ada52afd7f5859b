//! Access tokens for Graph and SharePoint.
//!
//! The service account signs in with the resource-owner password grant. One
//! token is cached per scope and refreshed shortly before it expires.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::{check, GraphClientError, Result};

pub const ENV_CLIENT_SECRET: &str = "SENSITIVITY_CLIENT_SECRET";
pub const ENV_PASSWORD: &str = "SENSITIVITY_PASSWORD";
pub const ENV_STORAGE_CONNECTION_STRING: &str = "SENSITIVITY_STORAGE_CONNECTION_STRING";

/// Tokens are refreshed this long before they expire.
const REFRESH_MARGIN_SECS: i64 = 60;

// ---------------------------------------------------------------------------
// Secrets
// ---------------------------------------------------------------------------

/// Credentials that never appear in the config file.
#[derive(Clone)]
pub struct Secrets {
    pub client_secret: String,
    pub password: String,
    pub storage_connection_string: String,
}

impl Secrets {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            client_secret: require_env(ENV_CLIENT_SECRET)?,
            password: require_env(ENV_PASSWORD)?,
            storage_connection_string: require_env(ENV_STORAGE_CONNECTION_STRING)?,
        })
    }
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secrets").finish_non_exhaustive()
    }
}

fn require_env(name: &'static str) -> Result<String> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(GraphClientError::MissingSecret(name)),
    }
}

// ---------------------------------------------------------------------------
// TokenProvider
// ---------------------------------------------------------------------------

#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Bearer token valid for `scope`.
    async fn token(&self, scope: &str) -> Result<String>;
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    refresh_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

pub struct RopcTokenProvider {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    user_name: String,
    password: String,
    cache: RwLock<HashMap<String, CachedToken>>,
}

impl RopcTokenProvider {
    pub fn new(
        http: reqwest::Client,
        login_base_url: &str,
        tenant_id: &str,
        client_id: impl Into<String>,
        user_name: impl Into<String>,
        secrets: &Secrets,
    ) -> Self {
        Self {
            http,
            token_url: format!(
                "{}/{}/oauth2/v2.0/token",
                login_base_url.trim_end_matches('/'),
                tenant_id
            ),
            client_id: client_id.into(),
            client_secret: secrets.client_secret.clone(),
            user_name: user_name.into(),
            password: secrets.password.clone(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    async fn fetch(&self, scope: &str) -> Result<CachedToken> {
        let form = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("scope", scope),
            ("username", self.user_name.as_str()),
            ("password", self.password.as_str()),
            ("grant_type", "password"),
        ];
        let resp = self.http.post(&self.token_url).form(&form).send().await?;
        let resp = check(resp).await.map_err(|e| match e {
            GraphClientError::Api { status, message } => {
                GraphClientError::Token(format!("{status} {message}"))
            }
            other => other,
        })?;
        let body: TokenResponse = resp.json().await?;
        let lifetime = (body.expires_in - REFRESH_MARGIN_SECS).max(0);
        info!(scope, expires_in = body.expires_in, "access token acquired");
        Ok(CachedToken {
            access_token: body.access_token,
            refresh_at: Utc::now() + Duration::seconds(lifetime),
        })
    }
}

#[async_trait]
impl TokenProvider for RopcTokenProvider {
    async fn token(&self, scope: &str) -> Result<String> {
        if let Some(cached) = self.cache.read().await.get(scope) {
            if Utc::now() < cached.refresh_at {
                debug!(scope, "using cached access token");
                return Ok(cached.access_token.clone());
            }
        }

        let fresh = self.fetch(scope).await?;
        let token = fresh.access_token.clone();
        self.cache.write().await.insert(scope.to_string(), fresh);
        Ok(token)
    }
}

/// Token provider returning a fixed value; for tests and local stubs.
#[derive(Debug, Clone)]
pub struct StaticTokenProvider(pub String);

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn token(&self, _scope: &str) -> Result<String> {
        Ok(self.0.clone())
    }
}
