//! Admin token acquisition for the Keycloak adapter.

use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{ProvisionError, ProvisionResult};

/// Refresh this long before the server-side expiry.
const EXPIRY_MARGIN: Duration = Duration::from_secs(30);

/// Grant used against the token endpoint.
///
/// The [`Debug`] impl redacts secrets.
#[derive(Clone)]
pub enum Credentials {
    /// Resource-owner password grant (e.g. `admin-cli` with an admin user).
    Password {
        client_id: String,
        client_secret: Option<String>,
        username: String,
        password: String,
    },
    /// Service account with the `manage-users` role.
    ClientCredentials {
        client_id: String,
        client_secret: String,
    },
}

impl Credentials {
    pub fn client_id(&self) -> &str {
        match self {
            Credentials::Password { client_id, .. } => client_id,
            Credentials::ClientCredentials { client_id, .. } => client_id,
        }
    }

    fn form(&self) -> Vec<(&'static str, String)> {
        match self {
            Credentials::Password {
                client_id,
                client_secret,
                username,
                password,
            } => {
                let mut form = vec![
                    ("grant_type", "password".to_string()),
                    ("client_id", client_id.clone()),
                    ("username", username.clone()),
                    ("password", password.clone()),
                ];
                if let Some(secret) = client_secret.as_ref().filter(|s| !s.is_empty()) {
                    form.push(("client_secret", secret.clone()));
                }
                form
            }
            Credentials::ClientCredentials {
                client_id,
                client_secret,
            } => vec![
                ("grant_type", "client_credentials".to_string()),
                ("client_id", client_id.clone()),
                ("client_secret", client_secret.clone()),
            ],
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::Password {
                client_id,
                username,
                ..
            } => f
                .debug_struct("Password")
                .field("client_id", client_id)
                .field("client_secret", &"[REDACTED]")
                .field("username", username)
                .field("password", &"[REDACTED]")
                .finish(),
            Credentials::ClientCredentials { client_id, .. } => f
                .debug_struct("ClientCredentials")
                .field("client_id", client_id)
                .field("client_secret", &"[REDACTED]")
                .finish(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: Option<Instant>,
}

impl CachedToken {
    fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(exp) => Instant::now() >= exp,
            None => false,
        }
    }
}

/// Fetches and caches access tokens. Clones share the cache.
#[derive(Debug, Clone)]
pub struct TokenSource {
    token_endpoint: String,
    credentials: Credentials,
    cached_token: Arc<RwLock<Option<CachedToken>>>,
    http_client: reqwest::Client,
}

impl TokenSource {
    pub fn new(
        server_url: &str,
        auth_realm: &str,
        credentials: Credentials,
        http_client: reqwest::Client,
    ) -> Self {
        Self {
            token_endpoint: format!(
                "{}/realms/{}/protocol/openid-connect/token",
                server_url, auth_realm
            ),
            credentials,
            cached_token: Arc::new(RwLock::new(None)),
            http_client,
        }
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Returns a valid access token, fetching a new one when the cached
    /// token is missing or about to expire. Concurrent callers that miss the
    /// cache wait on the write lock, so only one of them hits the endpoint.
    pub async fn access_token(&self) -> ProvisionResult<String> {
        {
            let cache = self.cached_token.read().await;
            if let Some(cached) = cache.as_ref().filter(|c| !c.is_expired()) {
                return Ok(cached.access_token.clone());
            }
        }

        let mut cache = self.cached_token.write().await;
        if let Some(cached) = cache.as_ref().filter(|c| !c.is_expired()) {
            return Ok(cached.access_token.clone());
        }

        let token = self.fetch().await?;
        let access_token = token.access_token.clone();
        *cache = Some(token);
        Ok(access_token)
    }

    async fn fetch(&self) -> ProvisionResult<CachedToken> {
        debug!("Fetching access token from {}", self.token_endpoint);
        let response = self
            .http_client
            .post(&self.token_endpoint)
            .form(&self.credentials.form())
            .send()
            .await
            .map_err(|e| ProvisionError::BackendUnavailable(format!("Token request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<no body>".to_string());
            return Err(ProvisionError::BackendUnavailable(format!(
                "Token endpoint returned {status}: {body}"
            )));
        }

        let token: TokenResponse = response.json().await.map_err(|e| {
            ProvisionError::BackendUnavailable(format!("Failed to parse token response: {e}"))
        })?;

        let expires_at = token
            .expires_in
            .map(|secs| Instant::now() + Duration::from_secs(secs).saturating_sub(EXPIRY_MARGIN));

        Ok(CachedToken {
            access_token: token.access_token,
            expires_at,
        })
    }

    /// Drops the cached token, e.g. after the admin API answered 401.
    pub async fn invalidate(&self) {
        let mut cache = self.cached_token.write().await;
        *cache = None;
    }
}
