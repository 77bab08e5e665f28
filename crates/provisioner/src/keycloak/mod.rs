//! [`ProviderFacade`] over the Keycloak admin REST API.

use async_trait::async_trait;
use reqwest::{header::LOCATION, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};

pub mod auth;
pub mod dto;

pub use auth::{Credentials, TokenSource};

use crate::error::{ProvisionError, ProvisionResult};
use crate::facade::ProviderFacade;
use crate::model::{AccountRecord, IdentityReference, DEFAULT_PASSWORD};
use dto::UserRepresentation;

/// Page size used by `list_all`.
pub const LIST_ALL_PAGE_SIZE: usize = i32::MAX as usize;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub struct KeycloakFacade {
    base_url: String,
    http_client: reqwest::Client,
    tokens: TokenSource,
    default_password: String,
}

impl KeycloakFacade {
    pub fn builder() -> KeycloakFacadeBuilder {
        KeycloakFacadeBuilder::default()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn users_url(&self, realm: &str) -> String {
        format!("{}/admin/realms/{}/users", self.base_url, realm)
    }

    async fn authorized(&self, builder: RequestBuilder) -> ProvisionResult<RequestBuilder> {
        let token = self.tokens.access_token().await?;
        Ok(builder.bearer_auth(token))
    }

    /// Sends the request. A 401 drops the cached token so the next call
    /// authenticates again.
    async fn send(&self, builder: RequestBuilder) -> ProvisionResult<reqwest::Response> {
        let response = self.authorized(builder).await?.send().await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            self.tokens.invalidate().await;
            return Err(ProvisionError::BackendUnavailable(format!(
                "admin API rejected the access token for client {}",
                self.tokens.credentials().client_id()
            )));
        }
        Ok(response)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
    ) -> ProvisionResult<T> {
        let response = self.send(builder).await?;
        let status = response.status();

        if status.is_success() {
            response
                .json()
                .await
                .map_err(|e| ProvisionError::Protocol(e.to_string()))
        } else {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            Err(ProvisionError::Api {
                status: status.as_u16(),
                message,
            })
        }
    }

    /// `username` filters on the username only; Keycloak's `search`
    /// parameter would also match email and names.
    async fn search(
        &self,
        realm: &str,
        username: Option<&str>,
        offset: usize,
        limit: usize,
    ) -> ProvisionResult<Vec<AccountRecord>> {
        let mut query = vec![
            ("first", offset.to_string()),
            ("max", limit.to_string()),
        ];
        if let Some(term) = username {
            query.push(("username", term.to_string()));
        }

        let users: Vec<UserRepresentation> = self
            .get_json(self.http_client.get(self.users_url(realm)).query(&query))
            .await?;

        users.into_iter().map(AccountRecord::try_from).collect()
    }
}

#[async_trait]
impl ProviderFacade for KeycloakFacade {
    async fn count(&self, realm: &str) -> ProvisionResult<u64> {
        let url = format!("{}/count", self.users_url(realm));
        self.get_json(self.http_client.get(url)).await
    }

    async fn list_all(&self, realm: &str) -> ProvisionResult<Vec<AccountRecord>> {
        self.search(realm, None, 0, LIST_ALL_PAGE_SIZE).await
    }

    async fn search_page(
        &self,
        realm: &str,
        search: &str,
        offset: usize,
        limit: usize,
    ) -> ProvisionResult<Vec<AccountRecord>> {
        self.search(realm, Some(search), offset, limit).await
    }

    async fn create_account(
        &self,
        realm: &str,
        record: &AccountRecord,
    ) -> ProvisionResult<IdentityReference> {
        let body = UserRepresentation::for_creation(record, &self.default_password);
        let response = self
            .send(self.http_client.post(self.users_url(realm)).json(&body))
            .await?;

        let status = response.status();
        if status != StatusCode::CREATED {
            let rejection = ProvisionError::AccountCreationRejected {
                realm: realm.to_string(),
                status: status.as_u16(),
            };
            warn!("{} for user {}", rejection, record.username);
            return Ok(IdentityReference::Unknown);
        }

        let reference = response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .map(IdentityReference::from_location)
            .unwrap_or(IdentityReference::Unknown);

        if !reference.is_resolved() {
            warn!(
                "User {} created in realm {} without a usable Location header",
                record.username, realm
            );
        }
        Ok(reference)
    }

    async fn delete_account(
        &self,
        realm: &str,
        reference: &IdentityReference,
    ) -> ProvisionResult<()> {
        let id = reference
            .id()
            .ok_or_else(|| ProvisionError::UnresolvedReference {
                realm: realm.to_string(),
            })?;

        let url = format!("{}/{}", self.users_url(realm), id);
        let response = self.send(self.http_client.delete(url)).await?;

        match response.status() {
            StatusCode::NO_CONTENT => {
                debug!("Deleted user {} in realm {}", id, realm);
                Ok(())
            }
            status => Err(ProvisionError::AccountDeletionFailed {
                realm: realm.to_string(),
                id: id.to_string(),
                status: status.as_u16(),
            }),
        }
    }
}

/// Builds a [`KeycloakFacade`]. A username selects the password grant,
/// otherwise the client-credentials grant is used.
#[derive(Default)]
pub struct KeycloakFacadeBuilder {
    server_url: Option<String>,
    realm: Option<String>,
    client_id: Option<String>,
    client_secret: Option<String>,
    username: Option<String>,
    password: Option<String>,
    default_password: Option<String>,
    timeout: Option<Duration>,
    http_client: Option<reqwest::Client>,
}

impl KeycloakFacadeBuilder {
    pub fn server_url(mut self, server_url: impl Into<String>) -> Self {
        self.server_url = Some(server_url.into());
        self
    }

    /// Realm the admin credentials belong to (usually `master`).
    pub fn realm(mut self, realm: impl Into<String>) -> Self {
        self.realm = Some(realm.into());
        self
    }

    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    pub fn client_secret(mut self, client_secret: impl Into<String>) -> Self {
        self.client_secret = Some(client_secret.into());
        self
    }

    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Password given to created accounts that carry none.
    pub fn default_password(mut self, password: impl Into<String>) -> Self {
        self.default_password = Some(password.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Use a pre-built HTTP client; `timeout` is ignored in that case.
    pub fn http_client(mut self, http_client: reqwest::Client) -> Self {
        self.http_client = Some(http_client);
        self
    }

    pub fn build(self) -> ProvisionResult<KeycloakFacade> {
        let server_url = required(self.server_url, "server url")?;
        let server_url = server_url.trim_end_matches('/').to_string();
        let realm = required(self.realm, "authentication realm")?;
        let client_id = required(self.client_id, "client id")?;

        let credentials = match self.username.filter(|u| !u.is_empty()) {
            Some(username) => Credentials::Password {
                client_id,
                client_secret: self.client_secret,
                username,
                password: self.password.unwrap_or_default(),
            },
            None => Credentials::ClientCredentials {
                client_id,
                client_secret: required(self.client_secret, "client secret")?,
            },
        };

        let http_client = match self.http_client {
            Some(client) => client,
            None => reqwest::Client::builder()
                .timeout(self.timeout.unwrap_or(DEFAULT_TIMEOUT))
                .build()
                .map_err(|e| {
                    ProvisionError::InvalidConfiguration(format!(
                        "failed to build HTTP client: {e}"
                    ))
                })?,
        };

        let tokens = TokenSource::new(&server_url, &realm, credentials, http_client.clone());

        Ok(KeycloakFacade {
            base_url: server_url,
            http_client,
            tokens,
            default_password: self
                .default_password
                .unwrap_or_else(|| DEFAULT_PASSWORD.to_string()),
        })
    }
}

fn required(value: Option<String>, name: &str) -> ProvisionResult<String> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ProvisionError::ConfigurationMissing(name.to_string()))
}
