use provisioner::bulk::ProvisionPlan;
use provisioner::orchestrator::{RunOptions, UnresolvedPolicy};
use provisioner::{KeycloakFacade, ProvisionError, ProvisionResult};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;

/// OAuth grant used to obtain the admin token.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
    #[default]
    Password,
    ClientCredentials,
}

/// Run configuration loaded from `KC_*` environment variables.
#[derive(Deserialize, Clone)]
pub struct Config {
    /// Server base URL (e.g., "http://localhost:8080")
    #[serde(default)]
    pub url: Option<String>,

    /// Realm the admin credentials belong to.
    #[serde(default = "default_realm")]
    pub realm: String,

    #[serde(default = "default_client_id")]
    pub client_id: String,

    #[serde(default)]
    pub client_secret: String,

    #[serde(default)]
    pub grant_type: GrantType,

    #[serde(default = "default_username")]
    pub username: String,

    #[serde(default = "default_password")]
    pub password: String,

    /// Realm the accounts are created in and deleted from.
    #[serde(default)]
    pub target_realm: Option<String>,

    /// Total number of accounts to create.
    #[serde(default = "default_user_count")]
    pub user_count: usize,

    /// Number of concurrent creation workers.
    #[serde(default = "default_client_threads")]
    pub client_threads: usize,

    /// Synthetic attributes per account.
    #[serde(default)]
    pub user_attributes: usize,

    /// Username prefix, also used as the sweep search term.
    #[serde(default = "default_user_prefix")]
    pub user_prefix: String,

    /// Password given to every created account.
    #[serde(default = "default_user_password")]
    pub user_password: String,

    #[serde(default = "default_sweep_batch_size")]
    pub sweep_batch_size: usize,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default)]
    pub unresolved_policy: UnresolvedPolicy,
}

fn default_realm() -> String { "master".to_string() }
fn default_client_id() -> String { "admin-cli".to_string() }
fn default_username() -> String { "keycloak".to_string() }
fn default_password() -> String { "keycloak".to_string() }
fn default_user_count() -> usize { 10 }
fn default_client_threads() -> usize { 4 }
fn default_user_prefix() -> String { "user-".to_string() }
fn default_user_password() -> String { provisioner::model::DEFAULT_PASSWORD.to_string() }
fn default_sweep_batch_size() -> usize { 100 }
fn default_request_timeout() -> u64 { 30 }

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::prefixed("KC_").from_env::<Config>()
    }

    /// Checks everything that can be checked without talking to the server.
    pub fn validate(&self) -> ProvisionResult<()> {
        if self.url.as_deref().map_or(true, |u| u.trim().is_empty()) {
            return Err(ProvisionError::ConfigurationMissing("KC_URL".to_string()));
        }
        if self.target_realm.as_deref().map_or(true, |r| r.trim().is_empty()) {
            return Err(ProvisionError::ConfigurationMissing(
                "KC_TARGET_REALM".to_string(),
            ));
        }
        if self.client_threads == 0 {
            return Err(ProvisionError::InvalidConfiguration(
                "KC_CLIENT_THREADS must be at least 1".to_string(),
            ));
        }
        if self.sweep_batch_size == 0 {
            return Err(ProvisionError::InvalidConfiguration(
                "KC_SWEEP_BATCH_SIZE must be at least 1".to_string(),
            ));
        }
        if self.grant_type == GrantType::ClientCredentials && self.client_secret.is_empty() {
            return Err(ProvisionError::ConfigurationMissing(
                "KC_CLIENT_SECRET".to_string(),
            ));
        }
        Ok(())
    }

    pub fn target_realm(&self) -> &str {
        self.target_realm.as_deref().unwrap_or_default()
    }

    pub fn facade(&self) -> ProvisionResult<KeycloakFacade> {
        let mut builder = KeycloakFacade::builder()
            .server_url(self.url.clone().unwrap_or_default())
            .realm(&self.realm)
            .client_id(&self.client_id)
            .default_password(&self.user_password)
            .timeout(Duration::from_secs(self.request_timeout_secs));

        if !self.client_secret.is_empty() {
            builder = builder.client_secret(&self.client_secret);
        }
        if self.grant_type == GrantType::Password {
            builder = builder.username(&self.username).password(&self.password);
        }

        builder.build()
    }

    pub fn run_options(&self, cleanup: bool) -> RunOptions {
        RunOptions {
            plan: ProvisionPlan {
                realm: self.target_realm().to_string(),
                total: self.user_count,
                workers: self.client_threads,
                attribute_count: self.user_attributes,
                username_prefix: self.user_prefix.clone(),
            },
            search_prefix: self.user_prefix.clone(),
            sweep_batch_size: self.sweep_batch_size,
            unresolved_policy: self.unresolved_policy,
            cleanup,
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("url", &self.url)
            .field("realm", &self.realm)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("grant_type", &self.grant_type)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("target_realm", &self.target_realm)
            .field("user_count", &self.user_count)
            .field("client_threads", &self.client_threads)
            .field("user_attributes", &self.user_attributes)
            .field("user_prefix", &self.user_prefix)
            .field("user_password", &"[REDACTED]")
            .field("sweep_batch_size", &self.sweep_batch_size)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("unresolved_policy", &self.unresolved_policy)
            .finish()
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Server: {}, Target Realm: {}, Users: {}, Threads: {}, Attributes: {}, Prefix: {}",
            self.url.as_deref().unwrap_or("None"),
            self.target_realm.as_deref().unwrap_or("None"),
            self.user_count,
            self.client_threads,
            self.user_attributes,
            self.user_prefix
        )
    }
}
