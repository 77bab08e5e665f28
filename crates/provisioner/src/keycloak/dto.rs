//! Admin API user payloads.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{ProvisionError, ProvisionResult};
use crate::model::{AccountRecord, IdentityReference};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRepresentation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<HashMap<String, Vec<String>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<Vec<CredentialRepresentation>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialRepresentation {
    #[serde(rename = "type")]
    pub type_: String,
    pub value: String,
    pub temporary: bool,
}

impl UserRepresentation {
    /// Creation payload: an enabled user with one non-temporary password.
    pub fn for_creation(record: &AccountRecord, default_password: &str) -> Self {
        let password = record
            .password
            .clone()
            .unwrap_or_else(|| default_password.to_string());

        Self {
            id: None,
            username: Some(record.username.clone()),
            first_name: record.first_name.clone(),
            last_name: record.last_name.clone(),
            email: record.email.clone(),
            enabled: Some(true),
            attributes: Some(record.attributes.clone()),
            credentials: Some(vec![CredentialRepresentation {
                type_: "password".to_string(),
                value: password,
                temporary: false,
            }]),
        }
    }
}

impl TryFrom<UserRepresentation> for AccountRecord {
    type Error = ProvisionError;

    fn try_from(user: UserRepresentation) -> ProvisionResult<Self> {
        let reference = IdentityReference::from_id(user.id.unwrap_or_default());
        if !reference.is_resolved() {
            return Err(ProvisionError::Protocol(format!(
                "user {:?} returned without an id",
                user.username
            )));
        }

        Ok(AccountRecord {
            reference,
            username: user.username.unwrap_or_default(),
            password: None,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            attributes: user.attributes.unwrap_or_default(),
        })
    }
}
