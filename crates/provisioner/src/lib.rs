//! Concurrent user provisioning, enumeration and cleanup against an
//! identity backend.
//!
//! The engine ([`bulk`], [`sweep`], [`orchestrator`]) only talks to the
//! [`ProviderFacade`] trait; [`keycloak`] implements it over the Keycloak
//! admin REST API.

pub mod bulk;
pub mod error;
pub mod facade;
pub mod keycloak;
pub mod model;
pub mod orchestrator;
pub mod sweep;

pub use error::{ProvisionError, ProvisionResult};
pub use facade::ProviderFacade;
pub use keycloak::KeycloakFacade;
pub use model::{AccountRecord, IdentityReference};
