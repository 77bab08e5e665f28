use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("Missing required configuration: {0}")]
    ConfigurationMissing(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Connection, timeout or token acquisition failure.
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Unexpected backend payload: {0}")]
    Protocol(String),

    /// Creation failures are recovered as an unknown reference; this variant
    /// only exists so the rejection can be logged in a uniform way.
    #[error("Account creation rejected in realm {realm} (status {status})")]
    AccountCreationRejected { realm: String, status: u16 },

    #[error("DELETE_USER_FAILED: realm={realm} id={id} status={status}")]
    AccountDeletionFailed {
        realm: String,
        id: String,
        status: u16,
    },

    #[error("Refusing to address an unresolved account reference in realm {realm}")]
    UnresolvedReference { realm: String },

    #[error("{count} account(s) could not be created in realm {realm}")]
    UnresolvedAccounts { realm: String, count: usize },

    #[error("Provisioning worker {worker} faulted: {message}")]
    WorkerFault { worker: usize, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for ProvisionError {
    fn from(err: reqwest::Error) -> Self {
        ProvisionError::BackendUnavailable(err.to_string())
    }
}

pub type ProvisionResult<T> = Result<T, ProvisionError>;
