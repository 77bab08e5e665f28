use std::collections::HashMap;
use std::fmt;

/// Textual sentinel older tooling used for "no id yet". Parsing it yields
/// [`IdentityReference::Unknown`].
pub const UNKNOWN_ID: &str = "-------------";

/// Password attached to created accounts when the record carries none.
pub const DEFAULT_PASSWORD: &str = "password";

/// Handle to one remote account.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum IdentityReference {
    Resolved(String),
    /// Creation did not yield an identifier. Never addresses a real account.
    Unknown,
}

impl IdentityReference {
    /// Builds a reference from a known identifier.
    /// The empty string and [`UNKNOWN_ID`] both map to `Unknown`.
    pub fn from_id(id: impl Into<String>) -> Self {
        let id = id.into();
        if id.is_empty() || id == UNKNOWN_ID {
            IdentityReference::Unknown
        } else {
            IdentityReference::Resolved(id)
        }
    }

    /// Extracts the identifier from a resource location such as
    /// `https://kc/admin/realms/demo/users/<id>` (the last non-empty path segment).
    pub fn from_location(location: &str) -> Self {
        let path = match reqwest::Url::parse(location) {
            Ok(url) => url.path().to_string(),
            Err(_) => location.split(['?', '#']).next().unwrap_or_default().to_string(),
        };

        let id = path
            .split('/')
            .filter(|segment| !segment.is_empty())
            .last()
            .unwrap_or_default();

        Self::from_id(id)
    }

    pub fn id(&self) -> Option<&str> {
        match self {
            IdentityReference::Resolved(id) => Some(id),
            IdentityReference::Unknown => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, IdentityReference::Resolved(_))
    }
}

impl fmt::Display for IdentityReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentityReference::Resolved(id) => write!(f, "{}", id),
            IdentityReference::Unknown => write!(f, "<unknown>"),
        }
    }
}

/// Profile data submitted for creation or returned by enumeration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccountRecord {
    /// `Unknown` until the backend has assigned an id.
    pub reference: IdentityReference,
    pub username: String,
    /// Falls back to the facade's default password when `None`.
    pub password: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub attributes: HashMap<String, Vec<String>>,
}

impl AccountRecord {
    /// A fresh record for creation.
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            reference: IdentityReference::Unknown,
            username: username.into(),
            password: None,
            email: None,
            first_name: None,
            last_name: None,
            attributes: HashMap::new(),
        }
    }

    /// A load-test account derived from `stamp`, carrying `attribute_count`
    /// single-valued attributes named `attr0..`.
    pub fn synthetic(prefix: &str, stamp: u64, attribute_count: usize) -> Self {
        let username = format!("{}{}", prefix, stamp);
        let mut record = Self::new(username.clone());
        record.first_name = Some(format!("First{}", stamp));
        record.last_name = Some(format!("Last{}", stamp));
        record.email = Some(format!("loadtest+{}@localhost", username));
        record.attributes = (0..attribute_count)
            .map(|i| (format!("attr{}", i), vec![format!("value{}", i)]))
            .collect();
        record
    }

    /// Adds or replaces one attribute.
    pub fn with_attribute(mut self, name: impl Into<String>, values: Vec<String>) -> Self {
        self.attributes.insert(name.into(), values);
        self
    }
}

impl fmt::Display for AccountRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (id={}, email={}, attributes={})",
            self.username,
            self.reference,
            self.email.as_deref().unwrap_or("-"),
            self.attributes.len()
        )
    }
}
