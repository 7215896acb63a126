//! Provider configuration handed to backend constructors

use std::collections::BTreeMap;
use std::fmt;

/// Login material for a switch.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Credentials {
    /// Login name
    pub username: String,
    /// Password, never printed by `Debug`
    pub password: String,
}

impl Credentials {
    /// Credentials from a username and password
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// What a provider object resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProviderConfig {
    /// Registered backend name (`ssh`, `ansible`, `fake`, ...)
    pub backend: String,

    /// Network OS of the device
    pub os: String,

    /// Host address
    pub host: String,

    /// Login material, when the provider needs any
    pub credentials: Option<Credentials>,

    /// Backend-specific options, e.g. `bridge`
    pub options: BTreeMap<String, String>,
}

impl ProviderConfig {
    /// Configuration for `backend` talking to an `os` device at `host`
    pub fn new(backend: impl Into<String>, os: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            backend: backend.into(),
            os: os.into(),
            host: host.into(),
            ..Default::default()
        }
    }

    /// Attach login material
    #[must_use]
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Set a backend-specific option
    #[must_use]
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Option value, if set
    pub fn option(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(String::as_str)
    }
}
