//! Login credentials carried by a resource address.

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// Login and password embedded in a URL.
///
/// Equality and hashing consider the login only, so two addresses that differ
/// just by password denote the same resource. Use [`Credentials::eq_strict`]
/// when the password matters (e.g. deciding whether to reuse a connection).
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct Credentials {
    login: String,
    password: String,
}

impl Credentials {
    pub fn new(login: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            password: password.into(),
        }
    }

    pub fn login(&self) -> &str {
        &self.login
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    /// The password with every character replaced by `*`.
    pub fn masked_password(&self) -> String {
        "*".repeat(self.password.chars().count())
    }

    /// True when both login and password are empty.
    pub fn is_empty(&self) -> bool {
        self.login.is_empty() && self.password.is_empty()
    }

    /// Compare login *and* password.
    pub fn eq_strict(&self, other: &Credentials) -> bool {
        self.login == other.login && self.password == other.password
    }
}

impl PartialEq for Credentials {
    fn eq(&self, other: &Self) -> bool {
        self.login == other.login
    }
}

impl Eq for Credentials {}

impl Hash for Credentials {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.login.hash(state);
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("login", &self.login)
            .field("password", &self.masked_password())
            .finish()
    }
}

impl fmt::Display for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.login)
    }
}
