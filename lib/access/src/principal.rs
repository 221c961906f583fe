//! The host application's user record.
//!
//! A `Principal` is owned by the host application. gatehouse only reads it:
//! the login redirector looks at its flags and the directory sync mirrors its
//! identity attributes into the external directory.

use serde::{Deserialize, Serialize};

/// How much of the admin area a caller may reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessLevel {
    /// No authenticated principal.
    Anonymous,
    /// Authenticated, without admin privileges.
    Member,
    /// Authenticated with admin privileges.
    Staff,
}

impl AccessLevel {
    /// Returns true if the caller is authenticated at all.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        !matches!(self, Self::Anonymous)
    }
}

/// A user of the host application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    email: String,
    username: String,
    #[serde(default)]
    first_name: String,
    #[serde(default)]
    last_name: String,
    /// Whether the host application has authenticated this principal.
    #[serde(default)]
    authenticated: bool,
    /// Whether the principal may use the admin area.
    #[serde(default)]
    staff: bool,
}

impl Principal {
    /// Creates an authenticated, non-staff principal.
    #[must_use]
    pub fn new(email: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            username: username.into(),
            first_name: String::new(),
            last_name: String::new(),
            authenticated: true,
            staff: false,
        }
    }

    /// Sets the first and last name.
    #[must_use]
    pub fn with_name(mut self, first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        self.first_name = first_name.into();
        self.last_name = last_name.into();
        self
    }

    /// Sets the staff flag.
    #[must_use]
    pub fn with_staff(mut self, staff: bool) -> Self {
        self.staff = staff;
        self
    }

    /// Sets the authentication flag.
    #[must_use]
    pub fn with_authenticated(mut self, authenticated: bool) -> Self {
        self.authenticated = authenticated;
        self
    }

    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    #[must_use]
    pub fn first_name(&self) -> &str {
        &self.first_name
    }

    #[must_use]
    pub fn last_name(&self) -> &str {
        &self.last_name
    }

    /// Returns "First Last", falling back to the username when both are blank.
    #[must_use]
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name.trim(), self.last_name.trim());
        let full = full.trim();
        if full.is_empty() {
            self.username.clone()
        } else {
            full.to_string()
        }
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    #[must_use]
    pub fn is_staff(&self) -> bool {
        self.staff
    }

    /// Collapses the authentication and staff flags into an access level.
    ///
    /// The staff flag is ignored for unauthenticated principals.
    #[must_use]
    pub fn access_level(&self) -> AccessLevel {
        match (self.authenticated, self.staff) {
            (false, _) => AccessLevel::Anonymous,
            (true, false) => AccessLevel::Member,
            (true, true) => AccessLevel::Staff,
        }
    }
}
