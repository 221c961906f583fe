//! Named route resolution.
//!
//! The login redirector asks the host routing table for the OIDC login entry
//! point by name, so a renamed or remounted route is picked up without a
//! config change.

use crate::error::RouteError;
use std::collections::HashMap;

/// Resolves a route name to a path on this host.
pub trait RouteResolver: Send + Sync {
    /// Returns the absolute path registered under `name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is unknown or maps to an unusable path.
    fn resolve(&self, name: &str) -> Result<String, RouteError>;
}

/// An in-memory route table.
#[derive(Debug, Clone, Default)]
pub struct NamedRoutes {
    routes: HashMap<String, String>,
}

impl NamedRoutes {
    /// Creates an empty route table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a route, replacing any previous path for the same name.
    #[must_use]
    pub fn with_route(mut self, name: impl Into<String>, path: impl Into<String>) -> Self {
        self.insert(name, path);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, path: impl Into<String>) {
        self.routes.insert(name.into(), path.into());
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl RouteResolver for NamedRoutes {
    fn resolve(&self, name: &str) -> Result<String, RouteError> {
        let path = self.routes.get(name).ok_or_else(|| RouteError::Unknown {
            name: name.to_string(),
        })?;

        // Only host-relative paths; "//" would be read as a scheme-relative URL.
        if !path.starts_with('/') || path.starts_with("//") {
            return Err(RouteError::InvalidPath {
                name: name.to_string(),
                path: path.clone(),
            });
        }

        Ok(path.clone())
    }
}
