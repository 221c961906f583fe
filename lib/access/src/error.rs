//! Error types for the access crate.

use std::fmt;

/// Errors from resolving a named route against the host routing table.
///
/// The login redirector never surfaces these to callers; they are logged and
/// replaced by a literal fallback path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteError {
    /// No route is registered under this name.
    Unknown { name: String },
    /// A route is registered but its path is unusable.
    InvalidPath { name: String, path: String },
}

impl fmt::Display for RouteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown { name } => {
                write!(f, "no route named '{name}'")
            }
            Self::InvalidPath { name, path } => {
                write!(f, "route '{name}' has unusable path '{path}'")
            }
        }
    }
}

impl std::error::Error for RouteError {}
