//! Directory error types.
//!
//! Every directory operation returns `Result<T, Report<DirectoryError>>`.
//! Callers that only care about success can reduce a result to a neutral
//! value with [`Degrade`]; the cause is logged instead of returned.

use rootcause::prelude::Report;
use std::fmt;

/// Directory errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    /// No admin session, or the provider could not be reached.
    Unreachable {
        /// Error details.
        details: String,
    },
    /// The requested entity does not exist.
    NotFound {
        /// What was looked up.
        resource: String,
    },
    /// The provider refused the request (authentication, conflict, server error).
    Rejected {
        /// HTTP status returned by the provider.
        status: u16,
        /// Error details.
        details: String,
    },
    /// The provider rejected the payload, or the caller supplied unusable input.
    InvalidInput {
        /// Error details.
        details: String,
    },
}

impl DirectoryError {
    /// Shorthand for the error returned while disconnected.
    #[must_use]
    pub fn disconnected() -> Self {
        Self::Unreachable {
            details: "no admin session".to_string(),
        }
    }
}

impl fmt::Display for DirectoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unreachable { details } => {
                write!(f, "directory unreachable: {}", details)
            }
            Self::NotFound { resource } => {
                write!(f, "directory entity not found: {}", resource)
            }
            Self::Rejected { status, details } => {
                write!(f, "directory rejected request ({}): {}", status, details)
            }
            Self::InvalidInput { details } => {
                write!(f, "invalid directory input: {}", details)
            }
        }
    }
}

impl std::error::Error for DirectoryError {}

/// Reduces a directory result to a neutral value, logging the cause.
pub trait Degrade<T> {
    /// Returns the value, or `None` after logging the error.
    fn logged_ok(self, operation: &str) -> Option<T>;

    /// Returns the value, or `T::default()` (`None`, empty `Vec`, ...) after
    /// logging the error.
    fn or_neutral(self, operation: &str) -> T
    where
        T: Default;

    /// Returns whether the operation succeeded, logging the error if not.
    fn succeeded(self, operation: &str) -> bool;
}

impl<T> Degrade<T> for Result<T, Report<DirectoryError>> {
    fn logged_ok(self, operation: &str) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(report) => {
                tracing::warn!(operation, error = %report, "Directory operation failed");
                None
            }
        }
    }

    fn or_neutral(self, operation: &str) -> T
    where
        T: Default,
    {
        self.logged_ok(operation).unwrap_or_default()
    }

    fn succeeded(self, operation: &str) -> bool {
        self.logged_ok(operation).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failed<T>() -> Result<T, Report<DirectoryError>> {
        Err(DirectoryError::disconnected().into())
    }

    #[test]
    fn unreachable_display() {
        let err = DirectoryError::disconnected();
        assert!(err.to_string().contains("unreachable"));
        assert!(err.to_string().contains("no admin session"));
    }

    #[test]
    fn rejected_display_includes_status() {
        let err = DirectoryError::Rejected {
            status: 409,
            details: "User exists with same username".to_string(),
        };
        assert!(err.to_string().contains("409"));
        assert!(err.to_string().contains("same username"));
    }

    #[test]
    fn not_found_display() {
        let err = DirectoryError::NotFound {
            resource: "role 'auditor'".to_string(),
        };
        assert!(err.to_string().contains("role 'auditor'"));
    }

    #[test]
    fn neutral_values_on_failure() {
        assert_eq!(failed::<Option<String>>().or_neutral("get"), None);
        assert!(failed::<Vec<String>>().or_neutral("list").is_empty());
        assert!(!failed::<()>().succeeded("update"));
        assert_eq!(failed::<String>().logged_ok("create"), None);
    }

    #[test]
    fn values_pass_through_on_success() {
        let ok: Result<Vec<u8>, Report<DirectoryError>> = Ok(vec![1, 2]);
        assert_eq!(ok.or_neutral("list"), vec![1, 2]);

        let ok: Result<(), Report<DirectoryError>> = Ok(());
        assert!(ok.succeeded("delete"));
    }
}
