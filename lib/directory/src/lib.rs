//! KeyCloak admin API client for gatehouse.
//!
//! This crate mirrors host principals into an external KeyCloak realm and
//! provisions the realm's clients, roles, and identity providers.
//!
//! All operations return `Result<T, Report<DirectoryError>>`, distinguishing
//! an unreachable directory from missing entities and rejected payloads.
//! Callers that prefer the "never fail" style can reduce results with
//! [`Degrade`].

mod client;
mod config;
mod error;
pub mod provision;
mod session;
mod sync;
mod types;

pub use client::DirectoryClient;
pub use config::DirectoryConfig;
pub use error::{Degrade, DirectoryError};
pub use provision::{Ensured, ProvisionPlan, ProvisionReport, Provisioner};
pub use session::AdminSession;
pub use sync::UserDirectory;
pub use types::{
    ClientRegistration, DirectoryUser, IdentityProviderConfig, RealmRole, SyncOutcome, UserUpdate,
};
