//! Idempotent provisioning of realm configuration.
//!
//! Each `ensure_*` call looks the entity up first and only creates it when
//! missing; existing entities are left untouched.

use crate::client::DirectoryClient;
use crate::error::DirectoryError;
use crate::types::{ClientRegistration, IdentityProviderConfig};
use rootcause::prelude::Report;
use tracing::{info, warn};

/// Whether an `ensure_*` call found or created its entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ensured {
    AlreadyPresent,
    Created,
}

/// What a provisioning run should make sure exists.
#[derive(Debug, Clone, Default)]
pub struct ProvisionPlan {
    /// Application client to register.
    pub client: Option<ClientRegistration>,
    /// Realm roles as `(name, description)`.
    pub realm_roles: Vec<(String, String)>,
    /// Upstream identity providers to broker.
    pub identity_providers: Vec<IdentityProviderConfig>,
}

impl ProvisionPlan {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.client.is_none() && self.realm_roles.is_empty() && self.identity_providers.is_empty()
    }
}

/// Outcome of a provisioning run, by entity label.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvisionReport {
    pub created: Vec<String>,
    pub existing: Vec<String>,
    pub failed: Vec<String>,
}

impl ProvisionReport {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    fn record(&mut self, label: String, result: Result<Ensured, Report<DirectoryError>>) {
        match result {
            Ok(Ensured::Created) => {
                info!(entity = %label, "Provisioned");
                self.created.push(label);
            }
            Ok(Ensured::AlreadyPresent) => self.existing.push(label),
            Err(report) => {
                warn!(entity = %label, error = %report, "Provisioning failed");
                self.failed.push(label);
            }
        }
    }
}

/// Provisions realm configuration through a directory client.
pub struct Provisioner<'a> {
    client: &'a DirectoryClient,
}

impl<'a> Provisioner<'a> {
    #[must_use]
    pub fn new(client: &'a DirectoryClient) -> Self {
        Self { client }
    }

    /// Registers the client unless one with the same `clientId` exists.
    pub async fn ensure_client(
        &self,
        desired: &ClientRegistration,
    ) -> Result<Ensured, Report<DirectoryError>> {
        if self.client.find_client(&desired.client_id).await?.is_some() {
            return Ok(Ensured::AlreadyPresent);
        }
        self.client.create_client(desired).await?;
        Ok(Ensured::Created)
    }

    /// Creates the realm role unless it exists.
    pub async fn ensure_realm_role(
        &self,
        name: &str,
        description: &str,
    ) -> Result<Ensured, Report<DirectoryError>> {
        if self.client.find_realm_role(name).await?.is_some() {
            return Ok(Ensured::AlreadyPresent);
        }
        self.client.create_realm_role(name, description).await?;
        Ok(Ensured::Created)
    }

    /// Registers the identity provider unless its alias is taken.
    pub async fn ensure_identity_provider(
        &self,
        desired: &IdentityProviderConfig,
    ) -> Result<Ensured, Report<DirectoryError>> {
        let existing = self.client.identity_providers().await?;
        if existing.iter().any(|idp| idp.alias == desired.alias) {
            return Ok(Ensured::AlreadyPresent);
        }
        self.client.create_identity_provider(desired).await?;
        Ok(Ensured::Created)
    }

    /// Ensures everything in the plan. Failures are recorded and do not stop
    /// the remaining steps.
    pub async fn run(&self, plan: &ProvisionPlan) -> ProvisionReport {
        let mut report = ProvisionReport::default();

        if let Some(client) = &plan.client {
            let result = self.ensure_client(client).await;
            report.record(format!("client:{}", client.client_id), result);
        }

        for (name, description) in &plan.realm_roles {
            let result = self.ensure_realm_role(name, description).await;
            report.record(format!("role:{}", name), result);
        }

        for provider in &plan.identity_providers {
            let result = self.ensure_identity_provider(provider).await;
            report.record(format!("identity-provider:{}", provider.alias), result);
        }

        report
    }
}
