//! Mirroring host principals into the directory.

use crate::client::DirectoryClient;
use crate::error::DirectoryError;
use crate::types::{DirectoryUser, SyncOutcome, UserUpdate};
use async_trait::async_trait;
use gatehouse_access::Principal;
use rootcause::prelude::Report;

/// The user operations principal sync needs from a directory.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Finds the user with exactly this email address.
    async fn find_user_by_email(
        &self,
        email: &str,
    ) -> Result<Option<DirectoryUser>, Report<DirectoryError>>;

    /// Creates a user and returns its directory id.
    async fn create_user(&self, user: &DirectoryUser) -> Result<String, Report<DirectoryError>>;

    /// Applies a partial update to a user.
    async fn update_user(
        &self,
        user_id: &str,
        update: &UserUpdate,
    ) -> Result<(), Report<DirectoryError>>;

    /// Creates or updates the directory record for `principal`, matched by email.
    ///
    /// Running this twice with an unchanged principal creates once and then
    /// updates with identical values.
    async fn sync_principal(
        &self,
        principal: &Principal,
    ) -> Result<SyncOutcome, Report<DirectoryError>> {
        if principal.email().is_empty() {
            return Err(DirectoryError::InvalidInput {
                details: format!("principal '{}' has no email", principal.username()),
            }
            .into());
        }

        match self.find_user_by_email(principal.email()).await? {
            Some(existing) => {
                let id = existing.id.ok_or_else(|| DirectoryError::Rejected {
                    status: 200,
                    details: "directory user without id".to_string(),
                })?;
                self.update_user(&id, &UserUpdate::from(principal)).await?;
                tracing::debug!(user_id = %id, "Updated directory user from principal");
                Ok(SyncOutcome::Updated { id })
            }
            None => {
                let id = self.create_user(&DirectoryUser::from(principal)).await?;
                tracing::info!(user_id = %id, "Created directory user from principal");
                Ok(SyncOutcome::Created { id })
            }
        }
    }

    /// Returns the directory record mirroring `principal`, if any.
    async fn directory_record(
        &self,
        principal: &Principal,
    ) -> Result<Option<DirectoryUser>, Report<DirectoryError>> {
        self.find_user_by_email(principal.email()).await
    }
}

#[async_trait]
impl UserDirectory for DirectoryClient {
    async fn find_user_by_email(
        &self,
        email: &str,
    ) -> Result<Option<DirectoryUser>, Report<DirectoryError>> {
        DirectoryClient::find_user_by_email(self, email).await
    }

    async fn create_user(&self, user: &DirectoryUser) -> Result<String, Report<DirectoryError>> {
        DirectoryClient::create_user(self, user).await
    }

    async fn update_user(
        &self,
        user_id: &str,
        update: &UserUpdate,
    ) -> Result<(), Report<DirectoryError>> {
        DirectoryClient::update_user(self, user_id, update).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Degrade;
    use std::sync::Mutex;

    /// In-memory directory keyed by generated ids.
    #[derive(Default)]
    struct MemoryDirectory {
        users: Mutex<Vec<DirectoryUser>>,
        creates: Mutex<u32>,
        updates: Mutex<u32>,
    }

    #[async_trait]
    impl UserDirectory for MemoryDirectory {
        async fn find_user_by_email(
            &self,
            email: &str,
        ) -> Result<Option<DirectoryUser>, Report<DirectoryError>> {
            let users = self.users.lock().expect("lock");
            Ok(users
                .iter()
                .find(|u| u.email.as_deref() == Some(email))
                .cloned())
        }

        async fn create_user(
            &self,
            user: &DirectoryUser,
        ) -> Result<String, Report<DirectoryError>> {
            let mut users = self.users.lock().expect("lock");
            let id = format!("user-{}", users.len() + 1);
            let mut stored = user.clone();
            stored.id = Some(id.clone());
            users.push(stored);
            *self.creates.lock().expect("lock") += 1;
            Ok(id)
        }

        async fn update_user(
            &self,
            user_id: &str,
            update: &UserUpdate,
        ) -> Result<(), Report<DirectoryError>> {
            let mut users = self.users.lock().expect("lock");
            let user = users
                .iter_mut()
                .find(|u| u.id.as_deref() == Some(user_id))
                .ok_or_else(|| DirectoryError::NotFound {
                    resource: "user".to_string(),
                })?;
            if let Some(v) = &update.first_name {
                user.first_name = Some(v.clone());
            }
            if let Some(v) = &update.last_name {
                user.last_name = Some(v.clone());
            }
            if let Some(v) = &update.email {
                user.email = Some(v.clone());
            }
            if let Some(v) = &update.username {
                user.username = v.clone();
            }
            *self.updates.lock().expect("lock") += 1;
            Ok(())
        }
    }

    /// A directory that is never reachable.
    struct Offline;

    #[async_trait]
    impl UserDirectory for Offline {
        async fn find_user_by_email(
            &self,
            _email: &str,
        ) -> Result<Option<DirectoryUser>, Report<DirectoryError>> {
            Err(DirectoryError::disconnected().into())
        }

        async fn create_user(
            &self,
            _user: &DirectoryUser,
        ) -> Result<String, Report<DirectoryError>> {
            Err(DirectoryError::disconnected().into())
        }

        async fn update_user(
            &self,
            _user_id: &str,
            _update: &UserUpdate,
        ) -> Result<(), Report<DirectoryError>> {
            Err(DirectoryError::disconnected().into())
        }
    }

    fn alice() -> Principal {
        Principal::new("alice@example.com", "alice").with_name("Alice", "Liddell")
    }

    #[tokio::test]
    async fn sync_twice_creates_then_updates() {
        let directory = MemoryDirectory::default();

        let first = directory.sync_principal(&alice()).await.expect("first sync");
        let second = directory.sync_principal(&alice()).await.expect("second sync");

        assert_eq!(first, SyncOutcome::Created { id: "user-1".to_string() });
        assert_eq!(second, SyncOutcome::Updated { id: "user-1".to_string() });
        assert_eq!(*directory.creates.lock().expect("lock"), 1);
        assert_eq!(*directory.updates.lock().expect("lock"), 1);

        let stored = directory
            .directory_record(&alice())
            .await
            .expect("lookup")
            .expect("record exists");
        assert_eq!(stored.username, "alice");
        assert_eq!(stored.email.as_deref(), Some("alice@example.com"));
        assert_eq!(stored.first_name.as_deref(), Some("Alice"));
        assert_eq!(stored.last_name.as_deref(), Some("Liddell"));
    }

    #[tokio::test]
    async fn sync_pushes_changed_fields() {
        let directory = MemoryDirectory::default();
        directory.sync_principal(&alice()).await.expect("first sync");

        let renamed = Principal::new("alice@example.com", "alice2").with_name("Alicia", "L");
        directory.sync_principal(&renamed).await.expect("second sync");

        let users = directory.users.lock().expect("lock");
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].username, "alice2");
        assert_eq!(users[0].first_name.as_deref(), Some("Alicia"));
    }

    #[tokio::test]
    async fn sync_rejects_principal_without_email() {
        let directory = MemoryDirectory::default();
        let err = directory
            .sync_principal(&Principal::new("", "ghost"))
            .await
            .expect_err("must fail");
        assert!(matches!(
            err.current_context(),
            DirectoryError::InvalidInput { .. }
        ));
        assert!(directory.users.lock().expect("lock").is_empty());
    }

    #[tokio::test]
    async fn offline_directory_degrades_to_failure() {
        let outcome = Offline.sync_principal(&alice()).await;
        assert!(!outcome.succeeded("sync_principal"));
        assert_eq!(
            Offline.directory_record(&alice()).await.or_neutral("lookup"),
            None
        );
    }
}
