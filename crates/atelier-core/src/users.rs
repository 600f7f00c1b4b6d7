//! User directory: CRUD over back-office accounts.

use std::sync::Arc;

use atelier_rbac::Role;
use atelier_storage::{Store, StoreError, User};
use chrono::Utc;

use crate::config::AdminConfig;
use crate::error::AdminError;
use crate::validate::{validate_email, validate_name};

/// CRUD over user records with the master-admin protections applied.
pub struct UserDirectory {
    store: Arc<dyn Store>,
    config: Arc<AdminConfig>,
}

impl UserDirectory {
    pub fn new(store: Arc<dyn Store>, config: Arc<AdminConfig>) -> Self {
        Self { store, config }
    }

    /// Create a user. The existence check and the write are separate store
    /// calls; concurrent creates for the same email can race, with the later
    /// write overwriting the earlier one.
    pub async fn create_user(
        &self,
        email: &str,
        name: &str,
        role: Role,
        invited_by: Option<&str>,
    ) -> Result<User, AdminError> {
        validate_email(email)?;
        validate_name(name)?;

        if self.store.user_exists(email).await? {
            return Err(AdminError::Conflict(
                "A user with this email already exists".to_string(),
            ));
        }

        let user = User {
            email: email.to_string(),
            name: name.trim().to_string(),
            role,
            created_at: Utc::now(),
            invited_by: invited_by.map(str::to_string),
            last_sign_in: None,
        };
        self.store.create_user(&user).await?;
        Ok(user)
    }

    /// Absence is a valid result, not an error.
    pub async fn get_user(&self, email: &str) -> Result<Option<User>, AdminError> {
        match self.store.get_user(email).await {
            Ok(user) => Ok(Some(user)),
            Err(StoreError::NotFound) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// All users, newest first. Index entries without a record are skipped,
    /// tolerating index/record divergence.
    pub async fn get_all_users(&self) -> Result<Vec<User>, AdminError> {
        let emails = self.store.list_user_emails().await?;
        let lookups = emails.iter().map(|email| self.store.get_user(email));
        let results = futures::future::join_all(lookups).await;

        let mut users = Vec::with_capacity(results.len());
        for result in results {
            match result {
                Ok(user) => users.push(user),
                Err(StoreError::NotFound) => {}
                Err(e) => return Err(e.into()),
            }
        }
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(users)
    }

    pub async fn update_user_role(&self, email: &str, role: Role) -> Result<User, AdminError> {
        if self.config.is_master_admin(email) && role != Role::MasterAdmin {
            return Err(AdminError::Policy(
                "The master administrator's role cannot be changed".to_string(),
            ));
        }

        let mut user = self
            .store
            .get_user(email)
            .await
            .map_err(not_found_as_user)?;
        user.role = role;
        self.store.update_user(&user).await?;
        Ok(user)
    }

    pub async fn update_user_name(&self, email: &str, name: &str) -> Result<User, AdminError> {
        validate_name(name)?;

        let mut user = self
            .store
            .get_user(email)
            .await
            .map_err(not_found_as_user)?;
        user.name = name.trim().to_string();
        self.store.update_user(&user).await?;
        Ok(user)
    }

    /// Stamp the last sign-in time. Called by the identity provider glue
    /// after a successful login.
    pub async fn record_sign_in(&self, email: &str) -> Result<User, AdminError> {
        let mut user = self
            .store
            .get_user(email)
            .await
            .map_err(not_found_as_user)?;
        user.last_sign_in = Some(Utc::now());
        self.store.update_user(&user).await?;
        Ok(user)
    }

    pub async fn delete_user(&self, email: &str) -> Result<(), AdminError> {
        if self.config.is_master_admin(email) {
            return Err(AdminError::Policy(
                "The master administrator cannot be deleted".to_string(),
            ));
        }

        match self.store.delete_user(email).await {
            Ok(()) => Ok(()),
            Err(StoreError::NotFound) => {
                Err(AdminError::NotFound("User not found".to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn user_exists(&self, email: &str) -> Result<bool, AdminError> {
        Ok(self.store.user_exists(email).await?)
    }

    pub async fn user_count(&self) -> Result<u64, AdminError> {
        Ok(self.store.user_count().await?)
    }

    /// Derived by filtering the full listing. O(n), acceptable at this
    /// system's scale; there is no per-role index.
    pub async fn users_by_role(&self, role: Role) -> Result<Vec<User>, AdminError> {
        let users = self.get_all_users().await?;
        Ok(users.into_iter().filter(|u| u.role == role).collect())
    }
}

fn not_found_as_user(e: StoreError) -> AdminError {
    match e {
        StoreError::NotFound => AdminError::NotFound("User not found".to_string()),
        other => other.into(),
    }
}
