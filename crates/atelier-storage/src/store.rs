//! The Store trait that backends implement.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::types::{Invitation, User};
use crate::StoreError;

/// The storage trait the service layer depends on.
///
/// Every mutator keeps the primary record and its index entries consistent
/// within the method, but the underlying writes are independent per-key
/// operations with no cross-key atomicity. Uniqueness checks
/// (existing user, existing pending invitation) belong to the caller.
#[cfg_attr(feature = "test-support", mockall::automock)]
#[async_trait::async_trait]
pub trait Store: Send + Sync {
    // ───────────────────────────────────── Users ──────────────────────────────────────────

    /// Write a user record and add its email to the global index.
    /// Overwrites silently if the record already exists.
    async fn create_user(&self, user: &User) -> Result<(), StoreError>;

    /// Get user by email.
    async fn get_user(&self, email: &str) -> Result<User, StoreError>;

    /// Rewrite an existing user record.
    async fn update_user(&self, user: &User) -> Result<(), StoreError>;

    /// Remove a user record and its index entry.
    async fn delete_user(&self, email: &str) -> Result<(), StoreError>;

    /// Check whether a user record exists.
    async fn user_exists(&self, email: &str) -> Result<bool, StoreError>;

    /// All emails in the global user index.
    async fn list_user_emails(&self) -> Result<Vec<String>, StoreError>;

    /// Size of the global user index.
    async fn user_count(&self) -> Result<u64, StoreError>;

    // ───────────────────────────────────── Invitations ────────────────────────────────────

    /// Write an invitation record, add its token to the pending index, and
    /// point the email reverse index at it.
    async fn create_invitation(&self, invitation: &Invitation) -> Result<(), StoreError>;

    /// Get invitation by token.
    async fn get_invitation(&self, token: &str) -> Result<Invitation, StoreError>;

    /// Resolve the email reverse index to a token. The returned token may be
    /// stale (pointing at a used/expired invitation); callers must re-check.
    async fn pending_token_for_email(&self, email: &str) -> Result<String, StoreError>;

    /// All tokens in the pending index.
    async fn list_pending_tokens(&self) -> Result<Vec<String>, StoreError>;

    /// Transition an invitation to used: stamps `used_at`, removes the token
    /// from the pending index, and clears the email reverse index.
    async fn mark_invitation_used(
        &self,
        token: &str,
        used_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Transition an invitation to expired and drop it from the pending and
    /// reverse indices.
    async fn mark_invitation_expired(&self, token: &str) -> Result<(), StoreError>;

    /// Hard-delete an invitation record and both its index entries.
    async fn delete_invitation(&self, token: &str) -> Result<(), StoreError>;

    // ───────────────────────────────────── Counters ───────────────────────────────────────

    /// Increment the fixed-window counter for (action, identifier), starting
    /// a new window of `window` length when the counter does not exist.
    /// Returns the new count. Subsequent increments do not extend the window.
    async fn incr_counter(
        &self,
        action: &str,
        identifier: &str,
        window: Duration,
    ) -> Result<u64, StoreError>;

    /// Current count for (action, identifier); 0 when no window is open.
    async fn get_counter(&self, action: &str, identifier: &str) -> Result<u64, StoreError>;

    /// Remaining lifetime of the current window, if one is open.
    async fn counter_ttl(
        &self,
        action: &str,
        identifier: &str,
    ) -> Result<Option<Duration>, StoreError>;

    /// Delete the counter outright (administrative override).
    async fn reset_counter(&self, action: &str, identifier: &str) -> Result<(), StoreError>;
}
