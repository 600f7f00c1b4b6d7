//! Invitation lifecycle: issue, validate, expire, resend, and cancel
//! single-use onboarding tokens.
//!
//! State machine per invitation: pending → used (signup completed) or
//! pending → expired (deadline passed, observed lazily on read).
//! Cancellation is a hard delete from pending, not a status transition.

use std::sync::Arc;

use atelier_rbac::Role;
use atelier_storage::{Invitation, InvitationStatus, Store, StoreError};
use chrono::{Duration, Utc};
use rand::RngCore;

use crate::config::AdminConfig;
use crate::error::AdminError;
use crate::validate::validate_email;

/// Issues and tracks invitations. Depends on the store and on the user
/// existence check; email delivery of the token is the caller's concern.
pub struct InvitationManager {
    store: Arc<dyn Store>,
    config: Arc<AdminConfig>,
}

/// 32 random bytes, hex-encoded. The token is used directly as the store key
/// suffix and doubles as a bearer credential, so it must be unguessable.
fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

impl InvitationManager {
    pub fn new(store: Arc<dyn Store>, config: Arc<AdminConfig>) -> Self {
        Self { store, config }
    }

    /// Issue an invitation. At most one pending invitation may exist per
    /// email; the check and the write are separate store calls, so two
    /// concurrent creates for the same email can race.
    pub async fn create_invitation(
        &self,
        email: &str,
        role: Role,
        created_by: &str,
    ) -> Result<Invitation, AdminError> {
        validate_email(email)?;
        if role == Role::MasterAdmin {
            return Err(AdminError::Policy(
                "The master administrator cannot be invited; that account is provisioned out of band"
                    .to_string(),
            ));
        }

        if self.store.user_exists(email).await? {
            return Err(AdminError::Conflict(
                "A user with this email already exists".to_string(),
            ));
        }
        if self.pending_invitation_for_email(email).await?.is_some() {
            return Err(AdminError::Conflict(
                "A pending invitation already exists for this email".to_string(),
            ));
        }

        let now = Utc::now();
        let invitation = Invitation {
            email: email.to_string(),
            role,
            token: generate_token(),
            expires_at: now + Duration::days(self.config.invitation_expiry_days),
            created_by: created_by.to_string(),
            created_at: now,
            status: InvitationStatus::Pending,
            used_at: None,
        };
        self.store.create_invitation(&invitation).await?;
        Ok(invitation)
    }

    /// Absence is a valid result, not an error.
    pub async fn get_invitation(&self, token: &str) -> Result<Option<Invitation>, AdminError> {
        match self.store.get_invitation(token).await {
            Ok(invitation) => Ok(Some(invitation)),
            Err(StoreError::NotFound) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Resolve the email reverse index. Stale entries (pointing at a used or
    /// expired invitation) read as None and self-heal on the next mutation.
    pub async fn pending_invitation_for_email(
        &self,
        email: &str,
    ) -> Result<Option<Invitation>, AdminError> {
        let token = match self.store.pending_token_for_email(email).await {
            Ok(token) => token,
            Err(StoreError::NotFound) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(self
            .get_invitation(&token)
            .await?
            .filter(|inv| inv.status == InvitationStatus::Pending))
    }

    /// Resolve every token in the pending index, skipping dangling entries
    /// and records that are no longer pending.
    async fn resolve_pending(&self) -> Result<Vec<Invitation>, AdminError> {
        let tokens = self.store.list_pending_tokens().await?;
        let lookups = tokens.iter().map(|token| self.store.get_invitation(token));
        let results = futures::future::join_all(lookups).await;

        let mut invitations = Vec::with_capacity(results.len());
        for result in results {
            match result {
                Ok(inv) if inv.status == InvitationStatus::Pending => invitations.push(inv),
                Ok(_) | Err(StoreError::NotFound) => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(invitations)
    }

    /// Transition every past-due pending invitation to expired. Invoked by
    /// the read path and by the scheduled cleanup job; returns how many
    /// invitations were expired.
    pub async fn sweep_expired(&self) -> Result<u64, AdminError> {
        let now = Utc::now();
        let mut expired = 0;
        for invitation in self.resolve_pending().await? {
            if invitation.is_past_due(now) {
                match self.store.mark_invitation_expired(&invitation.token).await {
                    // A concurrent sweep got there first; nothing to do.
                    Ok(()) | Err(StoreError::NotFound) => expired += 1,
                    Err(e) => return Err(e.into()),
                }
            }
        }
        Ok(expired)
    }

    /// Still-pending invitations, newest first. Past-due entries are expired
    /// by the sweep before the listing is taken.
    pub async fn pending_invitations(&self) -> Result<Vec<Invitation>, AdminError> {
        self.sweep_expired().await?;
        let mut invitations = self.resolve_pending().await?;
        invitations.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(invitations)
    }

    pub async fn mark_used(&self, token: &str) -> Result<(), AdminError> {
        self.store
            .mark_invitation_used(token, Utc::now())
            .await
            .map_err(not_found_as_invitation)
    }

    pub async fn mark_expired(&self, token: &str) -> Result<(), AdminError> {
        self.store
            .mark_invitation_expired(token)
            .await
            .map_err(not_found_as_invitation)
    }

    /// Cancel: a hard delete of the record and both index entries.
    pub async fn cancel(&self, token: &str) -> Result<(), AdminError> {
        self.store
            .delete_invitation(token)
            .await
            .map_err(not_found_as_invitation)
    }

    /// The signup-time check. A None return means "reject — show the
    /// invalid-invitation page", not a system failure: the token is unknown,
    /// already used, past due (transitioned to expired here), or the target
    /// user already exists.
    pub async fn validate_token(&self, token: &str) -> Result<Option<Invitation>, AdminError> {
        let invitation = match self.get_invitation(token).await? {
            Some(inv) => inv,
            None => return Ok(None),
        };

        match invitation.status {
            InvitationStatus::Used | InvitationStatus::Expired => return Ok(None),
            InvitationStatus::Pending => {}
        }

        if invitation.is_past_due(Utc::now()) {
            match self.store.mark_invitation_expired(token).await {
                Ok(()) | Err(StoreError::NotFound) => {}
                Err(e) => return Err(e.into()),
            }
            return Ok(None);
        }

        if self.store.user_exists(&invitation.email).await? {
            return Ok(None);
        }

        Ok(Some(invitation))
    }

    /// Delete the old invitation and issue a brand-new one with a fresh
    /// token and expiry, preserving email and role. The old token is dead
    /// the instant this runs, so the caller must deliver the new link —
    /// a user clicking the old link in that window sees an invalid
    /// invitation.
    pub async fn resend(&self, old_token: &str, resend_by: &str) -> Result<Invitation, AdminError> {
        let old = self
            .store
            .get_invitation(old_token)
            .await
            .map_err(not_found_as_invitation)?;

        match self.store.delete_invitation(old_token).await {
            Ok(()) | Err(StoreError::NotFound) => {}
            Err(e) => return Err(e.into()),
        }

        self.create_invitation(&old.email, old.role, resend_by).await
    }
}

fn not_found_as_invitation(e: StoreError) -> AdminError {
    match e {
        StoreError::NotFound => AdminError::NotFound("Invitation not found".to_string()),
        other => other.into(),
    }
}
