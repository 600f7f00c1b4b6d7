//! In-memory backend for the Atelier store and audit log.
//!
//! Mirrors the Redis backend's semantics (separate record/index tables,
//! lazily-expired counters, skip-on-missing audit resolution) so service
//! tests exercise the same behavior without a running server.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use atelier_audit::{AuditEvent, AuditLog, AuditLogError, AuditQuery};
use atelier_storage::{Invitation, InvitationStatus, Store, StoreError, User};

struct Counter {
    count: u64,
    expires_at: Instant,
}

#[derive(Default)]
struct Inner {
    users: HashMap<String, User>,
    user_index: HashSet<String>,
    invitations: HashMap<String, Invitation>,
    pending_tokens: HashSet<String>,
    email_tokens: HashMap<String, String>,
    counters: HashMap<String, Counter>,
    audit_events: HashMap<String, AuditEvent>,
    /// Index key → (epoch-millis score, event id) entries.
    audit_indices: HashMap<String, Vec<(i64, String)>>,
}

/// In-memory implementation of [`Store`] and [`AuditLog`].
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

fn counter_key(action: &str, identifier: &str) -> String {
    format!("{}:{}", action, identifier)
}

const AUDIT_ALL: &str = "all";

fn audit_category_index(category: &str) -> String {
    format!("category:{}", category)
}

fn audit_user_index(email: &str) -> String {
    format!("user:{}", email)
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn clear_pending_entries(inner: &mut Inner, token: &str, email: &str) {
        inner.pending_tokens.remove(token);
        if inner.email_tokens.get(email).map(String::as_str) == Some(token) {
            inner.email_tokens.remove(email);
        }
    }
}

#[async_trait::async_trait]
impl Store for MemoryStore {
    // ───────────────────────────────────── Users ──────────────────────────────────────────

    async fn create_user(&self, user: &User) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        inner.users.insert(user.email.clone(), user.clone());
        inner.user_index.insert(user.email.clone());
        Ok(())
    }

    async fn get_user(&self, email: &str) -> Result<User, StoreError> {
        let inner = self.inner.lock().await;
        inner.users.get(email).cloned().ok_or(StoreError::NotFound)
    }

    async fn update_user(&self, user: &User) -> Result<(), StoreError> {
        self.create_user(user).await
    }

    async fn delete_user(&self, email: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        let removed = inner.users.remove(email).is_some();
        inner.user_index.remove(email);
        if !removed {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn user_exists(&self, email: &str) -> Result<bool, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.users.contains_key(email))
    }

    async fn list_user_emails(&self) -> Result<Vec<String>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.user_index.iter().cloned().collect())
    }

    async fn user_count(&self) -> Result<u64, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.user_index.len() as u64)
    }

    // ───────────────────────────────────── Invitations ────────────────────────────────────

    async fn create_invitation(&self, invitation: &Invitation) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        inner
            .invitations
            .insert(invitation.token.clone(), invitation.clone());
        inner.pending_tokens.insert(invitation.token.clone());
        inner
            .email_tokens
            .insert(invitation.email.clone(), invitation.token.clone());
        Ok(())
    }

    async fn get_invitation(&self, token: &str) -> Result<Invitation, StoreError> {
        let inner = self.inner.lock().await;
        inner
            .invitations
            .get(token)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn pending_token_for_email(&self, email: &str) -> Result<String, StoreError> {
        let inner = self.inner.lock().await;
        inner
            .email_tokens
            .get(email)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn list_pending_tokens(&self) -> Result<Vec<String>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.pending_tokens.iter().cloned().collect())
    }

    async fn mark_invitation_used(
        &self,
        token: &str,
        used_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        let email = {
            let invitation = inner.invitations.get_mut(token).ok_or(StoreError::NotFound)?;
            invitation.status = InvitationStatus::Used;
            invitation.used_at = Some(used_at);
            invitation.email.clone()
        };
        Self::clear_pending_entries(&mut inner, token, &email);
        Ok(())
    }

    async fn mark_invitation_expired(&self, token: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        let email = {
            let invitation = inner.invitations.get_mut(token).ok_or(StoreError::NotFound)?;
            invitation.status = InvitationStatus::Expired;
            invitation.email.clone()
        };
        Self::clear_pending_entries(&mut inner, token, &email);
        Ok(())
    }

    async fn delete_invitation(&self, token: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        let invitation = inner.invitations.remove(token).ok_or(StoreError::NotFound)?;
        Self::clear_pending_entries(&mut inner, token, &invitation.email);
        Ok(())
    }

    // ───────────────────────────────────── Counters ───────────────────────────────────────

    async fn incr_counter(
        &self,
        action: &str,
        identifier: &str,
        window: Duration,
    ) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock().await;
        let key = counter_key(action, identifier);
        let now = Instant::now();
        match inner.counters.get_mut(&key) {
            Some(counter) if counter.expires_at > now => {
                counter.count += 1;
                Ok(counter.count)
            }
            _ => {
                inner.counters.insert(
                    key,
                    Counter {
                        count: 1,
                        expires_at: now + window,
                    },
                );
                Ok(1)
            }
        }
    }

    async fn get_counter(&self, action: &str, identifier: &str) -> Result<u64, StoreError> {
        let inner = self.inner.lock().await;
        let now = Instant::now();
        Ok(inner
            .counters
            .get(&counter_key(action, identifier))
            .filter(|c| c.expires_at > now)
            .map(|c| c.count)
            .unwrap_or(0))
    }

    async fn counter_ttl(
        &self,
        action: &str,
        identifier: &str,
    ) -> Result<Option<Duration>, StoreError> {
        let inner = self.inner.lock().await;
        let now = Instant::now();
        Ok(inner
            .counters
            .get(&counter_key(action, identifier))
            .filter(|c| c.expires_at > now)
            .map(|c| c.expires_at - now))
    }

    async fn reset_counter(&self, action: &str, identifier: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        inner.counters.remove(&counter_key(action, identifier));
        Ok(())
    }
}

#[async_trait::async_trait]
impl AuditLog for MemoryStore {
    async fn record(&self, event: &AuditEvent) -> Result<(), AuditLogError> {
        let mut inner = self.inner.lock().await;
        let score = event.timestamp.timestamp_millis();
        inner
            .audit_events
            .insert(event.id.clone(), event.clone());
        for index in [
            AUDIT_ALL.to_string(),
            audit_category_index(event.category.as_str()),
            audit_user_index(&event.performed_by),
        ] {
            inner
                .audit_indices
                .entry(index)
                .or_default()
                .push((score, event.id.clone()));
        }
        Ok(())
    }

    async fn query(&self, query: AuditQuery) -> Result<Vec<AuditEvent>, AuditLogError> {
        let limit = query.capped_limit();
        if limit == 0 {
            return Ok(Vec::new());
        }

        let index = match (&query.performed_by, &query.category) {
            (Some(email), _) => audit_user_index(email),
            (None, Some(category)) => audit_category_index(category.as_str()),
            (None, None) => AUDIT_ALL.to_string(),
        };

        let inner = self.inner.lock().await;
        let entries = inner
            .audit_indices
            .get(&index)
            .cloned()
            .unwrap_or_default();

        // Entries are appended in timestamp order, so newest-first is a
        // reverse walk; this also keeps same-millisecond events stable.
        Ok(entries
            .into_iter()
            .rev()
            .filter_map(|(_, id)| inner.audit_events.get(&id).cloned())
            .take(limit)
            .collect())
    }

    async fn prune(&self, cutoff: DateTime<Utc>) -> Result<u64, AuditLogError> {
        let cutoff_millis = cutoff.timestamp_millis();
        let mut inner = self.inner.lock().await;

        let expired: Vec<String> = inner
            .audit_indices
            .get(AUDIT_ALL)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|(score, _)| *score <= cutoff_millis)
                    .map(|(_, id)| id.clone())
                    .collect()
            })
            .unwrap_or_default();

        for id in &expired {
            inner.audit_events.remove(id);
        }
        if let Some(entries) = inner.audit_indices.get_mut(AUDIT_ALL) {
            entries.retain(|(score, _)| *score > cutoff_millis);
        }

        Ok(expired.len() as u64)
    }
}
