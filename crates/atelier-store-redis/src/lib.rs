//! Redis backend for the Atelier store and audit log.
//!
//! Key layout:
//! - `user:{email}` hash, `users:all` set of emails
//! - `invitation:{token}` hash, `invitation:email:{email}` string → token,
//!   `invitations:pending` set of tokens
//! - `ratelimit:{action}:{identifier}` string counter with TTL
//! - `auditlog:{id}` JSON string with TTL; `auditlogs:{category}`,
//!   `auditlogs:user:{email}`, `auditlogs:all` sorted sets of ids scored by
//!   epoch-millis, each with the retention TTL
//!
//! Each method keeps the primary record and its indices consistent, but the
//! writes are independent per-key commands; there is no cross-key atomicity.

mod codec;

use std::time::Duration;

use chrono::{DateTime, Utc};
use redis::{
    aio::{ConnectionManager, ConnectionManagerConfig},
    AsyncCommands, Client,
};

use atelier_audit::{AuditEvent, AuditLog, AuditLogError, AuditQuery};
use atelier_storage::{Invitation, InvitationStatus, Store, StoreError, User};

/// Redis-backed implementation of [`Store`] and [`AuditLog`].
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

fn backend_err(e: redis::RedisError) -> StoreError {
    StoreError::Backend(e.to_string())
}

fn audit_err(e: redis::RedisError) -> AuditLogError {
    AuditLogError::Backend(e.to_string())
}

// ───────────────────────────────────── Keys ───────────────────────────────────────

fn user_key(email: &str) -> String {
    format!("user:{}", email)
}

const USERS_ALL: &str = "users:all";

fn invitation_key(token: &str) -> String {
    format!("invitation:{}", token)
}

fn invitation_email_key(email: &str) -> String {
    format!("invitation:email:{}", email)
}

const INVITATIONS_PENDING: &str = "invitations:pending";

fn ratelimit_key(action: &str, identifier: &str) -> String {
    format!("ratelimit:{}:{}", action, identifier)
}

fn auditlog_key(id: &str) -> String {
    format!("auditlog:{}", id)
}

fn audit_category_index(category: &str) -> String {
    format!("auditlogs:{}", category)
}

fn audit_user_index(email: &str) -> String {
    format!("auditlogs:user:{}", email)
}

const AUDITLOGS_ALL: &str = "auditlogs:all";

impl RedisStore {
    /// Connect with retry and connection-timeout defaults.
    pub async fn connect(redis_url: &str) -> Result<Self, StoreError> {
        let config = ConnectionManagerConfig::new()
            .set_number_of_retries(3)
            .set_connection_timeout(Duration::from_secs(5));

        let client = Client::open(redis_url).map_err(backend_err)?;
        let conn = client
            .get_connection_manager_with_config(config)
            .await
            .map_err(backend_err)?;

        Ok(Self { conn })
    }

    fn conn(&self) -> ConnectionManager {
        self.conn.clone()
    }

    async fn read_invitation(&self, token: &str) -> Result<Invitation, StoreError> {
        let mut conn = self.conn();
        let fields: std::collections::HashMap<String, String> =
            conn.hgetall(invitation_key(token)).await.map_err(backend_err)?;
        if fields.is_empty() {
            return Err(StoreError::NotFound);
        }
        codec::invitation_from_hash(&fields)
    }

    /// Drop an invitation from the pending index and clear the email reverse
    /// index when it still points at this token (stale entries self-heal).
    async fn clear_pending_entries(&self, token: &str, email: &str) -> Result<(), StoreError> {
        let mut conn = self.conn();
        let _: () = conn
            .srem(INVITATIONS_PENDING, token)
            .await
            .map_err(backend_err)?;
        let current: Option<String> = conn
            .get(invitation_email_key(email))
            .await
            .map_err(backend_err)?;
        if current.as_deref() == Some(token) {
            let _: () = conn
                .del(invitation_email_key(email))
                .await
                .map_err(backend_err)?;
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Store for RedisStore {
    // ───────────────────────────────────── Users ──────────────────────────────────────────

    async fn create_user(&self, user: &User) -> Result<(), StoreError> {
        let mut conn = self.conn();
        let fields = codec::user_to_hash(user);
        let _: () = conn
            .hset_multiple(user_key(&user.email), &fields)
            .await
            .map_err(backend_err)?;
        let _: () = conn
            .sadd(USERS_ALL, &user.email)
            .await
            .map_err(backend_err)?;
        Ok(())
    }

    async fn get_user(&self, email: &str) -> Result<User, StoreError> {
        let mut conn = self.conn();
        let fields: std::collections::HashMap<String, String> =
            conn.hgetall(user_key(email)).await.map_err(backend_err)?;
        if fields.is_empty() {
            return Err(StoreError::NotFound);
        }
        codec::user_from_hash(&fields)
    }

    async fn update_user(&self, user: &User) -> Result<(), StoreError> {
        // A user hash never shrinks on update (every optional field, once
        // set, stays set or is overwritten), so a plain rewrite suffices.
        self.create_user(user).await
    }

    async fn delete_user(&self, email: &str) -> Result<(), StoreError> {
        let mut conn = self.conn();
        let deleted: i64 = conn.del(user_key(email)).await.map_err(backend_err)?;
        let _: () = conn.srem(USERS_ALL, email).await.map_err(backend_err)?;
        if deleted == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn user_exists(&self, email: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn();
        conn.exists(user_key(email)).await.map_err(backend_err)
    }

    async fn list_user_emails(&self) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn();
        conn.smembers(USERS_ALL).await.map_err(backend_err)
    }

    async fn user_count(&self) -> Result<u64, StoreError> {
        let mut conn = self.conn();
        let count: i64 = conn.scard(USERS_ALL).await.map_err(backend_err)?;
        Ok(count.max(0) as u64)
    }

    // ───────────────────────────────────── Invitations ────────────────────────────────────

    async fn create_invitation(&self, invitation: &Invitation) -> Result<(), StoreError> {
        let mut conn = self.conn();
        let fields = codec::invitation_to_hash(invitation);
        let _: () = conn
            .hset_multiple(invitation_key(&invitation.token), &fields)
            .await
            .map_err(backend_err)?;
        let _: () = conn
            .sadd(INVITATIONS_PENDING, &invitation.token)
            .await
            .map_err(backend_err)?;
        let _: () = conn
            .set(invitation_email_key(&invitation.email), &invitation.token)
            .await
            .map_err(backend_err)?;
        Ok(())
    }

    async fn get_invitation(&self, token: &str) -> Result<Invitation, StoreError> {
        self.read_invitation(token).await
    }

    async fn pending_token_for_email(&self, email: &str) -> Result<String, StoreError> {
        let mut conn = self.conn();
        let token: Option<String> = conn
            .get(invitation_email_key(email))
            .await
            .map_err(backend_err)?;
        token.ok_or(StoreError::NotFound)
    }

    async fn list_pending_tokens(&self) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn();
        conn.smembers(INVITATIONS_PENDING).await.map_err(backend_err)
    }

    async fn mark_invitation_used(
        &self,
        token: &str,
        used_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let invitation = self.read_invitation(token).await?;
        let mut conn = self.conn();
        let _: () = conn
            .hset_multiple(
                invitation_key(token),
                &[
                    ("status", InvitationStatus::Used.as_str().to_string()),
                    ("used_at", used_at.to_rfc3339()),
                ],
            )
            .await
            .map_err(backend_err)?;
        self.clear_pending_entries(token, &invitation.email).await
    }

    async fn mark_invitation_expired(&self, token: &str) -> Result<(), StoreError> {
        let invitation = self.read_invitation(token).await?;
        let mut conn = self.conn();
        let _: () = conn
            .hset(
                invitation_key(token),
                "status",
                InvitationStatus::Expired.as_str(),
            )
            .await
            .map_err(backend_err)?;
        self.clear_pending_entries(token, &invitation.email).await
    }

    async fn delete_invitation(&self, token: &str) -> Result<(), StoreError> {
        let invitation = self.read_invitation(token).await?;
        let mut conn = self.conn();
        let _: () = conn.del(invitation_key(token)).await.map_err(backend_err)?;
        self.clear_pending_entries(token, &invitation.email).await
    }

    // ───────────────────────────────────── Counters ───────────────────────────────────────

    async fn incr_counter(
        &self,
        action: &str,
        identifier: &str,
        window: Duration,
    ) -> Result<u64, StoreError> {
        let mut conn = self.conn();
        let key = ratelimit_key(action, identifier);
        let count: i64 = conn.incr(&key, 1).await.map_err(backend_err)?;
        if count == 1 {
            let secs = window.as_secs().max(1) as i64;
            let _: () = conn.expire(&key, secs).await.map_err(backend_err)?;
        }
        Ok(count.max(0) as u64)
    }

    async fn get_counter(&self, action: &str, identifier: &str) -> Result<u64, StoreError> {
        let mut conn = self.conn();
        let count: Option<i64> = conn
            .get(ratelimit_key(action, identifier))
            .await
            .map_err(backend_err)?;
        Ok(count.unwrap_or(0).max(0) as u64)
    }

    async fn counter_ttl(
        &self,
        action: &str,
        identifier: &str,
    ) -> Result<Option<Duration>, StoreError> {
        let mut conn = self.conn();
        let ttl: i64 = conn
            .ttl(ratelimit_key(action, identifier))
            .await
            .map_err(backend_err)?;
        // -2: key missing, -1: no expiry set
        if ttl > 0 {
            Ok(Some(Duration::from_secs(ttl as u64)))
        } else {
            Ok(None)
        }
    }

    async fn reset_counter(&self, action: &str, identifier: &str) -> Result<(), StoreError> {
        let mut conn = self.conn();
        let _: () = conn
            .del(ratelimit_key(action, identifier))
            .await
            .map_err(backend_err)?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl AuditLog for RedisStore {
    async fn record(&self, event: &AuditEvent) -> Result<(), AuditLogError> {
        let json = serde_json::to_string(event).map_err(|e| AuditLogError::Backend(e.to_string()))?;
        let retention_secs = atelier_audit::retention().as_secs();
        let score = event.timestamp.timestamp_millis();

        let mut conn = self.conn();
        let _: () = conn
            .set_ex(auditlog_key(&event.id), json, retention_secs)
            .await
            .map_err(audit_err)?;

        let indices = [
            audit_category_index(event.category.as_str()),
            audit_user_index(&event.performed_by),
            AUDITLOGS_ALL.to_string(),
        ];
        for index in &indices {
            let _: () = conn
                .zadd(index, &event.id, score)
                .await
                .map_err(audit_err)?;
            let _: () = conn
                .expire(index, retention_secs as i64)
                .await
                .map_err(audit_err)?;
        }
        Ok(())
    }

    async fn query(&self, query: AuditQuery) -> Result<Vec<AuditEvent>, AuditLogError> {
        let limit = query.capped_limit();
        if limit == 0 {
            return Ok(Vec::new());
        }

        // One index per query, most specific wins.
        let index = match (&query.performed_by, &query.category) {
            (Some(email), _) => audit_user_index(email),
            (None, Some(category)) => audit_category_index(category.as_str()),
            (None, None) => AUDITLOGS_ALL.to_string(),
        };

        let mut conn = self.conn();
        let ids: Vec<String> = conn
            .zrevrange(index, 0, limit as isize - 1)
            .await
            .map_err(audit_err)?;

        let mut events = Vec::with_capacity(ids.len());
        for id in ids {
            let json: Option<String> = conn.get(auditlog_key(&id)).await.map_err(audit_err)?;
            // Records can outlive index entries (and vice versa); skip holes.
            if let Some(json) = json {
                if let Ok(event) = serde_json::from_str::<AuditEvent>(&json) {
                    events.push(event);
                }
            }
        }
        Ok(events)
    }

    async fn prune(&self, cutoff: DateTime<Utc>) -> Result<u64, AuditLogError> {
        let cutoff_millis = cutoff.timestamp_millis();
        let mut conn = self.conn();

        let ids: Vec<String> = conn
            .zrangebyscore(AUDITLOGS_ALL, "-inf", cutoff_millis)
            .await
            .map_err(audit_err)?;
        for id in &ids {
            let _: () = conn.del(auditlog_key(id)).await.map_err(audit_err)?;
        }
        let _: () = conn
            .zrembyscore(AUDITLOGS_ALL, "-inf", cutoff_millis)
            .await
            .map_err(audit_err)?;

        Ok(ids.len() as u64)
    }
}
