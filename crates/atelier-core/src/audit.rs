//! Best-effort audit recording and bounded retrieval.

use std::sync::Arc;

use atelier_audit::{
    AuditAction, AuditCategory, AuditEvent, AuditEventBuilder, AuditLog, AuditQuery,
    MAX_QUERY_LIMIT,
};
use chrono::{Duration, Utc};

use crate::error::AdminError;

/// Wraps the audit sink so a logging failure never aborts the operation
/// being audited: the constructed event is returned either way.
pub struct AuditRecorder {
    log: Arc<dyn AuditLog>,
}

impl AuditRecorder {
    pub fn new(log: Arc<dyn AuditLog>) -> Self {
        Self { log }
    }

    /// Record an event, best effort. Failures are logged to the side channel
    /// and swallowed.
    pub async fn record(&self, event: AuditEvent) -> AuditEvent {
        if let Err(e) = self.log.record(&event).await {
            tracing::warn!(
                error = %e,
                action = %event.action,
                performed_by = %event.performed_by,
                "failed to record audit event"
            );
        }
        event
    }

    /// Record under the user-management category.
    pub async fn log_user_action(&self, builder: AuditEventBuilder) -> AuditEvent {
        self.record(builder.category(AuditCategory::User).build()).await
    }

    /// Record under the invitation category.
    pub async fn log_invitation_action(&self, builder: AuditEventBuilder) -> AuditEvent {
        self.record(builder.category(AuditCategory::Invitation).build())
            .await
    }

    /// Record under the auth category.
    pub async fn log_auth_action(&self, builder: AuditEventBuilder) -> AuditEvent {
        self.record(builder.category(AuditCategory::Auth).build()).await
    }

    /// Most recent events, newest first, from the most specific applicable
    /// index (performer > category > global). Limit is capped at
    /// [`MAX_QUERY_LIMIT`].
    pub async fn recent(
        &self,
        limit: usize,
        category: Option<AuditCategory>,
        performed_by: Option<&str>,
    ) -> Result<Vec<AuditEvent>, AdminError> {
        let mut query = AuditQuery::new(limit);
        if let Some(category) = category {
            query = query.category(category);
        }
        if let Some(email) = performed_by {
            query = query.performed_by(email);
        }
        Ok(self.log.query(query).await?)
    }

    /// Scan the most recent [`MAX_QUERY_LIMIT`] events and filter by action.
    /// Bounded, not a scalable query path.
    pub async fn by_action(
        &self,
        action: AuditAction,
        limit: usize,
    ) -> Result<Vec<AuditEvent>, AdminError> {
        let events = self.recent(MAX_QUERY_LIMIT, None, None).await?;
        Ok(events
            .into_iter()
            .filter(|e| e.action == action)
            .take(limit)
            .collect())
    }

    /// Scan the most recent [`MAX_QUERY_LIMIT`] events and filter by
    /// resource. Bounded, not a scalable query path.
    pub async fn by_resource(
        &self,
        resource: &str,
        limit: usize,
    ) -> Result<Vec<AuditEvent>, AdminError> {
        let events = self.recent(MAX_QUERY_LIMIT, None, None).await?;
        Ok(events
            .into_iter()
            .filter(|e| e.resource == resource)
            .take(limit)
            .collect())
    }

    /// Immediate cleanup of entries older than the given age. Redundant with
    /// TTL-based expiry; returns the number of deleted records.
    pub async fn cleanup_older_than(&self, days: i64) -> Result<u64, AdminError> {
        let cutoff = Utc::now() - Duration::days(days);
        Ok(self.log.prune(cutoff).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atelier_audit::{AuditLogError, AuditOutcome};
    use atelier_rbac::Role;
    use atelier_store_memory::MemoryStore;

    fn recorder() -> AuditRecorder {
        AuditRecorder::new(Arc::new(MemoryStore::new()))
    }

    fn builder(action: AuditAction) -> atelier_audit::AuditEventBuilder {
        AuditEvent::builder("admin@example.com", Role::Admin, action)
    }

    #[tokio::test]
    async fn wrappers_fix_the_category() {
        let recorder = recorder();

        let event = recorder
            .log_user_action(builder(AuditAction::UserDelete).resource("x@example.com"))
            .await;
        assert_eq!(event.category, AuditCategory::User);

        let event = recorder
            .log_invitation_action(builder(AuditAction::InvitationCreate).resource("x@example.com"))
            .await;
        assert_eq!(event.category, AuditCategory::Invitation);

        let event = recorder
            .log_auth_action(builder(AuditAction::SignIn).resource("x@example.com"))
            .await;
        assert_eq!(event.category, AuditCategory::Auth);
    }

    #[tokio::test]
    async fn retrieval_is_descending_by_timestamp() {
        let recorder = recorder();
        for _ in 0..6 {
            recorder
                .log_user_action(builder(AuditAction::UserCreate).resource("x@example.com"))
                .await;
        }

        let events = recorder
            .recent(6, None, Some("admin@example.com"))
            .await
            .unwrap();
        assert_eq!(events.len(), 6);
        for pair in events.windows(2) {
            assert!(pair[0].timestamp >= pair[1].timestamp);
        }
    }

    #[tokio::test]
    async fn by_action_and_by_resource_filter() {
        let recorder = recorder();
        recorder
            .log_user_action(builder(AuditAction::UserCreate).resource("a@example.com"))
            .await;
        recorder
            .log_user_action(builder(AuditAction::UserDelete).resource("b@example.com"))
            .await;
        recorder
            .log_user_action(builder(AuditAction::UserDelete).resource("c@example.com"))
            .await;

        let deletes = recorder.by_action(AuditAction::UserDelete, 10).await.unwrap();
        assert_eq!(deletes.len(), 2);
        assert!(deletes.iter().all(|e| e.action == AuditAction::UserDelete));

        let for_b = recorder.by_resource("b@example.com", 10).await.unwrap();
        assert_eq!(for_b.len(), 1);
        assert_eq!(for_b[0].resource, "b@example.com");
    }

    #[tokio::test]
    async fn cleanup_removes_everything_older_than_now() {
        let recorder = recorder();
        recorder
            .log_user_action(builder(AuditAction::UserCreate).resource("a@example.com"))
            .await;
        // A negative age pushes the cutoff into the future
        let removed = recorder.cleanup_older_than(-1).await.unwrap();
        assert_eq!(removed, 1);
        assert!(recorder.recent(10, None, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn sink_failure_still_returns_the_event() {
        struct BrokenSink;

        #[async_trait::async_trait]
        impl AuditLog for BrokenSink {
            async fn record(&self, _event: &AuditEvent) -> Result<(), AuditLogError> {
                Err(AuditLogError::Backend("down".into()))
            }
            async fn query(&self, _query: AuditQuery) -> Result<Vec<AuditEvent>, AuditLogError> {
                Err(AuditLogError::Backend("down".into()))
            }
            async fn prune(
                &self,
                _cutoff: chrono::DateTime<Utc>,
            ) -> Result<u64, AuditLogError> {
                Err(AuditLogError::Backend("down".into()))
            }
        }

        let recorder = AuditRecorder::new(Arc::new(BrokenSink));
        let event = recorder
            .log_user_action(builder(AuditAction::UserCreate).resource("a@example.com"))
            .await;
        // The unpersisted event is still handed back to the caller
        assert_eq!(event.action, AuditAction::UserCreate);
        assert_eq!(event.outcome, AuditOutcome::Success);
    }
}
