//! Fixed-window rate limiting over the shared store.
//!
//! Fixed windows admit burst-at-boundary behavior (up to twice the nominal
//! rate across a window edge); callers needing strict guarantees must choose
//! tighter windows. The read and the increment are separate store calls, so
//! concurrent checks near the boundary can exceed the limit by a small
//! margin.

use std::sync::Arc;

use atelier_storage::{RateLimitDecision, RateLimitQuota, Store, StoreError};

use crate::error::AdminError;

const GENERIC_LIMIT_MESSAGE: &str = "Too many attempts. Please try again later.";
const UNAVAILABLE_MESSAGE: &str = "Rate limiting is unavailable; please try again later.";

/// Fixed-window counters keyed by (action, identifier).
///
/// Store failures never block a legitimate action: the limiter logs and
/// allows. Deployments that prefer strict enforcement over availability can
/// invert this with the fail-closed flag.
pub struct RateLimiter {
    store: Arc<dyn Store>,
    fail_closed: bool,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn Store>, fail_closed: bool) -> Self {
        Self { store, fail_closed }
    }

    /// Check-then-increment. Counts the attempt unless the window is already
    /// exhausted.
    pub async fn check(
        &self,
        identifier: &str,
        action: &str,
        quota: &RateLimitQuota,
    ) -> RateLimitDecision {
        match self.check_inner(identifier, action, quota).await {
            Ok(decision) => decision,
            Err(e) => self.store_failure(identifier, action, quota, e),
        }
    }

    async fn check_inner(
        &self,
        identifier: &str,
        action: &str,
        quota: &RateLimitQuota,
    ) -> Result<RateLimitDecision, StoreError> {
        let count = self.store.get_counter(action, identifier).await?;
        if count >= quota.max_attempts {
            let reset_in = self.store.counter_ttl(action, identifier).await?;
            return Ok(RateLimitDecision::denied(reset_in, limit_message(quota)));
        }

        let new_count = self
            .store
            .incr_counter(action, identifier, quota.window)
            .await?;
        let reset_in = self.store.counter_ttl(action, identifier).await?;
        Ok(RateLimitDecision::allowed(
            quota.max_attempts.saturating_sub(new_count),
            reset_in,
        ))
    }

    /// The same computation without incrementing; a pure read for UI display.
    pub async fn status(
        &self,
        identifier: &str,
        action: &str,
        quota: &RateLimitQuota,
    ) -> RateLimitDecision {
        match self.status_inner(identifier, action, quota).await {
            Ok(decision) => decision,
            Err(e) => self.store_failure(identifier, action, quota, e),
        }
    }

    async fn status_inner(
        &self,
        identifier: &str,
        action: &str,
        quota: &RateLimitQuota,
    ) -> Result<RateLimitDecision, StoreError> {
        let count = self.store.get_counter(action, identifier).await?;
        let reset_in = self.store.counter_ttl(action, identifier).await?;
        if count >= quota.max_attempts {
            Ok(RateLimitDecision::denied(reset_in, limit_message(quota)))
        } else {
            Ok(RateLimitDecision::allowed(
                quota.max_attempts.saturating_sub(count),
                reset_in,
            ))
        }
    }

    /// Delete the counter outright (administrative override).
    pub async fn reset(&self, identifier: &str, action: &str) -> Result<(), AdminError> {
        Ok(self.store.reset_counter(action, identifier).await?)
    }

    fn store_failure(
        &self,
        identifier: &str,
        action: &str,
        quota: &RateLimitQuota,
        error: StoreError,
    ) -> RateLimitDecision {
        tracing::warn!(
            error = %error,
            action,
            identifier,
            fail_closed = self.fail_closed,
            "rate limit store access failed"
        );
        if self.fail_closed {
            RateLimitDecision::denied(None, UNAVAILABLE_MESSAGE.to_string())
        } else {
            RateLimitDecision::allowed(quota.max_attempts, None)
        }
    }
}

fn limit_message(quota: &RateLimitQuota) -> String {
    quota
        .message
        .clone()
        .unwrap_or_else(|| GENERIC_LIMIT_MESSAGE.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use atelier_store_memory::MemoryStore;
    use std::time::Duration;

    fn limiter() -> RateLimiter {
        RateLimiter::new(Arc::new(MemoryStore::new()), false)
    }

    fn quota(max: u64, window: Duration) -> RateLimitQuota {
        RateLimitQuota {
            max_attempts: max,
            window,
            message: None,
        }
    }

    #[tokio::test]
    async fn boundary_behavior() {
        let limiter = limiter();
        let quota = quota(3, Duration::from_secs(60));

        for expected_remaining in [2, 1, 0] {
            let decision = limiter.check("ada@example.com", "test_action", &quota).await;
            assert!(decision.allowed);
            assert_eq!(decision.remaining, expected_remaining);
            assert!(decision.reset_in.is_some());
        }

        let denied = limiter.check("ada@example.com", "test_action", &quota).await;
        assert!(!denied.allowed);
        assert_eq!(denied.remaining, 0);
        assert_eq!(denied.message.as_deref(), Some(GENERIC_LIMIT_MESSAGE));
    }

    #[tokio::test]
    async fn window_elapse_resets_counter() {
        let limiter = limiter();
        let quota = quota(2, Duration::from_millis(80));

        assert!(limiter.check("id", "act", &quota).await.allowed);
        assert!(limiter.check("id", "act", &quota).await.allowed);
        assert!(!limiter.check("id", "act", &quota).await.allowed);

        tokio::time::sleep(Duration::from_millis(120)).await;

        let decision = limiter.check("id", "act", &quota).await;
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 1);
    }

    #[tokio::test]
    async fn identifiers_are_isolated() {
        let limiter = limiter();
        let quota = quota(1, Duration::from_secs(60));

        assert!(limiter.check("a@example.com", "act", &quota).await.allowed);
        assert!(!limiter.check("a@example.com", "act", &quota).await.allowed);
        // A different identifier gets its own window
        assert!(limiter.check("b@example.com", "act", &quota).await.allowed);
        // As does a different action for the first identifier
        assert!(limiter.check("a@example.com", "other", &quota).await.allowed);
    }

    #[tokio::test]
    async fn status_does_not_count() {
        let limiter = limiter();
        let quota = quota(2, Duration::from_secs(60));

        for _ in 0..5 {
            let status = limiter.status("id", "act", &quota).await;
            assert!(status.allowed);
            assert_eq!(status.remaining, 2);
        }

        limiter.check("id", "act", &quota).await;
        let status = limiter.status("id", "act", &quota).await;
        assert_eq!(status.remaining, 1);
    }

    #[tokio::test]
    async fn reset_clears_the_window() {
        let limiter = limiter();
        let quota = quota(1, Duration::from_secs(60));

        assert!(limiter.check("id", "act", &quota).await.allowed);
        assert!(!limiter.check("id", "act", &quota).await.allowed);

        limiter.reset("id", "act").await.unwrap();
        assert!(limiter.check("id", "act", &quota).await.allowed);
    }

    #[tokio::test]
    async fn quota_message_is_surfaced() {
        let limiter = limiter();
        let quota = RateLimitQuota {
            max_attempts: 1,
            window: Duration::from_secs(60),
            message: Some("Too many invitations sent. Please try again later.".to_string()),
        };

        limiter.check("id", "act", &quota).await;
        let denied = limiter.check("id", "act", &quota).await;
        assert_eq!(
            denied.message.as_deref(),
            Some("Too many invitations sent. Please try again later.")
        );
    }

    mod failing_store {
        use super::*;
        use atelier_storage::{Invitation, Store, StoreError, User};
        use chrono::{DateTime, Utc};

        /// A store whose counter operations always fail.
        struct BrokenStore;

        #[async_trait::async_trait]
        impl Store for BrokenStore {
            async fn create_user(&self, _user: &User) -> Result<(), StoreError> {
                Err(StoreError::Backend("down".into()))
            }
            async fn get_user(&self, _email: &str) -> Result<User, StoreError> {
                Err(StoreError::Backend("down".into()))
            }
            async fn update_user(&self, _user: &User) -> Result<(), StoreError> {
                Err(StoreError::Backend("down".into()))
            }
            async fn delete_user(&self, _email: &str) -> Result<(), StoreError> {
                Err(StoreError::Backend("down".into()))
            }
            async fn user_exists(&self, _email: &str) -> Result<bool, StoreError> {
                Err(StoreError::Backend("down".into()))
            }
            async fn list_user_emails(&self) -> Result<Vec<String>, StoreError> {
                Err(StoreError::Backend("down".into()))
            }
            async fn user_count(&self) -> Result<u64, StoreError> {
                Err(StoreError::Backend("down".into()))
            }
            async fn create_invitation(&self, _invitation: &Invitation) -> Result<(), StoreError> {
                Err(StoreError::Backend("down".into()))
            }
            async fn get_invitation(&self, _token: &str) -> Result<Invitation, StoreError> {
                Err(StoreError::Backend("down".into()))
            }
            async fn pending_token_for_email(&self, _email: &str) -> Result<String, StoreError> {
                Err(StoreError::Backend("down".into()))
            }
            async fn list_pending_tokens(&self) -> Result<Vec<String>, StoreError> {
                Err(StoreError::Backend("down".into()))
            }
            async fn mark_invitation_used(
                &self,
                _token: &str,
                _used_at: DateTime<Utc>,
            ) -> Result<(), StoreError> {
                Err(StoreError::Backend("down".into()))
            }
            async fn mark_invitation_expired(&self, _token: &str) -> Result<(), StoreError> {
                Err(StoreError::Backend("down".into()))
            }
            async fn delete_invitation(&self, _token: &str) -> Result<(), StoreError> {
                Err(StoreError::Backend("down".into()))
            }
            async fn incr_counter(
                &self,
                _action: &str,
                _identifier: &str,
                _window: Duration,
            ) -> Result<u64, StoreError> {
                Err(StoreError::Backend("down".into()))
            }
            async fn get_counter(&self, _action: &str, _identifier: &str) -> Result<u64, StoreError> {
                Err(StoreError::Backend("down".into()))
            }
            async fn counter_ttl(
                &self,
                _action: &str,
                _identifier: &str,
            ) -> Result<Option<Duration>, StoreError> {
                Err(StoreError::Backend("down".into()))
            }
            async fn reset_counter(&self, _action: &str, _identifier: &str) -> Result<(), StoreError> {
                Err(StoreError::Backend("down".into()))
            }
        }

        #[tokio::test]
        async fn fail_open_allows_on_store_error() {
            let limiter = RateLimiter::new(Arc::new(BrokenStore), false);
            let quota = quota(3, Duration::from_secs(60));

            let decision = limiter.check("id", "act", &quota).await;
            assert!(decision.allowed);
            assert_eq!(decision.remaining, 3);
        }

        #[tokio::test]
        async fn fail_closed_denies_on_store_error() {
            let limiter = RateLimiter::new(Arc::new(BrokenStore), true);
            let quota = quota(3, Duration::from_secs(60));

            let decision = limiter.check("id", "act", &quota).await;
            assert!(!decision.allowed);
            assert_eq!(decision.message.as_deref(), Some(UNAVAILABLE_MESSAGE));
        }
    }
}
