//! Rate limiting types.

use std::time::Duration;

/// Fixed-window admission policy for one class of action.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RateLimitQuota {
    pub max_attempts: u64,
    pub window: Duration,
    /// Shown to the caller when the limit is hit; a generic message is
    /// used when absent.
    pub message: Option<String>,
}

impl RateLimitQuota {
    /// Invitation creation: 10 per hour per user.
    pub fn invitation_create() -> Self {
        Self {
            max_attempts: 10,
            window: Duration::from_secs(3600),
            message: Some("Too many invitations sent. Please try again later.".to_string()),
        }
    }

    /// User deletion: 20 per hour per user.
    pub fn user_delete() -> Self {
        Self {
            max_attempts: 20,
            window: Duration::from_secs(3600),
            message: Some("Too many user deletions. Please try again later.".to_string()),
        }
    }
}

/// Outcome of a rate-limit check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    /// Attempts left in the current window after this check.
    pub remaining: u64,
    /// Time until the window resets; None when no window is open.
    pub reset_in: Option<Duration>,
    pub message: Option<String>,
}

impl RateLimitDecision {
    pub fn allowed(remaining: u64, reset_in: Option<Duration>) -> Self {
        Self {
            allowed: true,
            remaining,
            reset_in,
            message: None,
        }
    }

    pub fn denied(reset_in: Option<Duration>, message: String) -> Self {
        Self {
            allowed: false,
            remaining: 0,
            reset_in,
            message: Some(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preconfigured_quotas() {
        let invite = RateLimitQuota::invitation_create();
        assert_eq!(invite.max_attempts, 10);
        assert_eq!(invite.window, Duration::from_secs(3600));
        assert!(invite.message.is_some());

        let delete = RateLimitQuota::user_delete();
        assert_eq!(delete.max_attempts, 20);
        assert_eq!(delete.window, Duration::from_secs(3600));
    }

    #[test]
    fn test_decision_constructors() {
        let ok = RateLimitDecision::allowed(3, Some(Duration::from_secs(10)));
        assert!(ok.allowed);
        assert_eq!(ok.remaining, 3);
        assert!(ok.message.is_none());

        let no = RateLimitDecision::denied(None, "slow down".to_string());
        assert!(!no.allowed);
        assert_eq!(no.remaining, 0);
        assert_eq!(no.message.as_deref(), Some("slow down"));
    }
}
