//! Invitation types.

use std::str::FromStr;

use atelier_rbac::Role;
use chrono::{DateTime, Utc};

/// Lifecycle state of an invitation.
///
/// Pending is the only non-terminal state: it transitions to Used when the
/// invitee completes signup, or to Expired once its deadline passes (checked
/// lazily on read). Cancellation is a hard delete, not a state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InvitationStatus {
    Pending,
    Used,
    Expired,
}

/// Error type for parsing InvitationStatus from string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseInvitationStatusError(pub String);

impl std::fmt::Display for ParseInvitationStatusError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid invitation status: {}", self.0)
    }
}

impl std::error::Error for ParseInvitationStatusError {}

impl FromStr for InvitationStatus {
    type Err = ParseInvitationStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(InvitationStatus::Pending),
            "used" => Ok(InvitationStatus::Used),
            "expired" => Ok(InvitationStatus::Expired),
            _ => Err(ParseInvitationStatusError(s.to_string())),
        }
    }
}

impl InvitationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvitationStatus::Pending => "pending",
            InvitationStatus::Used => "used",
            InvitationStatus::Expired => "expired",
        }
    }
}

/// Invitation record, keyed by its token.
///
/// The token is a single-use bearer credential: holding it grants the ability
/// to complete signup as this email/role pair.
#[derive(Clone, Debug, PartialEq)]
pub struct Invitation {
    pub email: String,
    pub role: Role,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub status: InvitationStatus,
    pub used_at: Option<DateTime<Utc>>,
}

impl Invitation {
    /// Whether the deadline has passed, regardless of the stored status.
    pub fn is_past_due(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}
