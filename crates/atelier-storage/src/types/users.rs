//! User types.

use atelier_rbac::Role;
use chrono::{DateTime, Utc};

/// Back-office user record, keyed by email.
#[derive(Clone, Debug, PartialEq)]
pub struct User {
    pub email: String,
    pub name: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    /// Email of the admin whose invitation created this account.
    /// None for the bootstrapped master admin.
    pub invited_by: Option<String>,
    pub last_sign_in: Option<DateTime<Utc>>,
}
