//! Service-layer error taxonomy.
//!
//! Every rejection carries a short, specific message because these messages
//! are shown directly in the administrative UI.

use atelier_audit::AuditLogError;
use atelier_storage::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdminError {
    /// Malformed or missing input; checked before any store access.
    #[error("{0}")]
    Validation(String),

    /// A uniqueness invariant would be violated.
    #[error("{0}")]
    Conflict(String),

    /// The referenced entity does not exist at mutation time. A normal,
    /// expected outcome for stale-UI scenarios.
    #[error("{0}")]
    NotFound(String),

    /// The action is structurally disallowed regardless of input validity.
    #[error("{0}")]
    Policy(String),

    /// The caller is not signed in or lacks the required permission.
    /// Checked before all other validation, so no side effect occurs.
    #[error("{0}")]
    Unauthorized(String),

    /// The underlying store is unreachable or errored. Propagated for
    /// directory and invitation mutations; the rate limiter and audit
    /// recorder convert it to a fail-open outcome instead.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    #[error("audit log error: {0}")]
    Audit(#[from] AuditLogError),
}
