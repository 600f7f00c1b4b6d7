//! Back-office services for the Atelier storefront.
//!
//! This crate composes the store and audit-log backends into the services the
//! admin surface calls: the user directory, the invitation manager, the rate
//! limiter, the audit recorder, and the [`AdminBackend`] facade that gates
//! every mutating operation behind a session + permission check.

mod admin;
mod audit;
mod config;
mod error;
mod invitations;
mod ratelimit;
mod session;
mod users;
mod validate;

pub use admin::{ActionResult, AdminBackend, ACTION_CREATE_INVITATION, ACTION_DELETE_USER};
pub use audit::AuditRecorder;
pub use config::{AdminConfig, ConfigError, DEFAULT_INVITATION_EXPIRY_DAYS};
pub use error::AdminError;
pub use invitations::InvitationManager;
pub use ratelimit::RateLimiter;
pub use session::{Actor, Session, StaticSession};
pub use users::UserDirectory;
