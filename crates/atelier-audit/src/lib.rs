//! Audit logging abstraction for the Atelier back office.
//!
//! This crate defines the `AuditLog` trait for persisting audit events
//! and the types representing auditable administrative actions.

use async_trait::async_trait;
use atelier_rbac::Role;
use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Audit records are retained for a bounded compliance window.
pub const RETENTION_DAYS: i64 = 90;

/// Hard cap on how many entries a single query may return.
pub const MAX_QUERY_LIMIT: usize = 100;

/// Retention window as a std Duration (for backends that set TTLs).
pub fn retention() -> std::time::Duration {
    std::time::Duration::from_secs(RETENTION_DAYS as u64 * 24 * 3600)
}

/// Auditable administrative actions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    // User management
    UserCreate,
    UserRoleUpdate,
    UserNameUpdate,
    UserDelete,

    // Invitation lifecycle
    InvitationCreate,
    InvitationResend,
    InvitationCancel,
    InvitationUsed,

    // Authentication
    SignIn,
    SignupComplete,

    // Rental products
    ProductCreate,
    ProductUpdate,
    ProductDelete,

    // Site settings
    SettingsUpdate,
}

impl AuditAction {
    /// The category this action is indexed under.
    pub fn category(&self) -> AuditCategory {
        match self {
            AuditAction::UserCreate
            | AuditAction::UserRoleUpdate
            | AuditAction::UserNameUpdate
            | AuditAction::UserDelete => AuditCategory::User,
            AuditAction::InvitationCreate
            | AuditAction::InvitationResend
            | AuditAction::InvitationCancel
            | AuditAction::InvitationUsed => AuditCategory::Invitation,
            AuditAction::SignIn | AuditAction::SignupComplete => AuditCategory::Auth,
            AuditAction::ProductCreate
            | AuditAction::ProductUpdate
            | AuditAction::ProductDelete => AuditCategory::Product,
            AuditAction::SettingsUpdate => AuditCategory::Settings,
        }
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AuditAction::UserCreate => "user.create",
            AuditAction::UserRoleUpdate => "user.update_role",
            AuditAction::UserNameUpdate => "user.update_name",
            AuditAction::UserDelete => "user.delete",
            AuditAction::InvitationCreate => "invitation.create",
            AuditAction::InvitationResend => "invitation.resend",
            AuditAction::InvitationCancel => "invitation.cancel",
            AuditAction::InvitationUsed => "invitation.used",
            AuditAction::SignIn => "auth.sign_in",
            AuditAction::SignupComplete => "auth.signup_complete",
            AuditAction::ProductCreate => "product.create",
            AuditAction::ProductUpdate => "product.update",
            AuditAction::ProductDelete => "product.delete",
            AuditAction::SettingsUpdate => "settings.update",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for AuditAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user.create" => Ok(AuditAction::UserCreate),
            "user.update_role" => Ok(AuditAction::UserRoleUpdate),
            "user.update_name" => Ok(AuditAction::UserNameUpdate),
            "user.delete" => Ok(AuditAction::UserDelete),
            "invitation.create" => Ok(AuditAction::InvitationCreate),
            "invitation.resend" => Ok(AuditAction::InvitationResend),
            "invitation.cancel" => Ok(AuditAction::InvitationCancel),
            "invitation.used" => Ok(AuditAction::InvitationUsed),
            "auth.sign_in" => Ok(AuditAction::SignIn),
            "auth.signup_complete" => Ok(AuditAction::SignupComplete),
            "product.create" => Ok(AuditAction::ProductCreate),
            "product.update" => Ok(AuditAction::ProductUpdate),
            "product.delete" => Ok(AuditAction::ProductDelete),
            "settings.update" => Ok(AuditAction::SettingsUpdate),
            _ => Err(format!("Unknown audit action: {}", s)),
        }
    }
}

/// Category grouping used by the per-category index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditCategory {
    User,
    Invitation,
    Auth,
    Product,
    Settings,
}

impl AuditCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditCategory::User => "user",
            AuditCategory::Invitation => "invitation",
            AuditCategory::Auth => "auth",
            AuditCategory::Product => "product",
            AuditCategory::Settings => "settings",
        }
    }
}

impl std::fmt::Display for AuditCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AuditCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(AuditCategory::User),
            "invitation" => Ok(AuditCategory::Invitation),
            "auth" => Ok(AuditCategory::Auth),
            "product" => Ok(AuditCategory::Product),
            "settings" => Ok(AuditCategory::Settings),
            _ => Err(format!("Unknown audit category: {}", s)),
        }
    }
}

/// Result of an audited operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Success,
    Failure,
}

impl std::fmt::Display for AuditOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AuditOutcome::Success => "success",
            AuditOutcome::Failure => "failure",
        };
        write!(f, "{}", s)
    }
}

/// An audit log entry representing a single performed or attempted action.
///
/// Immutable once recorded. Serialized as JSON by backends.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Opaque time-and-random derived identifier.
    pub id: String,
    /// When the action occurred.
    pub timestamp: DateTime<Utc>,
    /// Email of the account that performed the action.
    pub performed_by: String,
    /// Role held by the performer at the time of the action.
    pub performed_by_role: String,
    pub action: AuditAction,
    pub category: AuditCategory,
    /// Identifier of the affected entity (an email, a token, a product slug).
    pub resource: String,
    /// Additional context (e.g., the role an invitation granted).
    #[serde(default)]
    pub details: serde_json::Map<String, serde_json::Value>,
    pub outcome: AuditOutcome,
    pub error_message: Option<String>,
}

impl AuditEvent {
    /// Create a new audit event builder.
    pub fn builder(performed_by: &str, performed_by_role: Role, action: AuditAction) -> AuditEventBuilder {
        AuditEventBuilder::new(performed_by, performed_by_role, action)
    }

    /// Generate an id of the form `audit_{epoch_millis}_{random suffix}`.
    pub fn generate_id(timestamp: DateTime<Utc>) -> String {
        let mut suffix = [0u8; 6];
        rand::rng().fill_bytes(&mut suffix);
        format!("audit_{}_{}", timestamp.timestamp_millis(), hex::encode(suffix))
    }
}

/// Builder for constructing audit events.
pub struct AuditEventBuilder {
    performed_by: String,
    performed_by_role: String,
    action: AuditAction,
    category: AuditCategory,
    resource: String,
    details: serde_json::Map<String, serde_json::Value>,
    outcome: AuditOutcome,
    error_message: Option<String>,
}

impl AuditEventBuilder {
    pub fn new(performed_by: &str, performed_by_role: Role, action: AuditAction) -> Self {
        Self {
            performed_by: performed_by.to_string(),
            performed_by_role: performed_by_role.as_str().to_string(),
            action,
            category: action.category(),
            resource: String::new(),
            details: serde_json::Map::new(),
            outcome: AuditOutcome::Success,
            error_message: None,
        }
    }

    /// Override the category derived from the action.
    pub fn category(mut self, category: AuditCategory) -> Self {
        self.category = category;
        self
    }

    pub fn resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = resource.into();
        self
    }

    pub fn detail(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    pub fn outcome(mut self, outcome: AuditOutcome) -> Self {
        self.outcome = outcome;
        self
    }

    pub fn error_message(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self.outcome = AuditOutcome::Failure;
        self
    }

    pub fn build(self) -> AuditEvent {
        let timestamp = Utc::now();
        AuditEvent {
            id: AuditEvent::generate_id(timestamp),
            timestamp,
            performed_by: self.performed_by,
            performed_by_role: self.performed_by_role,
            action: self.action,
            category: self.category,
            resource: self.resource,
            details: self.details,
            outcome: self.outcome,
            error_message: self.error_message,
        }
    }
}

/// Filter for querying audit logs.
///
/// Exactly one index is consulted, chosen by specificity:
/// performer, then category, then the global index.
#[derive(Clone, Debug)]
pub struct AuditQuery {
    pub limit: usize,
    pub category: Option<AuditCategory>,
    pub performed_by: Option<String>,
}

impl AuditQuery {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            category: None,
            performed_by: None,
        }
    }

    pub fn category(mut self, category: AuditCategory) -> Self {
        self.category = Some(category);
        self
    }

    pub fn performed_by(mut self, email: impl Into<String>) -> Self {
        self.performed_by = Some(email.into());
        self
    }

    /// Query limit with the hard cap applied.
    pub fn capped_limit(&self) -> usize {
        self.limit.min(MAX_QUERY_LIMIT)
    }
}

/// Error type for audit log operations.
#[derive(Debug, Error)]
pub enum AuditLogError {
    #[error("backend error: {0}")]
    Backend(String),
}

/// Trait for audit log persistence.
///
/// Failures to record audit events must be logged by callers but must not
/// fail the operation being audited.
#[async_trait]
pub trait AuditLog: Send + Sync {
    /// Record an audit event.
    async fn record(&self, event: &AuditEvent) -> Result<(), AuditLogError>;

    /// Query audit logs, newest first. Entries that can no longer be
    /// resolved or parsed are skipped.
    async fn query(&self, query: AuditQuery) -> Result<Vec<AuditEvent>, AuditLogError>;

    /// Delete entries older than the cutoff from the global index and the
    /// record keyspace. Redundant with TTL-based expiry; provided for
    /// immediate manual cleanup. Returns the number of deleted records.
    async fn prune(&self, cutoff: DateTime<Utc>) -> Result<u64, AuditLogError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audit_action_display() {
        assert_eq!(AuditAction::UserCreate.to_string(), "user.create");
        assert_eq!(AuditAction::InvitationResend.to_string(), "invitation.resend");
        assert_eq!(AuditAction::SignupComplete.to_string(), "auth.signup_complete");
    }

    #[test]
    fn test_audit_action_roundtrip() {
        let actions = [
            AuditAction::UserCreate,
            AuditAction::UserRoleUpdate,
            AuditAction::UserNameUpdate,
            AuditAction::UserDelete,
            AuditAction::InvitationCreate,
            AuditAction::InvitationResend,
            AuditAction::InvitationCancel,
            AuditAction::InvitationUsed,
            AuditAction::SignIn,
            AuditAction::SignupComplete,
            AuditAction::ProductCreate,
            AuditAction::ProductUpdate,
            AuditAction::ProductDelete,
            AuditAction::SettingsUpdate,
        ];
        for action in actions {
            let parsed: AuditAction = action.to_string().parse().unwrap();
            assert_eq!(action, parsed, "Roundtrip failed for {:?}", action);
        }
        assert!("invalid.action".parse::<AuditAction>().is_err());
    }

    #[test]
    fn test_action_category_mapping() {
        assert_eq!(AuditAction::UserDelete.category(), AuditCategory::User);
        assert_eq!(
            AuditAction::InvitationCreate.category(),
            AuditCategory::Invitation
        );
        assert_eq!(AuditAction::SignIn.category(), AuditCategory::Auth);
        assert_eq!(AuditAction::ProductUpdate.category(), AuditCategory::Product);
        assert_eq!(AuditAction::SettingsUpdate.category(), AuditCategory::Settings);
    }

    #[test]
    fn test_category_roundtrip() {
        for category in [
            AuditCategory::User,
            AuditCategory::Invitation,
            AuditCategory::Auth,
            AuditCategory::Product,
            AuditCategory::Settings,
        ] {
            let parsed: AuditCategory = category.as_str().parse().unwrap();
            assert_eq!(category, parsed);
        }
        assert!("users".parse::<AuditCategory>().is_err());
    }

    #[test]
    fn test_generate_id_shape() {
        let now = Utc::now();
        let id = AuditEvent::generate_id(now);
        let mut parts = id.splitn(3, '_');
        assert_eq!(parts.next(), Some("audit"));
        let millis: i64 = parts.next().unwrap().parse().unwrap();
        assert_eq!(millis, now.timestamp_millis());
        let suffix = parts.next().unwrap();
        assert_eq!(suffix.len(), 12);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_generate_id_uniqueness() {
        let now = Utc::now();
        let ids: std::collections::HashSet<String> =
            (0..100).map(|_| AuditEvent::generate_id(now)).collect();
        assert_eq!(ids.len(), 100);
    }

    #[test]
    fn test_event_builder() {
        let event = AuditEvent::builder(
            "admin@example.com",
            atelier_rbac::Role::Admin,
            AuditAction::InvitationCreate,
        )
        .resource("new@example.com")
        .detail("role", "MEMBER")
        .build();

        assert_eq!(event.performed_by, "admin@example.com");
        assert_eq!(event.performed_by_role, "ADMIN");
        assert_eq!(event.action, AuditAction::InvitationCreate);
        assert_eq!(event.category, AuditCategory::Invitation);
        assert_eq!(event.resource, "new@example.com");
        assert_eq!(event.details.get("role").and_then(|v| v.as_str()), Some("MEMBER"));
        assert_eq!(event.outcome, AuditOutcome::Success);
        assert!(event.error_message.is_none());
        assert!(event.id.starts_with("audit_"));
    }

    #[test]
    fn test_error_message_marks_failure() {
        let event = AuditEvent::builder(
            "admin@example.com",
            atelier_rbac::Role::MasterAdmin,
            AuditAction::UserDelete,
        )
        .resource("gone@example.com")
        .error_message("User not found")
        .build();

        assert_eq!(event.outcome, AuditOutcome::Failure);
        assert_eq!(event.error_message.as_deref(), Some("User not found"));
    }

    #[test]
    fn test_category_override() {
        let event = AuditEvent::builder(
            "admin@example.com",
            atelier_rbac::Role::Admin,
            AuditAction::InvitationUsed,
        )
        .category(AuditCategory::Auth)
        .build();
        assert_eq!(event.category, AuditCategory::Auth);
    }

    #[test]
    fn test_event_serialization_roundtrip() {
        let event = AuditEvent::builder(
            "admin@example.com",
            atelier_rbac::Role::Admin,
            AuditAction::UserRoleUpdate,
        )
        .resource("member@example.com")
        .detail("new_role", "ADMIN")
        .build();

        let json = serde_json::to_string(&event).unwrap();
        let parsed: AuditEvent = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.id, event.id);
        assert_eq!(parsed.action, event.action);
        assert_eq!(parsed.category, event.category);
        assert_eq!(parsed.performed_by, event.performed_by);
        assert_eq!(
            parsed.details.get("new_role").and_then(|v| v.as_str()),
            Some("ADMIN")
        );
    }

    #[test]
    fn test_query_capped_limit() {
        assert_eq!(AuditQuery::new(10).capped_limit(), 10);
        assert_eq!(AuditQuery::new(500).capped_limit(), MAX_QUERY_LIMIT);
    }

    #[test]
    fn test_query_builder() {
        let query = AuditQuery::new(25)
            .category(AuditCategory::User)
            .performed_by("admin@example.com");
        assert_eq!(query.limit, 25);
        assert_eq!(query.category, Some(AuditCategory::User));
        assert_eq!(query.performed_by.as_deref(), Some("admin@example.com"));
    }

    #[test]
    fn test_retention() {
        assert_eq!(retention().as_secs(), 90 * 24 * 3600);
    }
}
