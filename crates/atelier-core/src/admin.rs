//! The admin action facade: every mutating entry point resolves the current
//! session, checks the required permission, optionally consults the rate
//! limiter, performs the mutation, then appends an audit entry — in that
//! order. Unauthorized callers produce no side effects at all.
//!
//! Entry points return a uniform success/message/data shape instead of
//! throwing across the boundary to the presentation layer.

use std::sync::Arc;

use atelier_audit::{AuditAction, AuditCategory, AuditEvent, AuditLog};
use atelier_rbac::{Permission, Role};
use atelier_storage::{Invitation, RateLimitQuota, Store, User};

use crate::audit::AuditRecorder;
use crate::config::AdminConfig;
use crate::error::AdminError;
use crate::invitations::InvitationManager;
use crate::ratelimit::RateLimiter;
use crate::session::{Actor, Session};
use crate::users::UserDirectory;

pub const ACTION_CREATE_INVITATION: &str = "create_invitation";
pub const ACTION_DELETE_USER: &str = "delete_user";

/// Uniform result shape returned to the presentation layer.
#[derive(Clone, Debug)]
pub struct ActionResult<T> {
    pub success: bool,
    pub message: String,
    pub data: Option<T>,
}

impl<T> ActionResult<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }

    pub fn done(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
        }
    }

    pub fn rejected(error: &AdminError) -> Self {
        Self {
            success: false,
            message: error.to_string(),
            data: None,
        }
    }

    pub fn rejected_with(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
        }
    }
}

/// Composes the directory, invitation manager, rate limiter, and audit
/// recorder behind session + permission gates.
pub struct AdminBackend {
    pub users: UserDirectory,
    pub invitations: InvitationManager,
    pub rate_limiter: RateLimiter,
    pub audit: AuditRecorder,
    config: Arc<AdminConfig>,
}

impl AdminBackend {
    pub fn new(store: Arc<dyn Store>, log: Arc<dyn AuditLog>, config: AdminConfig) -> Self {
        let config = Arc::new(config);
        Self {
            users: UserDirectory::new(store.clone(), config.clone()),
            invitations: InvitationManager::new(store.clone(), config.clone()),
            rate_limiter: RateLimiter::new(store, config.rate_limit_fail_closed),
            audit: AuditRecorder::new(log),
            config,
        }
    }

    pub fn config(&self) -> &AdminConfig {
        &self.config
    }

    /// Resolve the session and require a permission. Runs before anything
    /// else so an unauthorized caller causes no side effect.
    async fn authorize(
        &self,
        session: &dyn Session,
        permission: Permission,
    ) -> Result<Actor, AdminError> {
        let actor = session.current_user().await?.ok_or_else(|| {
            AdminError::Unauthorized("You must be signed in to perform this action".to_string())
        })?;
        if !actor.role.has_permission(permission) {
            return Err(AdminError::Unauthorized(
                "You do not have permission to perform this action".to_string(),
            ));
        }
        Ok(actor)
    }

    // ───────────────────────────────────── Invitations ────────────────────────────────────

    /// Issue an invitation. The caller must deliver the returned token to the
    /// invitee as `{signup_base_url}/signup/{token}` via the email service.
    pub async fn invite_user(
        &self,
        session: &dyn Session,
        email: &str,
        role: &str,
    ) -> ActionResult<Invitation> {
        let actor = match self.authorize(session, Permission::CreateInvitations).await {
            Ok(actor) => actor,
            Err(e) => return ActionResult::rejected(&e),
        };

        // Malformed role strings are rejected before any store access.
        let role = match role.parse::<Role>() {
            Ok(role) => role,
            Err(_) => {
                let e = AdminError::Validation("Invalid role".to_string());
                self.audit
                    .log_invitation_action(
                        AuditEvent::builder(&actor.email, actor.role, AuditAction::InvitationCreate)
                            .resource(email)
                            .error_message(e.to_string()),
                    )
                    .await;
                return ActionResult::rejected(&e);
            }
        };

        let decision = self
            .rate_limiter
            .check(
                &actor.email,
                ACTION_CREATE_INVITATION,
                &RateLimitQuota::invitation_create(),
            )
            .await;
        if !decision.allowed {
            let message = decision
                .message
                .unwrap_or_else(|| "Too many attempts. Please try again later.".to_string());
            self.audit
                .log_invitation_action(
                    AuditEvent::builder(&actor.email, actor.role, AuditAction::InvitationCreate)
                        .resource(email)
                        .error_message(&*message),
                )
                .await;
            return ActionResult::rejected_with(message);
        }

        match self
            .invitations
            .create_invitation(email, role, &actor.email)
            .await
        {
            Ok(invitation) => {
                self.audit
                    .log_invitation_action(
                        AuditEvent::builder(&actor.email, actor.role, AuditAction::InvitationCreate)
                            .resource(email)
                            .detail("role", role.as_str()),
                    )
                    .await;
                ActionResult::ok("Invitation created", invitation)
            }
            Err(e) => {
                self.audit
                    .log_invitation_action(
                        AuditEvent::builder(&actor.email, actor.role, AuditAction::InvitationCreate)
                            .resource(email)
                            .error_message(e.to_string()),
                    )
                    .await;
                ActionResult::rejected(&e)
            }
        }
    }

    /// Cancel a pending invitation (hard delete).
    pub async fn cancel_invitation(
        &self,
        session: &dyn Session,
        token: &str,
    ) -> ActionResult<()> {
        let actor = match self.authorize(session, Permission::CancelInvitations).await {
            Ok(actor) => actor,
            Err(e) => return ActionResult::rejected(&e),
        };

        // Resolve the email first so the audit entry names the invitee, not
        // the credential.
        let resource = match self.invitations.get_invitation(token).await {
            Ok(Some(invitation)) => invitation.email,
            Ok(None) => token.to_string(),
            Err(e) => return ActionResult::rejected(&e),
        };

        match self.invitations.cancel(token).await {
            Ok(()) => {
                self.audit
                    .log_invitation_action(
                        AuditEvent::builder(&actor.email, actor.role, AuditAction::InvitationCancel)
                            .resource(&*resource),
                    )
                    .await;
                ActionResult::done("Invitation cancelled")
            }
            Err(e) => {
                self.audit
                    .log_invitation_action(
                        AuditEvent::builder(&actor.email, actor.role, AuditAction::InvitationCancel)
                            .resource(&*resource)
                            .error_message(e.to_string()),
                    )
                    .await;
                ActionResult::rejected(&e)
            }
        }
    }

    /// Replace an invitation with a fresh token and expiry. The old link is
    /// dead as soon as this returns; the caller must deliver the new one.
    pub async fn resend_invitation(
        &self,
        session: &dyn Session,
        token: &str,
    ) -> ActionResult<Invitation> {
        let actor = match self.authorize(session, Permission::ResendInvitations).await {
            Ok(actor) => actor,
            Err(e) => return ActionResult::rejected(&e),
        };

        match self.invitations.resend(token, &actor.email).await {
            Ok(invitation) => {
                self.audit
                    .log_invitation_action(
                        AuditEvent::builder(&actor.email, actor.role, AuditAction::InvitationResend)
                            .resource(&*invitation.email)
                            .detail("role", invitation.role.as_str()),
                    )
                    .await;
                ActionResult::ok("Invitation resent", invitation)
            }
            Err(e) => {
                self.audit
                    .log_invitation_action(
                        AuditEvent::builder(&actor.email, actor.role, AuditAction::InvitationResend)
                            .resource(token)
                            .error_message(e.to_string()),
                    )
                    .await;
                ActionResult::rejected(&e)
            }
        }
    }

    /// Complete signup with an invitation token. Runs without a session: the
    /// token itself is the credential.
    pub async fn complete_signup(&self, token: &str, name: &str) -> ActionResult<User> {
        let invitation = match self.invitations.validate_token(token).await {
            Ok(Some(invitation)) => invitation,
            Ok(None) => {
                return ActionResult::rejected_with("This invitation is invalid or has expired")
            }
            Err(e) => return ActionResult::rejected(&e),
        };

        let user = match self
            .users
            .create_user(
                &invitation.email,
                name,
                invitation.role,
                Some(&invitation.created_by),
            )
            .await
        {
            Ok(user) => user,
            Err(e) => return ActionResult::rejected(&e),
        };

        if let Err(e) = self.invitations.mark_used(token).await {
            // The account exists; surface the half-completed transition
            // instead of pretending the signup failed.
            tracing::warn!(error = %e, email = %user.email, "signup completed but invitation was not marked used");
        }

        self.audit
            .log_auth_action(
                AuditEvent::builder(&user.email, user.role, AuditAction::SignupComplete)
                    .resource(&*user.email)
                    .detail("invited_by", invitation.created_by.clone()),
            )
            .await;
        ActionResult::ok("Welcome aboard", user)
    }

    /// Pending invitations, newest first.
    pub async fn list_pending_invitations(
        &self,
        session: &dyn Session,
    ) -> ActionResult<Vec<Invitation>> {
        if let Err(e) = self.authorize(session, Permission::ViewInvitations).await {
            return ActionResult::rejected(&e);
        }
        match self.invitations.pending_invitations().await {
            Ok(invitations) => ActionResult::ok("Pending invitations", invitations),
            Err(e) => ActionResult::rejected(&e),
        }
    }

    // ───────────────────────────────────── Users ──────────────────────────────────────────

    pub async fn list_users(&self, session: &dyn Session) -> ActionResult<Vec<User>> {
        if let Err(e) = self.authorize(session, Permission::ViewUsers).await {
            return ActionResult::rejected(&e);
        }
        match self.users.get_all_users().await {
            Ok(users) => ActionResult::ok("Users", users),
            Err(e) => ActionResult::rejected(&e),
        }
    }

    pub async fn update_user_role(
        &self,
        session: &dyn Session,
        email: &str,
        role: &str,
    ) -> ActionResult<User> {
        let actor = match self.authorize(session, Permission::ManageUsers).await {
            Ok(actor) => actor,
            Err(e) => return ActionResult::rejected(&e),
        };

        let role = match role.parse::<Role>() {
            Ok(role) => role,
            Err(_) => {
                let e = AdminError::Validation("Invalid role".to_string());
                self.audit
                    .log_user_action(
                        AuditEvent::builder(&actor.email, actor.role, AuditAction::UserRoleUpdate)
                            .resource(email)
                            .error_message(e.to_string()),
                    )
                    .await;
                return ActionResult::rejected(&e);
            }
        };

        match self.users.update_user_role(email, role).await {
            Ok(user) => {
                self.audit
                    .log_user_action(
                        AuditEvent::builder(&actor.email, actor.role, AuditAction::UserRoleUpdate)
                            .resource(email)
                            .detail("new_role", role.as_str()),
                    )
                    .await;
                ActionResult::ok("Role updated", user)
            }
            Err(e) => {
                self.audit
                    .log_user_action(
                        AuditEvent::builder(&actor.email, actor.role, AuditAction::UserRoleUpdate)
                            .resource(email)
                            .error_message(e.to_string()),
                    )
                    .await;
                ActionResult::rejected(&e)
            }
        }
    }

    pub async fn update_user_name(
        &self,
        session: &dyn Session,
        email: &str,
        name: &str,
    ) -> ActionResult<User> {
        let actor = match self.authorize(session, Permission::ManageUsers).await {
            Ok(actor) => actor,
            Err(e) => return ActionResult::rejected(&e),
        };

        match self.users.update_user_name(email, name).await {
            Ok(user) => {
                self.audit
                    .log_user_action(
                        AuditEvent::builder(&actor.email, actor.role, AuditAction::UserNameUpdate)
                            .resource(email),
                    )
                    .await;
                ActionResult::ok("Name updated", user)
            }
            Err(e) => {
                self.audit
                    .log_user_action(
                        AuditEvent::builder(&actor.email, actor.role, AuditAction::UserNameUpdate)
                            .resource(email)
                            .error_message(e.to_string()),
                    )
                    .await;
                ActionResult::rejected(&e)
            }
        }
    }

    pub async fn delete_user(&self, session: &dyn Session, email: &str) -> ActionResult<()> {
        let actor = match self.authorize(session, Permission::ManageUsers).await {
            Ok(actor) => actor,
            Err(e) => return ActionResult::rejected(&e),
        };

        let decision = self
            .rate_limiter
            .check(&actor.email, ACTION_DELETE_USER, &RateLimitQuota::user_delete())
            .await;
        if !decision.allowed {
            let message = decision
                .message
                .unwrap_or_else(|| "Too many attempts. Please try again later.".to_string());
            self.audit
                .log_user_action(
                    AuditEvent::builder(&actor.email, actor.role, AuditAction::UserDelete)
                        .resource(email)
                        .error_message(&*message),
                )
                .await;
            return ActionResult::rejected_with(message);
        }

        match self.users.delete_user(email).await {
            Ok(()) => {
                self.audit
                    .log_user_action(
                        AuditEvent::builder(&actor.email, actor.role, AuditAction::UserDelete)
                            .resource(email),
                    )
                    .await;
                ActionResult::done("User deleted")
            }
            Err(e) => {
                self.audit
                    .log_user_action(
                        AuditEvent::builder(&actor.email, actor.role, AuditAction::UserDelete)
                            .resource(email)
                            .error_message(e.to_string()),
                    )
                    .await;
                ActionResult::rejected(&e)
            }
        }
    }

    // ───────────────────────────────────── Auth & ops ─────────────────────────────────────

    /// Stamp a successful sign-in. Called by the identity provider glue, so
    /// it takes the authenticated email rather than a session.
    pub async fn record_sign_in(&self, email: &str) -> ActionResult<User> {
        match self.users.record_sign_in(email).await {
            Ok(user) => {
                self.audit
                    .log_auth_action(
                        AuditEvent::builder(&user.email, user.role, AuditAction::SignIn)
                            .resource(&*user.email),
                    )
                    .await;
                ActionResult::ok("Sign-in recorded", user)
            }
            Err(e) => ActionResult::rejected(&e),
        }
    }

    /// Administrative rate-limit override.
    pub async fn reset_rate_limit(
        &self,
        session: &dyn Session,
        action: &str,
        identifier: &str,
    ) -> ActionResult<()> {
        let actor = match self.authorize(session, Permission::UpdateSettings).await {
            Ok(actor) => actor,
            Err(e) => return ActionResult::rejected(&e),
        };

        match self.rate_limiter.reset(identifier, action).await {
            Ok(()) => {
                self.audit
                    .record(
                        AuditEvent::builder(&actor.email, actor.role, AuditAction::SettingsUpdate)
                            .resource(format!("ratelimit:{}:{}", action, identifier))
                            .build(),
                    )
                    .await;
                ActionResult::done("Rate limit reset")
            }
            Err(e) => ActionResult::rejected(&e),
        }
    }

    /// Recent audit entries for the admin dashboard.
    pub async fn audit_trail(
        &self,
        session: &dyn Session,
        limit: usize,
        category: Option<AuditCategory>,
        performed_by: Option<&str>,
    ) -> ActionResult<Vec<AuditEvent>> {
        if let Err(e) = self.authorize(session, Permission::ViewAnalytics).await {
            return ActionResult::rejected(&e);
        }
        match self.audit.recent(limit, category, performed_by).await {
            Ok(events) => ActionResult::ok("Audit trail", events),
            Err(e) => ActionResult::rejected(&e),
        }
    }
}
