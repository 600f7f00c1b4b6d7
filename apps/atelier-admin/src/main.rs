mod config;
mod email;

use std::sync::Arc;

use atelier_audit::{AuditCategory, AuditLog};
use atelier_core::{AdminBackend, AdminConfig, StaticSession};
use atelier_rbac::Role;
use atelier_storage::Invitation;
use atelier_store_redis::RedisStore;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use config::EmailSettings;
use email::InvitationEmailContent;

// ────────────────────────────────────── CLI Types ──────────────────────────────────────

#[derive(Parser)]
#[command(name = "atelier-admin")]
#[command(about = "Atelier back-office CLI for bootstrap, invitations, and maintenance")]
struct Cli {
    /// Redis connection URL
    #[arg(
        long,
        global = true,
        env = "REDIS_URL",
        default_value = "redis://127.0.0.1:6379"
    )]
    redis_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Provision the master admin account (out-of-band bootstrap)
    Bootstrap {
        /// Display name for the master admin
        #[arg(long)]
        name: String,
    },
    /// Invitation management commands
    Invite {
        #[command(subcommand)]
        invite_cmd: InviteCommand,
    },
    /// User directory commands
    Users {
        #[command(subcommand)]
        users_cmd: UsersCommand,
    },
    /// Maintenance sweeps, intended for an external scheduler
    Cleanup {
        #[command(subcommand)]
        cleanup_cmd: CleanupCommand,
    },
    /// Rate limiter overrides
    Ratelimit {
        #[command(subcommand)]
        ratelimit_cmd: RatelimitCommand,
    },
    /// Audit log queries
    Audit {
        #[command(subcommand)]
        audit_cmd: AuditCommand,
    },
}

#[derive(Subcommand)]
enum InviteCommand {
    /// Create an invitation and deliver the signup link
    Create {
        /// Invitee email address
        email: String,
        /// Role the invitation grants (ADMIN or MEMBER)
        #[arg(long, default_value = "MEMBER")]
        role: String,
        /// Output only the signup link (for scripts)
        #[arg(long)]
        plain: bool,
    },
    /// List pending invitations
    List,
    /// Cancel a pending invitation
    Revoke {
        /// Invitation token to revoke
        token: String,
    },
    /// Replace an invitation with a fresh token and re-deliver the link
    Resend {
        /// Invitation token to resend
        token: String,
    },
}

#[derive(Subcommand)]
enum UsersCommand {
    /// List all back-office users
    List,
    /// Change a user's role
    SetRole {
        email: String,
        /// New role (MEMBER, ADMIN, or MASTER_ADMIN)
        role: String,
    },
    /// Change a user's display name
    Rename { email: String, name: String },
    /// Delete a user
    Delete { email: String },
}

#[derive(Subcommand)]
enum CleanupCommand {
    /// Expire past-due pending invitations
    Invitations,
    /// Delete audit entries older than the retention cutoff
    Audit {
        #[arg(long, default_value_t = atelier_audit::RETENTION_DAYS)]
        older_than_days: i64,
    },
}

#[derive(Subcommand)]
enum RatelimitCommand {
    /// Delete a rate-limit counter outright
    Reset {
        /// Action tag (e.g. create_invitation, delete_user)
        action: String,
        /// Identifier the counter is keyed by (usually an email)
        identifier: String,
    },
}

#[derive(Subcommand)]
enum AuditCommand {
    /// List recent audit entries
    List {
        #[arg(long, default_value_t = 20)]
        limit: usize,
        /// Filter by category (user, invitation, auth, product, settings)
        #[arg(long)]
        category: Option<String>,
        /// Filter by performer email
        #[arg(long)]
        user: Option<String>,
    },
}

// ────────────────────────────────────── Helpers ──────────────────────────────────────

async fn open_backend(redis_url: &str) -> Result<AdminBackend, Box<dyn std::error::Error>> {
    let config = AdminConfig::from_env()?;
    let store = Arc::new(RedisStore::connect(redis_url).await?);
    let log: Arc<dyn AuditLog> = store.clone();
    Ok(AdminBackend::new(store, log, config))
}

/// The CLI acts as the master admin account.
fn operator_session(backend: &AdminBackend) -> StaticSession {
    StaticSession::signed_in(backend.config().master_admin_email.clone(), Role::MasterAdmin)
}

/// Deliver the signup link by email when a provider is configured; print it
/// for out-of-band delivery otherwise. Delivery failure is reported but does
/// not undo the invitation.
async fn deliver_invitation(backend: &AdminBackend, invitation: &Invitation) {
    let link = backend.config().signup_url(&invitation.token);

    let settings = match EmailSettings::from_env() {
        Ok(Some(settings)) => settings,
        Ok(None) => {
            println!("No email provider configured; deliver this link out of band:");
            println!("\n  {}\n", link);
            return;
        }
        Err(e) => {
            warn!(error = %e, "email configuration is invalid");
            println!("Email configuration is invalid; deliver this link out of band:");
            println!("\n  {}\n", link);
            return;
        }
    };

    let content =
        InvitationEmailContent::new(&link, invitation.role.as_str(), &invitation.expires_at);
    let outcome = match email::create_provider(&settings) {
        Ok(provider) => {
            provider
                .send_invitation(
                    &invitation.email,
                    &content,
                    &settings.from_address,
                    settings.from_name.as_deref(),
                )
                .await
        }
        Err(e) => Err(e),
    };

    match outcome {
        Ok(()) => println!("Invitation email sent to {}", invitation.email),
        Err(e) => {
            warn!(error = %e, to = %invitation.email, "invitation email was not sent");
            println!("Email delivery failed ({}); deliver this link out of band:", e);
            println!("\n  {}\n", link);
        }
    }
}

// ────────────────────────────────────── Commands ──────────────────────────────────────

async fn cmd_bootstrap(redis_url: &str, name: &str) -> Result<(), Box<dyn std::error::Error>> {
    let backend = open_backend(redis_url).await?;
    let email = backend.config().master_admin_email.clone();

    if backend.users.user_exists(&email).await? {
        println!("Master admin {} is already provisioned.", email);
        return Ok(());
    }

    backend
        .users
        .create_user(&email, name, Role::MasterAdmin, None)
        .await?;
    info!(email = %email, "master admin provisioned");

    println!("✓ Master admin provisioned!\n");
    println!("Email: {}", email);
    println!("Name:  {}", name);
    Ok(())
}

async fn cmd_invite_create(
    redis_url: &str,
    invitee: &str,
    role: &str,
    plain: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let backend = open_backend(redis_url).await?;
    let session = operator_session(&backend);

    let result = backend.invite_user(&session, invitee, role).await;
    if !result.success {
        return Err(result.message.into());
    }
    let invitation = result.data.ok_or("invitation missing from result")?;

    if plain {
        println!("{}", backend.config().signup_url(&invitation.token));
        return Ok(());
    }

    println!("✓ Invitation created!\n");
    println!("Email:   {}", invitation.email);
    println!("Role:    {}", invitation.role.as_str());
    println!("Expires: {}", invitation.expires_at);
    println!();
    deliver_invitation(&backend, &invitation).await;
    Ok(())
}

async fn cmd_invite_list(redis_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    let backend = open_backend(redis_url).await?;
    let session = operator_session(&backend);

    let result = backend.list_pending_invitations(&session).await;
    if !result.success {
        return Err(result.message.into());
    }
    let invitations = result.data.unwrap_or_default();

    if invitations.is_empty() {
        println!("No pending invitations found.");
    } else {
        println!("Pending invitations:\n");
        for invitation in invitations {
            println!("Email:      {}", invitation.email);
            println!("Role:       {}", invitation.role.as_str());
            println!("Token:      {}", invitation.token);
            println!("Invited by: {}", invitation.created_by);
            println!("Expires:    {}", invitation.expires_at);
            println!();
        }
    }
    Ok(())
}

async fn cmd_invite_revoke(
    redis_url: &str,
    token: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let backend = open_backend(redis_url).await?;
    let session = operator_session(&backend);

    let result = backend.cancel_invitation(&session, token).await;
    if !result.success {
        return Err(result.message.into());
    }
    println!("✓ Invitation revoked.");
    Ok(())
}

async fn cmd_invite_resend(
    redis_url: &str,
    token: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let backend = open_backend(redis_url).await?;
    let session = operator_session(&backend);

    let result = backend.resend_invitation(&session, token).await;
    if !result.success {
        return Err(result.message.into());
    }
    let invitation = result.data.ok_or("invitation missing from result")?;

    println!("✓ Invitation resent with a fresh token; the old link is now invalid.\n");
    println!("Email:   {}", invitation.email);
    println!("Expires: {}", invitation.expires_at);
    println!();
    deliver_invitation(&backend, &invitation).await;
    Ok(())
}

async fn cmd_users_list(redis_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    let backend = open_backend(redis_url).await?;
    let session = operator_session(&backend);

    let result = backend.list_users(&session).await;
    if !result.success {
        return Err(result.message.into());
    }
    let users = result.data.unwrap_or_default();

    if users.is_empty() {
        println!("No users found. Run 'atelier-admin bootstrap' first.");
    } else {
        println!("{} user(s):\n", users.len());
        for user in users {
            println!("Email:        {}", user.email);
            println!("Name:         {}", user.name);
            println!("Role:         {}", user.role.as_str());
            println!("Created:      {}", user.created_at);
            if let Some(invited_by) = &user.invited_by {
                println!("Invited by:   {}", invited_by);
            }
            if let Some(last_sign_in) = &user.last_sign_in {
                println!("Last sign-in: {}", last_sign_in);
            }
            println!();
        }
    }
    Ok(())
}

async fn cmd_users_set_role(
    redis_url: &str,
    user_email: &str,
    role: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let backend = open_backend(redis_url).await?;
    let session = operator_session(&backend);

    let result = backend.update_user_role(&session, user_email, role).await;
    if !result.success {
        return Err(result.message.into());
    }
    println!("✓ {} is now {}.", user_email, role);
    Ok(())
}

async fn cmd_users_rename(
    redis_url: &str,
    user_email: &str,
    name: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let backend = open_backend(redis_url).await?;
    let session = operator_session(&backend);

    let result = backend.update_user_name(&session, user_email, name).await;
    if !result.success {
        return Err(result.message.into());
    }
    println!("✓ {} renamed to {}.", user_email, name);
    Ok(())
}

async fn cmd_users_delete(
    redis_url: &str,
    user_email: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let backend = open_backend(redis_url).await?;
    let session = operator_session(&backend);

    let result = backend.delete_user(&session, user_email).await;
    if !result.success {
        return Err(result.message.into());
    }
    println!("✓ {} deleted.", user_email);
    Ok(())
}

async fn cmd_cleanup_invitations(redis_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    let backend = open_backend(redis_url).await?;
    let expired = backend.invitations.sweep_expired().await?;
    info!(expired, "invitation sweep finished");
    println!("✓ {} invitation(s) expired.", expired);
    Ok(())
}

async fn cmd_cleanup_audit(
    redis_url: &str,
    older_than_days: i64,
) -> Result<(), Box<dyn std::error::Error>> {
    let backend = open_backend(redis_url).await?;
    let removed = backend.audit.cleanup_older_than(older_than_days).await?;
    info!(removed, older_than_days, "audit cleanup finished");
    println!("✓ {} audit record(s) removed.", removed);
    Ok(())
}

async fn cmd_ratelimit_reset(
    redis_url: &str,
    action: &str,
    identifier: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let backend = open_backend(redis_url).await?;
    let session = operator_session(&backend);

    let result = backend.reset_rate_limit(&session, action, identifier).await;
    if !result.success {
        return Err(result.message.into());
    }
    println!("✓ Rate limit {}:{} reset.", action, identifier);
    Ok(())
}

async fn cmd_audit_list(
    redis_url: &str,
    limit: usize,
    category: Option<String>,
    user: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let backend = open_backend(redis_url).await?;
    let session = operator_session(&backend);

    let category = category
        .map(|c| c.parse::<AuditCategory>())
        .transpose()
        .map_err(|e| format!("{}", e))?;

    let result = backend
        .audit_trail(&session, limit, category, user.as_deref())
        .await;
    if !result.success {
        return Err(result.message.into());
    }
    let events = result.data.unwrap_or_default();

    if events.is_empty() {
        println!("No audit entries found.");
    } else {
        for event in events {
            let outcome = match event.error_message {
                Some(ref message) => format!("{} ({})", event.outcome, message),
                None => event.outcome.to_string(),
            };
            println!(
                "{}  {:<24} {:<32} {:<32} {}",
                event.timestamp.format("%Y-%m-%d %H:%M:%S"),
                event.action.to_string(),
                event.performed_by,
                event.resource,
                outcome
            );
        }
    }
    Ok(())
}

// ────────────────────────────────────── Entry point ──────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let cli = Cli::parse();

    match cli.command {
        Command::Bootstrap { name } => {
            cmd_bootstrap(&cli.redis_url, &name).await?;
        }
        Command::Invite { invite_cmd } => match invite_cmd {
            InviteCommand::Create { email, role, plain } => {
                cmd_invite_create(&cli.redis_url, &email, &role, plain).await?;
            }
            InviteCommand::List => {
                cmd_invite_list(&cli.redis_url).await?;
            }
            InviteCommand::Revoke { token } => {
                cmd_invite_revoke(&cli.redis_url, &token).await?;
            }
            InviteCommand::Resend { token } => {
                cmd_invite_resend(&cli.redis_url, &token).await?;
            }
        },
        Command::Users { users_cmd } => match users_cmd {
            UsersCommand::List => {
                cmd_users_list(&cli.redis_url).await?;
            }
            UsersCommand::SetRole { email, role } => {
                cmd_users_set_role(&cli.redis_url, &email, &role).await?;
            }
            UsersCommand::Rename { email, name } => {
                cmd_users_rename(&cli.redis_url, &email, &name).await?;
            }
            UsersCommand::Delete { email } => {
                cmd_users_delete(&cli.redis_url, &email).await?;
            }
        },
        Command::Cleanup { cleanup_cmd } => match cleanup_cmd {
            CleanupCommand::Invitations => {
                cmd_cleanup_invitations(&cli.redis_url).await?;
            }
            CleanupCommand::Audit { older_than_days } => {
                cmd_cleanup_audit(&cli.redis_url, older_than_days).await?;
            }
        },
        Command::Ratelimit { ratelimit_cmd } => match ratelimit_cmd {
            RatelimitCommand::Reset { action, identifier } => {
                cmd_ratelimit_reset(&cli.redis_url, &action, &identifier).await?;
            }
        },
        Command::Audit { audit_cmd } => match audit_cmd {
            AuditCommand::List {
                limit,
                category,
                user,
            } => {
                cmd_audit_list(&cli.redis_url, limit, category, user).await?;
            }
        },
    }

    Ok(())
}
