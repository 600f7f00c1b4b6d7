//! Back-office configuration.
//!
//! Loaded once from the environment and injected into services at
//! construction, so business logic never reads ambient process state and
//! tests can supply arbitrary configurations.
//!
//! ```bash
//! ATELIER_MASTER_ADMIN_EMAIL=owner@maisonatelier.com
//! ATELIER_INVITATION_EXPIRY_DAYS=7
//! ATELIER_SIGNUP_BASE_URL=https://admin.maisonatelier.com
//! ATELIER_RATE_LIMIT_FAIL_CLOSED=false
//! ```

use std::env;

use thiserror::Error;

pub const DEFAULT_INVITATION_EXPIRY_DAYS: i64 = 7;

const DEFAULT_SIGNUP_BASE_URL: &str = "http://localhost:3000";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: ATELIER_MASTER_ADMIN_EMAIL")]
    MissingMasterAdminEmail,

    #[error("Invalid invitation expiry days: {0}. Expected a positive integer")]
    InvalidExpiryDays(String),
}

/// Back-office configuration shared by all services.
#[derive(Clone, Debug)]
pub struct AdminConfig {
    /// The one account that can never be deleted or demoted.
    pub master_admin_email: String,
    pub invitation_expiry_days: i64,
    /// Base URL that invitation tokens are appended to.
    pub signup_base_url: String,
    /// When true, a store failure during a rate-limit check rejects the
    /// request instead of allowing it.
    pub rate_limit_fail_closed: bool,
}

impl AdminConfig {
    /// Configuration with defaults for everything but the master admin email.
    pub fn new(master_admin_email: impl Into<String>) -> Self {
        Self {
            master_admin_email: master_admin_email.into(),
            invitation_expiry_days: DEFAULT_INVITATION_EXPIRY_DAYS,
            signup_base_url: DEFAULT_SIGNUP_BASE_URL.to_string(),
            rate_limit_fail_closed: false,
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let master_admin_email = env::var("ATELIER_MASTER_ADMIN_EMAIL")
            .map_err(|_| ConfigError::MissingMasterAdminEmail)?;

        let invitation_expiry_days = match env::var("ATELIER_INVITATION_EXPIRY_DAYS") {
            Ok(value) => {
                let days: i64 = value
                    .parse()
                    .map_err(|_| ConfigError::InvalidExpiryDays(value.clone()))?;
                if days <= 0 {
                    return Err(ConfigError::InvalidExpiryDays(value));
                }
                days
            }
            Err(_) => DEFAULT_INVITATION_EXPIRY_DAYS,
        };

        let signup_base_url = env::var("ATELIER_SIGNUP_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_SIGNUP_BASE_URL.to_string());

        let rate_limit_fail_closed = env::var("ATELIER_RATE_LIMIT_FAIL_CLOSED")
            .map(|v| v.to_lowercase() == "true" || v == "1")
            .unwrap_or(false);

        Ok(Self {
            master_admin_email,
            invitation_expiry_days,
            signup_base_url,
            rate_limit_fail_closed,
        })
    }

    pub fn is_master_admin(&self, email: &str) -> bool {
        self.master_admin_email == email
    }

    /// The signup link delivered to an invitee.
    pub fn signup_url(&self, token: &str) -> String {
        format!("{}/signup/{}", self.signup_base_url.trim_end_matches('/'), token)
    }
}
