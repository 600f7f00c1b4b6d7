//! Email delivery configuration for the admin CLI.
//!
//! Supports configuration via environment variables:
//!
//! ```bash
//! # Provider: Resend
//! ATELIER_EMAIL_PROVIDER=resend
//! RESEND_API_KEY=re_...
//!
//! # Provider: SMTP
//! ATELIER_EMAIL_PROVIDER=smtp
//! SMTP_HOST=smtp.example.com
//! SMTP_PORT=587
//! SMTP_USERNAME=user@example.com
//! SMTP_PASSWORD=app_password
//! SMTP_USE_TLS=true
//!
//! # Sender config
//! ATELIER_EMAIL_FROM=noreply@maisonatelier.com
//! ATELIER_EMAIL_FROM_NAME="Maison Atelier"
//! ```
//!
//! With no provider configured, invitation links are printed to stdout for
//! out-of-band delivery instead.

use std::env;
use thiserror::Error;

/// Email delivery settings.
#[derive(Debug, Clone)]
pub struct EmailSettings {
    pub provider: EmailProviderConfig,
    pub from_address: String,
    pub from_name: Option<String>,
}

/// Email provider configuration.
#[derive(Debug, Clone)]
pub enum EmailProviderConfig {
    Resend {
        #[allow(dead_code)] // Used when the email-resend feature is enabled
        api_key: String,
    },
    Smtp {
        #[allow(dead_code)] // Used when the email-smtp feature is enabled
        host: String,
        #[allow(dead_code)]
        port: u16,
        #[allow(dead_code)]
        username: Option<String>,
        #[allow(dead_code)]
        password: Option<String>,
        #[allow(dead_code)]
        use_tls: bool,
    },
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid email provider: {0}. Expected 'resend' or 'smtp'")]
    InvalidProvider(String),

    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid port number: {0}")]
    InvalidPort(String),

    #[error("Missing from address: ATELIER_EMAIL_FROM is required when email is configured")]
    MissingFromAddress,

    #[error("SMTP provider requires SMTP_HOST")]
    SmtpMissingHost,
}

impl EmailSettings {
    /// Load email settings from environment variables. `Ok(None)` means no
    /// provider is configured and links should be delivered out of band.
    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        let provider_type = match env::var("ATELIER_EMAIL_PROVIDER") {
            Ok(value) => value,
            Err(_) => return Ok(None),
        };

        let provider = match provider_type.to_lowercase().as_str() {
            "resend" => {
                let api_key = env::var("RESEND_API_KEY")
                    .map_err(|_| ConfigError::MissingEnvVar("RESEND_API_KEY".to_string()))?;
                EmailProviderConfig::Resend { api_key }
            }
            "smtp" => {
                let host = env::var("SMTP_HOST").map_err(|_| ConfigError::SmtpMissingHost)?;
                let port_raw = env::var("SMTP_PORT").unwrap_or_else(|_| "587".to_string());
                let port = port_raw
                    .parse::<u16>()
                    .map_err(|_| ConfigError::InvalidPort(port_raw.clone()))?;
                let username = env::var("SMTP_USERNAME").ok();
                let password = env::var("SMTP_PASSWORD").ok();
                let use_tls = env::var("SMTP_USE_TLS")
                    .map(|v| v.to_lowercase() == "true" || v == "1")
                    .unwrap_or(true); // TLS by default

                EmailProviderConfig::Smtp {
                    host,
                    port,
                    username,
                    password,
                    use_tls,
                }
            }
            other => return Err(ConfigError::InvalidProvider(other.to_string())),
        };

        let from_address =
            env::var("ATELIER_EMAIL_FROM").map_err(|_| ConfigError::MissingFromAddress)?;
        let from_name = env::var("ATELIER_EMAIL_FROM_NAME").ok();

        Ok(Some(Self {
            provider,
            from_address,
            from_name,
        }))
    }
}
