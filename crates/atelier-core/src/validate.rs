//! Input validation shared by the directory and invitation services.
//!
//! Runs before any store access; rejection messages are user-facing.

use crate::error::AdminError;

pub(crate) fn validate_email(email: &str) -> Result<(), AdminError> {
    let trimmed = email.trim();
    if trimmed.is_empty() {
        return Err(AdminError::Validation("Email is required".to_string()));
    }
    // Deliverability is the email provider's problem; this only rejects
    // obviously malformed input before it becomes a store key.
    let mut parts = trimmed.splitn(2, '@');
    let local = parts.next().unwrap_or_default();
    let domain = parts.next().unwrap_or_default();
    if local.is_empty() || domain.is_empty() || !domain.contains('.') || domain.ends_with('.') {
        return Err(AdminError::Validation("Invalid email address".to_string()));
    }
    Ok(())
}

pub(crate) fn validate_name(name: &str) -> Result<(), AdminError> {
    if name.trim().is_empty() {
        return Err(AdminError::Validation("Name is required".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_plain_addresses() {
        assert!(validate_email("a@example.com").is_ok());
        assert!(validate_email("first.last@shop.example.co").is_ok());
    }

    #[test]
    fn test_rejects_malformed_addresses() {
        assert!(validate_email("").is_err());
        assert!(validate_email("   ").is_err());
        assert!(validate_email("no-at-sign").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("user@").is_err());
        assert!(validate_email("user@localhost").is_err());
        assert!(validate_email("user@domain.").is_err());
    }

    #[test]
    fn test_name_validation() {
        assert!(validate_name("Ada").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name("   ").is_err());
    }
}
