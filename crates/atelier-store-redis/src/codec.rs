//! Hash (de)serialization for user and invitation records.
//!
//! Records are stored as Redis hashes with string fields; optional fields are
//! omitted entirely when absent. Malformed hashes surface as Backend errors.

use std::collections::HashMap;

use atelier_rbac::Role;
use atelier_storage::{Invitation, InvitationStatus, StoreError, User};
use chrono::{DateTime, Utc};

fn parse_timestamp(key: &str, field: &str, value: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::Backend(format!("malformed {} field {}: {}", key, field, e)))
}

fn require<'a>(
    fields: &'a HashMap<String, String>,
    record: &str,
    field: &str,
) -> Result<&'a str, StoreError> {
    fields
        .get(field)
        .map(String::as_str)
        .ok_or_else(|| StoreError::Backend(format!("{} record missing field {}", record, field)))
}

pub(crate) fn user_to_hash(user: &User) -> Vec<(&'static str, String)> {
    let mut fields = vec![
        ("email", user.email.clone()),
        ("name", user.name.clone()),
        ("role", user.role.as_str().to_string()),
        ("created_at", user.created_at.to_rfc3339()),
    ];
    if let Some(invited_by) = &user.invited_by {
        fields.push(("invited_by", invited_by.clone()));
    }
    if let Some(last_sign_in) = &user.last_sign_in {
        fields.push(("last_sign_in", last_sign_in.to_rfc3339()));
    }
    fields
}

pub(crate) fn user_from_hash(fields: &HashMap<String, String>) -> Result<User, StoreError> {
    let role: Role = require(fields, "user", "role")?
        .parse()
        .map_err(|e| StoreError::Backend(format!("malformed user role: {}", e)))?;
    let last_sign_in = fields
        .get("last_sign_in")
        .map(|v| parse_timestamp("user", "last_sign_in", v))
        .transpose()?;

    Ok(User {
        email: require(fields, "user", "email")?.to_string(),
        name: require(fields, "user", "name")?.to_string(),
        role,
        created_at: parse_timestamp("user", "created_at", require(fields, "user", "created_at")?)?,
        invited_by: fields.get("invited_by").cloned(),
        last_sign_in,
    })
}

pub(crate) fn invitation_to_hash(invitation: &Invitation) -> Vec<(&'static str, String)> {
    let mut fields = vec![
        ("email", invitation.email.clone()),
        ("role", invitation.role.as_str().to_string()),
        ("token", invitation.token.clone()),
        ("expires_at", invitation.expires_at.to_rfc3339()),
        ("created_by", invitation.created_by.clone()),
        ("created_at", invitation.created_at.to_rfc3339()),
        ("status", invitation.status.as_str().to_string()),
    ];
    if let Some(used_at) = &invitation.used_at {
        fields.push(("used_at", used_at.to_rfc3339()));
    }
    fields
}

pub(crate) fn invitation_from_hash(
    fields: &HashMap<String, String>,
) -> Result<Invitation, StoreError> {
    let role: Role = require(fields, "invitation", "role")?
        .parse()
        .map_err(|e| StoreError::Backend(format!("malformed invitation role: {}", e)))?;
    let status: InvitationStatus = require(fields, "invitation", "status")?
        .parse()
        .map_err(|e| StoreError::Backend(format!("malformed invitation status: {}", e)))?;
    let used_at = fields
        .get("used_at")
        .map(|v| parse_timestamp("invitation", "used_at", v))
        .transpose()?;

    Ok(Invitation {
        email: require(fields, "invitation", "email")?.to_string(),
        role,
        token: require(fields, "invitation", "token")?.to_string(),
        expires_at: parse_timestamp(
            "invitation",
            "expires_at",
            require(fields, "invitation", "expires_at")?,
        )?,
        created_by: require(fields, "invitation", "created_by")?.to_string(),
        created_at: parse_timestamp(
            "invitation",
            "created_at",
            require(fields, "invitation", "created_at")?,
        )?,
        status,
        used_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> User {
        User {
            email: "a@example.com".to_string(),
            name: "Ada".to_string(),
            role: Role::Admin,
            created_at: "2026-01-15T10:30:00Z".parse().unwrap(),
            invited_by: Some("master@example.com".to_string()),
            last_sign_in: None,
        }
    }

    fn to_map(fields: Vec<(&'static str, String)>) -> HashMap<String, String> {
        fields
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }

    #[test]
    fn test_user_roundtrip() {
        let user = sample_user();
        let parsed = user_from_hash(&to_map(user_to_hash(&user))).unwrap();
        assert_eq!(parsed, user);
    }

    #[test]
    fn test_user_optional_fields_omitted() {
        let mut user = sample_user();
        user.invited_by = None;
        let fields = user_to_hash(&user);
        assert!(!fields.iter().any(|(k, _)| *k == "invited_by"));
        assert!(!fields.iter().any(|(k, _)| *k == "last_sign_in"));

        let parsed = user_from_hash(&to_map(fields)).unwrap();
        assert!(parsed.invited_by.is_none());
        assert!(parsed.last_sign_in.is_none());
    }

    #[test]
    fn test_user_last_sign_in_roundtrip() {
        let mut user = sample_user();
        user.last_sign_in = Some("2026-02-01T08:00:00Z".parse().unwrap());
        let parsed = user_from_hash(&to_map(user_to_hash(&user))).unwrap();
        assert_eq!(parsed.last_sign_in, user.last_sign_in);
    }

    #[test]
    fn test_user_missing_field() {
        let mut fields = to_map(user_to_hash(&sample_user()));
        fields.remove("role");
        let err = user_from_hash(&fields).unwrap_err();
        assert!(matches!(err, StoreError::Backend(_)));
        assert!(err.to_string().contains("role"));
    }

    #[test]
    fn test_user_malformed_timestamp() {
        let mut fields = to_map(user_to_hash(&sample_user()));
        fields.insert("created_at".to_string(), "yesterday".to_string());
        assert!(user_from_hash(&fields).is_err());
    }

    #[test]
    fn test_user_unknown_role_rejected() {
        let mut fields = to_map(user_to_hash(&sample_user()));
        fields.insert("role".to_string(), "OVERLORD".to_string());
        assert!(user_from_hash(&fields).is_err());
    }

    fn sample_invitation() -> Invitation {
        Invitation {
            email: "new@example.com".to_string(),
            role: Role::Member,
            token: "deadbeef".to_string(),
            expires_at: "2026-01-22T10:30:00Z".parse().unwrap(),
            created_by: "admin@example.com".to_string(),
            created_at: "2026-01-15T10:30:00Z".parse().unwrap(),
            status: InvitationStatus::Pending,
            used_at: None,
        }
    }

    #[test]
    fn test_invitation_roundtrip() {
        let invitation = sample_invitation();
        let parsed = invitation_from_hash(&to_map(invitation_to_hash(&invitation))).unwrap();
        assert_eq!(parsed, invitation);
    }

    #[test]
    fn test_invitation_used_roundtrip() {
        let mut invitation = sample_invitation();
        invitation.status = InvitationStatus::Used;
        invitation.used_at = Some("2026-01-16T12:00:00Z".parse().unwrap());
        let parsed = invitation_from_hash(&to_map(invitation_to_hash(&invitation))).unwrap();
        assert_eq!(parsed.status, InvitationStatus::Used);
        assert_eq!(parsed.used_at, invitation.used_at);
    }

    #[test]
    fn test_invitation_missing_token() {
        let mut fields = to_map(invitation_to_hash(&sample_invitation()));
        fields.remove("token");
        assert!(invitation_from_hash(&fields).is_err());
    }

    #[test]
    fn test_invitation_malformed_status() {
        let mut fields = to_map(invitation_to_hash(&sample_invitation()));
        fields.insert("status".to_string(), "revoked".to_string());
        assert!(invitation_from_hash(&fields).is_err());
    }
}
