//! Email templates for invitations.

use chrono::{DateTime, Utc};

/// Content for invitation emails.
pub struct InvitationEmailContent {
    pub subject: String,
    pub text: String,
    pub html: String,
}

impl InvitationEmailContent {
    /// Create invitation email content with the signup link and expiry.
    pub fn new(signup_url: &str, role: &str, expires_at: &DateTime<Utc>) -> Self {
        let expires = expires_at.format("%B %-d, %Y").to_string();
        Self {
            subject: "You're invited to the Maison Atelier back office".to_string(),
            text: Self::text_template(signup_url, role, &expires),
            html: Self::html_template(signup_url, role, &expires),
        }
    }

    fn text_template(signup_url: &str, role: &str, expires: &str) -> String {
        format!(
            r#"You've been invited to join the Maison Atelier back office as {}.

Complete your signup here:

{}

This invitation expires on {}.

If you weren't expecting this invitation, you can ignore this email.

--
Maison Atelier"#,
            role, signup_url, expires
        )
    }

    fn html_template(signup_url: &str, role: &str, expires: &str) -> String {
        format!(
            r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <style>
        body {{ font-family: Georgia, 'Times New Roman', serif; line-height: 1.6; color: #1a1a1a; margin: 0; padding: 0; background: #faf8f5; }}
        .container {{ max-width: 600px; margin: 0 auto; padding: 40px 20px; }}
        .card {{ background: white; border: 1px solid #e8e2d8; padding: 40px; }}
        h1 {{ color: #1a1a1a; margin-top: 0; font-size: 22px; font-weight: normal; letter-spacing: 1px; }}
        .button {{ display: inline-block; padding: 14px 32px; background: #1a1a1a; color: #ffffff; text-decoration: none; letter-spacing: 2px; font-size: 13px; margin: 24px 0; }}
        .expires {{ color: #8a8378; font-size: 14px; }}
        .footer {{ margin-top: 32px; padding-top: 20px; border-top: 1px solid #e8e2d8; color: #8a8378; font-size: 12px; }}
    </style>
</head>
<body>
    <div class="container">
        <div class="card">
            <h1>MAISON ATELIER</h1>
            <p>You've been invited to join the back office as <strong>{}</strong>.</p>
            <a class="button" href="{}">COMPLETE SIGNUP</a>
            <p class="expires">This invitation expires on {}.</p>
            <div class="footer">
                <p>If you weren't expecting this invitation, you can ignore this email.</p>
            </div>
        </div>
    </div>
</body>
</html>"#,
            role, signup_url, expires
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn content() -> InvitationEmailContent {
        let expires_at: DateTime<Utc> = "2026-03-15T00:00:00Z".parse().unwrap();
        InvitationEmailContent::new(
            "https://admin.example.com/signup/abc123",
            "MEMBER",
            &expires_at,
        )
    }

    #[test]
    fn test_content_contains_link() {
        let content = content();
        assert!(content.text.contains("https://admin.example.com/signup/abc123"));
        assert!(content.html.contains("https://admin.example.com/signup/abc123"));
    }

    #[test]
    fn test_content_contains_role_and_expiry() {
        let content = content();
        assert!(content.text.contains("MEMBER"));
        assert!(content.html.contains("MEMBER"));
        assert!(content.text.contains("March 15, 2026"));
        assert!(content.html.contains("March 15, 2026"));
    }

    #[test]
    fn test_subject() {
        assert!(content().subject.contains("invited"));
    }
}
