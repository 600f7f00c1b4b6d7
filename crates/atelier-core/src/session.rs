//! The session capability supplied by the external identity provider.

use async_trait::async_trait;
use atelier_rbac::Role;

use crate::error::AdminError;

/// The signed-in account on whose behalf an action runs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Actor {
    pub email: String,
    pub role: Role,
}

impl Actor {
    pub fn new(email: impl Into<String>, role: Role) -> Self {
        Self {
            email: email.into(),
            role,
        }
    }
}

/// Resolves the current session to an actor.
///
/// Implemented by the host application over its auth stack; the cookie and
/// token mechanics behind it are out of scope here.
#[async_trait]
pub trait Session: Send + Sync {
    async fn current_user(&self) -> Result<Option<Actor>, AdminError>;
}

/// A fixed session, used by tests and by operator tooling that acts as a
/// known account.
pub struct StaticSession(pub Option<Actor>);

impl StaticSession {
    pub fn signed_in(email: impl Into<String>, role: Role) -> Self {
        Self(Some(Actor::new(email, role)))
    }

    pub fn signed_out() -> Self {
        Self(None)
    }
}

#[async_trait]
impl Session for StaticSession {
    async fn current_user(&self) -> Result<Option<Actor>, AdminError> {
        Ok(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_session() {
        let session = StaticSession::signed_in("a@example.com", Role::Admin);
        let actor = session.current_user().await.unwrap().unwrap();
        assert_eq!(actor.email, "a@example.com");
        assert_eq!(actor.role, Role::Admin);

        let session = StaticSession::signed_out();
        assert!(session.current_user().await.unwrap().is_none());
    }
}
