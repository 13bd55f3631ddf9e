//! Account and session handling backed by the hosted identity service.

pub mod memory;
pub mod rest;

use crate::errors::AuthError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;

pub use memory::MemoryIdentity;
pub use rest::RestIdentity;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub user: User,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// Result of a sign-in or sign-up call. A sign-up awaiting email
/// confirmation carries a user but no session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthOutcome {
    pub user: Option<User>,
    pub session: Option<Session>,
}

#[async_trait]
pub trait IdentityService: Send + Sync {
    async fn sign_in(&self, credentials: &Credentials) -> Result<AuthOutcome, AuthError>;

    async fn sign_up(&self, credentials: &Credentials) -> Result<AuthOutcome, AuthError>;

    async fn sign_out(&self, session: &Session) -> Result<(), AuthError>;

    /// Trades a refresh token for a fresh session. Refresh tokens are single
    /// use; the returned session carries the next one.
    async fn refresh(&self, refresh_token: &str) -> Result<Session, AuthError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn,
    SignedOut,
}

impl AuthEvent {
    pub fn between(before: Option<&Session>, after: Option<&Session>) -> Option<Self> {
        match (before, after) {
            (None, Some(_)) => Some(AuthEvent::SignedIn),
            (Some(_), None) => Some(AuthEvent::SignedOut),
            (Some(old), Some(new)) if old.user.id != new.user.id => Some(AuthEvent::SignedIn),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AuthEvent::SignedIn => "SIGNED_IN",
            AuthEvent::SignedOut => "SIGNED_OUT",
        }
    }
}

/// The client's single current session. Every change is published to
/// subscribers.
#[derive(Clone)]
pub struct SessionStore {
    tx: Arc<watch::Sender<Option<Session>>>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    pub fn current(&self) -> Option<Session> {
        self.tx.borrow().clone()
    }

    pub fn user(&self) -> Option<User> {
        self.tx.borrow().as_ref().map(|session| session.user.clone())
    }

    pub fn access_token(&self) -> Option<String> {
        self.tx
            .borrow()
            .as_ref()
            .map(|session| session.access_token.clone())
    }

    pub fn set(&self, session: Session) {
        self.tx.send_replace(Some(session));
    }

    pub fn clear(&self) -> Option<Session> {
        self.tx.send_replace(None)
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(user: &str) -> Session {
        Session {
            access_token: format!("token-{user}"),
            refresh_token: None,
            user: User {
                id: user.to_string(),
                email: None,
            },
        }
    }

    #[test]
    fn events_follow_session_presence() {
        let a = session("a");
        let b = session("b");
        assert_eq!(AuthEvent::between(None, Some(&a)), Some(AuthEvent::SignedIn));
        assert_eq!(AuthEvent::between(Some(&a), None), Some(AuthEvent::SignedOut));
        assert_eq!(AuthEvent::between(Some(&a), Some(&b)), Some(AuthEvent::SignedIn));
        assert_eq!(AuthEvent::between(Some(&a), Some(&a)), None);
        assert_eq!(AuthEvent::between(None, None), None);
    }

    #[tokio::test]
    async fn subscribers_observe_changes() {
        let store = SessionStore::new();
        let mut rx = store.subscribe();

        store.set(session("a"));
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().as_ref().map(|s| s.user.id.clone()), Some("a".into()));

        let previous = store.clear();
        assert!(previous.is_some());
        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().is_none());
        assert!(store.user().is_none());
    }
}
