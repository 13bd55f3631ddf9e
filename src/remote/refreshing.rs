use super::{Filter, Query, RemoteStore, Table};
use crate::errors::StoreError;
use crate::identity::{IdentityService, SessionStore};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Wraps a store whose requests carry the session's access token. When the
/// store rejects the token, the session is renewed with its refresh token and
/// the call is retried once. A failed renewal ends the session.
pub struct RefreshingStore {
    inner: Arc<dyn RemoteStore>,
    identity: Arc<dyn IdentityService>,
    sessions: SessionStore,
    renewing: Mutex<()>,
}

impl RefreshingStore {
    pub fn new(
        inner: Arc<dyn RemoteStore>,
        identity: Arc<dyn IdentityService>,
        sessions: SessionStore,
    ) -> Self {
        Self {
            inner,
            identity,
            sessions,
            renewing: Mutex::new(()),
        }
    }

    /// Renews the session unless another call already replaced the token
    /// that was rejected.
    async fn renew(&self, rejected: Option<&str>, cause: StoreError) -> Result<(), StoreError> {
        let _guard = self.renewing.lock().await;
        let Some(session) = self.sessions.current() else {
            return Err(cause);
        };
        if rejected != Some(session.access_token.as_str()) {
            return Ok(());
        }

        let Some(refresh_token) = session.refresh_token.as_deref() else {
            warn!("access token rejected and no refresh token held; signing out");
            self.sessions.clear();
            return Err(cause);
        };
        match self.identity.refresh(refresh_token).await {
            Ok(renewed) => {
                info!("renewed session for {}", renewed.user.id);
                self.sessions.set(renewed);
                Ok(())
            }
            Err(err) => {
                warn!("could not renew session, signing out: {err}");
                self.sessions.clear();
                Err(cause)
            }
        }
    }
}

macro_rules! with_renewal {
    ($self:ident, $call:expr) => {{
        let token = $self.sessions.access_token();
        match $call {
            Err(err) if err.is_jwt_rejected() => {
                $self.renew(token.as_deref(), err).await?;
                $call
            }
            result => result,
        }
    }};
}

#[async_trait]
impl RemoteStore for RefreshingStore {
    async fn select(&self, table: Table, query: &Query) -> Result<Vec<Value>, StoreError> {
        with_renewal!(self, self.inner.select(table, query).await)
    }

    async fn insert(&self, table: Table, row: Value) -> Result<Value, StoreError> {
        with_renewal!(self, self.inner.insert(table, row.clone()).await)
    }

    async fn update(
        &self,
        table: Table,
        filters: &[Filter],
        patch: Value,
    ) -> Result<(), StoreError> {
        with_renewal!(self, self.inner.update(table, filters, patch.clone()).await)
    }

    async fn delete(&self, table: Table, filters: &[Filter]) -> Result<(), StoreError> {
        with_renewal!(self, self.inner.delete(table, filters).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{Credentials, MemoryIdentity, Session};
    use crate::remote::MemoryStore;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Memory store that rejects requests carrying an expired access token,
    /// like PostgREST checking the JWT.
    struct TokenCheckingStore {
        inner: MemoryStore,
        sessions: SessionStore,
        expired: Vec<String>,
        calls: AtomicUsize,
    }

    impl TokenCheckingStore {
        fn check(&self) -> Result<(), StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let token = self.sessions.access_token().unwrap_or_default();
            if self.expired.contains(&token) {
                return Err(StoreError::jwt_rejected("JWT expired"));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl RemoteStore for TokenCheckingStore {
        async fn select(&self, table: Table, query: &Query) -> Result<Vec<Value>, StoreError> {
            self.check()?;
            self.inner.select(table, query).await
        }

        async fn insert(&self, table: Table, row: Value) -> Result<Value, StoreError> {
            self.check()?;
            self.inner.insert(table, row).await
        }

        async fn update(
            &self,
            table: Table,
            filters: &[Filter],
            patch: Value,
        ) -> Result<(), StoreError> {
            self.check()?;
            self.inner.update(table, filters, patch).await
        }

        async fn delete(&self, table: Table, filters: &[Filter]) -> Result<(), StoreError> {
            self.check()?;
            self.inner.delete(table, filters).await
        }
    }

    async fn signed_in() -> (Arc<MemoryIdentity>, SessionStore, Session) {
        let identity = Arc::new(MemoryIdentity::new(false));
        let credentials = Credentials {
            email: "ana@example.com".into(),
            password: "secreto".into(),
        };
        let session = identity
            .sign_up(&credentials)
            .await
            .unwrap()
            .session
            .unwrap();
        let sessions = SessionStore::new();
        sessions.set(session.clone());
        (identity, sessions, session)
    }

    fn checking(sessions: &SessionStore, expired: &Session) -> Arc<TokenCheckingStore> {
        Arc::new(TokenCheckingStore {
            inner: MemoryStore::new(),
            sessions: sessions.clone(),
            expired: vec![expired.access_token.clone()],
            calls: AtomicUsize::new(0),
        })
    }

    #[tokio::test]
    async fn expired_token_is_renewed_and_call_retried() {
        let (identity, sessions, original) = signed_in().await;
        let inner = checking(&sessions, &original);
        let store = RefreshingStore::new(inner.clone(), identity, sessions.clone());

        let row = store
            .insert(Table::Habits, json!({ "name": "Leer" }))
            .await
            .unwrap();
        assert_eq!(row["name"], "Leer");
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);

        let renewed = sessions.current().expect("still signed in");
        assert_eq!(renewed.user, original.user);
        assert_ne!(renewed.access_token, original.access_token);
        assert_eq!(store.select(Table::Habits, &Query::all()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_renewal_signs_out() {
        let (identity, sessions, original) = signed_in().await;
        let inner = checking(&sessions, &original);
        // Spend the refresh token so the renewal is refused.
        identity
            .refresh(original.refresh_token.as_deref().unwrap())
            .await
            .unwrap();
        let store = RefreshingStore::new(inner, identity, sessions.clone());
        let mut changes = sessions.subscribe();

        let err = store
            .select(Table::Projects, &Query::all())
            .await
            .unwrap_err();
        assert!(err.is_jwt_rejected());
        assert!(sessions.current().is_none());
        assert!(changes.has_changed().unwrap());
        assert!(changes.borrow_and_update().is_none());
    }

    #[tokio::test]
    async fn other_errors_pass_through_without_renewal() {
        let (identity, sessions, original) = signed_in().await;
        let store = RefreshingStore::new(Arc::new(MemoryStore::new()), identity, sessions.clone());

        let err = store
            .update(Table::Projects, &[], json!(null))
            .await
            .unwrap_err();
        assert!(!err.is_jwt_rejected());
        assert_eq!(sessions.current(), Some(original));
    }
}
