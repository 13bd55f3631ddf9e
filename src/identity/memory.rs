use super::{AuthOutcome, Credentials, IdentityService, Session, User};
use crate::errors::AuthError;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

const MIN_PASSWORD_LEN: usize = 6;

struct Account {
    user: User,
    password: String,
    confirmed: bool,
}

/// Process-local accounts. Error messages match the hosted service so the
/// auth gate's translation table applies unchanged.
pub struct MemoryIdentity {
    accounts: Mutex<HashMap<String, Account>>,
    /// Outstanding refresh tokens and the user each one belongs to.
    refresh_tokens: Mutex<HashMap<String, User>>,
    require_confirmation: bool,
}

impl MemoryIdentity {
    pub fn new(require_confirmation: bool) -> Self {
        Self {
            accounts: Mutex::new(HashMap::new()),
            refresh_tokens: Mutex::new(HashMap::new()),
            require_confirmation,
        }
    }

    /// Marks an account as confirmed, as following the emailed link would.
    pub async fn confirm(&self, email: &str) -> bool {
        match self.accounts.lock().await.get_mut(email) {
            Some(account) => {
                account.confirmed = true;
                true
            }
            None => false,
        }
    }

    async fn open_session(&self, user: &User) -> Session {
        let refresh_token = uuid::Uuid::new_v4().to_string();
        self.refresh_tokens
            .lock()
            .await
            .insert(refresh_token.clone(), user.clone());
        Session {
            access_token: uuid::Uuid::new_v4().to_string(),
            refresh_token: Some(refresh_token),
            user: user.clone(),
        }
    }
}

#[async_trait]
impl IdentityService for MemoryIdentity {
    async fn sign_in(&self, credentials: &Credentials) -> Result<AuthOutcome, AuthError> {
        let user = {
            let accounts = self.accounts.lock().await;
            let account = accounts
                .get(&credentials.email)
                .filter(|account| account.password == credentials.password)
                .ok_or_else(|| AuthError::new("Invalid login credentials"))?;
            if !account.confirmed {
                return Err(AuthError::new("Email not confirmed"));
            }
            account.user.clone()
        };
        let session = self.open_session(&user).await;
        Ok(AuthOutcome {
            user: Some(user),
            session: Some(session),
        })
    }

    async fn sign_up(&self, credentials: &Credentials) -> Result<AuthOutcome, AuthError> {
        if credentials.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::new(
                "Password should be at least 6 characters",
            ));
        }
        let user = User {
            id: uuid::Uuid::new_v4().to_string(),
            email: Some(credentials.email.clone()),
        };
        let confirmed = !self.require_confirmation;
        {
            let mut accounts = self.accounts.lock().await;
            if accounts.contains_key(&credentials.email) {
                return Err(AuthError::new("User already registered"));
            }
            accounts.insert(
                credentials.email.clone(),
                Account {
                    user: user.clone(),
                    password: credentials.password.clone(),
                    confirmed,
                },
            );
        }

        let session = if confirmed {
            Some(self.open_session(&user).await)
        } else {
            None
        };
        Ok(AuthOutcome {
            user: Some(user),
            session,
        })
    }

    async fn sign_out(&self, session: &Session) -> Result<(), AuthError> {
        if let Some(token) = &session.refresh_token {
            self.refresh_tokens.lock().await.remove(token);
        }
        Ok(())
    }

    async fn refresh(&self, refresh_token: &str) -> Result<Session, AuthError> {
        let user = self
            .refresh_tokens
            .lock()
            .await
            .remove(refresh_token)
            .ok_or_else(|| AuthError::new("Invalid Refresh Token: Refresh Token Not Found"))?;
        Ok(self.open_session(&user).await)
    }
}
