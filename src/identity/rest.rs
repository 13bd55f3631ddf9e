use super::{AuthOutcome, Credentials, IdentityService, Session, User};
use crate::errors::AuthError;
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde_json::{Value, json};
use tracing::warn;

/// Hosted identity service speaking the `/auth/v1` HTTP API.
pub struct RestIdentity {
    client: Client,
    base_url: String,
    anon_key: String,
}

impl RestIdentity {
    pub fn new(client: Client, base_url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            anon_key: anon_key.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/auth/v1/{path}", self.base_url)
    }

    async fn post_credentials(
        &self,
        path: &str,
        credentials: &Credentials,
    ) -> Result<Value, AuthError> {
        let response = self
            .client
            .post(self.url(path))
            .header("apikey", &self.anon_key)
            .json(&json!({
                "email": credentials.email,
                "password": credentials.password,
            }))
            .send()
            .await?;
        read_body(response).await
    }
}

#[async_trait]
impl IdentityService for RestIdentity {
    async fn sign_in(&self, credentials: &Credentials) -> Result<AuthOutcome, AuthError> {
        let body = self
            .post_credentials("token?grant_type=password", credentials)
            .await?;
        parse_outcome(body)
    }

    async fn sign_up(&self, credentials: &Credentials) -> Result<AuthOutcome, AuthError> {
        let body = self.post_credentials("signup", credentials).await?;
        parse_outcome(body)
    }

    async fn sign_out(&self, session: &Session) -> Result<(), AuthError> {
        let response = self
            .client
            .post(self.url("logout"))
            .header("apikey", &self.anon_key)
            .bearer_auth(&session.access_token)
            .send()
            .await?;
        if response.status().is_success() {
            return Ok(());
        }
        let status = response.status();
        let body: Value = response.json().await.unwrap_or(Value::Null);
        Err(AuthError::new(error_message(&body).unwrap_or_else(|| status.to_string())))
    }

    async fn refresh(&self, refresh_token: &str) -> Result<Session, AuthError> {
        let response = self
            .client
            .post(self.url("token?grant_type=refresh_token"))
            .header("apikey", &self.anon_key)
            .json(&json!({ "refresh_token": refresh_token }))
            .send()
            .await?;
        let body = read_body(response).await?;
        parse_outcome(body)?
            .session
            .ok_or_else(|| AuthError::new("refresh response carried no session"))
    }
}

async fn read_body(response: Response) -> Result<Value, AuthError> {
    let status = response.status();
    let body: Value = response.json().await.unwrap_or(Value::Null);
    if status.is_success() {
        return Ok(body);
    }
    let message = error_message(&body).unwrap_or_else(|| status.to_string());
    warn!("identity service rejected request: {status} {message}");
    Err(AuthError::new(message))
}

fn error_message(body: &Value) -> Option<String> {
    ["msg", "error_description", "message", "error"]
        .iter()
        .find_map(|key| body.get(*key).and_then(Value::as_str))
        .map(str::to_string)
}

/// A token response carries `access_token` plus a nested `user`; a sign-up
/// pending confirmation returns the bare user object instead.
fn parse_outcome(body: Value) -> Result<AuthOutcome, AuthError> {
    let user_value = match body.get("user") {
        Some(user) if !user.is_null() => user.clone(),
        _ if body.get("id").is_some() => body.clone(),
        _ => Value::Null,
    };
    let user: Option<User> = if user_value.is_null() {
        None
    } else {
        Some(
            serde_json::from_value(user_value)
                .map_err(|err| AuthError::new(format!("unexpected user payload: {err}")))?,
        )
    };

    let access_token = body
        .get("access_token")
        .and_then(Value::as_str)
        .map(str::to_string);
    let session = match (access_token, &user) {
        (Some(access_token), Some(user)) => Some(Session {
            access_token,
            refresh_token: body
                .get("refresh_token")
                .and_then(Value::as_str)
                .map(str::to_string),
            user: user.clone(),
        }),
        _ => None,
    };

    Ok(AuthOutcome { user, session })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_response_yields_session() {
        let outcome = parse_outcome(json!({
            "access_token": "abc",
            "refresh_token": "def",
            "user": {"id": "u1", "email": "ana@example.com"}
        }))
        .unwrap();
        let session = outcome.session.expect("session");
        assert_eq!(session.access_token, "abc");
        assert_eq!(session.user.id, "u1");
    }

    #[test]
    fn pending_confirmation_yields_user_only() {
        let outcome = parse_outcome(json!({"id": "u1", "email": "ana@example.com"})).unwrap();
        assert_eq!(outcome.user.map(|user| user.id).as_deref(), Some("u1"));
        assert!(outcome.session.is_none());
    }

    #[test]
    fn refresh_response_rotates_refresh_token() {
        let outcome = parse_outcome(json!({
            "access_token": "new-access",
            "refresh_token": "new-refresh",
            "token_type": "bearer",
            "user": {"id": "u1"}
        }))
        .unwrap();
        let session = outcome.session.expect("session");
        assert_eq!(session.refresh_token.as_deref(), Some("new-refresh"));
        assert_eq!(session.user.email, None);
    }

    #[test]
    fn error_message_prefers_msg_field() {
        let body = json!({"code": 400, "msg": "Invalid login credentials", "error": "x"});
        assert_eq!(error_message(&body).as_deref(), Some("Invalid login credentials"));
        assert_eq!(error_message(&Value::Null), None);
    }
}
