use crate::identity::{Credentials, IdentityService, Session, SessionStore};
use tracing::{error, info, warn};

pub const CONFIRMATION_MESSAGE: &str = "Revisa tu email para confirmar tu cuenta";

/// Shown when the service accepted the request but handed back no session.
pub const NO_SESSION_MESSAGE: &str = "No se pudo iniciar la sesión, inténtalo de nuevo";

const ERROR_TRANSLATIONS: &[(&str, &str)] = &[
    ("Invalid login credentials", "Email o contraseña incorrectos"),
    ("Email not confirmed", "Debes confirmar tu email primero"),
    ("User already registered", "Este email ya está registrado"),
    (
        "Password should be at least 6 characters",
        "La contraseña debe tener al menos 6 caracteres",
    ),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthMode {
    #[default]
    Login,
    Register,
}

impl AuthMode {
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some("register") => AuthMode::Register,
            _ => AuthMode::Login,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMode::Login => "login",
            AuthMode::Register => "register",
        }
    }

    pub fn submit_label(&self) -> &'static str {
        match self {
            AuthMode::Login => "Iniciar Sesión",
            AuthMode::Register => "Registrarse",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthResult {
    SignedIn(Session),
    /// Account created; the service wants the email confirmed before it
    /// hands out a session.
    ConfirmationPending,
    Failed(String),
}

/// Maps the identity service's known failure texts to display text, passing
/// unknown ones through unchanged.
pub fn translate_error(message: &str) -> String {
    ERROR_TRANSLATIONS
        .iter()
        .find(|(raw, _)| *raw == message)
        .map_or_else(|| message.to_string(), |(_, text)| text.to_string())
}

/// Runs a login or registration and, when a session comes back, installs it
/// as the current session (which notifies the shell).
pub async fn submit(
    identity: &dyn IdentityService,
    sessions: &SessionStore,
    mode: AuthMode,
    credentials: &Credentials,
) -> AuthResult {
    let result = match mode {
        AuthMode::Login => identity.sign_in(credentials).await,
        AuthMode::Register => identity.sign_up(credentials).await,
    };

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(err) => return AuthResult::Failed(translate_error(&err.message)),
    };

    match (outcome.session, outcome.user) {
        (Some(session), _) => {
            info!("signed in as {}", session.user.id);
            sessions.set(session.clone());
            AuthResult::SignedIn(session)
        }
        (None, Some(_)) if mode == AuthMode::Register => AuthResult::ConfirmationPending,
        (None, _) => {
            warn!("{} succeeded without a session", mode.as_str());
            AuthResult::Failed(NO_SESSION_MESSAGE.to_string())
        }
    }
}

/// Ends the current session. The local session is dropped even if the
/// service call fails.
pub async fn sign_out(identity: &dyn IdentityService, sessions: &SessionStore) {
    let Some(session) = sessions.clear() else {
        return;
    };
    if let Err(err) = identity.sign_out(&session).await {
        error!("error signing out: {err}");
    }
    info!("signed out {}", session.user.id);
}
