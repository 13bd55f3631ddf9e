use crate::config::{Backend, Config};
use crate::gateway::Gateway;
use crate::identity::{IdentityService, MemoryIdentity, RestIdentity, SessionStore};
use crate::remote::{MemoryStore, RefreshingStore, RemoteStore, RestStore};
use crate::storage::PreferenceStore;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub gateway: Gateway,
    pub identity: Arc<dyn IdentityService>,
    pub sessions: SessionStore,
    /// Port the host listens on; requests must address it.
    pub port: u16,
}

impl AppState {
    pub fn new(
        store: Arc<dyn RemoteStore>,
        identity: Arc<dyn IdentityService>,
        sessions: SessionStore,
        preferences: PreferenceStore,
        port: u16,
    ) -> Self {
        Self {
            gateway: Gateway::new(store, sessions.clone(), preferences),
            identity,
            sessions,
            port,
        }
    }

    pub fn from_config(config: &Config, preferences: PreferenceStore) -> Self {
        let sessions = SessionStore::new();
        match &config.backend {
            Backend::Remote { url, anon_key } => {
                let client = reqwest::Client::new();
                let rest = RestStore::new(client.clone(), url, anon_key, sessions.clone());
                let identity: Arc<dyn IdentityService> =
                    Arc::new(RestIdentity::new(client, url, anon_key));
                let store = RefreshingStore::new(Arc::new(rest), identity.clone(), sessions.clone());
                Self::new(Arc::new(store), identity, sessions, preferences, config.port)
            }
            Backend::Memory { confirm_email } => Self::new(
                Arc::new(MemoryStore::new()),
                Arc::new(MemoryIdentity::new(*confirm_email)),
                sessions,
                preferences,
                config.port,
            ),
        }
    }
}
