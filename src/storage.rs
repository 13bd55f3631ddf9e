use crate::errors::AppError;
use crate::identity::Session;
use crate::models::ActiveTab;
use serde::{Deserialize, Serialize};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::{fs, sync::Mutex};
use tracing::error;

/// State kept on the local machine, never in the remote store: the active tab
/// and the last session, so a restart does not force a new sign-in.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Preferences {
    #[serde(default, rename = "activeTab")]
    pub active_tab: ActiveTab,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<Session>,
}

pub async fn load_preferences(path: &Path) -> Preferences {
    match fs::read(path).await {
        Ok(bytes) => match serde_json::from_slice(&bytes) {
            Ok(prefs) => prefs,
            Err(err) => {
                error!("failed to parse preferences file: {err}");
                Preferences::default()
            }
        },
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Preferences::default(),
        Err(err) => {
            error!("failed to read preferences file: {err}");
            Preferences::default()
        }
    }
}

pub async fn persist_preferences(path: &Path, prefs: &Preferences) -> Result<(), AppError> {
    let payload = serde_json::to_vec_pretty(prefs).map_err(AppError::internal)?;
    fs::write(path, payload).await.map_err(AppError::internal)?;
    Ok(())
}

/// Shared handle over the preference file. Without a path, changes live only
/// in memory.
#[derive(Clone, Default)]
pub struct PreferenceStore {
    path: Option<PathBuf>,
    current: Arc<Mutex<Preferences>>,
}

impl PreferenceStore {
    pub async fn open(path: PathBuf) -> Result<Self, std::io::Error> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        let prefs = load_preferences(&path).await;
        Ok(Self {
            path: Some(path),
            current: Arc::new(Mutex::new(prefs)),
        })
    }

    pub fn ephemeral() -> Self {
        Self::default()
    }

    pub async fn active_tab(&self) -> ActiveTab {
        self.current.lock().await.active_tab
    }

    pub async fn set_active_tab(&self, tab: ActiveTab) {
        let mut prefs = self.current.lock().await;
        prefs.active_tab = tab;
        self.persist(&prefs).await;
    }

    pub async fn session(&self) -> Option<Session> {
        self.current.lock().await.session.clone()
    }

    pub async fn set_session(&self, session: Option<Session>) {
        let mut prefs = self.current.lock().await;
        if prefs.session == session {
            return;
        }
        prefs.session = session;
        self.persist(&prefs).await;
    }

    async fn persist(&self, prefs: &Preferences) {
        if let Some(path) = &self.path {
            if let Err(err) = persist_preferences(path, prefs).await {
                error!("failed to persist preferences: {}", err.message);
            }
        }
    }
}
