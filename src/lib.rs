pub mod app;
pub mod auth;
pub mod config;
pub mod errors;
pub mod gateway;
pub mod gesture;
pub mod guard;
pub mod handlers;
pub mod identity;
pub mod models;
pub mod remote;
pub mod state;
pub mod stats;
pub mod storage;
pub mod ui;
pub mod week;

pub use app::{router, spawn_session_listener};
pub use config::Config;
pub use gateway::Gateway;
pub use state::AppState;
pub use storage::PreferenceStore;
