use checkapp::{AppState, Config, PreferenceStore, router, spawn_session_listener};
use std::net::SocketAddr;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let config = Config::from_env()?;
    let preferences = PreferenceStore::open(config.data_path.clone()).await?;
    let saved = preferences.session().await;
    let state = AppState::from_config(&config, preferences.clone());
    if let Some(session) = saved {
        info!("restoring session for {}", session.user.id);
        state.sessions.set(session);
    }
    spawn_session_listener(&state.sessions, preferences);

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    info!("listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(state)).await?;

    Ok(())
}
