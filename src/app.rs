use crate::guard;
use crate::handlers;
use crate::identity::{AuthEvent, SessionStore};
use crate::state::AppState;
use crate::storage::PreferenceStore;
use axum::{
    Router, middleware,
    routing::{get, post},
};
use tracing::info;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/auth/login", post(handlers::login))
        .route("/auth/register", post(handlers::register))
        .route("/auth/logout", post(handlers::logout))
        .route("/habits", get(handlers::habits).post(handlers::create_habit))
        .route("/habits/:habit_id/delete", post(handlers::delete_habit))
        .route("/habits/:habit_id/days/:day", post(handlers::set_day))
        .route("/projects", get(handlers::projects).post(handlers::create_project))
        .route("/projects/reorder", post(handlers::reorder_projects))
        .route("/projects/:project_id/delete", post(handlers::delete_project))
        .route("/projects/:project_id/tasks", post(handlers::add_task))
        .route(
            "/projects/:project_id/tasks/:task_id/toggle",
            post(handlers::toggle_task),
        )
        .route(
            "/projects/:project_id/tasks/:task_id/delete",
            post(handlers::delete_task),
        )
        .route(
            "/projects/:project_id/tasks/:task_id/edit",
            post(handlers::edit_task),
        )
        .route("/api/gestures/swipe", post(handlers::swipe))
        .route("/api/gestures/drop", post(handlers::touch_drop))
        .route("/api/session/events", get(handlers::session_events))
        .layer(middleware::from_fn_with_state(state.clone(), guard::local_only))
        .with_state(state)
}

/// Logs every sign-in and sign-out and keeps the saved session in step with
/// the current one, including token renewals.
pub fn spawn_session_listener(
    sessions: &SessionStore,
    preferences: PreferenceStore,
) -> tokio::task::JoinHandle<()> {
    let mut rx = sessions.subscribe();
    tokio::spawn(async move {
        let mut last = rx.borrow_and_update().clone();
        while rx.changed().await.is_ok() {
            let next = rx.borrow_and_update().clone();
            if let Some(event) = AuthEvent::between(last.as_ref(), next.as_ref()) {
                let user = next.as_ref().or(last.as_ref()).map(|s| s.user.id.clone());
                info!(
                    "session change: {} ({})",
                    event.as_str(),
                    user.unwrap_or_default()
                );
            }
            preferences.set_session(next.clone()).await;
            last = next;
        }
    })
}
