use crate::auth::{self, AuthMode, AuthResult, CONFIRMATION_MESSAGE};
use crate::errors::AppError;
use crate::gesture::{CardBounds, DragOutcome, DragSurface, SwipeIntent, SwipeSurface};
use crate::identity::{AuthEvent, Credentials, Session};
use crate::models::{
    ActiveTab, AuthQuery, CredentialsForm, DAYS_PER_WEEK, DayForm, EditTaskForm, HabitQuery,
    NameForm, NewHabitForm, ProjectQuery, ReorderForm, TaskForm, WeekForm,
};
use crate::state::AppState;
use crate::ui::{
    HabitViewState, Notice, ProjectViewState, render_auth, render_habits, render_projects,
    render_shell,
};
use crate::week::WeekId;
use axum::{
    Form, Json,
    extract::{Path, Query, State},
    response::{
        Html, IntoResponse, Redirect, Response,
        sse::{Event, KeepAlive, Sse},
    },
};
use futures::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;

// Shell

pub async fn index(State(state): State<AppState>, Query(query): Query<AuthQuery>) -> Html<String> {
    match state.sessions.current() {
        Some(session) => {
            let tab = state.gateway.active_tab().await;
            Html(render_tab(&state, &session, tab).await)
        }
        None => Html(render_auth(
            AuthMode::parse(query.mode.as_deref()),
            "",
            None,
        )),
    }
}

async fn render_tab(state: &AppState, session: &Session, tab: ActiveTab) -> String {
    let content = match tab {
        ActiveTab::Habits => {
            habits_content(
                state,
                HabitViewState {
                    week: WeekId::current(),
                },
            )
            .await
        }
        ActiveTab::Projects => projects_content(state, ProjectViewState::default()).await,
    };
    render_shell(tab, session.user.email.as_deref(), &content)
}

fn require_session(state: &AppState) -> Result<Session, Redirect> {
    state.sessions.current().ok_or_else(|| Redirect::to("/"))
}

// Auth gate

pub async fn login(State(state): State<AppState>, Form(form): Form<CredentialsForm>) -> Response {
    submit_credentials(state, AuthMode::Login, form).await
}

pub async fn register(
    State(state): State<AppState>,
    Form(form): Form<CredentialsForm>,
) -> Response {
    submit_credentials(state, AuthMode::Register, form).await
}

async fn submit_credentials(state: AppState, mode: AuthMode, form: CredentialsForm) -> Response {
    let credentials = Credentials {
        email: form.email.trim().to_string(),
        password: form.password,
    };
    let result = auth::submit(
        state.identity.as_ref(),
        &state.sessions,
        mode,
        &credentials,
    )
    .await;

    match result {
        AuthResult::SignedIn(_) => Redirect::to("/").into_response(),
        AuthResult::ConfirmationPending => Html(render_auth(
            mode,
            &credentials.email,
            Some(&Notice::Success(CONFIRMATION_MESSAGE.to_string())),
        ))
        .into_response(),
        AuthResult::Failed(message) => {
            Html(render_auth(mode, &credentials.email, Some(&Notice::Error(message))))
                .into_response()
        }
    }
}

pub async fn logout(State(state): State<AppState>) -> Redirect {
    auth::sign_out(state.identity.as_ref(), &state.sessions).await;
    Redirect::to("/")
}

/// Server-sent `auth` events (`SIGNED_IN` / `SIGNED_OUT`) whenever the
/// session changes, so open pages can swap between the auth gate and the
/// application.
pub async fn session_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut rx = state.sessions.subscribe();
    let last = rx.borrow_and_update().clone();
    let events = stream::unfold((rx, last), |(mut rx, mut last)| async move {
        loop {
            rx.changed().await.ok()?;
            let next = rx.borrow_and_update().clone();
            let event = AuthEvent::between(last.as_ref(), next.as_ref());
            last = next;
            if let Some(event) = event {
                let sse = Event::default().event("auth").data(event.as_str());
                return Some((Ok(sse), (rx, last)));
            }
        }
    });
    Sse::new(events).keep_alive(KeepAlive::default())
}

// Habits

fn parse_week(value: &str) -> Result<WeekId, AppError> {
    value
        .parse()
        .map_err(|err: crate::week::ParseWeekError| AppError::bad_request(err.to_string()))
}

async fn habits_content(state: &AppState, view: HabitViewState) -> String {
    let habits = state.gateway.list_habits().await;
    let logs = state.gateway.all_week_logs(view.week).await;
    render_habits(&view, &habits, &logs)
}

pub async fn habits(
    State(state): State<AppState>,
    Query(query): Query<HabitQuery>,
) -> Result<Response, AppError> {
    let session = match require_session(&state) {
        Ok(session) => session,
        Err(redirect) => return Ok(redirect.into_response()),
    };
    let week = match query.week.as_deref() {
        Some(value) => parse_week(value)?,
        None => WeekId::current(),
    };

    state.gateway.set_active_tab(ActiveTab::Habits).await;
    let content = habits_content(&state, HabitViewState { week }).await;
    let page = render_shell(ActiveTab::Habits, session.user.email.as_deref(), &content);
    Ok(Html(page).into_response())
}

pub async fn create_habit(
    State(state): State<AppState>,
    Form(form): Form<NewHabitForm>,
) -> Result<Redirect, AppError> {
    let view = HabitViewState {
        week: parse_week(&form.week)?,
    };
    if require_session(&state).is_ok() {
        let name = form.name.trim();
        if !name.is_empty() {
            state.gateway.create_habit(name).await;
        }
    }
    Ok(Redirect::to(&view.href()))
}

pub async fn delete_habit(
    State(state): State<AppState>,
    Path(habit_id): Path<String>,
    Form(form): Form<WeekForm>,
) -> Result<Redirect, AppError> {
    let view = HabitViewState {
        week: parse_week(&form.week)?,
    };
    if require_session(&state).is_ok() {
        state.gateway.delete_habit(&habit_id).await;
    }
    Ok(Redirect::to(&view.href()))
}

pub async fn set_day(
    State(state): State<AppState>,
    Path((habit_id, day)): Path<(String, usize)>,
    Form(form): Form<DayForm>,
) -> Result<Redirect, AppError> {
    if day >= DAYS_PER_WEEK {
        return Err(AppError::bad_request("day must be between 0 and 6"));
    }
    let view = HabitViewState {
        week: parse_week(&form.week)?,
    };
    if require_session(&state).is_ok() {
        state
            .gateway
            .set_day(view.week, &habit_id, day, form.value.is_some())
            .await;
    }
    Ok(Redirect::to(&view.href()))
}

// Projects

async fn projects_content(state: &AppState, view: ProjectViewState) -> String {
    let projects = state.gateway.list_projects().await;
    render_projects(&view, &projects)
}

pub async fn projects(State(state): State<AppState>, Query(query): Query<ProjectQuery>) -> Response {
    let session = match require_session(&state) {
        Ok(session) => session,
        Err(redirect) => return redirect.into_response(),
    };

    state.gateway.set_active_tab(ActiveTab::Projects).await;
    let view = ProjectViewState {
        editing: query.edit.filter(|id| !id.is_empty()),
    };
    let content = projects_content(&state, view).await;
    Html(render_shell(
        ActiveTab::Projects,
        session.user.email.as_deref(),
        &content,
    ))
    .into_response()
}

pub async fn create_project(State(state): State<AppState>, Form(form): Form<NameForm>) -> Redirect {
    let name = form.name.trim();
    if require_session(&state).is_ok() && !name.is_empty() {
        state.gateway.create_project(name).await;
    }
    Redirect::to("/projects")
}

pub async fn delete_project(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
) -> Redirect {
    if require_session(&state).is_ok() {
        state.gateway.delete_project(&project_id).await;
    }
    Redirect::to("/projects")
}

pub async fn add_task(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Form(form): Form<TaskForm>,
) -> Redirect {
    let text = form.text.trim();
    if require_session(&state).is_ok() && !text.is_empty() {
        state.gateway.add_task(&project_id, text).await;
    }
    Redirect::to("/projects")
}

pub async fn toggle_task(
    State(state): State<AppState>,
    Path((project_id, task_id)): Path<(String, String)>,
) -> Redirect {
    if require_session(&state).is_ok() {
        state.gateway.toggle_task(&project_id, &task_id).await;
    }
    Redirect::to("/projects")
}

pub async fn delete_task(
    State(state): State<AppState>,
    Path((project_id, task_id)): Path<(String, String)>,
) -> Redirect {
    if require_session(&state).is_ok() {
        state.gateway.delete_task(&project_id, &task_id).await;
    }
    Redirect::to("/projects")
}

/// Commits an inline edit. Empty or unchanged text leaves the task alone.
pub async fn edit_task(
    State(state): State<AppState>,
    Path((project_id, task_id)): Path<(String, String)>,
    Form(form): Form<EditTaskForm>,
) -> Redirect {
    let text = form.text.trim();
    if require_session(&state).is_ok() && !text.is_empty() && text != form.original {
        state.gateway.edit_task(&project_id, &task_id, text).await;
    }
    Redirect::to("/projects")
}

pub async fn reorder_projects(
    State(state): State<AppState>,
    Form(form): Form<ReorderForm>,
) -> Redirect {
    let mut surface = DragSurface::default();
    surface.start(form.from);
    if let DragOutcome::Reorder { from, to } = surface.drop_on(form.to) {
        if require_session(&state).is_ok() {
            state.gateway.reorder_projects(from, to).await;
        }
    }
    Redirect::to("/projects")
}

// Gestures

#[derive(Debug, Deserialize)]
pub struct SwipeRequest {
    pub start_x: f64,
    pub end_x: f64,
}

#[derive(Debug, Serialize)]
pub struct SwipeResponse {
    pub intent: SwipeIntent,
    pub offset: f64,
}

pub async fn swipe(Json(request): Json<SwipeRequest>) -> Json<SwipeResponse> {
    let mut surface = SwipeSurface::default();
    surface.start(request.start_x);
    let offset = surface.move_to(request.end_x);
    let intent = surface.release();
    Json(SwipeResponse { intent, offset })
}

#[derive(Debug, Deserialize)]
pub struct DropRequest {
    pub from: usize,
    pub release_y: f64,
    pub cards: Vec<CardBounds>,
}

/// Touch release over the project list; reorders when the release lands on
/// another card.
pub async fn touch_drop(
    State(state): State<AppState>,
    Json(request): Json<DropRequest>,
) -> Json<DragOutcome> {
    let mut surface = DragSurface::default();
    surface.start(request.from);
    let outcome = surface.release_at(request.release_y, &request.cards);
    match outcome {
        DragOutcome::Reorder { from, to } if require_session(&state).is_ok() => {
            state.gateway.reorder_projects(from, to).await;
            Json(outcome)
        }
        DragOutcome::Reorder { .. } => Json(DragOutcome::Cancelled),
        DragOutcome::Cancelled => Json(outcome),
    }
}
