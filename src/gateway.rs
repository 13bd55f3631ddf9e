//! Domain operations against the remote store.
//!
//! Nothing here returns an error to the caller: failed reads are logged and
//! replaced by an empty or default value, failed writes are logged and
//! dropped. Views re-read after every mutation, so a lost write simply
//! shows up as "nothing happened".
//!
//! Mutations that touch an existing row are read-modify-write without any
//! version check. Two sessions editing the same week log or the same
//! project's task list can overwrite each other; the last write wins.

use crate::errors::StoreError;
use crate::identity::SessionStore;
use crate::models::{ActiveTab, Days, Habit, Project, Task, nullable_days};
use crate::remote::{Filter, Query, RemoteStore, Table, decode, decode_all, single};
use crate::storage::PreferenceStore;
use crate::week::WeekId;
use chrono::Utc;
use futures::future::join_all;
use serde::Deserialize;
use serde_json::json;
use std::{collections::HashMap, sync::Arc};
use tracing::{error, warn};

#[derive(Clone)]
pub struct Gateway {
    store: Arc<dyn RemoteStore>,
    session: SessionStore,
    preferences: PreferenceStore,
}

#[derive(Deserialize)]
struct LogRow {
    id: String,
    #[serde(default, deserialize_with = "nullable_days")]
    days: Days,
}

#[derive(Deserialize)]
struct HabitDaysRow {
    habit_id: String,
    #[serde(default, deserialize_with = "nullable_days")]
    days: Days,
}

#[derive(Deserialize)]
struct TasksRow {
    #[serde(default)]
    tasks: Option<Vec<Task>>,
}

#[derive(Deserialize)]
struct PositionRow {
    position: i64,
}

impl Gateway {
    pub fn new(
        store: Arc<dyn RemoteStore>,
        session: SessionStore,
        preferences: PreferenceStore,
    ) -> Self {
        Self {
            store,
            session,
            preferences,
        }
    }

    fn owner_id(&self, operation: &str) -> Option<String> {
        let user = self.session.user();
        if user.is_none() {
            error!("{operation}: no signed-in user");
        }
        user.map(|user| user.id)
    }

    // Habits

    pub async fn list_habits(&self) -> Vec<Habit> {
        let query = Query::all().order_by("created_at", true);
        let result = self.store.select(Table::Habits, &query).await;
        match result.and_then(decode_all) {
            Ok(habits) => habits,
            Err(err) => {
                error!("error fetching habits: {err}");
                Vec::new()
            }
        }
    }

    pub async fn create_habit(&self, name: &str) -> Option<Habit> {
        let user_id = self.owner_id("create habit")?;
        let row = json!({ "name": name, "user_id": user_id });
        match self.store.insert(Table::Habits, row).await.and_then(decode) {
            Ok(habit) => Some(habit),
            Err(err) => {
                error!("error adding habit: {err}");
                None
            }
        }
    }

    pub async fn delete_habit(&self, id: &str) {
        if let Err(err) = self
            .store
            .delete(Table::Habits, &[Filter::eq("id", id)])
            .await
        {
            error!("error deleting habit {id}: {err}");
        }
    }

    // Week logs

    async fn find_log(&self, week: WeekId, habit_id: &str) -> Result<LogRow, StoreError> {
        let query = Query::all()
            .columns("id, days")
            .eq("week", week.to_string())
            .eq("habit_id", habit_id);
        let rows = self.store.select(Table::HabitLogs, &query).await?;
        decode(single(rows)?)
    }

    pub async fn week_log(&self, week: WeekId, habit_id: &str) -> Days {
        match self.find_log(week, habit_id).await {
            Ok(log) => log.days,
            Err(err) if err.is_not_found() => Days::default(),
            Err(err) => {
                error!("error fetching week log for habit {habit_id}: {err}");
                Days::default()
            }
        }
    }

    pub async fn all_week_logs(&self, week: WeekId) -> HashMap<String, Days> {
        let query = Query::all()
            .columns("habit_id, days")
            .eq("week", week.to_string());
        let result = self.store.select(Table::HabitLogs, &query).await;
        match result.and_then(decode_all::<HabitDaysRow>) {
            Ok(rows) => rows.into_iter().map(|row| (row.habit_id, row.days)).collect(),
            Err(err) => {
                error!("error fetching week logs for {week}: {err}");
                HashMap::new()
            }
        }
    }

    /// Sets one day of a habit's week, creating the week's log on first use.
    pub async fn set_day(&self, week: WeekId, habit_id: &str, day: usize, value: bool) {
        let Some(user_id) = self.owner_id("set day") else {
            return;
        };

        let result = match self.find_log(week, habit_id).await {
            Ok(existing) => {
                let days = existing.days.with(day, value);
                self.store
                    .update(
                        Table::HabitLogs,
                        &[Filter::eq("id", existing.id)],
                        json!({ "days": days }),
                    )
                    .await
            }
            Err(err) if err.is_not_found() => {
                let row = json!({
                    "week": week.to_string(),
                    "habit_id": habit_id,
                    "days": Days::only(day, value),
                    "user_id": user_id,
                });
                self.store.insert(Table::HabitLogs, row).await.map(|_| ())
            }
            Err(err) => Err(err),
        };

        if let Err(err) = result {
            error!("error setting day {day} of {week} for habit {habit_id}: {err}");
        }
    }

    // Projects

    pub async fn list_projects(&self) -> Vec<Project> {
        let query = Query::all().order_by("position", true);
        let result = self.store.select(Table::Projects, &query).await;
        match result.and_then(decode_all) {
            Ok(projects) => projects,
            Err(err) => {
                error!("error fetching projects: {err}");
                Vec::new()
            }
        }
    }

    async fn next_position(&self) -> Result<i64, StoreError> {
        let query = Query::all()
            .columns("position")
            .order_by("position", false)
            .limit(1);
        let rows: Vec<PositionRow> = decode_all(self.store.select(Table::Projects, &query).await?)?;
        Ok(rows.first().map_or(0, |row| row.position + 1))
    }

    pub async fn create_project(&self, name: &str) -> Option<Project> {
        let user_id = self.owner_id("create project")?;
        let result = match self.next_position().await {
            Ok(position) => {
                let row = json!({
                    "name": name,
                    "user_id": user_id,
                    "tasks": [],
                    "position": position,
                });
                self.store.insert(Table::Projects, row).await.and_then(decode)
            }
            Err(err) => Err(err),
        };
        match result {
            Ok(project) => Some(project),
            Err(err) => {
                error!("error adding project: {err}");
                None
            }
        }
    }

    pub async fn delete_project(&self, id: &str) {
        if let Err(err) = self
            .store
            .delete(Table::Projects, &[Filter::eq("id", id)])
            .await
        {
            error!("error deleting project {id}: {err}");
        }
    }

    // Tasks live inside their project's `tasks` column and are rewritten as
    // a whole on every change.

    async fn fetch_tasks(&self, project_id: &str) -> Result<Vec<Task>, StoreError> {
        let query = Query::all().columns("tasks").eq("id", project_id);
        let rows = self.store.select(Table::Projects, &query).await?;
        let row: TasksRow = decode(single(rows)?)?;
        Ok(row.tasks.unwrap_or_default())
    }

    async fn rewrite_tasks<F>(&self, operation: &str, project_id: &str, change: F) -> bool
    where
        F: FnOnce(Vec<Task>) -> Vec<Task>,
    {
        let result = match self.fetch_tasks(project_id).await {
            Ok(tasks) => {
                let tasks = change(tasks);
                self.store
                    .update(
                        Table::Projects,
                        &[Filter::eq("id", project_id)],
                        json!({ "tasks": tasks }),
                    )
                    .await
            }
            Err(err) => Err(err),
        };
        match result {
            Ok(()) => true,
            Err(err) => {
                error!("error during {operation} on project {project_id}: {err}");
                false
            }
        }
    }

    pub async fn add_task(&self, project_id: &str, text: &str) -> Option<Task> {
        let task = Task {
            id: uuid::Uuid::new_v4().to_string(),
            text: text.to_string(),
            done: false,
            created_at: Utc::now().timestamp_millis(),
        };
        let added = task.clone();
        self.rewrite_tasks("add task", project_id, move |mut tasks| {
            tasks.push(added);
            tasks
        })
        .await
        .then_some(task)
    }

    pub async fn toggle_task(&self, project_id: &str, task_id: &str) {
        self.rewrite_tasks("toggle task", project_id, |tasks| {
            tasks
                .into_iter()
                .map(|mut task| {
                    if task.id == task_id {
                        task.done = !task.done;
                    }
                    task
                })
                .collect()
        })
        .await;
    }

    pub async fn delete_task(&self, project_id: &str, task_id: &str) {
        self.rewrite_tasks("delete task", project_id, |tasks| {
            tasks.into_iter().filter(|task| task.id != task_id).collect()
        })
        .await;
    }

    pub async fn edit_task(&self, project_id: &str, task_id: &str, text: &str) {
        self.rewrite_tasks("edit task", project_id, |tasks| {
            tasks
                .into_iter()
                .map(|mut task| {
                    if task.id == task_id {
                        task.text = text.to_string();
                    }
                    task
                })
                .collect()
        })
        .await;
    }

    /// Moves the project at `from` to `to` and renumbers every project to
    /// its new rank. Updates run concurrently; if some fail the order is left
    /// partially applied.
    pub async fn reorder_projects(&self, from: usize, to: usize) {
        let mut projects = self.list_projects().await;
        if !move_item(&mut projects, from, to) {
            warn!(
                "ignoring reorder {from} -> {to} for {} projects",
                projects.len()
            );
            return;
        }

        let filters: Vec<[Filter; 1]> = projects
            .iter()
            .map(|project| [Filter::eq("id", project.id.as_str())])
            .collect();
        let updates = filters.iter().enumerate().map(|(position, filter)| {
            self.store
                .update(Table::Projects, filter, json!({ "position": position }))
        });
        let results = join_all(updates).await;
        for (project, result) in projects.iter().zip(results) {
            if let Err(err) = result {
                error!("error updating position of project {}: {err}", project.id);
            }
        }
    }

    // Preferences

    pub async fn active_tab(&self) -> ActiveTab {
        self.preferences.active_tab().await
    }

    pub async fn set_active_tab(&self, tab: ActiveTab) {
        self.preferences.set_active_tab(tab).await;
    }
}

/// Removes the element at `from` and reinserts it at `to`. Returns `false`
/// when either index is out of range.
pub fn move_item<T>(items: &mut Vec<T>, from: usize, to: usize) -> bool {
    if from >= items.len() || to >= items.len() {
        return false;
    }
    let item = items.remove(from);
    items.insert(to, item);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{Session, User};
    use crate::remote::MemoryStore;
    use async_trait::async_trait;
    use serde_json::Value;

    fn signed_in() -> SessionStore {
        let session = SessionStore::new();
        session.set(Session {
            access_token: "token".into(),
            refresh_token: None,
            user: User {
                id: "user-1".into(),
                email: Some("ana@example.com".into()),
            },
        });
        session
    }

    fn gateway() -> (Gateway, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let gateway = Gateway::new(store.clone(), signed_in(), PreferenceStore::ephemeral());
        (gateway, store)
    }

    fn week() -> WeekId {
        "2024-W05".parse().unwrap()
    }

    struct FailingStore;

    #[async_trait]
    impl RemoteStore for FailingStore {
        async fn select(&self, _: Table, _: &Query) -> Result<Vec<Value>, StoreError> {
            Err(StoreError::with_code("08006", "connection lost"))
        }

        async fn insert(&self, _: Table, _: Value) -> Result<Value, StoreError> {
            Err(StoreError::new("connection lost"))
        }

        async fn update(&self, _: Table, _: &[Filter], _: Value) -> Result<(), StoreError> {
            Err(StoreError::new("connection lost"))
        }

        async fn delete(&self, _: Table, _: &[Filter]) -> Result<(), StoreError> {
            Err(StoreError::new("connection lost"))
        }
    }

    #[tokio::test]
    async fn created_habit_is_owned_by_current_user() {
        let (gateway, _) = gateway();
        let habit = gateway.create_habit("Leer").await.expect("habit");
        assert_eq!(habit.user_id, "user-1");
        assert_eq!(gateway.list_habits().await, vec![habit]);
    }

    #[tokio::test]
    async fn writes_without_session_are_dropped() {
        let store = Arc::new(MemoryStore::new());
        let gateway = Gateway::new(store.clone(), SessionStore::new(), PreferenceStore::ephemeral());
        assert!(gateway.create_habit("Leer").await.is_none());
        assert!(gateway.create_project("Casa").await.is_none());
        gateway.set_day(week(), "h1", 0, true).await;
        assert!(store.rows(Table::Habits).await.is_empty());
        assert!(store.rows(Table::HabitLogs).await.is_empty());
    }

    #[tokio::test]
    async fn missing_week_log_defaults_to_all_false() {
        let (gateway, _) = gateway();
        assert_eq!(gateway.week_log(week(), "h1").await, Days::default());
        assert!(gateway.all_week_logs(week()).await.is_empty());
    }

    #[tokio::test]
    async fn first_toggle_creates_log_with_single_day() {
        let (gateway, store) = gateway();
        let habit = gateway.create_habit("Correr").await.unwrap();

        gateway.set_day(week(), &habit.id, 3, true).await;

        let days = gateway.week_log(week(), &habit.id).await;
        assert_eq!(
            days.iter().collect::<Vec<_>>(),
            vec![false, false, false, true, false, false, false]
        );
        let rows = store.rows(Table::HabitLogs).await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["user_id"], "user-1");
        assert_eq!(rows[0]["week"], "2024-W05");
    }

    #[tokio::test]
    async fn later_toggles_update_the_same_log() {
        let (gateway, store) = gateway();
        gateway.set_day(week(), "h1", 0, true).await;
        gateway.set_day(week(), "h1", 6, true).await;
        gateway.set_day(week(), "h1", 0, false).await;

        assert_eq!(store.rows(Table::HabitLogs).await.len(), 1);
        let logs = gateway.all_week_logs(week()).await;
        assert_eq!(logs["h1"], Days::only(6, true));

        // Other weeks are untouched.
        assert_eq!(gateway.week_log(week().next(), "h1").await, Days::default());
    }

    #[tokio::test]
    async fn deleting_habit_removes_it() {
        let (gateway, _) = gateway();
        let keep = gateway.create_habit("Leer").await.unwrap();
        let gone = gateway.create_habit("Fumar").await.unwrap();
        gateway.delete_habit(&gone.id).await;
        assert_eq!(gateway.list_habits().await, vec![keep]);
    }

    #[tokio::test]
    async fn project_positions_start_at_zero() {
        let (gateway, _) = gateway();
        let first = gateway.create_project("Casa").await.unwrap();
        let second = gateway.create_project("Trabajo").await.unwrap();
        assert_eq!(first.position, 0);
        assert_eq!(second.position, 1);
        assert!(first.tasks.is_empty());
    }

    #[tokio::test]
    async fn task_lifecycle_rewrites_embedded_list() {
        let (gateway, _) = gateway();
        let project = gateway.create_project("Casa").await.unwrap();

        let a = gateway.add_task(&project.id, "Barrer").await.unwrap();
        let b = gateway.add_task(&project.id, "Lavar").await.unwrap();
        let c = gateway.add_task(&project.id, "Cocinar").await.unwrap();
        assert!(!a.done);
        assert_ne!(a.id, b.id);

        gateway.toggle_task(&project.id, &b.id).await;
        gateway.edit_task(&project.id, &c.id, "Cocinar arroz").await;
        gateway.delete_task(&project.id, &a.id).await;

        let tasks = gateway.list_projects().await.remove(0).tasks;
        let summary: Vec<_> = tasks
            .iter()
            .map(|task| (task.id.clone(), task.text.as_str(), task.done))
            .collect();
        assert_eq!(
            summary,
            vec![
                (b.id.clone(), "Lavar", true),
                (c.id.clone(), "Cocinar arroz", false),
            ]
        );
    }

    #[tokio::test]
    async fn add_task_to_missing_project_returns_none() {
        let (gateway, _) = gateway();
        assert!(gateway.add_task("missing", "Barrer").await.is_none());
    }

    #[tokio::test]
    async fn reorder_moves_project_and_renumbers() {
        let (gateway, _) = gateway();
        for name in ["a", "b", "c", "d"] {
            gateway.create_project(name).await.unwrap();
        }

        gateway.reorder_projects(2, 0).await;

        let projects = gateway.list_projects().await;
        let names: Vec<_> = projects.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["c", "a", "b", "d"]);
        for (rank, project) in projects.iter().enumerate() {
            assert_eq!(project.position, rank as i64);
        }
    }

    #[tokio::test]
    async fn out_of_range_reorder_is_ignored() {
        let (gateway, _) = gateway();
        gateway.create_project("a").await.unwrap();
        gateway.reorder_projects(0, 5).await;
        assert_eq!(gateway.list_projects().await[0].position, 0);
    }

    #[tokio::test]
    async fn failed_reads_degrade_to_defaults() {
        let gateway = Gateway::new(Arc::new(FailingStore), signed_in(), PreferenceStore::ephemeral());
        assert!(gateway.list_habits().await.is_empty());
        assert!(gateway.list_projects().await.is_empty());
        assert!(gateway.all_week_logs(week()).await.is_empty());
        assert_eq!(gateway.week_log(week(), "h1").await, Days::default());
        assert!(gateway.create_project("Casa").await.is_none());
        assert!(gateway.add_task("p1", "Barrer").await.is_none());
        gateway.set_day(week(), "h1", 1, true).await;
        gateway.reorder_projects(0, 1).await;
    }

    #[tokio::test]
    async fn null_days_row_only_blanks_its_own_habit() {
        let (gateway, store) = gateway();
        gateway.set_day(week(), "h1", 0, true).await;
        store
            .insert(
                Table::HabitLogs,
                json!({ "habit_id": "h2", "week": "2024-W05", "days": null, "user_id": "user-1" }),
            )
            .await
            .unwrap();

        let logs = gateway.all_week_logs(week()).await;
        assert_eq!(logs["h1"], Days::only(0, true));
        assert_eq!(logs["h2"], Days::default());

        gateway.set_day(week(), "h2", 3, true).await;
        assert_eq!(gateway.week_log(week(), "h2").await, Days::only(3, true));
        assert_eq!(store.rows(Table::HabitLogs).await.len(), 2);
    }

    /// Memory store whose updates fail for one project id.
    struct RejectingUpdates {
        inner: MemoryStore,
        rejected: String,
    }

    #[async_trait]
    impl RemoteStore for RejectingUpdates {
        async fn select(&self, table: Table, query: &Query) -> Result<Vec<Value>, StoreError> {
            self.inner.select(table, query).await
        }

        async fn insert(&self, table: Table, row: Value) -> Result<Value, StoreError> {
            self.inner.insert(table, row).await
        }

        async fn update(
            &self,
            table: Table,
            filters: &[Filter],
            patch: Value,
        ) -> Result<(), StoreError> {
            if filters.iter().any(|f| f.value == self.rejected.as_str()) {
                return Err(StoreError::new("row is locked"));
            }
            self.inner.update(table, filters, patch).await
        }

        async fn delete(&self, table: Table, filters: &[Filter]) -> Result<(), StoreError> {
            self.inner.delete(table, filters).await
        }
    }

    #[tokio::test]
    async fn partial_reorder_keeps_the_updates_that_succeeded() {
        let inner = MemoryStore::new();
        for (position, name) in ["a", "b", "c"].into_iter().enumerate() {
            let row = json!({ "id": name, "name": name, "user_id": "user-1", "position": position, "tasks": [] });
            inner.insert(Table::Projects, row).await.unwrap();
        }
        let store = Arc::new(RejectingUpdates {
            inner,
            rejected: "b".into(),
        });
        let gateway = Gateway::new(store, signed_in(), PreferenceStore::ephemeral());

        gateway.reorder_projects(2, 0).await;

        let positions: HashMap<String, i64> = gateway
            .list_projects()
            .await
            .into_iter()
            .map(|p| (p.name, p.position))
            .collect();
        assert_eq!(positions["c"], 0);
        assert_eq!(positions["a"], 1);
        // "b" kept its old position; nothing was rolled back.
        assert_eq!(positions["b"], 1);
    }

    #[tokio::test]
    async fn active_tab_round_trips_through_preferences() {
        let (gateway, _) = gateway();
        assert_eq!(gateway.active_tab().await, ActiveTab::Habits);
        gateway.set_active_tab(ActiveTab::Projects).await;
        assert_eq!(gateway.active_tab().await, ActiveTab::Projects);
    }

    #[test]
    fn move_item_shifts_neighbours() {
        let mut items = vec![0, 1, 2, 3];
        assert!(move_item(&mut items, 0, 3));
        assert_eq!(items, vec![1, 2, 3, 0]);
        assert!(!move_item(&mut items, 4, 0));
    }
}
