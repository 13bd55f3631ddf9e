use crate::week::WeekId;
use serde::{Deserialize, Deserializer, Serialize};
use std::{fmt, str::FromStr};

pub const DAYS_PER_WEEK: usize = 7;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Habit {
    pub id: String,
    pub name: String,
    pub user_id: String,
    pub created_at: String,
}

/// Monday..Sunday completion flags. Always exactly seven entries; shorter
/// payloads are padded with `false` and longer ones truncated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Vec<bool>", into = "Vec<bool>")]
pub struct Days([bool; DAYS_PER_WEEK]);

impl Days {
    pub fn only(day: usize, value: bool) -> Self {
        Self::default().with(day, value)
    }

    pub fn with(mut self, day: usize, value: bool) -> Self {
        if let Some(slot) = self.0.get_mut(day) {
            *slot = value;
        }
        self
    }

    pub fn get(&self, day: usize) -> bool {
        self.0.get(day).copied().unwrap_or(false)
    }

    pub fn completed(&self) -> usize {
        self.0.iter().filter(|done| **done).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        self.0.iter().copied()
    }
}

impl From<[bool; DAYS_PER_WEEK]> for Days {
    fn from(days: [bool; DAYS_PER_WEEK]) -> Self {
        Self(days)
    }
}

impl From<Vec<bool>> for Days {
    fn from(values: Vec<bool>) -> Self {
        let mut days = [false; DAYS_PER_WEEK];
        for (slot, value) in days.iter_mut().zip(values) {
            *slot = value;
        }
        Self(days)
    }
}

impl From<Days> for Vec<bool> {
    fn from(days: Days) -> Self {
        days.0.to_vec()
    }
}

/// Reads a `days` column that may be `null`, which stands for an untouched
/// week.
pub fn nullable_days<'de, D>(deserializer: D) -> Result<Days, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Days>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeekLog {
    pub id: String,
    pub habit_id: String,
    pub week: WeekId,
    #[serde(default, deserialize_with = "nullable_days")]
    pub days: Days,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub user_id: String,
    pub position: i64,
    #[serde(default, deserialize_with = "nullable_tasks")]
    pub tasks: Vec<Task>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub text: String,
    pub done: bool,
    /// Milliseconds since the Unix epoch.
    #[serde(rename = "createdAt")]
    pub created_at: i64,
}

fn nullable_tasks<'de, D>(deserializer: D) -> Result<Vec<Task>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<Task>>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActiveTab {
    #[default]
    Habits,
    Projects,
}

impl ActiveTab {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActiveTab::Habits => "habits",
            ActiveTab::Projects => "projects",
        }
    }
}

impl fmt::Display for ActiveTab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActiveTab {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "habits" => Ok(ActiveTab::Habits),
            "projects" => Ok(ActiveTab::Projects),
            other => Err(format!("unknown tab '{other}'")),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct HabitQuery {
    pub week: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NewHabitForm {
    pub name: String,
    pub week: String,
}

#[derive(Debug, Deserialize)]
pub struct WeekForm {
    pub week: String,
}

#[derive(Debug, Deserialize)]
pub struct DayForm {
    pub week: String,
    /// Present only when the checkbox ends up checked.
    pub value: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ProjectQuery {
    pub edit: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NameForm {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct TaskForm {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct EditTaskForm {
    pub text: String,
    pub original: String,
}

#[derive(Debug, Deserialize)]
pub struct ReorderForm {
    pub from: usize,
    pub to: usize,
}

#[derive(Debug, Deserialize)]
pub struct AuthQuery {
    pub mode: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CredentialsForm {
    pub email: String,
    pub password: String,
}
