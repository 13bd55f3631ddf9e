use crate::models::{DAYS_PER_WEEK, Days, Task};

/// Presentation band for a habit's weekly completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Band {
    High,
    Medium,
    Low,
}

impl Band {
    pub fn for_percentage(percentage: u32) -> Self {
        if percentage >= 80 {
            Band::High
        } else if percentage >= 50 {
            Band::Medium
        } else {
            Band::Low
        }
    }

    pub fn css_class(&self) -> &'static str {
        match self {
            Band::High => "high",
            Band::Medium => "medium",
            Band::Low => "low",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HabitScore {
    pub completed: usize,
    pub percentage: u32,
    pub band: Band,
}

pub fn habit_score(days: &Days) -> HabitScore {
    let completed = days.completed();
    let percentage = rounded_percent(completed, DAYS_PER_WEEK);
    HabitScore {
        completed,
        percentage,
        band: Band::for_percentage(percentage),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub done: usize,
    pub total: usize,
    pub percentage: u32,
}

impl Progress {
    pub fn is_complete(&self) -> bool {
        self.percentage == 100
    }
}

pub fn project_progress(tasks: &[Task]) -> Progress {
    let total = tasks.len();
    let done = tasks.iter().filter(|task| task.done).count();
    let percentage = if total == 0 { 0 } else { rounded_percent(done, total) };
    Progress {
        done,
        total,
        percentage,
    }
}

fn rounded_percent(part: usize, whole: usize) -> u32 {
    (part as f64 / whole as f64 * 100.0).round() as u32
}
