use chrono::{Datelike, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Weeks wrap at 52 in both directions; week 53 is only ever produced by
/// [`WeekId::current_at`] for the last days of some years.
pub const WEEKS_PER_YEAR: u32 = 52;

/// Year-week key used for habit logs, formatted as `2024-W05`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WeekId {
    year: i32,
    week: u32,
}

impl WeekId {
    pub fn new(year: i32, week: u32) -> Self {
        Self { year, week }
    }

    pub fn current() -> Self {
        Self::current_at(Local::now().date_naive())
    }

    /// Simplified week numbering: `ceil((day_of_year + jan1_weekday + 1) / 7)`
    /// with the weekday counted from Sunday. Not ISO-8601.
    pub fn current_at(date: NaiveDate) -> Self {
        let jan1 = NaiveDate::from_ymd_opt(date.year(), 1, 1).unwrap_or(date);
        let offset = jan1.weekday().num_days_from_sunday();
        let week = (date.ordinal0() + offset + 1).div_ceil(7);
        Self::new(date.year(), week)
    }

    pub fn adjacent(self, direction: i32) -> Self {
        let mut year = self.year;
        let mut week = self.week as i64 + direction as i64;
        if week < 1 {
            year -= 1;
            week = WEEKS_PER_YEAR as i64;
        } else if week > WEEKS_PER_YEAR as i64 {
            year += 1;
            week = 1;
        }
        Self::new(year, week as u32)
    }

    pub fn previous(self) -> Self {
        self.adjacent(-1)
    }

    pub fn next(self) -> Self {
        self.adjacent(1)
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn week(&self) -> u32 {
        self.week
    }

    /// Human label shown above the habit grid.
    pub fn label(&self) -> String {
        format!("Semana {:02}, {}", self.week, self.year)
    }
}

impl fmt::Display for WeekId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-W{:02}", self.year, self.week)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseWeekError(String);

impl fmt::Display for ParseWeekError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid week id '{}', expected YYYY-WNN", self.0)
    }
}

impl std::error::Error for ParseWeekError {}

impl FromStr for WeekId {
    type Err = ParseWeekError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseWeekError(value.to_string());
        let (year, week) = value.trim().split_once("-W").ok_or_else(invalid)?;
        let year = year.parse::<i32>().map_err(|_| invalid())?;
        let week = week.parse::<u32>().map_err(|_| invalid())?;
        if week == 0 || week > WEEKS_PER_YEAR + 1 {
            return Err(invalid());
        }
        Ok(Self::new(year, week))
    }
}

impl TryFrom<String> for WeekId {
    type Error = ParseWeekError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<WeekId> for String {
    fn from(week: WeekId) -> Self {
        week.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn week(value: &str) -> WeekId {
        value.parse().expect("valid week id")
    }

    #[test]
    fn next_week_wraps_into_next_year() {
        assert_eq!(week("2024-W52").next().to_string(), "2025-W01");
    }

    #[test]
    fn previous_week_wraps_into_previous_year() {
        assert_eq!(week("2024-W01").previous().to_string(), "2023-W52");
    }

    #[test]
    fn stepping_forward_then_back_is_identity() {
        for id in ["2024-W01", "2024-W02", "2024-W26", "2024-W51", "1999-W10"] {
            assert_eq!(week(id).next().previous(), week(id));
            assert_eq!(week(id).previous().next(), week(id));
        }
    }

    #[test]
    fn week_53_steps_forward_to_week_one() {
        assert_eq!(week("2023-W53").next().to_string(), "2024-W01");
    }

    #[test]
    fn current_week_uses_sunday_based_offset() {
        // 2024-01-01 is a Monday (offset 1): (0 + 1 + 1) / 7 rounds up to 1.
        let jan1 = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert_eq!(WeekId::current_at(jan1).to_string(), "2024-W01");

        // 2024-01-07 is the first Sunday: (6 + 1 + 1) / 7 rounds up to 2.
        let jan7 = NaiveDate::from_ymd_opt(2024, 1, 7).unwrap();
        assert_eq!(WeekId::current_at(jan7).to_string(), "2024-W02");

        let feb6 = NaiveDate::from_ymd_opt(2026, 2, 6).unwrap();
        assert_eq!(WeekId::current_at(feb6).to_string(), "2026-W06");
    }

    #[test]
    fn last_days_of_some_years_land_in_week_53() {
        // 2022-01-01 is a Saturday (offset 6).
        let dec31 = NaiveDate::from_ymd_opt(2022, 12, 31).unwrap();
        assert_eq!(WeekId::current_at(dec31).to_string(), "2022-W53");
    }

    #[test]
    fn parse_rejects_malformed_ids() {
        assert!("2024-05".parse::<WeekId>().is_err());
        assert!("2024-W00".parse::<WeekId>().is_err());
        assert!("2024-W60".parse::<WeekId>().is_err());
        assert!("abcd-W05".parse::<WeekId>().is_err());
    }

    #[test]
    fn label_pads_week_number() {
        assert_eq!(week("2024-W05").label(), "Semana 05, 2024");
    }
}
