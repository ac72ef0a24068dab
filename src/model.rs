use chrono::{DateTime, NaiveDate, NaiveDateTime, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

use crate::error::{Result, TrackerError};

/// Column order of the task table.
pub const TASK_HEADERS: [&str; 10] = [
    "id",
    "title",
    "due_date",
    "estimated_hours",
    "hours_logged",
    "priority",
    "status",
    "steps",
    "created_at",
    "completed_at",
];

/// Column order of the timetable.
pub const TIMETABLE_HEADERS: [&str; 6] = ["id", "day", "start_time", "end_time", "activity", "focus"];

/// Hours logged or estimated when a task is completed without any.
pub const DEFAULT_COMPLETION_HOURS: f64 = 1.0;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// A single study task, saved as a row of the task table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    /// `YYYY-MM-DD` when written by the tracker; imported text is kept as is.
    #[serde(default)]
    pub due_date: String,
    #[serde(with = "hours_field")]
    pub estimated_hours: f64,
    #[serde(with = "hours_field", default)]
    pub hours_logged: f64,
    pub priority: Priority,
    pub status: Status,
    #[serde(default)]
    pub steps: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub completed_at: String,
}

impl Task {
    pub fn is_done(&self) -> bool {
        self.status == Status::Done
    }

    /// Hours still needed to reach the estimate, never negative.
    pub fn remaining_hours(&self) -> f64 {
        (self.estimated_hours - self.hours_logged).max(0.0)
    }

    /// The due date, when the stored text reads as a date.
    pub fn due(&self) -> Option<NaiveDate> {
        parse_date_lenient(&self.due_date)
    }

    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        !self.is_done() && self.due().map_or(false, |due| due < today)
    }

    /// The calendar day the task was created on, if created_at can be read.
    pub fn created_on(&self) -> Option<NaiveDate> {
        parse_date_lenient(&self.created_at)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
        };
        f.write_str(name)
    }
}

impl FromStr for Priority {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            other => Err(TrackerError::InvalidInput {
                field: "priority",
                reason: format!("expected Low, Medium or High, got '{}'", other),
            }),
        }
    }
}

// Stored values are decoded leniently: anything unknown falls back to Medium.
impl From<String> for Priority {
    fn from(s: String) -> Self {
        if s.trim().is_empty() {
            return Priority::Medium;
        }
        s.parse().unwrap_or_else(|_| {
            warn!(value = %s, "unknown priority, using Medium");
            Priority::Medium
        })
    }
}

impl From<Priority> for String {
    fn from(p: Priority) -> Self {
        p.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Status {
    Todo,
    Done,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Todo => f.write_str("todo"),
            Status::Done => f.write_str("done"),
        }
    }
}

impl FromStr for Status {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "todo" => Ok(Status::Todo),
            "done" => Ok(Status::Done),
            other => Err(TrackerError::InvalidInput {
                field: "status",
                reason: format!("expected todo or done, got '{}'", other),
            }),
        }
    }
}

impl From<String> for Status {
    fn from(s: String) -> Self {
        if s.trim().is_empty() {
            return Status::Todo;
        }
        s.parse().unwrap_or_else(|_| {
            warn!(value = %s, "unknown status, using todo");
            Status::Todo
        })
    }
}

impl From<Status> for String {
    fn from(s: Status) -> Self {
        s.to_string()
    }
}

/// One line of a task's step list.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub id: usize,
    pub description: String,
    pub completed: bool,
    pub order: usize,
}

/// A slot of the weekly timetable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimetableEntry {
    pub id: String,
    #[serde(with = "weekday_field")]
    pub day: Weekday,
    pub start_time: String,
    pub end_time: String,
    pub activity: String,
    #[serde(default)]
    pub focus: String,
}

/// Full English name of a weekday, as stored in the timetable.
pub fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

/// A fresh opaque id for a task or a timetable entry.
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Find the row whose id is `id`, or the only row whose id starts with it.
pub fn position_by_id<T, F>(rows: &[T], id: &str, entity: &'static str, id_of: F) -> Result<usize>
where
    F: Fn(&T) -> &str,
{
    let id = id.trim();
    if id.is_empty() {
        return Err(TrackerError::NotFound { entity, id: id.to_string() });
    }
    if let Some(pos) = rows.iter().position(|row| id_of(row) == id) {
        return Ok(pos);
    }

    let mut matches = rows
        .iter()
        .enumerate()
        .filter(|(_, row)| id_of(row).starts_with(id))
        .map(|(pos, _)| pos);

    match (matches.next(), matches.next()) {
        (Some(pos), None) => Ok(pos),
        (Some(_), Some(_)) => Err(TrackerError::AmbiguousId { entity, id: id.to_string() }),
        (None, _) => Err(TrackerError::NotFound { entity, id: id.to_string() }),
    }
}

/// Parse a date or date-time written in one of the common layouts and
/// return its calendar day.
pub fn parse_date_lenient(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.date_naive());
    }

    const DATETIME_FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ];
    for format in DATETIME_FORMATS.iter() {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Some(dt.date());
        }
    }

    const DATE_FORMATS: [&str; 7] = [
        "%Y-%m-%d",
        "%Y/%m/%d",
        "%m/%d/%Y",
        "%d.%m.%Y",
        "%B %d, %Y",
        "%b %d, %Y",
        "%d %B %Y",
    ];
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
}

/// Stored form of a day.
pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Reduce a free-form date to a bare `YYYY-MM-DD`. Text that cannot be read
/// as a date keeps its first ten characters.
pub fn normalize_date(raw: &str) -> String {
    let raw = raw.trim();
    if raw.is_empty() {
        return String::new();
    }
    match parse_date_lenient(raw) {
        Some(date) => format_date(date),
        None => {
            warn!(value = %raw, "unparsable date, keeping its first ten characters");
            raw.chars().take(10).collect::<String>().trim_end().to_string()
        }
    }
}

/// Fixed two decimal text used for every hours column.
pub fn format_hours(hours: f64) -> String {
    format!("{:.2}", hours)
}

/// Parse an hours value, coercing anything malformed or negative to 0.
pub fn coerce_hours(raw: &str) -> f64 {
    let raw = raw.trim();
    if raw.is_empty() {
        return 0.0;
    }
    match raw.parse::<f64>() {
        Ok(h) if h.is_finite() => h.max(0.0),
        _ => {
            warn!(value = %raw, "malformed hours, using 0");
            0.0
        }
    }
}

mod hours_field {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(hours: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_hours(*hours))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(super::coerce_hours(&raw))
    }
}

mod weekday_field {
    use chrono::Weekday;
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(day: &Weekday, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(super::weekday_name(*day))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Weekday, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.trim()
            .parse::<Weekday>()
            .map_err(|_| D::Error::custom(format!("unknown day '{}'", raw)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids() -> Vec<String> {
        vec!["a1b2".to_string(), "a1c3".to_string(), "ff00".to_string()]
    }

    #[test]
    fn test_position_by_exact_id() {
        let rows = ids();
        assert_eq!(position_by_id(&rows, "a1c3", "Task", |r| r.as_str()).unwrap(), 1);
    }

    #[test]
    fn test_position_by_unique_prefix() {
        let rows = ids();
        assert_eq!(position_by_id(&rows, "ff", "Task", |r| r.as_str()).unwrap(), 2);
    }

    #[test]
    fn test_position_by_ambiguous_prefix() {
        let rows = ids();
        let err = position_by_id(&rows, "a1", "Task", |r| r.as_str()).unwrap_err();
        assert!(matches!(err, TrackerError::AmbiguousId { .. }));
    }

    #[test]
    fn test_position_by_unknown_id() {
        let rows = ids();
        let err = position_by_id(&rows, "zz", "Task", |r| r.as_str()).unwrap_err();
        assert!(matches!(err, TrackerError::NotFound { entity: "Task", .. }));
    }

    #[test]
    fn test_priority_lenient_decoding() {
        assert_eq!(Priority::from("high".to_string()), Priority::High);
        assert_eq!(Priority::from("".to_string()), Priority::Medium);
        assert_eq!(Priority::from("urgent".to_string()), Priority::Medium);
        assert!("urgent".parse::<Priority>().is_err());
    }

    #[test]
    fn test_status_lenient_decoding() {
        assert_eq!(Status::from("DONE".to_string()), Status::Done);
        assert_eq!(Status::from("waiting".to_string()), Status::Todo);
    }

    #[test]
    fn test_parse_date_lenient_layouts() {
        let expected = NaiveDate::from_ymd_opt(2025, 10, 15);
        assert_eq!(parse_date_lenient("2025-10-15"), expected);
        assert_eq!(parse_date_lenient("2025-10-15T09:30:00.123456-04:00"), expected);
        assert_eq!(parse_date_lenient("2025-10-15 09:30:00"), expected);
        assert_eq!(parse_date_lenient("10/15/2025"), expected);
        assert_eq!(parse_date_lenient("October 15, 2025"), expected);
        assert_eq!(parse_date_lenient("soon"), None);
    }

    #[test]
    fn test_normalize_date_falls_back_to_prefix() {
        assert_eq!(normalize_date("2025-10-15T09:30:00-04:00"), "2025-10-15");
        assert_eq!(normalize_date("Oct 15, 2025"), "2025-10-15");
        assert_eq!(normalize_date("2025-10-15 around noon"), "2025-10-15");
        assert_eq!(normalize_date("15/10/2025 evening"), "15/10/2025");
        assert_eq!(normalize_date("whenever"), "whenever");
        assert_eq!(normalize_date("   "), "");
    }

    #[test]
    fn test_due_reads_stored_text() {
        let mut task = Task {
            id: "a".into(),
            title: "Essay".into(),
            due_date: "2025-10-15".into(),
            estimated_hours: 1.0,
            hours_logged: 0.0,
            priority: Priority::Medium,
            status: Status::Todo,
            steps: String::new(),
            created_at: String::new(),
            completed_at: String::new(),
        };
        let day = NaiveDate::from_ymd_opt(2025, 10, 16).unwrap();
        assert_eq!(task.due(), NaiveDate::from_ymd_opt(2025, 10, 15));
        assert!(task.is_overdue(day));

        task.due_date = "15/10/2025".into();
        assert_eq!(task.due(), None);
        assert!(!task.is_overdue(day));
    }

    #[test]
    fn test_coerce_hours() {
        assert_eq!(coerce_hours("2.5"), 2.5);
        assert_eq!(coerce_hours(" 3 "), 3.0);
        assert_eq!(coerce_hours("two"), 0.0);
        assert_eq!(coerce_hours("-4"), 0.0);
        assert_eq!(coerce_hours("NaN"), 0.0);
        assert_eq!(format_hours(1.0), "1.00");
    }

    #[test]
    fn test_weekday_names() {
        assert_eq!(weekday_name(Weekday::Wed), "Wednesday");
        assert_eq!("wednesday".parse::<Weekday>().unwrap(), Weekday::Wed);
    }

    #[test]
    fn test_generated_ids_are_unique_hex() {
        let a = generate_id();
        let b = generate_id();
        assert_ne!(a, b);
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
